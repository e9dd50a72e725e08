//! Upgrade pipeline: install the old revision, test it, upgrade in place, test again

use std::path::Path;

use ct_common::chart::{effective_overrides, find_values_files};
use ct_common::{InstallIdentity, Result, ValuesOverride};
use tracing::{info, warn};

use crate::results::TestResult;
use crate::testing::Testing;
use crate::worktree::PreviousRevisionWorktree;

/// How one upgrade attempt ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UpgradeOutcome {
    Upgraded,
    /// The old revision could not serve as a baseline
    Skipped,
}

impl Testing {
    /// Test upgrading `chart` from its revision at the merge base.
    ///
    /// Skipped (successfully) when the version change is breaking or the chart
    /// is new. Failures of the old revision's own install or tests are ignored.
    pub async fn upgrade_chart(
        &self,
        chart: &Path,
        worktree: &PreviousRevisionWorktree,
    ) -> TestResult {
        let gate = match self.check_breaking_change_allowed(chart).await {
            Ok(gate) => gate,
            Err(e) => {
                warn!(chart = %chart.display(), error = %e, "Error comparing chart versions");
                return TestResult::from_outcome(chart, Err(e));
            }
        };

        if gate.breaking_allowed() {
            info!(chart = %chart.display(), ?gate, "Skipping upgrade test");
            return TestResult::from_outcome(chart, gate.notice().map_or(Ok(()), Err));
        }

        let old_chart = worktree.chart_path(chart);
        TestResult::from_outcome(chart, self.upgrade(&old_chart, chart, false).await)
    }

    /// Install `old_chart`, test it, upgrade the release to `new_chart`, and test again.
    ///
    /// Runs once per values file of `old_chart`. Unless `old_must_pass`, a failure
    /// to install or test the old revision skips that attempt without error.
    pub async fn upgrade(&self, old_chart: &Path, new_chart: &Path, old_must_pass: bool) -> Result<()> {
        info!(
            new_chart = %new_chart.display(),
            old_chart = %old_chart.display(),
            "Testing upgrades of chart relative to previous revision"
        );
        let values_files = find_values_files(old_chart);

        for values in effective_overrides(&values_files) {
            let identity = self.acquire_identity(old_chart);
            let outcome = self
                .upgrade_release(old_chart, new_chart, &values, &identity, old_must_pass)
                .await;
            self.release_identity(&identity).await;

            if outcome? == UpgradeOutcome::Skipped {
                info!(release = %identity.release, "Upgrade attempt skipped");
            }
        }
        Ok(())
    }

    async fn upgrade_release(
        &self,
        old_chart: &Path,
        new_chart: &Path,
        values: &ValuesOverride,
        identity: &InstallIdentity,
        old_must_pass: bool,
    ) -> Result<UpgradeOutcome> {
        info!(chart = %old_chart.display(), %values, release = %identity.release, "Installing previous revision");
        let old_install = self
            .tools
            .helm
            .install(old_chart, values, &identity.namespace, &identity.release)
            .await;
        if let Err(e) = old_install {
            if old_must_pass {
                return Err(e);
            }
            warn!(release = %identity.release, error = %e, "Upgrade testing skipped because of previous revision installation error");
            return Ok(UpgradeOutcome::Skipped);
        }

        if let Err(e) = self.test_release(identity, true).await {
            if old_must_pass {
                return Err(e);
            }
            warn!(release = %identity.release, error = %e, "Upgrade testing skipped because of previous revision testing error");
            return Ok(UpgradeOutcome::Skipped);
        }

        self.tools
            .helm
            .upgrade(new_chart, &identity.namespace, &identity.release)
            .await?;
        self.test_release(identity, false).await?;
        Ok(UpgradeOutcome::Upgraded)
    }
}
