//! Version gate: version bump enforcement and the upgrade-test skip decision

use std::cmp::Ordering;
use std::path::Path;

use ct_common::chart::CHART_YAML;
use ct_common::version::{breaking_change_allowed, compare_versions};
use ct_common::{ChartYaml, Error, Result};
use tracing::info;

use crate::testing::Testing;

/// Whether upgrade testing applies to a chart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpgradeGate {
    /// Chart is absent from the target branch; there is nothing to upgrade from
    NewChart,
    /// The version change may break existing installs; upgrade testing is skipped
    Breaking {
        /// Version on the target branch
        old: String,
        /// Version in the working copy
        new: String,
    },
    /// Compatible version change; upgrade testing must run
    Compatible {
        /// Version on the target branch
        old: String,
        /// Version in the working copy
        new: String,
    },
}

impl UpgradeGate {
    /// Whether upgrade testing may be skipped.
    pub fn breaking_allowed(&self) -> bool {
        !matches!(self, UpgradeGate::Compatible { .. })
    }

    /// The informational notice attached to the decision, if any.
    pub fn notice(&self) -> Option<Error> {
        match self {
            UpgradeGate::NewChart => Some(Error::NoPreviousRevision),
            _ => None,
        }
    }
}

impl Testing {
    /// Fail unless the chart's version is greater than on the target branch.
    ///
    /// Charts new on the target branch pass.
    pub async fn check_version_increment(&self, chart: &Path) -> Result<()> {
        info!(chart = %chart.display(), "Checking chart for a version bump");

        let Some(old) = self.old_chart_version(chart).await? else {
            return Ok(());
        };
        let new = self.new_chart_version(chart).await?;
        info!(%old, %new, "Comparing chart versions");

        if compare_versions(&old, &new)? != Ordering::Less {
            return Err(Error::VersionNotIncremented { old, new });
        }
        info!("Chart version ok");
        Ok(())
    }

    /// Decide whether the chart's version change permits skipping upgrade tests.
    pub async fn check_breaking_change_allowed(&self, chart: &Path) -> Result<UpgradeGate> {
        let Some(old) = self.old_chart_version(chart).await? else {
            return Ok(UpgradeGate::NewChart);
        };
        let new = self.new_chart_version(chart).await?;

        if breaking_change_allowed(&old, &new)? {
            Ok(UpgradeGate::Breaking { old, new })
        } else {
            Ok(UpgradeGate::Compatible { old, new })
        }
    }

    /// Chart version on the target branch, `None` for a new chart.
    async fn old_chart_version(&self, chart: &Path) -> Result<Option<String>> {
        let chart_yaml = chart.join(CHART_YAML);
        let remote = &self.config.remote;
        let branch = &self.config.target_branch;

        if !self
            .tools
            .git
            .file_exists_on_branch(&chart_yaml, remote, branch)
            .await
        {
            info!(%branch, chart = %chart.display(), "Chart not found on target branch, new chart detected");
            return Ok(None);
        }

        let contents = self.tools.git.show(&chart_yaml, remote, branch).await?;
        let parsed = ChartYaml::from_bytes(contents.as_bytes())?;
        Ok(Some(parsed.version))
    }

    async fn new_chart_version(&self, chart: &Path) -> Result<String> {
        Ok(self.tools.chart_utils.read_chart_yaml(chart).await?.version)
    }
}
