//! Install pipeline and the install identity lifecycle

use std::path::Path;

use ct_common::chart::{effective_overrides, find_values_files};
use ct_common::{InstallIdentity, Result, ValuesOverride};
use tracing::info;

use crate::testing::Testing;

impl Testing {
    /// Install `chart` once per values file, verifying and tearing down each release.
    ///
    /// Stops at the first failing values file.
    pub async fn install(&self, chart: &Path) -> Result<()> {
        info!(chart = %chart.display(), "Installing chart");
        let values_files = find_values_files(chart);

        for values in effective_overrides(&values_files) {
            let identity = self.acquire_identity(chart);
            let outcome = self.install_and_test(chart, &values, &identity).await;
            self.release_identity(&identity).await;
            outcome?;
        }
        Ok(())
    }

    async fn install_and_test(
        &self,
        chart: &Path,
        values: &ValuesOverride,
        identity: &InstallIdentity,
    ) -> Result<()> {
        info!(chart = %chart.display(), %values, release = %identity.release, "Installing chart with values");
        self.tools
            .helm
            .install(chart, values, &identity.namespace, &identity.release)
            .await?;
        self.test_release(identity, false).await
    }

    /// A fresh namespace/release pair for one install attempt.
    pub(crate) fn acquire_identity(&self, chart: &Path) -> InstallIdentity {
        InstallIdentity::generate(
            chart,
            &self.config.build_id,
            self.config.namespace.as_deref(),
            &self.config.release_label,
            &mut rand::thread_rng(),
        )
    }

    /// Tear down everything created under `identity`.
    ///
    /// Pod diagnostics are collected before the release is deleted. Generated
    /// namespaces are deleted too; a configured namespace is left alone.
    pub(crate) async fn release_identity(&self, identity: &InstallIdentity) {
        self.print_pod_details_and_logs(&identity.namespace, &identity.selector)
            .await;
        self.tools
            .helm
            .delete_release(&identity.namespace, &identity.release)
            .await;
        if identity.ephemeral_namespace {
            self.tools.kubectl.delete_namespace(&identity.namespace).await;
        }
    }

    /// Wait for the release's deployments, then run its test hooks.
    pub(crate) async fn test_release(&self, identity: &InstallIdentity, cleanup: bool) -> Result<()> {
        self.tools
            .kubectl
            .wait_for_deployments(&identity.namespace, &identity.selector)
            .await?;
        self.tools
            .helm
            .test(&identity.namespace, &identity.release, cleanup)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{CallLog, MockTools};
    use ct_common::{Configuration, Error};
    use std::path::PathBuf;

    /// Chart dir with the given CI values files.
    fn chart_with_values(files: &[&str]) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let chart = dir.path().join("nginx");
        std::fs::create_dir_all(chart.join("ci")).unwrap();
        for file in files {
            std::fs::write(chart.join("ci").join(file), "replicas: 1\n").unwrap();
        }
        (dir, chart)
    }

    fn logged_cleanup(tools: &mut MockTools, log: &CallLog) {
        tools.kubectl.expect_get_pods().returning(|_, _| Ok(Vec::new()));
        let l = log.clone();
        tools.helm.expect_delete_release().returning(move |_, release| {
            l.push(format!("delete-release {}", release));
        });
        let l = log.clone();
        tools.kubectl.expect_delete_namespace().returning(move |ns| {
            l.push(format!("delete-namespace {}", ns));
        });
    }

    #[tokio::test]
    async fn each_values_file_gets_its_own_identity_and_cleanup() {
        let (_dir, chart) = chart_with_values(&["a-values.yaml", "b-values.yaml"]);
        let log = CallLog::default();
        let mut tools = MockTools::new();
        let l = log.clone();
        tools
            .helm
            .expect_install()
            .times(2)
            .returning(move |_, values, ns, release| {
                assert_eq!(ns, release);
                l.push(format!("install {} {}", values, release));
                Ok(())
            });
        tools
            .kubectl
            .expect_wait_for_deployments()
            .withf(|_, selector| selector.is_empty())
            .returning(|_, _| Ok(()));
        tools
            .helm
            .expect_test()
            .withf(|_, _, cleanup| !cleanup)
            .returning(|_, _, _| Ok(()));
        logged_cleanup(&mut tools, &log);

        tools
            .into_testing(Configuration::default())
            .install(&chart)
            .await
            .unwrap();

        let calls = log.calls();
        assert_eq!(calls.len(), 6);
        assert!(calls[0].starts_with("install ") && calls[0].contains("a-values.yaml"));
        assert!(calls[3].starts_with("install ") && calls[3].contains("b-values.yaml"));
        let first_release = calls[0].rsplit(' ').next().unwrap().to_string();
        let second_release = calls[3].rsplit(' ').next().unwrap().to_string();
        assert_ne!(first_release, second_release);
        assert_eq!(calls[1], format!("delete-release {}", first_release));
        assert_eq!(calls[2], format!("delete-namespace {}", first_release));
    }

    #[tokio::test]
    async fn failed_install_still_cleans_up_and_stops() {
        let (_dir, chart) = chart_with_values(&["a-values.yaml", "b-values.yaml"]);
        let log = CallLog::default();
        let mut tools = MockTools::new();
        tools
            .helm
            .expect_install()
            .times(1)
            .returning(|_, _, _, _| Err(Error::helm("timed out waiting for the condition")));
        tools.kubectl.expect_wait_for_deployments().never();
        logged_cleanup(&mut tools, &log);

        let err = tools
            .into_testing(Configuration::default())
            .install(&chart)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Helm { .. }));
        let calls = log.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].starts_with("delete-release nginx-"));
        assert!(calls[1].starts_with("delete-namespace nginx-"));
    }

    #[tokio::test]
    async fn readiness_failure_propagates_after_cleanup() {
        let log = CallLog::default();
        let mut tools = MockTools::new();
        tools.helm.expect_install().returning(|_, values, _, _| {
            assert_eq!(*values, ValuesOverride::Defaults);
            Ok(())
        });
        tools
            .kubectl
            .expect_wait_for_deployments()
            .returning(|_, _| Err(Error::cluster("deployment not available")));
        tools.helm.expect_test().never();
        logged_cleanup(&mut tools, &log);

        let err = tools
            .into_testing(Configuration::default())
            .install(Path::new("charts/no-ci"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cluster { .. }));
        assert_eq!(log.calls().len(), 2);
    }

    #[tokio::test]
    async fn fixed_namespace_is_kept_and_selector_targets_release() {
        let log = CallLog::default();
        let mut tools = MockTools::new();
        tools
            .helm
            .expect_install()
            .withf(|_, _, ns, _| ns == "ci")
            .returning(|_, _, _, _| Ok(()));
        tools
            .kubectl
            .expect_wait_for_deployments()
            .withf(|ns, selector| ns == "ci" && selector.starts_with("app.kubernetes.io/instance=nginx-"))
            .returning(|_, _| Ok(()));
        tools.helm.expect_test().returning(|_, _, _| Ok(()));
        tools
            .kubectl
            .expect_get_pods()
            .withf(|ns, selector| ns == "ci" && !selector.is_empty())
            .returning(|_, _| Ok(Vec::new()));
        let l = log.clone();
        tools.helm.expect_delete_release().returning(move |ns, _| {
            l.push(format!("delete-release in {}", ns));
        });
        tools.kubectl.expect_delete_namespace().never();

        let config = Configuration {
            namespace: Some("ci".to_string()),
            ..Configuration::default()
        };
        tools
            .into_testing(config)
            .install(Path::new("charts/nginx"))
            .await
            .unwrap();
        assert_eq!(log.calls(), vec!["delete-release in ci"]);
    }
}
