//! Helm operations via the `helm` CLI

use std::path::Path;

use async_trait::async_trait;
#[cfg(any(test, feature = "mock"))]
use mockall::automock;
use tracing::{info, warn};

use ct_common::{Result, ValuesOverride};

use crate::exec::ProcessExecutor;

/// Package manager operations.
#[cfg_attr(any(test, feature = "mock"), automock)]
#[async_trait]
pub trait Helm: Send + Sync {
    /// Client-side initialization.
    async fn init(&self) -> Result<()>;

    /// Register a chart repository.
    async fn add_repo(&self, name: &str, url: &str, extra_args: &[String]) -> Result<()>;

    /// Fetch the chart's dependencies into its `charts/` directory.
    async fn build_dependencies(&self, chart: &Path) -> Result<()>;

    /// Lint the chart with the given values.
    async fn lint(&self, chart: &Path, values: &ValuesOverride) -> Result<()>;

    /// Install the chart as `release` into `namespace` and wait for it.
    async fn install(
        &self,
        chart: &Path,
        values: &ValuesOverride,
        namespace: &str,
        release: &str,
    ) -> Result<()>;

    /// Upgrade `release` to `chart`, reusing its values.
    async fn upgrade(&self, chart: &Path, namespace: &str, release: &str) -> Result<()>;

    /// Run the release's test hooks. With `cleanup` test pod logs are not kept.
    async fn test(&self, namespace: &str, release: &str, cleanup: bool) -> Result<()>;

    /// Uninstall `release`. Failures are logged only.
    async fn delete_release(&self, namespace: &str, release: &str);
}

/// Helm implementation shelling out to the `helm` binary.
pub struct HelmClient {
    exec: ProcessExecutor,
    extra_args: Vec<String>,
}

impl HelmClient {
    /// `extra_args` are appended to install and upgrade.
    pub fn new(exec: ProcessExecutor, extra_args: Vec<String>) -> Self {
        Self { exec, extra_args }
    }

    fn values_args(values: &ValuesOverride) -> Vec<String> {
        match values.file() {
            Some(path) => vec!["--values".to_string(), path.display().to_string()],
            None => Vec::new(),
        }
    }

    fn install_args(
        &self,
        chart: &Path,
        values: &ValuesOverride,
        namespace: &str,
        release: &str,
    ) -> Vec<String> {
        let chart = chart.display().to_string();
        let mut args: Vec<String> = [
            "install",
            release,
            chart.as_str(),
            "--namespace",
            namespace,
            "--create-namespace",
            "--wait",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        args.extend(Self::values_args(values));
        args.extend(self.extra_args.iter().cloned());
        args
    }

    fn upgrade_args(&self, chart: &Path, namespace: &str, release: &str) -> Vec<String> {
        let chart = chart.display().to_string();
        let mut args: Vec<String> = [
            "upgrade",
            release,
            chart.as_str(),
            "--namespace",
            namespace,
            "--reuse-values",
            "--wait",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        args.extend(self.extra_args.iter().cloned());
        args
    }
}

#[async_trait]
impl Helm for HelmClient {
    async fn init(&self) -> Result<()> {
        // Helm 3 needs no server-side setup; just make sure the binary works.
        self.exec.capture("helm", ["version", "--short"]).await.map(|version| {
            info!(%version, "Using helm");
        })
    }

    async fn add_repo(&self, name: &str, url: &str, extra_args: &[String]) -> Result<()> {
        let mut args = vec![
            "repo".to_string(),
            "add".to_string(),
            name.to_string(),
            url.to_string(),
        ];
        args.extend(extra_args.iter().cloned());
        self.exec.run("helm", args).await
    }

    async fn build_dependencies(&self, chart: &Path) -> Result<()> {
        let chart = chart.display().to_string();
        self.exec
            .run("helm", ["dependency", "build", chart.as_str()])
            .await
    }

    async fn lint(&self, chart: &Path, values: &ValuesOverride) -> Result<()> {
        let mut args = vec!["lint".to_string(), chart.display().to_string()];
        args.extend(Self::values_args(values));
        self.exec.run("helm", args).await
    }

    async fn install(
        &self,
        chart: &Path,
        values: &ValuesOverride,
        namespace: &str,
        release: &str,
    ) -> Result<()> {
        let args = self.install_args(chart, values, namespace, release);
        self.exec.run("helm", args).await
    }

    async fn upgrade(&self, chart: &Path, namespace: &str, release: &str) -> Result<()> {
        let args = self.upgrade_args(chart, namespace, release);
        self.exec.run("helm", args).await
    }

    async fn test(&self, namespace: &str, release: &str, cleanup: bool) -> Result<()> {
        let mut args = vec!["test", release, "--namespace", namespace];
        if !cleanup {
            args.push("--logs");
        }
        self.exec.run("helm", args).await
    }

    async fn delete_release(&self, namespace: &str, release: &str) {
        info!(%release, %namespace, "Deleting release");
        if let Err(e) = self
            .exec
            .run("helm", ["uninstall", release, "--namespace", namespace])
            .await
        {
            warn!(%release, error = %e, "Error deleting release");
        }
    }
}
