//! The orchestrator: selects charts and drives them through the pipelines

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ct_common::chart::find_values_files;
use ct_common::{delimiter_line, Configuration, Result};
use ct_tools::{
    AccountValidator, ChartUtils, CliLinter, DirectoryLister, FsChartUtils, FsDirectoryLister,
    Git, GitClient, Helm, HelmClient, HttpAccountValidator, KubeCluster, Kubectl, Linter,
    ProcessExecutor,
};
use tracing::{info, warn};

use crate::results::{TestResult, TestResults};
use crate::worktree::{PreviousRevisionWorktree, PREVIOUS_REVISION_DIR};

/// External collaborators the engine drives.
#[derive(Clone)]
pub struct Tools {
    /// Version control
    pub git: Arc<dyn Git>,
    /// Package manager
    pub helm: Arc<dyn Helm>,
    /// Cluster
    pub kubectl: Arc<dyn Kubectl>,
    /// YAML style and schema linters
    pub linter: Arc<dyn Linter>,
    /// Maintainer account checks
    pub account_validator: Arc<dyn AccountValidator>,
    /// Chart directory lookups
    pub chart_utils: Arc<dyn ChartUtils>,
    /// Directory listing
    pub directory_lister: Arc<dyn DirectoryLister>,
}

impl Tools {
    /// Production tools configured from `config`.
    pub fn from_config(config: &Configuration) -> Self {
        let exec = ProcessExecutor::new(config.debug);
        Self {
            git: Arc::new(GitClient::new(exec.clone())),
            helm: Arc::new(HelmClient::new(exec.clone(), config.helm_extra_args())),
            kubectl: Arc::new(KubeCluster::new(config.deployment_timeout())),
            linter: Arc::new(CliLinter::new(exec)),
            account_validator: Arc::new(HttpAccountValidator::new()),
            chart_utils: Arc::new(FsChartUtils),
            directory_lister: Arc::new(FsDirectoryLister),
        }
    }
}

/// What to do with each selected chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Lint only
    Lint,
    /// Install (and upgrade, if enabled) only
    Install,
    /// Lint, then install if linting passed
    LintAndInstall,
}

/// Chart testing engine bound to one configuration snapshot.
pub struct Testing {
    pub(crate) config: Configuration,
    pub(crate) tools: Tools,
}

impl Testing {
    /// Create an engine using the real tools.
    pub fn new(config: Configuration) -> Self {
        let tools = Tools::from_config(&config);
        Self::with_tools(config, tools)
    }

    /// Create an engine with injected tools.
    pub fn with_tools(config: Configuration, tools: Tools) -> Self {
        Self { config, tools }
    }

    /// Lint the selected charts.
    pub async fn lint_charts(&self) -> Result<TestResults> {
        self.process_charts(Action::Lint).await
    }

    /// Install the selected charts.
    pub async fn install_charts(&self) -> Result<TestResults> {
        self.process_charts(Action::Install).await
    }

    /// Lint and then install the selected charts.
    pub async fn lint_and_install_charts(&self) -> Result<TestResults> {
        self.process_charts(Action::LintAndInstall).await
    }

    /// Print the end-of-run summary.
    pub fn print_results(&self, results: &TestResults) {
        println!("{}", results.summary());
    }

    /// Run `action` over every selected chart.
    ///
    /// An `Err` means the run itself could not proceed. Per-chart failures are
    /// recorded in the returned results; see [`TestResults::check`].
    pub async fn process_charts(&self, action: Action) -> Result<TestResults> {
        let charts = self.find_charts_to_be_processed().await?;
        if charts.is_empty() {
            info!("No charts to process");
            return Ok(TestResults::default());
        }
        print_charts_banner(&charts);

        self.tools.helm.init().await?;
        for repo in self.config.chart_repos()? {
            info!(name = %repo.name, url = %repo.url, "Adding chart repository");
            self.tools
                .helm
                .add_repo(&repo.name, &repo.url, &repo.extra_args)
                .await?;
        }

        let worktree = if self.config.upgrade {
            Some(self.checkout_previous_revision(&charts).await?)
        } else {
            None
        };

        let outcome = self.run_charts(action, &charts, worktree.as_ref()).await;

        if let Some(worktree) = worktree {
            worktree.remove(self.tools.git.as_ref()).await;
        }
        outcome
    }

    async fn checkout_previous_revision(
        &self,
        charts: &[PathBuf],
    ) -> Result<PreviousRevisionWorktree> {
        let merge_base = self.compute_merge_base().await?;
        let worktree = PreviousRevisionWorktree::checkout(
            self.tools.git.as_ref(),
            PathBuf::from(PREVIOUS_REVISION_DIR),
            &merge_base,
        )
        .await?;

        for chart in charts {
            let previous = worktree.chart_path(chart);
            if let Err(e) = self.tools.helm.build_dependencies(&previous).await {
                warn!(
                    chart = %chart.display(),
                    error = %e,
                    "Error building dependencies for previous revision of chart"
                );
            }
        }
        Ok(worktree)
    }

    async fn run_charts(
        &self,
        action: Action,
        charts: &[PathBuf],
        worktree: Option<&PreviousRevisionWorktree>,
    ) -> Result<TestResults> {
        let mut results = TestResults::default();
        for chart in charts {
            let values_files = find_values_files(chart);
            self.tools.helm.build_dependencies(chart).await?;

            let result = match action {
                Action::Lint => self.lint_chart(chart, &values_files).await,
                Action::Install => self.install_chart(chart, &values_files, worktree).await,
                Action::LintAndInstall => {
                    let linted = self.lint_chart(chart, &values_files).await;
                    if linted.is_success() {
                        self.install_chart(chart, &values_files, worktree).await
                    } else {
                        linted
                    }
                }
            };
            results.record(result);
        }
        Ok(results)
    }

    /// Install-test one chart, running upgrade tests first when enabled.
    pub async fn install_chart(
        &self,
        chart: &Path,
        values_files: &[PathBuf],
        worktree: Option<&PreviousRevisionWorktree>,
    ) -> TestResult {
        if self.config.skip_missing_values && values_files.is_empty() {
            info!(chart = %chart.display(), "Skipping chart without CI values files");
            return TestResult::success(chart);
        }

        if let Some(worktree) = worktree {
            let upgraded = self.upgrade_chart(chart, worktree).await;
            if !upgraded.is_success() {
                return upgraded;
            }
            if let Err(e) = self.upgrade(chart, chart, true).await {
                return TestResult::from_outcome(chart, Err(e));
            }
        }

        TestResult::from_outcome(chart, self.install(chart).await)
    }
}

fn print_charts_banner(charts: &[PathBuf]) {
    println!();
    println!("{}", delimiter_line('-'));
    println!(" Charts to be processed:");
    println!("{}", delimiter_line('-'));
    for chart in charts {
        println!(" {}", chart.display());
    }
    println!("{}", delimiter_line('-'));
    println!();
}
