//! CLI commands
//!
//! Every flag overrides the corresponding key of the config file; flags left
//! unset keep the file's (or the built-in default) value.

use std::path::PathBuf;

use clap::Args;
use tracing::debug;

use ct_common::{Configuration, Result};
use ct_testing::TestResults;

pub mod install;
pub mod lint;
pub mod lint_and_install;
pub mod list_changed;

/// Options shared by every subcommand.
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    /// Explicit config file
    pub config: Option<PathBuf>,
    /// Debug output
    pub debug: bool,
}

/// Which charts to process.
#[derive(Args, Debug, Clone, Default)]
pub struct SelectionArgs {
    /// Git remote used to identify changed charts
    #[arg(long, env = "CT_REMOTE")]
    pub remote: Option<String>,

    /// Branch changed charts are identified against
    #[arg(long, env = "CT_TARGET_BRANCH")]
    pub target_branch: Option<String>,

    /// Process only these charts (comma-separated)
    #[arg(long, value_delimiter = ',', env = "CT_CHARTS")]
    pub charts: Vec<PathBuf>,

    /// Process all charts instead of only changed ones
    #[arg(long, env = "CT_ALL")]
    pub all: bool,

    /// Directories containing charts (comma-separated)
    #[arg(long, value_delimiter = ',', env = "CT_CHART_DIRS")]
    pub chart_dirs: Vec<PathBuf>,

    /// Charts never to process (comma-separated)
    #[arg(long, value_delimiter = ',', env = "CT_EXCLUDED_CHARTS")]
    pub excluded_charts: Vec<String>,
}

impl SelectionArgs {
    fn apply(&self, config: &mut Configuration) {
        override_with(&mut config.remote, &self.remote);
        override_with(&mut config.target_branch, &self.target_branch);
        override_list(&mut config.charts, &self.charts);
        config.all |= self.all;
        override_list(&mut config.chart_dirs, &self.chart_dirs);
        override_list(&mut config.excluded_charts, &self.excluded_charts);
    }
}

/// Chart repositories and helm invocation.
#[derive(Args, Debug, Clone, Default)]
pub struct HelmArgs {
    /// Chart repositories to add, as name=url (comma-separated)
    #[arg(long, value_delimiter = ',', env = "CT_CHART_REPOS")]
    pub chart_repos: Vec<String>,

    /// Extra `helm repo add` arguments per repository, as name=args (comma-separated)
    #[arg(long, value_delimiter = ',', env = "CT_HELM_REPO_EXTRA_ARGS")]
    pub helm_repo_extra_args: Vec<String>,
}

impl HelmArgs {
    fn apply(&self, config: &mut Configuration) {
        override_list(&mut config.chart_repos, &self.chart_repos);
        override_list(&mut config.helm_repo_extra_args, &self.helm_repo_extra_args);
    }
}

/// Lint stages.
#[derive(Args, Debug, Clone, Default)]
pub struct LintFlags {
    /// Require a chart version bump
    #[arg(long, env = "CT_CHECK_VERSION_INCREMENT")]
    pub check_version_increment: Option<bool>,

    /// Validate Chart.yaml against the schema
    #[arg(long, env = "CT_VALIDATE_CHART_SCHEMA")]
    pub validate_chart_schema: Option<bool>,

    /// Lint YAML style of Chart.yaml and values files
    #[arg(long, env = "CT_VALIDATE_YAML")]
    pub validate_yaml: Option<bool>,

    /// Validate maintainers against the hosting service
    #[arg(long, env = "CT_VALIDATE_MAINTAINERS")]
    pub validate_maintainers: Option<bool>,

    /// yamllint config file
    #[arg(long, env = "CT_LINT_CONF")]
    pub lint_conf: Option<PathBuf>,

    /// Chart.yaml schema file
    #[arg(long, env = "CT_CHART_YAML_SCHEMA")]
    pub chart_yaml_schema: Option<PathBuf>,
}

impl LintFlags {
    fn apply(&self, config: &mut Configuration) {
        override_with(&mut config.check_version_increment, &self.check_version_increment);
        override_with(&mut config.validate_chart_schema, &self.validate_chart_schema);
        override_with(&mut config.validate_yaml, &self.validate_yaml);
        override_with(&mut config.validate_maintainers, &self.validate_maintainers);
        if self.lint_conf.is_some() {
            config.lint_conf = self.lint_conf.clone();
        }
        if self.chart_yaml_schema.is_some() {
            config.chart_yaml_schema = self.chart_yaml_schema.clone();
        }
    }
}

/// Install and upgrade testing.
#[derive(Args, Debug, Clone, Default)]
pub struct InstallFlags {
    /// Extra arguments for helm install and upgrade
    #[arg(long, env = "CT_HELM_EXTRA_ARGS", allow_hyphen_values = true)]
    pub helm_extra_args: Option<String>,

    /// Build id, made part of generated namespaces
    #[arg(long, env = "CT_BUILD_ID")]
    pub build_id: Option<String>,

    /// Install into this existing namespace instead of a generated one
    #[arg(long, env = "CT_NAMESPACE")]
    pub namespace: Option<String>,

    /// Label identifying a release's resources in a fixed namespace
    #[arg(long, env = "CT_RELEASE_LABEL")]
    pub release_label: Option<String>,

    /// Test in-place upgrades from the previous revision
    #[arg(long, env = "CT_UPGRADE")]
    pub upgrade: bool,

    /// Skip install testing of charts without CI values files
    #[arg(long, env = "CT_SKIP_MISSING_VALUES")]
    pub skip_missing_values: bool,

    /// Seconds to wait for deployments to become ready
    #[arg(long, env = "CT_DEPLOYMENT_TIMEOUT")]
    pub deployment_timeout_secs: Option<u64>,
}

impl InstallFlags {
    fn apply(&self, config: &mut Configuration) {
        override_with(&mut config.helm_extra_args, &self.helm_extra_args);
        override_with(&mut config.build_id, &self.build_id);
        if self.namespace.is_some() {
            config.namespace = self.namespace.clone();
        }
        override_with(&mut config.release_label, &self.release_label);
        config.upgrade |= self.upgrade;
        config.skip_missing_values |= self.skip_missing_values;
        override_with(&mut config.deployment_timeout_secs, &self.deployment_timeout_secs);
    }
}

fn override_with<T: Clone>(target: &mut T, value: &Option<T>) {
    if let Some(value) = value {
        *target = value.clone();
    }
}

fn override_list<T: Clone>(target: &mut Vec<T>, values: &[T]) {
    if !values.is_empty() {
        *target = values.to_vec();
    }
}

/// Load the config file and layer flags over it.
pub fn load_configuration(
    global: &GlobalOptions,
    apply: impl FnOnce(&mut Configuration),
) -> Result<Configuration> {
    let mut config = Configuration::load(global.config.as_deref())?;
    config.debug |= global.debug;
    apply(&mut config);
    config.validate()?;
    debug!(?config, "Loaded configuration");
    Ok(config)
}

/// Print the summary and turn chart failures into the command's error.
fn report(testing: &ct_testing::Testing, results: &TestResults) -> Result<()> {
    testing.print_results(results);
    results.check()
}
