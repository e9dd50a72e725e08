//! Chart testing configuration.
//!
//! A run is driven by one immutable [`Configuration`] snapshot. Values come from
//! an optional YAML file and are then overridden by command-line flags.
//!
//! Config file resolution (first match wins):
//! 1. Explicit `--config` path
//! 2. `ct.yaml` / `ct.yml` in the working directory
//! 3. `~/.ct/ct.yaml`
//! 4. `/etc/ct/ct.yaml`

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::{Error, Result};

const CONFIG_FILE_NAMES: &[&str] = &["ct.yaml", "ct.yml"];
const USER_CONFIG_DIR: &str = ".ct";
const SYSTEM_CONFIG_DIR: &str = "/etc/ct";

/// Default yamllint configuration file name
pub const DEFAULT_LINT_CONF: &str = "lintconf.yaml";
/// Default yamale schema for Chart.yaml
pub const DEFAULT_CHART_SCHEMA: &str = "chart_schema.yaml";

/// Configuration for a chart testing run.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "kebab-case")]
pub struct Configuration {
    /// Git remote holding the target branch
    pub remote: String,
    /// Branch changes are compared against
    pub target_branch: String,
    /// CI build identifier, folded into generated namespaces
    pub build_id: String,
    /// yamllint configuration file
    pub lint_conf: Option<PathBuf>,
    /// yamale schema used to validate Chart.yaml
    pub chart_yaml_schema: Option<PathBuf>,
    /// Validate maintainer names against the hosting domain
    pub validate_maintainers: bool,
    /// Validate Chart.yaml against the schema
    pub validate_chart_schema: bool,
    /// Lint Chart.yaml, values.yaml and CI values files with yamllint
    pub validate_yaml: bool,
    /// Require a version bump on changed charts
    pub check_version_increment: bool,
    /// Process every chart in the chart directories
    pub all: bool,
    /// Explicit chart list, bypasses selection
    pub charts: Vec<PathBuf>,
    /// Chart repositories to register, as `name=url`
    pub chart_repos: Vec<String>,
    /// Extra `helm repo add` arguments per repository, as `name=args`
    pub helm_repo_extra_args: Vec<String>,
    /// Extra arguments for `helm install` and `helm upgrade`
    pub helm_extra_args: String,
    /// Directories containing charts
    pub chart_dirs: Vec<PathBuf>,
    /// Chart names to skip
    pub excluded_charts: Vec<String>,
    /// Test in-place upgrades from the target branch revision
    pub upgrade: bool,
    /// Skip install testing for charts without CI values files
    pub skip_missing_values: bool,
    /// Fixed namespace to install into instead of an ephemeral one
    pub namespace: Option<String>,
    /// Label identifying release resources when `namespace` is set
    pub release_label: String,
    /// Log every external command
    pub debug: bool,
    /// How long to wait for deployments to become ready
    pub deployment_timeout_secs: u64,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            remote: "origin".to_string(),
            target_branch: "main".to_string(),
            build_id: String::new(),
            lint_conf: None,
            chart_yaml_schema: None,
            validate_maintainers: true,
            validate_chart_schema: true,
            validate_yaml: true,
            check_version_increment: true,
            all: false,
            charts: Vec::new(),
            chart_repos: Vec::new(),
            helm_repo_extra_args: Vec::new(),
            helm_extra_args: String::new(),
            chart_dirs: vec![PathBuf::from("charts")],
            excluded_charts: Vec::new(),
            upgrade: false,
            skip_missing_values: false,
            namespace: None,
            release_label: "app.kubernetes.io/instance".to_string(),
            debug: false,
            deployment_timeout_secs: 300,
        }
    }
}

/// A chart repository to register before processing charts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartRepo {
    /// Local repository name
    pub name: String,
    /// Repository URL
    pub url: String,
    /// Extra `helm repo add` arguments
    pub extra_args: Vec<String>,
}

impl Configuration {
    /// Parse a configuration from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Read a configuration file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&content)
    }

    /// Load configuration from an explicit file, a discovered file, or defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        match CONFIG_FILE_NAMES.iter().find_map(|name| find_support_file(name)) {
            Some(path) => {
                debug!(path = %path.display(), "Using config file");
                Self::from_file(&path)
            }
            None => Ok(Self::default()),
        }
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        if self.namespace.is_some() && self.release_label.is_empty() {
            return Err(Error::config(
                "release-label is required when namespace is set",
            ));
        }
        if self.chart_dirs.is_empty() {
            return Err(Error::config("at least one chart directory is required"));
        }
        if self.upgrade {
            // The previous revision is checked out below the repository root.
            let absolute = self
                .charts
                .iter()
                .chain(&self.chart_dirs)
                .find(|path| path.is_absolute());
            if let Some(path) = absolute {
                return Err(Error::config(format!(
                    "chart paths must be relative to the repository root for upgrade testing: {}",
                    path.display()
                )));
            }
        }
        self.chart_repos()?;
        self.repo_extra_args()?;
        Ok(())
    }

    /// Chart repositories with their extra `helm repo add` arguments.
    pub fn chart_repos(&self) -> Result<Vec<ChartRepo>> {
        let mut extra_args = self.repo_extra_args()?;
        self.chart_repos
            .iter()
            .map(|entry| {
                let (name, url) = split_pair(entry, "chart-repos")?;
                Ok(ChartRepo {
                    extra_args: extra_args.remove(name).unwrap_or_default(),
                    name: name.to_string(),
                    url: url.to_string(),
                })
            })
            .collect()
    }

    fn repo_extra_args(&self) -> Result<HashMap<&str, Vec<String>>> {
        self.helm_repo_extra_args
            .iter()
            .map(|entry| {
                let (name, args) = split_pair(entry, "helm-repo-extra-args")?;
                Ok((name, args.split_whitespace().map(String::from).collect()))
            })
            .collect()
    }

    /// `helm_extra_args` split into individual arguments.
    pub fn helm_extra_args(&self) -> Vec<String> {
        self.helm_extra_args
            .split_whitespace()
            .map(String::from)
            .collect()
    }

    /// `<remote>/<target_branch>`
    pub fn target_ref(&self) -> String {
        format!("{}/{}", self.remote, self.target_branch)
    }

    /// Deployment readiness timeout.
    pub fn deployment_timeout(&self) -> Duration {
        Duration::from_secs(self.deployment_timeout_secs)
    }

    /// Whether a chart name is excluded.
    pub fn is_excluded(&self, name: &str) -> bool {
        self.excluded_charts.iter().any(|excluded| excluded == name)
    }

    /// yamllint config, configured or discovered.
    pub fn resolved_lint_conf(&self) -> Result<PathBuf> {
        resolve_support_file(self.lint_conf.as_deref(), DEFAULT_LINT_CONF)
    }

    /// Chart.yaml schema, configured or discovered.
    pub fn resolved_chart_schema(&self) -> Result<PathBuf> {
        resolve_support_file(self.chart_yaml_schema.as_deref(), DEFAULT_CHART_SCHEMA)
    }
}

fn split_pair<'a>(entry: &'a str, key: &str) -> Result<(&'a str, &'a str)> {
    match entry.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name, value)),
        _ => Err(Error::config(format!(
            "invalid {} entry '{}', expected name=value",
            key, entry
        ))),
    }
}

fn resolve_support_file(configured: Option<&Path>, default_name: &str) -> Result<PathBuf> {
    if let Some(path) = configured {
        return Ok(path.to_path_buf());
    }
    find_support_file(default_name)
        .ok_or_else(|| Error::config(format!("could not find {}", default_name)))
}

/// Search the working directory, `~/.ct` and `/etc/ct` for a file.
pub fn find_support_file(name: &str) -> Option<PathBuf> {
    let mut candidates = vec![PathBuf::from(name)];
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join(USER_CONFIG_DIR).join(name));
    }
    candidates.push(Path::new(SYSTEM_CONFIG_DIR).join(name));
    candidates.into_iter().find(|path| path.is_file())
}
