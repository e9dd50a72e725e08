//! External tool adapters for chart testing
//!
//! This crate provides:
//! - Collaborator traits for git, helm, the cluster, linters and account validation
//! - Production implementations backed by git2, kube-rs, reqwest and the helm/yamllint/yamale CLIs
//! - mockall mocks of every trait behind the `mock` feature

pub mod account;
pub mod chart_utils;
pub mod exec;
pub mod git;
pub mod helm;
pub mod kubectl;
pub mod linter;

pub use account::{AccountValidator, HttpAccountValidator};
pub use chart_utils::{ChartUtils, DirectoryLister, FsChartUtils, FsDirectoryLister};
pub use exec::ProcessExecutor;
pub use git::{Git, GitClient};
pub use helm::{Helm, HelmClient};
pub use kubectl::{KubeCluster, Kubectl};
pub use linter::{CliLinter, Linter};

#[cfg(any(test, feature = "mock"))]
pub use account::MockAccountValidator;
#[cfg(any(test, feature = "mock"))]
pub use chart_utils::{MockChartUtils, MockDirectoryLister};
#[cfg(any(test, feature = "mock"))]
pub use git::MockGit;
#[cfg(any(test, feature = "mock"))]
pub use helm::MockHelm;
#[cfg(any(test, feature = "mock"))]
pub use kubectl::MockKubectl;
#[cfg(any(test, feature = "mock"))]
pub use linter::MockLinter;
