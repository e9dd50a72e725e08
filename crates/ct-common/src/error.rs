//! Error types for chart testing
//!
//! Variants carry the context needed to read a failure straight from a CI log:
//! the chart, the tool that failed, and what it reported.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for chart testing operations
#[derive(Debug, Error)]
pub enum Error {
    /// Filesystem error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML (de)serialization error
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A chart version is not a valid semantic version
    #[error("invalid chart version '{version}': {source}")]
    Version {
        /// The version string as found in Chart.yaml
        version: String,
        /// The underlying parse error
        source: semver::Error,
    },

    /// Version control operation failed
    #[error("git error: {message}")]
    Git {
        /// Description of what failed
        message: String,
    },

    /// Package manager operation failed
    #[error("helm error: {message}")]
    Helm {
        /// Description of what failed
        message: String,
    },

    /// Cluster operation failed
    #[error("cluster error: {message}")]
    Cluster {
        /// Description of what failed
        message: String,
    },

    /// Schema or style linting reported problems
    #[error("lint error for {file}: {message}")]
    Lint {
        /// The linted file
        file: PathBuf,
        /// Linter output
        message: String,
    },

    /// External command exited unsuccessfully
    #[error("command failed: {command}: {message}")]
    CommandFailed {
        /// Command line that was run
        command: String,
        /// Captured stderr or spawn error
        message: String,
    },

    /// The working directory is not a git repository
    #[error("must be in a git repository")]
    NotARepository,

    /// New chart version is not greater than the one on the target branch
    #[error("chart version not ok, needs a version bump: {old} -> {new}")]
    VersionNotIncremented {
        /// Version on the target branch
        old: String,
        /// Version in the working copy
        new: String,
    },

    /// Chart does not exist on the target branch
    #[error("chart has no previous revision")]
    NoPreviousRevision,

    /// Maintainer declaration is inconsistent with the chart's deprecation state
    #[error("maintainer validation failed: {message}")]
    Maintainers {
        /// Description of the violation
        message: String,
    },

    /// Maintainer name is not an account on the repository's hosting domain
    #[error("invalid account '{account}' on {domain}: {message}")]
    AccountInvalid {
        /// Hosting domain, e.g. github.com
        domain: String,
        /// Maintainer name
        account: String,
        /// Why validation failed
        message: String,
    },

    /// No chart root contains the given directory
    #[error("no chart directory for {path}")]
    NoChartDirectory {
        /// Directory that was looked up
        path: PathBuf,
    },

    /// Invalid or incomplete configuration
    #[error("configuration error: {message}")]
    Config {
        /// Description of what's invalid
        message: String,
    },

    /// At least one chart failed; per-chart errors are in the result list
    #[error("error processing charts")]
    ChartsFailed,
}

impl Error {
    /// Create a git error
    pub fn git(message: impl Into<String>) -> Self {
        Error::Git {
            message: message.into(),
        }
    }

    /// Create a helm error
    pub fn helm(message: impl Into<String>) -> Self {
        Error::Helm {
            message: message.into(),
        }
    }

    /// Create a cluster error
    pub fn cluster(message: impl Into<String>) -> Self {
        Error::Cluster {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
        }
    }

    /// Create a maintainer validation error
    pub fn maintainers(message: impl Into<String>) -> Self {
        Error::Maintainers {
            message: message.into(),
        }
    }

    /// Create a command failure for the given command line
    pub fn command_failed(command: impl Into<String>, message: impl Into<String>) -> Self {
        Error::CommandFailed {
            command: command.into(),
            message: message.into(),
        }
    }

    /// Whether this error is a notice rather than a failure.
    ///
    /// Only [`Error::NoPreviousRevision`] qualifies: a chart that is new on the
    /// target branch has nothing to upgrade from.
    pub fn is_informational(&self) -> bool {
        matches!(self, Error::NoPreviousRevision)
    }
}
