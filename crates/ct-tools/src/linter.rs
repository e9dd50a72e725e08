//! YAML linting via `yamllint` and `yamale`

use std::path::Path;

use async_trait::async_trait;
#[cfg(any(test, feature = "mock"))]
use mockall::automock;

use ct_common::{Error, Result};

use crate::exec::ProcessExecutor;

/// Style and schema linters.
#[cfg_attr(any(test, feature = "mock"), automock)]
#[async_trait]
pub trait Linter: Send + Sync {
    /// Lint YAML style of `file` against the yamllint `config`.
    async fn yaml_lint(&self, file: &Path, config: &Path) -> Result<()>;

    /// Validate `file` against the yamale `schema`.
    async fn yamale(&self, file: &Path, schema: &Path) -> Result<()>;
}

/// Linter shelling out to `yamllint` and `yamale`.
pub struct CliLinter {
    exec: ProcessExecutor,
}

impl CliLinter {
    /// Create a linter running tools through `exec`.
    pub fn new(exec: ProcessExecutor) -> Self {
        Self { exec }
    }
}

fn lint_err(file: &Path, e: Error) -> Error {
    let message = match e {
        Error::CommandFailed { message, .. } => message,
        other => other.to_string(),
    };
    Error::Lint {
        file: file.to_path_buf(),
        message,
    }
}

#[async_trait]
impl Linter for CliLinter {
    async fn yaml_lint(&self, file: &Path, config: &Path) -> Result<()> {
        let file_arg = file.display().to_string();
        let config_arg = config.display().to_string();
        self.exec
            .run(
                "yamllint",
                ["--config-file", config_arg.as_str(), file_arg.as_str()],
            )
            .await
            .map_err(|e| lint_err(file, e))
    }

    async fn yamale(&self, file: &Path, schema: &Path) -> Result<()> {
        let file_arg = file.display().to_string();
        let schema_arg = schema.display().to_string();
        self.exec
            .run("yamale", ["--schema", schema_arg.as_str(), file_arg.as_str()])
            .await
            .map_err(|e| lint_err(file, e))
    }
}
