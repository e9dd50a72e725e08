//! Checkout of the merge-base revision used as the "old chart" source

use std::path::{Path, PathBuf};

use ct_tools::Git;
use tracing::{info, warn};

use ct_common::Result;

/// Directory the previous revision is checked out into, relative to the repository
pub const PREVIOUS_REVISION_DIR: &str = "ct_previous_revision";

/// An owned worktree of the previous revision.
///
/// Must be handed back with [`PreviousRevisionWorktree::remove`] once the charts
/// using it are done.
#[derive(Debug)]
pub struct PreviousRevisionWorktree {
    path: PathBuf,
}

impl PreviousRevisionWorktree {
    /// Check out `git_ref` into a new worktree at `path`.
    pub async fn checkout(git: &dyn Git, path: PathBuf, git_ref: &str) -> Result<Self> {
        info!(path = %path.display(), %git_ref, "Checking out previous revision");
        git.add_worktree(&path, git_ref).await?;
        Ok(Self { path })
    }

    /// Where `chart` lives in the previous revision.
    pub fn chart_path(&self, chart: &Path) -> PathBuf {
        self.path.join(chart)
    }

    /// Remove the worktree. Failures are logged only.
    pub async fn remove(self, git: &dyn Git) {
        if let Err(e) = git.remove_worktree(&self.path).await {
            warn!(path = %self.path.display(), error = %e, "Error removing previous revision worktree");
        }
    }
}

#[cfg(test)]
impl PreviousRevisionWorktree {
    /// Handle for an already checked out worktree.
    pub(crate) fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}
