//! Git operations
//!
//! Read-only queries go through git2. Worktrees are managed with the `git`
//! binary because git2 cannot check out a detached worktree at an arbitrary
//! commit.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use git2::{DiffFindOptions, DiffOptions, Repository};
#[cfg(any(test, feature = "mock"))]
use mockall::automock;
use tracing::debug;

use ct_common::{Error, Result};

use crate::exec::ProcessExecutor;

/// Version control operations needed to select and compare charts.
#[cfg_attr(any(test, feature = "mock"), automock)]
#[async_trait]
pub trait Git: Send + Sync {
    /// Whether `file` exists on `<remote>/<branch>`.
    async fn file_exists_on_branch(&self, file: &Path, remote: &str, branch: &str) -> bool;

    /// Contents of `file` on `<remote>/<branch>`.
    async fn show(&self, file: &Path, remote: &str, branch: &str) -> Result<String>;

    /// Check out `git_ref` into a new worktree at `path`.
    async fn add_worktree(&self, path: &Path, git_ref: &str) -> Result<()>;

    /// Remove the worktree at `path`.
    async fn remove_worktree(&self, path: &Path) -> Result<()>;

    /// Merge base of two commits.
    async fn merge_base(&self, commit1: &str, commit2: &str) -> Result<String>;

    /// Files changed between `commit` and the working tree under `dirs`.
    async fn list_changed_files_in_dirs(&self, commit: &str, dirs: &[PathBuf])
        -> Result<Vec<PathBuf>>;

    /// URL configured for `remote`.
    async fn url_for_remote(&self, remote: &str) -> Result<String>;

    /// Fails unless the working directory is inside a git repository.
    async fn validate_repository(&self) -> Result<()>;
}

/// Git implementation backed by the repository containing the working directory.
pub struct GitClient {
    exec: ProcessExecutor,
    workdir: PathBuf,
}

impl GitClient {
    /// Create a client for the repository containing the current directory.
    pub fn new(exec: ProcessExecutor) -> Self {
        Self::with_workdir(exec, PathBuf::from("."))
    }

    /// Create a client for the repository containing `workdir`.
    pub fn with_workdir(exec: ProcessExecutor, workdir: PathBuf) -> Self {
        Self { exec, workdir }
    }

    fn open(&self) -> Result<Repository> {
        Repository::discover(&self.workdir).map_err(|_| Error::NotARepository)
    }

    fn revision_spec(file: &Path, remote: &str, branch: &str) -> String {
        format!("{}/{}:{}", remote, branch, file.to_string_lossy())
    }
}

fn git_err(e: git2::Error) -> Error {
    Error::git(e.message().to_string())
}

#[async_trait]
impl Git for GitClient {
    async fn file_exists_on_branch(&self, file: &Path, remote: &str, branch: &str) -> bool {
        let Ok(repo) = self.open() else {
            return false;
        };
        let spec = Self::revision_spec(file, remote, branch);
        let found = repo.revparse_single(&spec).is_ok();
        found
    }

    async fn show(&self, file: &Path, remote: &str, branch: &str) -> Result<String> {
        let repo = self.open()?;
        let spec = Self::revision_spec(file, remote, branch);
        let blob = repo
            .revparse_single(&spec)
            .and_then(|object| object.peel_to_blob())
            .map_err(|e| Error::git(format!("failed to read {}: {}", spec, e.message())))?;
        Ok(String::from_utf8_lossy(blob.content()).into_owned())
    }

    async fn add_worktree(&self, path: &Path, git_ref: &str) -> Result<()> {
        let path = path.to_string_lossy().into_owned();
        self.exec
            .run("git", ["worktree", "add", path.as_str(), git_ref])
            .await
    }

    async fn remove_worktree(&self, path: &Path) -> Result<()> {
        let path = path.to_string_lossy().into_owned();
        self.exec
            .run("git", ["worktree", "remove", "--force", path.as_str()])
            .await
    }

    async fn merge_base(&self, commit1: &str, commit2: &str) -> Result<String> {
        let repo = self.open()?;
        let one = repo
            .revparse_single(commit1)
            .and_then(|o| o.peel_to_commit())
            .map_err(git_err)?;
        let two = repo
            .revparse_single(commit2)
            .and_then(|o| o.peel_to_commit())
            .map_err(git_err)?;
        let base = repo.merge_base(one.id(), two.id()).map_err(git_err)?;
        debug!(%commit1, %commit2, merge_base = %base, "Computed merge base");
        Ok(base.to_string())
    }

    async fn list_changed_files_in_dirs(
        &self,
        commit: &str,
        dirs: &[PathBuf],
    ) -> Result<Vec<PathBuf>> {
        let repo = self.open()?;
        let tree = repo
            .revparse_single(commit)
            .and_then(|o| o.peel_to_tree())
            .map_err(git_err)?;

        let mut opts = DiffOptions::new();
        for dir in dirs {
            opts.pathspec(dir.as_path());
        }

        let mut diff = repo
            .diff_tree_to_workdir_with_index(Some(&tree), Some(&mut opts))
            .map_err(git_err)?;
        diff.find_similar(Some(DiffFindOptions::new().renames(true)))
            .map_err(git_err)?;

        let files = diff
            .deltas()
            .filter_map(|delta| {
                delta
                    .new_file()
                    .path()
                    .or_else(|| delta.old_file().path())
                    .map(Path::to_path_buf)
            })
            .collect();
        Ok(files)
    }

    async fn url_for_remote(&self, remote: &str) -> Result<String> {
        let repo = self.open()?;
        let remote_ref = repo.find_remote(remote).map_err(git_err)?;
        remote_ref
            .url()
            .map(String::from)
            .ok_or_else(|| Error::git(format!("remote '{}' has no valid URL", remote)))
    }

    async fn validate_repository(&self) -> Result<()> {
        self.open().map(|_| ())
    }
}
