//! Filesystem lookups for chart directories

use std::path::{Path, PathBuf};

use async_trait::async_trait;
#[cfg(any(test, feature = "mock"))]
use mockall::automock;

use ct_common::chart::CHART_YAML;
use ct_common::{ChartYaml, Error, Result};

/// Chart directory resolution and manifest reading.
#[cfg_attr(any(test, feature = "mock"), automock)]
#[async_trait]
pub trait ChartUtils: Send + Sync {
    /// The chart containing `dir`: the nearest ancestor (or `dir` itself) that
    /// holds a Chart.yaml and sits directly below one of `chart_dirs`.
    async fn lookup_chart_dir(&self, chart_dirs: &[PathBuf], dir: &Path) -> Result<PathBuf>;

    /// Parse `<chart>/Chart.yaml`.
    async fn read_chart_yaml(&self, chart: &Path) -> Result<ChartYaml>;
}

/// Directory listing.
#[cfg_attr(any(test, feature = "mock"), automock)]
#[async_trait]
pub trait DirectoryLister: Send + Sync {
    /// Immediate subdirectories of `parent`, sorted by path.
    async fn list_child_dirs(&self, parent: &Path) -> Result<Vec<PathBuf>>;
}

/// [`ChartUtils`] over the local filesystem.
#[derive(Debug, Default, Clone)]
pub struct FsChartUtils;

/// [`DirectoryLister`] over the local filesystem.
#[derive(Debug, Default, Clone)]
pub struct FsDirectoryLister;

fn is_chart_root(chart_dirs: &[PathBuf], candidate: &Path) -> bool {
    let Some(parent) = candidate.parent() else {
        return false;
    };
    let parent = normalize(parent);
    chart_dirs.iter().any(|chart_dir| normalize(chart_dir) == parent)
        && candidate.join(CHART_YAML).is_file()
}

/// Strip `./` components so `./charts` and `charts` compare equal.
fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, std::path::Component::CurDir))
        .collect()
}

#[async_trait]
impl ChartUtils for FsChartUtils {
    async fn lookup_chart_dir(&self, chart_dirs: &[PathBuf], dir: &Path) -> Result<PathBuf> {
        let mut current = Some(dir);
        while let Some(candidate) = current {
            if candidate.as_os_str().is_empty() {
                break;
            }
            if is_chart_root(chart_dirs, candidate) {
                return Ok(candidate.to_path_buf());
            }
            current = candidate.parent();
        }
        Err(Error::NoChartDirectory {
            path: dir.to_path_buf(),
        })
    }

    async fn read_chart_yaml(&self, chart: &Path) -> Result<ChartYaml> {
        let bytes = tokio::fs::read(chart.join(CHART_YAML)).await?;
        ChartYaml::from_bytes(&bytes)
    }
}

#[async_trait]
impl DirectoryLister for FsDirectoryLister {
    async fn list_child_dirs(&self, parent: &Path) -> Result<Vec<PathBuf>> {
        let mut entries = tokio::fs::read_dir(parent).await?;
        let mut dirs = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                dirs.push(entry.path());
            }
        }
        dirs.sort();
        Ok(dirs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chart(root: &Path, rel: &str) -> PathBuf {
        let dir = root.join(rel);
        std::fs::create_dir_all(dir.join("templates")).unwrap();
        std::fs::write(dir.join(CHART_YAML), "name: x\nversion: 0.1.0\n").unwrap();
        dir
    }

    #[tokio::test]
    async fn lookup_walks_up_to_chart_root() {
        let root = tempfile::tempdir().unwrap();
        let charts = root.path().join("charts");
        let foo = chart(root.path(), "charts/foo");

        let found = FsChartUtils
            .lookup_chart_dir(&[charts], &foo.join("templates"))
            .await
            .unwrap();
        assert_eq!(found, foo);
    }

    #[tokio::test]
    async fn nested_subchart_resolves_to_top_level_chart() {
        let root = tempfile::tempdir().unwrap();
        let charts = root.path().join("charts");
        let foo = chart(root.path(), "charts/foo");
        let sub = chart(root.path(), "charts/foo/charts/sub");

        let found = FsChartUtils.lookup_chart_dir(&[charts], &sub).await.unwrap();
        assert_eq!(found, foo);
    }

    #[tokio::test]
    async fn lookup_outside_chart_dirs_fails() {
        let root = tempfile::tempdir().unwrap();
        let other = chart(root.path(), "other/foo");

        let err = FsChartUtils
            .lookup_chart_dir(&[root.path().join("charts")], &other)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoChartDirectory { .. }));
    }

    #[tokio::test]
    async fn lookup_requires_chart_yaml() {
        let root = tempfile::tempdir().unwrap();
        let docs = root.path().join("charts/docs");
        std::fs::create_dir_all(&docs).unwrap();

        assert!(FsChartUtils
            .lookup_chart_dir(&[root.path().join("charts")], &docs)
            .await
            .is_err());
    }

    #[test]
    fn current_dir_prefix_is_ignored() {
        assert_eq!(normalize(Path::new("./charts/foo")), PathBuf::from("charts/foo"));
    }

    #[tokio::test]
    async fn reads_chart_yaml() {
        let root = tempfile::tempdir().unwrap();
        let foo = chart(root.path(), "charts/foo");
        let parsed = FsChartUtils.read_chart_yaml(&foo).await.unwrap();
        assert_eq!(parsed.version, "0.1.0");
    }

    #[tokio::test]
    async fn lists_only_directories_sorted() {
        let root = tempfile::tempdir().unwrap();
        chart(root.path(), "b");
        chart(root.path(), "a");
        std::fs::write(root.path().join("README.md"), "").unwrap();

        let dirs = FsDirectoryLister.list_child_dirs(root.path()).await.unwrap();
        assert_eq!(dirs, vec![root.path().join("a"), root.path().join("b")]);
    }
}
