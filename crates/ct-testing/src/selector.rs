//! Chart selection: explicit list, full scan, or changes since the merge base

use std::path::{Component, Path, PathBuf};

use ct_common::{Error, Result};
use tracing::{debug, info, warn};

use crate::testing::Testing;

impl Testing {
    /// Charts this run processes, in processing order.
    ///
    /// `all` scans every chart directory, an explicit chart list is used as
    /// given, and otherwise only charts changed since the merge base with the
    /// target branch are selected.
    pub async fn find_charts_to_be_processed(&self) -> Result<Vec<PathBuf>> {
        if self.config.all {
            self.read_all_chart_directories().await
        } else if !self.config.charts.is_empty() {
            Ok(self.config.charts.clone())
        } else {
            self.compute_changed_chart_directories().await
        }
    }

    pub(crate) async fn compute_merge_base(&self) -> Result<String> {
        self.tools
            .git
            .validate_repository()
            .await
            .map_err(|_| Error::NotARepository)?;
        self.tools
            .git
            .merge_base(&self.config.target_ref(), "HEAD")
            .await
    }

    /// Charts containing files changed since the merge base, first-seen order.
    pub async fn compute_changed_chart_directories(&self) -> Result<Vec<PathBuf>> {
        let merge_base = self.compute_merge_base().await?;
        let changed = self
            .tools
            .git
            .list_changed_files_in_dirs(&merge_base, &self.config.chart_dirs)
            .await?;
        debug!(%merge_base, files = changed.len(), "Computed changed files");

        let mut chart_dirs: Vec<PathBuf> = Vec::new();
        for file in &changed {
            let Some(group) = chart_group_name(file) else {
                continue;
            };
            if self.config.is_excluded(&group) {
                continue;
            }

            let dir = file.parent().unwrap_or_else(|| Path::new(""));
            match self
                .tools
                .chart_utils
                .lookup_chart_dir(&self.config.chart_dirs, dir)
                .await
            {
                Ok(chart_dir) => {
                    if !chart_dirs.contains(&chart_dir) {
                        chart_dirs.push(chart_dir);
                    }
                }
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "Directory is no chart directory, skipping");
                }
            }
        }
        Ok(chart_dirs)
    }

    /// Every chart below the configured chart directories, minus excluded ones.
    pub async fn read_all_chart_directories(&self) -> Result<Vec<PathBuf>> {
        let mut charts = Vec::new();
        for parent in &self.config.chart_dirs {
            let children = self
                .tools
                .directory_lister
                .list_child_dirs(parent)
                .await
                .map_err(|e| {
                    Error::config(format!(
                        "error reading chart directories in {}: {}",
                        parent.display(),
                        e
                    ))
                })?;

            for dir in children {
                let name = dir
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                if self.config.is_excluded(&name) {
                    continue;
                }
                if self
                    .tools
                    .chart_utils
                    .lookup_chart_dir(&self.config.chart_dirs, &dir)
                    .await
                    .is_ok()
                {
                    charts.push(dir);
                }
            }
        }
        info!(count = charts.len(), "Found charts");
        Ok(charts)
    }
}

/// Second path segment of a changed file, the name excludes are matched against.
fn chart_group_name(file: &Path) -> Option<String> {
    let mut segments = file.components().filter_map(|c| match c {
        Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
        _ => None,
    });
    segments.next()?;
    segments.next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockTools;
    use ct_common::Configuration;

    /// Resolves `charts/<name>/...` to `charts/<name>`, everything else fails.
    fn chart_root_lookup(tools: &mut MockTools) {
        tools
            .chart_utils
            .expect_lookup_chart_dir()
            .returning(|_, dir| {
                let mut components = dir.components();
                match (components.next(), components.next()) {
                    (Some(first), Some(second)) if first.as_os_str() == "charts" => {
                        Ok(Path::new("charts").join(second.as_os_str()))
                    }
                    _ => Err(Error::NoChartDirectory {
                        path: dir.to_path_buf(),
                    }),
                }
            });
    }

    fn changed_files(tools: &mut MockTools, files: &'static [&'static str]) {
        tools.git.expect_validate_repository().returning(|| Ok(()));
        tools
            .git
            .expect_merge_base()
            .withf(|one, two| one == "origin/main" && two == "HEAD")
            .returning(|_, _| Ok("base".to_string()));
        tools
            .git
            .expect_list_changed_files_in_dirs()
            .withf(|commit, _| commit == "base")
            .returning(move |_, _| Ok(files.iter().map(PathBuf::from).collect()));
    }

    #[tokio::test]
    async fn changed_charts_are_deduplicated_in_first_seen_order() {
        let mut tools = MockTools::new();
        changed_files(
            &mut tools,
            &[
                "charts/foo/templates/x.yaml",
                "charts/bar/Chart.yaml",
                "charts/foo/values.yaml",
                "docs/readme.md",
            ],
        );
        chart_root_lookup(&mut tools);

        let charts = tools
            .into_testing(Configuration::default())
            .compute_changed_chart_directories()
            .await
            .unwrap();
        assert_eq!(
            charts,
            vec![PathBuf::from("charts/foo"), PathBuf::from("charts/bar")]
        );
    }

    #[tokio::test]
    async fn excluded_charts_are_not_selected() {
        let mut tools = MockTools::new();
        changed_files(
            &mut tools,
            &["charts/foo/templates/x.yaml", "charts/bar/Chart.yaml"],
        );
        chart_root_lookup(&mut tools);

        let config = Configuration {
            excluded_charts: vec!["bar".to_string()],
            ..Configuration::default()
        };
        let charts = tools
            .into_testing(config)
            .compute_changed_chart_directories()
            .await
            .unwrap();
        assert_eq!(charts, vec![PathBuf::from("charts/foo")]);
    }

    #[tokio::test]
    async fn top_level_files_are_ignored() {
        let mut tools = MockTools::new();
        changed_files(&mut tools, &["README.md"]);
        tools.chart_utils.expect_lookup_chart_dir().never();

        let charts = tools
            .into_testing(Configuration::default())
            .compute_changed_chart_directories()
            .await
            .unwrap();
        assert!(charts.is_empty());
    }

    #[tokio::test]
    async fn outside_a_repository_is_an_error() {
        let mut tools = MockTools::new();
        tools
            .git
            .expect_validate_repository()
            .returning(|| Err(Error::git("not found")));

        let err = tools
            .into_testing(Configuration::default())
            .find_charts_to_be_processed()
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotARepository));
    }

    #[tokio::test]
    async fn explicit_charts_are_returned_verbatim() {
        let mut tools = MockTools::new();
        tools.git.expect_validate_repository().never();
        tools.chart_utils.expect_lookup_chart_dir().never();

        let config = Configuration {
            charts: vec![PathBuf::from("charts/b"), PathBuf::from("not/a/chart")],
            ..Configuration::default()
        };
        let charts = tools
            .into_testing(config)
            .find_charts_to_be_processed()
            .await
            .unwrap();
        assert_eq!(
            charts,
            vec![PathBuf::from("charts/b"), PathBuf::from("not/a/chart")]
        );
    }

    #[tokio::test]
    async fn all_scans_chart_dirs_keeping_valid_unexcluded_charts() {
        let mut tools = MockTools::new();
        tools
            .directory_lister
            .expect_list_child_dirs()
            .withf(|parent| parent == Path::new("charts"))
            .returning(|_| {
                Ok(vec![
                    PathBuf::from("charts/a"),
                    PathBuf::from("charts/docs"),
                    PathBuf::from("charts/skip"),
                ])
            });
        tools
            .chart_utils
            .expect_lookup_chart_dir()
            .returning(|_, dir| {
                if dir == Path::new("charts/docs") {
                    Err(Error::NoChartDirectory {
                        path: dir.to_path_buf(),
                    })
                } else {
                    Ok(dir.to_path_buf())
                }
            });

        let config = Configuration {
            all: true,
            excluded_charts: vec!["skip".to_string()],
            ..Configuration::default()
        };
        let charts = tools
            .into_testing(config)
            .find_charts_to_be_processed()
            .await
            .unwrap();
        assert_eq!(charts, vec![PathBuf::from("charts/a")]);
    }

    #[test]
    fn group_name_is_second_segment() {
        assert_eq!(
            chart_group_name(Path::new("charts/foo/Chart.yaml")).as_deref(),
            Some("foo")
        );
        assert_eq!(chart_group_name(Path::new("README.md")), None);
    }
}
