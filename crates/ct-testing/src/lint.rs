//! Lint pipeline: version bump, schema, YAML style, maintainers, helm lint

use std::path::{Path, PathBuf};

use ct_common::chart::{effective_overrides, CHART_YAML, VALUES_YAML};
use ct_common::{Error, Result};
use tracing::info;

use crate::results::TestResult;
use crate::testing::Testing;

impl Testing {
    /// Lint one chart with each of its values files.
    pub async fn lint_chart(&self, chart: &Path, values_files: &[PathBuf]) -> TestResult {
        info!(chart = %chart.display(), "Linting chart");
        TestResult::from_outcome(chart, self.run_lint(chart, values_files).await)
    }

    async fn run_lint(&self, chart: &Path, values_files: &[PathBuf]) -> Result<()> {
        if self.config.check_version_increment {
            self.check_version_increment(chart).await?;
        }

        let chart_yaml = chart.join(CHART_YAML);

        if self.config.validate_chart_schema {
            let schema = self.config.resolved_chart_schema()?;
            self.tools.linter.yamale(&chart_yaml, &schema).await?;
        }

        if self.config.validate_yaml {
            let lint_conf = self.config.resolved_lint_conf()?;
            let yaml_files = [chart_yaml.clone(), chart.join(VALUES_YAML)]
                .into_iter()
                .chain(values_files.iter().cloned());
            for file in yaml_files {
                self.tools.linter.yaml_lint(&file, &lint_conf).await?;
            }
        }

        if self.config.validate_maintainers {
            self.validate_maintainers(chart).await?;
        }

        for values in effective_overrides(values_files) {
            info!(chart = %chart.display(), %values, "Linting chart with values");
            self.tools.helm.lint(chart, &values).await?;
        }
        Ok(())
    }

    /// Check maintainers against the chart's deprecation state and the hosting service.
    ///
    /// A deprecated chart must declare no maintainers; any other chart needs at
    /// least one, and each must be an account on the repository's host.
    pub async fn validate_maintainers(&self, chart: &Path) -> Result<()> {
        info!(chart = %chart.display(), "Validating maintainers");
        let chart_yaml = self.tools.chart_utils.read_chart_yaml(chart).await?;

        if chart_yaml.deprecated {
            if !chart_yaml.maintainers.is_empty() {
                return Err(Error::maintainers("deprecated chart must not have maintainers"));
            }
            return Ok(());
        }

        if chart_yaml.maintainers.is_empty() {
            return Err(Error::maintainers("chart doesn't have maintainers"));
        }

        let repo_url = self.tools.git.url_for_remote(&self.config.remote).await?;
        for maintainer in &chart_yaml.maintainers {
            self.tools
                .account_validator
                .validate(&repo_url, &maintainer.name)
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{chart_yaml, CallLog, MockTools};
    use ct_common::{ChartYaml, Configuration, Maintainer, ValuesOverride};

    fn maintainer(name: &str) -> Maintainer {
        Maintainer {
            name: name.to_string(),
            ..Maintainer::default()
        }
    }

    fn with_manifest(tools: &mut MockTools, deprecated: bool, maintainers: Vec<Maintainer>) {
        tools.chart_utils.expect_read_chart_yaml().returning(move |_| {
            Ok(ChartYaml {
                deprecated,
                maintainers: maintainers.clone(),
                ..chart_yaml("1.0.0")
            })
        });
    }

    #[tokio::test]
    async fn deprecated_chart_with_maintainer_fails() {
        let mut tools = MockTools::new();
        with_manifest(&mut tools, true, vec![maintainer("alice")]);
        tools.account_validator.expect_validate().never();

        let err = tools
            .into_testing(Configuration::default())
            .validate_maintainers(Path::new("charts/old"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Maintainers { .. }));
    }

    #[tokio::test]
    async fn deprecated_chart_without_maintainers_passes() {
        let mut tools = MockTools::new();
        with_manifest(&mut tools, true, Vec::new());

        assert!(tools
            .into_testing(Configuration::default())
            .validate_maintainers(Path::new("charts/old"))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn active_chart_without_maintainers_fails() {
        let mut tools = MockTools::new();
        with_manifest(&mut tools, false, Vec::new());

        let err = tools
            .into_testing(Configuration::default())
            .validate_maintainers(Path::new("charts/foo"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Maintainers { .. }));
    }

    #[tokio::test]
    async fn every_maintainer_is_validated_against_remote_url() {
        let mut tools = MockTools::new();
        with_manifest(&mut tools, false, vec![maintainer("alice"), maintainer("bob")]);
        tools
            .git
            .expect_url_for_remote()
            .withf(|remote| remote == "origin")
            .returning(|_| Ok("https://github.com/helm/charts".to_string()));
        tools
            .account_validator
            .expect_validate()
            .withf(|url, _| url == "https://github.com/helm/charts")
            .times(2)
            .returning(|_, _| Ok(()));

        assert!(tools
            .into_testing(Configuration::default())
            .validate_maintainers(Path::new("charts/foo"))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn invalid_account_fails_validation() {
        let mut tools = MockTools::new();
        with_manifest(&mut tools, false, vec![maintainer("ghost")]);
        tools
            .git
            .expect_url_for_remote()
            .returning(|_| Ok("https://github.com/helm/charts".to_string()));
        tools
            .account_validator
            .expect_validate()
            .returning(|_, account| {
                Err(Error::AccountInvalid {
                    domain: "github.com".to_string(),
                    account: account.to_string(),
                    message: "404".to_string(),
                })
            });

        let err = tools
            .into_testing(Configuration::default())
            .validate_maintainers(Path::new("charts/foo"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AccountInvalid { ref account, .. } if account == "ghost"));
    }

    fn lint_config() -> Configuration {
        Configuration {
            check_version_increment: false,
            validate_maintainers: false,
            lint_conf: Some(PathBuf::from("etc/lintconf.yaml")),
            chart_yaml_schema: Some(PathBuf::from("etc/chart_schema.yaml")),
            ..Configuration::default()
        }
    }

    #[tokio::test]
    async fn stages_run_in_order_over_every_yaml_file() {
        let log = CallLog::default();
        let mut tools = MockTools::new();
        let l = log.clone();
        tools
            .linter
            .expect_yamale()
            .withf(|file, schema| {
                file == Path::new("charts/foo/Chart.yaml")
                    && schema == Path::new("etc/chart_schema.yaml")
            })
            .returning(move |_, _| {
                l.push("yamale");
                Ok(())
            });
        let l = log.clone();
        tools
            .linter
            .expect_yaml_lint()
            .returning(move |file, _| {
                l.push(format!("yamllint {}", file.display()));
                Ok(())
            });
        let l = log.clone();
        tools.helm.expect_lint().returning(move |_, values| {
            l.push(format!("helm lint {}", values));
            Ok(())
        });

        let values = vec![
            PathBuf::from("charts/foo/ci/a-values.yaml"),
            PathBuf::from("charts/foo/ci/b-values.yaml"),
        ];
        let result = tools
            .into_testing(lint_config())
            .lint_chart(Path::new("charts/foo"), &values)
            .await;

        assert!(result.is_success());
        assert_eq!(
            log.calls(),
            vec![
                "yamale",
                "yamllint charts/foo/Chart.yaml",
                "yamllint charts/foo/values.yaml",
                "yamllint charts/foo/ci/a-values.yaml",
                "yamllint charts/foo/ci/b-values.yaml",
                "helm lint charts/foo/ci/a-values.yaml",
                "helm lint charts/foo/ci/b-values.yaml",
            ]
        );
    }

    #[tokio::test]
    async fn first_failure_short_circuits() {
        let mut tools = MockTools::new();
        tools.linter.expect_yamale().returning(|file, _| {
            Err(Error::Lint {
                file: file.to_path_buf(),
                message: "version: Required field missing".to_string(),
            })
        });
        tools.linter.expect_yaml_lint().never();
        tools.helm.expect_lint().never();

        let result = tools
            .into_testing(lint_config())
            .lint_chart(Path::new("charts/foo"), &[])
            .await;
        assert!(matches!(result.error, Some(Error::Lint { .. })));
    }

    #[tokio::test]
    async fn helm_lint_runs_once_with_defaults_and_surfaces_failure() {
        let mut tools = MockTools::new();
        tools
            .helm
            .expect_lint()
            .withf(|_, values| *values == ValuesOverride::Defaults)
            .times(1)
            .returning(|_, _| Err(Error::helm("template: nil pointer")));

        let config = Configuration {
            validate_chart_schema: false,
            validate_yaml: false,
            ..lint_config()
        };
        let result = tools
            .into_testing(config)
            .lint_chart(Path::new("charts/foo"), &[])
            .await;
        assert!(matches!(result.error, Some(Error::Helm { .. })));
    }

    #[tokio::test]
    async fn version_check_runs_first() {
        let mut tools = MockTools::new();
        tools
            .git
            .expect_file_exists_on_branch()
            .returning(|_, _, _| true);
        tools
            .git
            .expect_show()
            .returning(|_, _, _| Ok("name: foo\nversion: 1.0.0\n".to_string()));
        tools
            .chart_utils
            .expect_read_chart_yaml()
            .returning(|_| Ok(chart_yaml("1.0.0")));
        tools.linter.expect_yamale().never();

        let config = Configuration {
            check_version_increment: true,
            ..lint_config()
        };
        let result = tools
            .into_testing(config)
            .lint_chart(Path::new("charts/foo"), &[])
            .await;
        assert!(matches!(
            result.error,
            Some(Error::VersionNotIncremented { .. })
        ));
    }
}
