//! Per-chart outcomes and their aggregate

use std::path::{Path, PathBuf};

use ct_common::{delimiter_line, Error, Result};
use tracing::info;

/// Outcome of processing one chart.
#[derive(Debug)]
pub struct TestResult {
    /// Chart directory
    pub chart: PathBuf,
    /// Why the chart failed, if it did
    pub error: Option<Error>,
}

impl TestResult {
    /// A passing result.
    pub fn success(chart: &Path) -> Self {
        Self {
            chart: chart.to_path_buf(),
            error: None,
        }
    }

    /// Result for `chart` from a pipeline outcome.
    ///
    /// Informational errors are logged and do not fail the chart.
    pub fn from_outcome(chart: &Path, outcome: Result<()>) -> Self {
        let error = match outcome {
            Err(e) if e.is_informational() => {
                info!(chart = %chart.display(), notice = %e, "Chart passed with notice");
                None
            }
            other => other.err(),
        };
        Self {
            chart: chart.to_path_buf(),
            error,
        }
    }

    /// Whether the chart passed.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Results of one run, in processing order.
#[derive(Debug)]
pub struct TestResults {
    /// False as soon as any chart fails
    pub overall_success: bool,
    /// One entry per processed chart
    pub results: Vec<TestResult>,
}

impl Default for TestResults {
    fn default() -> Self {
        Self {
            overall_success: true,
            results: Vec::new(),
        }
    }
}

impl TestResults {
    /// Append a chart's result.
    pub fn record(&mut self, result: TestResult) {
        if !result.is_success() {
            self.overall_success = false;
        }
        self.results.push(result);
    }

    /// Whether no chart was processed.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// The aggregate outcome: [`Error::ChartsFailed`] iff any chart failed.
    pub fn check(&self) -> Result<()> {
        if self.overall_success {
            Ok(())
        } else {
            Err(Error::ChartsFailed)
        }
    }

    /// Render the summary table printed at the end of a run.
    pub fn summary(&self) -> String {
        let mut out = delimiter_line('-');
        out.push('\n');
        if self.results.is_empty() {
            out.push_str("No chart changes detected.\n");
        }
        for result in &self.results {
            match &result.error {
                Some(e) => {
                    out.push_str(&format!(" ✖︎ {} > {}\n", result.chart.display(), e));
                }
                None => out.push_str(&format!(" ✔︎ {}\n", result.chart.display())),
            }
        }
        out.push_str(&delimiter_line('-'));
        out
    }
}
