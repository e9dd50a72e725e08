//! Chart testing engine
//!
//! This crate provides:
//! - Chart selection by explicit list, full scan, or changes since the merge base
//! - The version gate deciding whether a chart needs a bump and upgrade testing
//! - Lint, install and upgrade pipelines with guaranteed teardown
//! - Result aggregation across charts

mod diagnostics;
mod install;
mod lint;
pub mod results;
mod selector;
pub mod testing;
mod upgrade;
pub mod version;
pub mod worktree;

#[cfg(test)]
mod test_support;

pub use results::{TestResult, TestResults};
pub use testing::{Action, Testing, Tools};
pub use version::UpgradeGate;
pub use worktree::{PreviousRevisionWorktree, PREVIOUS_REVISION_DIR};
