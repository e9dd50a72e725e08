//! Lint command - lint and validate charts

use clap::Args;
use tracing::info;

use ct_common::Result;
use ct_testing::Testing;

use super::{load_configuration, report, GlobalOptions, HelmArgs, LintFlags, SelectionArgs};

/// Lint and validate charts
#[derive(Args, Debug)]
pub struct LintArgs {
    #[command(flatten)]
    pub selection: SelectionArgs,

    #[command(flatten)]
    pub helm: HelmArgs,

    #[command(flatten)]
    pub lint: LintFlags,
}

/// Run the lint command
pub async fn run(global: &GlobalOptions, args: LintArgs) -> Result<()> {
    let config = load_configuration(global, |c| {
        args.selection.apply(c);
        args.helm.apply(c);
        args.lint.apply(c);
    })?;

    info!("Linting charts...");
    let testing = Testing::new(config);
    let results = testing.lint_charts().await?;
    report(&testing, &results)
}
