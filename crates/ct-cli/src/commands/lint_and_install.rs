//! Lint-and-install command - lint charts, then install those that pass

use clap::Args;
use tracing::info;

use ct_common::Result;
use ct_testing::Testing;

use super::{
    load_configuration, report, GlobalOptions, HelmArgs, InstallFlags, LintFlags, SelectionArgs,
};

/// Lint, install and test charts
#[derive(Args, Debug)]
pub struct LintAndInstallArgs {
    #[command(flatten)]
    pub selection: SelectionArgs,

    #[command(flatten)]
    pub helm: HelmArgs,

    #[command(flatten)]
    pub lint: LintFlags,

    #[command(flatten)]
    pub install: InstallFlags,
}

/// Run the lint-and-install command
pub async fn run(global: &GlobalOptions, args: LintAndInstallArgs) -> Result<()> {
    let config = load_configuration(global, |c| {
        args.selection.apply(c);
        args.helm.apply(c);
        args.lint.apply(c);
        args.install.apply(c);
    })?;

    info!("Linting and installing charts...");
    let testing = Testing::new(config);
    let results = testing.lint_and_install_charts().await?;
    report(&testing, &results)
}
