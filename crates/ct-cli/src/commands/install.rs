//! Install command - install and test charts, optionally testing upgrades

use clap::Args;
use tracing::info;

use ct_common::Result;
use ct_testing::Testing;

use super::{load_configuration, report, GlobalOptions, HelmArgs, InstallFlags, SelectionArgs};

/// Install and test charts
#[derive(Args, Debug)]
pub struct InstallArgs {
    #[command(flatten)]
    pub selection: SelectionArgs,

    #[command(flatten)]
    pub helm: HelmArgs,

    #[command(flatten)]
    pub install: InstallFlags,
}

/// Run the install command
pub async fn run(global: &GlobalOptions, args: InstallArgs) -> Result<()> {
    let config = load_configuration(global, |c| {
        args.selection.apply(c);
        args.helm.apply(c);
        args.install.apply(c);
    })?;

    info!(upgrade = config.upgrade, "Installing charts...");
    let testing = Testing::new(config);
    let results = testing.install_charts().await?;
    report(&testing, &results)
}
