//! List-changed command - print the charts a run would process

use clap::Args;

use ct_common::Result;
use ct_testing::Testing;

use super::{load_configuration, GlobalOptions, SelectionArgs};

/// List changed charts
#[derive(Args, Debug)]
pub struct ListChangedArgs {
    #[command(flatten)]
    pub selection: SelectionArgs,
}

/// Run the list-changed command
pub async fn run(global: &GlobalOptions, args: ListChangedArgs) -> Result<()> {
    let config = load_configuration(global, |c| args.selection.apply(c))?;

    let charts = Testing::new(config).find_charts_to_be_processed().await?;
    for chart in charts {
        println!("{}", chart.display());
    }
    Ok(())
}
