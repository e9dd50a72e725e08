//! ct CLI library

pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use ct_common::Result;

/// ct - The chart testing tool
#[derive(Parser, Debug)]
#[command(name = "ct")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Config file (defaults to ct.yaml in the working directory, ~/.ct or /etc/ct)
    #[arg(long, global = true, env = "CT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Print commands and debug output
    #[arg(long, global = true, env = "CT_DEBUG")]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Lint and validate charts
    Lint(commands::lint::LintArgs),
    /// Install and test charts
    Install(commands::install::InstallArgs),
    /// Lint, install and test charts
    LintAndInstall(commands::lint_and_install::LintAndInstallArgs),
    /// List changed charts
    ListChanged(commands::list_changed::ListChangedArgs),
}

impl Cli {
    /// Run the CLI command
    pub async fn run(self) -> Result<()> {
        let base = commands::GlobalOptions {
            config: self.config,
            debug: self.debug,
        };
        match self.command {
            Commands::Lint(args) => commands::lint::run(&base, args).await,
            Commands::Install(args) => commands::install::run(&base, args).await,
            Commands::LintAndInstall(args) => commands::lint_and_install::run(&base, args).await,
            Commands::ListChanged(args) => commands::list_changed::run(&base, args).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_subcommands_with_global_flags() {
        let cli = Cli::try_parse_from(["ct", "lint", "--debug", "--charts", "charts/a,charts/b"])
            .unwrap();
        assert!(cli.debug);
        match cli.command {
            Commands::Lint(args) => assert_eq!(
                args.selection.charts,
                vec![PathBuf::from("charts/a"), PathBuf::from("charts/b")]
            ),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn kebab_case_subcommand_names() {
        assert!(Cli::try_parse_from(["ct", "lint-and-install", "--all"]).is_ok());
        assert!(Cli::try_parse_from(["ct", "list-changed"]).is_ok());
    }
}
