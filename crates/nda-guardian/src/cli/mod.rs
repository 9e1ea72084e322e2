//! Command-line interface for nda-guardian.
//!
//! This module provides the CLI structure for the `ndag` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    AskCommand, ConfigCommand, DemoCommand, HistoryCommand, LoadCommand, ServeCommand,
    ToolsCommand,
};

use crate::logging::Verbosity;

/// ndag - Ask questions about an NDA without sending it anywhere
///
/// Questions are answered on-device. Only those that need legal or market
/// knowledge go to a cloud model, and then only as an anonymized clause
/// summary.
#[derive(Debug, Parser)]
#[command(name = "ndag")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP API
    Serve(ServeCommand),

    /// Segment an agreement and list the clauses found
    Load(LoadCommand),

    /// Ask one question about an agreement
    Ask(AskCommand),

    /// Walk through five questions about a sample agreement
    Demo(DemoCommand),

    /// List the tools the models can call
    Tools(ToolsCommand),

    /// Show recent queries from the audit log
    History(HistoryCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else {
            match self.verbose {
                0 => Verbosity::Normal,
                1 => Verbosity::Verbose,
                _ => Verbosity::Trace,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn cli_with(verbose: u8, quiet: bool) -> Cli {
        Cli {
            config: None,
            verbose,
            quiet,
            command: Command::Tools(ToolsCommand { json: false }),
        }
    }

    #[test]
    fn test_cli_name() {
        let cli = Cli::command();
        assert_eq!(cli.get_name(), "ndag");
    }

    #[test]
    fn test_cli_verify() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_verbosity() {
        assert_eq!(cli_with(0, true).verbosity(), Verbosity::Quiet);
        assert_eq!(cli_with(0, false).verbosity(), Verbosity::Normal);
        assert_eq!(cli_with(1, false).verbosity(), Verbosity::Verbose);
        assert_eq!(cli_with(2, false).verbosity(), Verbosity::Trace);
    }

    #[test]
    fn test_parse_serve_with_bind() {
        let cli = Cli::try_parse_from(["ndag", "serve", "--bind", "0.0.0.0:9000"]).unwrap();
        match cli.command {
            Command::Serve(cmd) => assert_eq!(cmd.bind.as_deref(), Some("0.0.0.0:9000")),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_ask() {
        let cli =
            Cli::try_parse_from(["ndag", "ask", "nda.txt", "Who are the parties?", "--json"])
                .unwrap();
        match cli.command {
            Command::Ask(cmd) => {
                assert_eq!(cmd.file, PathBuf::from("nda.txt"));
                assert_eq!(cmd.question, "Who are the parties?");
                assert!(cmd.json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_demo_modes_conflict() {
        assert!(Cli::try_parse_from(["ndag", "demo", "--mock", "--live"]).is_err());

        let cli = Cli::try_parse_from(["ndag", "demo", "--live"]).unwrap();
        assert!(matches!(cli.command, Command::Demo(DemoCommand { live: true, .. })));
    }

    #[test]
    fn test_parse_history_default_limit() {
        let cli = Cli::try_parse_from(["ndag", "history"]).unwrap();
        match cli.command {
            Command::History(cmd) => assert_eq!(cmd.limit, 20),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_config_validate() {
        let cli = Cli::try_parse_from(["ndag", "config", "validate", "--file", "x.toml"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Config(ConfigCommand::Validate { file: Some(_) })
        ));
    }

    #[test]
    fn test_parse_with_global_flags() {
        let cli = Cli::try_parse_from(["ndag", "-c", "/custom/config.toml", "-v", "tools"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/custom/config.toml")));
        assert_eq!(cli.verbose, 1);

        let cli = Cli::try_parse_from(["ndag", "tools", "-q"]).unwrap();
        assert!(cli.quiet);
    }
}
