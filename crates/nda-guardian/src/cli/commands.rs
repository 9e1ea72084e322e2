//! CLI command definitions.

use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::demo::DemoMode;

/// Serve command arguments.
#[derive(Debug, Args)]
pub struct ServeCommand {
    /// Address to listen on (overrides `server.bind`)
    #[arg(short, long, value_name = "ADDR")]
    pub bind: Option<String>,
}

/// Load command arguments.
#[derive(Debug, Args)]
pub struct LoadCommand {
    /// Path to the agreement (plain text)
    pub file: PathBuf,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Ask command arguments.
#[derive(Debug, Args)]
pub struct AskCommand {
    /// Path to the agreement (plain text)
    pub file: PathBuf,

    /// The question to ask about it
    pub question: String,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Demo command arguments.
#[derive(Debug, Args)]
pub struct DemoCommand {
    /// Pick tools with keyword rules
    #[arg(long, conflicts_with = "live")]
    pub mock: bool,

    /// Pick tools with the configured local model
    #[arg(long)]
    pub live: bool,
}

impl DemoCommand {
    /// The selected mode; auto-detected when neither flag was given.
    #[must_use]
    pub fn mode(&self) -> DemoMode {
        if self.live {
            DemoMode::Live
        } else if self.mock {
            DemoMode::Mock
        } else {
            DemoMode::Auto
        }
    }
}

/// Tools command arguments.
#[derive(Debug, Args)]
pub struct ToolsCommand {
    /// Output the full JSON schemas
    #[arg(short, long)]
    pub json: bool,
}

/// History command arguments.
#[derive(Debug, Args)]
pub struct HistoryCommand {
    /// Maximum number of entries
    #[arg(short, long, default_value = "20")]
    pub limit: usize,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_mode_flags() {
        let cmd = DemoCommand {
            mock: false,
            live: false,
        };
        assert_eq!(cmd.mode(), DemoMode::Auto);

        let cmd = DemoCommand {
            mock: true,
            live: false,
        };
        assert_eq!(cmd.mode(), DemoMode::Mock);
    }

    #[test]
    fn test_demo_mode_live() {
        let cmd = DemoCommand {
            mock: false,
            live: true,
        };
        assert_eq!(cmd.mode(), DemoMode::Live);
    }

    #[test]
    fn test_ask_command_debug() {
        let cmd = AskCommand {
            file: PathBuf::from("nda.txt"),
            question: "Who are the parties?".to_string(),
            json: false,
        };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("question"));
        assert!(debug_str.contains("nda.txt"));
    }

    #[test]
    fn test_config_command_debug() {
        let cmd = ConfigCommand::Show { json: false };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("Show"));
    }
}
