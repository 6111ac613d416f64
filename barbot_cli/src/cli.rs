//! CLI argument definitions and shared statics.

use barbot_traits::CommandKind;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::OnceLock;

/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "barbot", version, about = "BarBot cocktail machine host")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/barbot.toml")]
    pub config: PathBuf,

    /// Print results, events and errors as JSON lines
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); overrides [logging].level
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

/// Exchange type of a raw mainboard command.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum Kind {
    /// Long-running action (ACK, STATUS.., DONE)
    Do,
    /// Setter (single ACK)
    Set,
    /// Getter (ACK carrying the value)
    Get,
}

impl From<Kind> for CommandKind {
    fn from(k: Kind) -> Self {
        match k {
            Kind::Do => CommandKind::Do,
            Kind::Set => CommandKind::Set,
            Kind::Get => CommandKind::Get,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the orchestrator with an interactive console
    Run {
        /// Use the built-in simulator instead of the configured device
        #[arg(long, action = ArgAction::SetTrue)]
        demo: bool,
    },
    /// Send one command to the mainboard and print the result
    Send {
        #[arg(value_enum)]
        kind: Kind,
        /// Wire name, e.g. Draft, SetLED, GetWeight
        command: String,
        /// Command parameters
        #[arg(allow_negative_numbers = true)]
        params: Vec<String>,
        /// Use the built-in simulator instead of the configured device
        #[arg(long, action = ArgAction::SetTrue)]
        demo: bool,
    },
    /// Search for a mainboard and print its identifier
    Find,
    /// Mix a drink against the simulator and report
    SelfCheck,
}
