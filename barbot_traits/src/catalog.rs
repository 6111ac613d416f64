//! Mainboard command catalog shared by the dispatcher, the simulator and the CLI.

use std::fmt;
use std::str::FromStr;

/// Exchange semantics of a mainboard command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// Long-running action: ACK, any number of STATUS, then DONE or ERROR.
    Do,
    /// Setter: a single ACK.
    Set,
    /// Getter: a single ACK carrying the value.
    Get,
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CommandKind::Do => "do",
            CommandKind::Set => "set",
            CommandKind::Get => "get",
        })
    }
}

impl FromStr for CommandKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "do" => Ok(CommandKind::Do),
            "set" => Ok(CommandKind::Set),
            "get" => Ok(CommandKind::Get),
            other => Err(format!("unknown command kind '{other}' (expected do|set|get)")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandSpec {
    pub name: &'static str,
    pub kind: CommandKind,
    pub params: usize,
}

const fn spec(name: &'static str, kind: CommandKind, params: usize) -> CommandSpec {
    CommandSpec { name, kind, params }
}

/// Sent without framing; interrupts the running DO.
pub const ABORT: &str = "ABORT";

pub const COMMANDS: &[CommandSpec] = &[
    spec("Draft", CommandKind::Do, 2),
    spec("Crush", CommandKind::Do, 1),
    spec("Sugar", CommandKind::Do, 1),
    spec("Mix", CommandKind::Do, 1),
    spec("Clean", CommandKind::Do, 2),
    spec("Straw", CommandKind::Do, 0),
    spec("Home", CommandKind::Do, 0),
    spec("Move", CommandKind::Do, 1),
    spec("Delay", CommandKind::Do, 1),
    spec("PlatformLED", CommandKind::Set, 1),
    spec("SetSpeed", CommandKind::Set, 1),
    spec("SetAccel", CommandKind::Set, 1),
    spec("SetBalanceCalibration", CommandKind::Set, 1),
    spec("SetBalanceOffset", CommandKind::Set, 1),
    spec("SetPumpPower", CommandKind::Set, 1),
    spec("SetLED", CommandKind::Set, 1),
    spec("IsIdle", CommandKind::Get, 0),
    spec("GetFirmwareVersion", CommandKind::Get, 0),
    spec("GetWeight", CommandKind::Get, 0),
    spec("HasGlas", CommandKind::Get, 0),
    spec("GetConnectedBoards", CommandKind::Get, 0),
];

/// Look up a command by its exact (case-sensitive) wire name.
pub fn lookup(name: &str) -> Option<&'static CommandSpec> {
    COMMANDS.iter().find(|c| c.name == name)
}
