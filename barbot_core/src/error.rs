use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BarBotError {
    #[error("not connected to the mainboard")]
    NotConnected,
    #[error("connecting to '{address}' failed: {reason}")]
    Connect { address: String, reason: String },
    #[error("no BarBot mainboard found")]
    DeviceNotFound,
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("{command} expects {expected} parameter(s), got {got}")]
    ParameterCount {
        command: String,
        expected: usize,
        got: usize,
    },
    #[error("{command} failed after all retries")]
    CommandFailed { command: String },
    #[error("mainboard reported error {code} during {command}")]
    Mainboard { command: String, code: String },
    #[error("orchestrator thread panicked")]
    WorkerPanicked,
    #[error("orchestrator is not running")]
    Stopped,
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing transport")]
    MissingTransport,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
