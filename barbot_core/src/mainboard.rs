//! Command dispatcher: request/response exchanges with retries.
//!
//! Every call sends the command and validates the echo. Framing problems
//! (wrong echo, NAK, timeout, link failure) fail the attempt, and the whole
//! attempt is retried up to `MAX_RETRIES` times. A DO that the board answers
//! with `ERROR` is a hardware verdict and is returned immediately.

use std::fmt::Display;

use barbot_traits::catalog::{ABORT, CommandKind};
use barbot_traits::{LineSender, Transport};
use thiserror::Error;

use crate::error::BarBotError;
use crate::hw_error;
use crate::protocol::{self, HeartbeatFilter, MessageType, ProtocolMessage};
use crate::types::{CommandResult, FirmwareVersion};

pub const MAX_RETRIES: usize = 3;

/// Reason a single attempt failed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("send failed: {0}")]
    Send(String),
    #[error("link failure: {0}")]
    Link(String),
    #[error("reply timed out")]
    Timeout,
    #[error("NAK received")]
    Nak,
    #[error("expected reply to '{expected}', got '{got}'")]
    WrongCommand { expected: String, got: String },
    #[error("unexpected {0} frame")]
    Unexpected(MessageType),
    #[error("reply carries no value")]
    MissingValue,
    #[error("reply carries {0} values, expected one")]
    ExtraValues(usize),
}

impl DispatchError {
    fn from_reply(expected: &str, msg: &ProtocolMessage) -> Self {
        match msg.kind {
            MessageType::CommError => DispatchError::Link(msg.command.clone()),
            MessageType::Timeout => DispatchError::Timeout,
            MessageType::Nak => DispatchError::Nak,
            _ if msg.command != expected => DispatchError::WrongCommand {
                expected: expected.to_string(),
                got: msg.to_string(),
            },
            other => DispatchError::Unexpected(other),
        }
    }
}

enum DoOutcome {
    Done,
    Failed(Vec<String>),
}

pub struct Mainboard {
    transport: Box<dyn Transport>,
    heartbeat: HeartbeatFilter,
    firmware: FirmwareVersion,
}

impl std::fmt::Debug for Mainboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mainboard")
            .field("connected", &self.transport.is_connected())
            .field("firmware", &self.firmware)
            .finish()
    }
}

impl Mainboard {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            heartbeat: HeartbeatFilter::default(),
            firmware: FirmwareVersion::default(),
        }
    }

    /// Open the link and read the firmware version (legacy boards report `0.0.0`).
    pub fn connect(&mut self, address: &str) -> Result<(), BarBotError> {
        tracing::info!(address, "connecting to mainboard");
        self.transport
            .connect(address)
            .map_err(|e| BarBotError::Connect {
                address: address.to_string(),
                reason: e.to_string(),
            })?;
        let res = self.get("GetFirmwareVersion", &[]);
        self.firmware = res.first().map(FirmwareVersion::parse).unwrap_or_default();
        tracing::info!(firmware = %self.firmware, "mainboard connected");
        Ok(())
    }

    pub fn disconnect(&mut self) {
        self.transport.disconnect();
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    pub fn firmware_version(&self) -> FirmwareVersion {
        self.firmware
    }

    pub fn find_device(&mut self) -> Option<String> {
        self.transport.find_device()
    }

    /// Independent writer for `ABORT`, usable from the UI thread.
    pub fn abort_sender(&self) -> Option<Box<dyn LineSender>> {
        self.transport.sender()
    }

    /// Fire-and-forget `ABORT` on the dispatcher's own link.
    pub fn send_abort(&mut self) {
        let line = format!("{ABORT}\r");
        tracing::debug!("-> {ABORT}");
        if let Err(e) = self.transport.send(&line) {
            tracing::warn!(error = %e, "sending ABORT failed");
        }
    }

    /// Read one line. Never fails: problems come back as COMM_ERROR / TIMEOUT.
    pub fn read_message(&mut self) -> ProtocolMessage {
        if !self.transport.is_connected() {
            return ProtocolMessage::comm_error("port not open");
        }
        match self.transport.read_line() {
            Ok(line) => {
                let msg = protocol::decode(&line);
                if self.heartbeat.should_log(&msg) {
                    tracing::debug!("<- {msg}");
                }
                msg
            }
            Err(e) => {
                let msg = hw_error::map_transport_error(e.as_ref());
                if hw_error::is_link_failure(&msg) {
                    tracing::warn!(reason = %msg.command, "mainboard link lost");
                    self.transport.disconnect();
                }
                msg
            }
        }
    }

    pub fn do_command(&mut self, command: &str, params: &[&dyn Display]) -> CommandResult {
        self.do_strings(command, &stringify(params))
    }

    pub fn set(&mut self, command: &str, params: &[&dyn Display]) -> CommandResult {
        self.set_strings(command, &stringify(params))
    }

    pub fn get(&mut self, command: &str, params: &[&dyn Display]) -> CommandResult {
        self.get_strings(command, &stringify(params))
    }

    /// Dispatch by kind with pre-rendered parameters (idle tasks, CLI).
    pub fn execute(&mut self, kind: CommandKind, command: &str, params: &[String]) -> CommandResult {
        match kind {
            CommandKind::Do => self.do_strings(command, params),
            CommandKind::Set => self.set_strings(command, params),
            CommandKind::Get => self.get_strings(command, params),
        }
    }

    fn do_strings(&mut self, command: &str, params: &[String]) -> CommandResult {
        match self.with_retries(command, |mb| mb.try_do(command, params)) {
            Some(DoOutcome::Done) => CommandResult::ok(),
            Some(DoOutcome::Failed(payload)) => {
                tracing::error!(command, payload = ?payload, "mainboard reported an error");
                CommandResult::mainboard_error(payload)
            }
            None => CommandResult::failed(),
        }
    }

    fn set_strings(&mut self, command: &str, params: &[String]) -> CommandResult {
        match self.with_retries(command, |mb| mb.try_set(command, params)) {
            Some(()) => CommandResult::ok(),
            None => CommandResult::failed(),
        }
    }

    fn get_strings(&mut self, command: &str, params: &[String]) -> CommandResult {
        match self.with_retries(command, |mb| mb.try_get(command, params)) {
            Some(v) => CommandResult::value(v),
            None => CommandResult::failed(),
        }
    }

    fn with_retries<T>(
        &mut self,
        command: &str,
        mut attempt: impl FnMut(&mut Self) -> Result<T, DispatchError>,
    ) -> Option<T> {
        for n in 1..=MAX_RETRIES {
            match attempt(self) {
                Ok(v) => return Some(v),
                Err(e) => {
                    tracing::warn!(command, attempt = n, max = MAX_RETRIES, error = %e, "attempt failed");
                }
            }
        }
        tracing::error!(command, "giving up after {MAX_RETRIES} attempts");
        None
    }

    fn send_command(&mut self, command: &str, params: &[String]) -> Result<(), DispatchError> {
        self.transport.clear_input();
        let line = protocol::encode_command(command, params);
        if command != "IsIdle" {
            tracing::debug!("-> {}", line.trim_end());
        }
        self.transport.send(&line).map_err(|e| {
            let msg = hw_error::map_transport_error(e.as_ref());
            if hw_error::is_link_failure(&msg) {
                self.transport.disconnect();
            }
            DispatchError::Send(e.to_string())
        })
    }

    /// First reply to a request; one heartbeat STATUS already on the wire is skipped.
    fn read_reply(&mut self) -> ProtocolMessage {
        let msg = self.read_message();
        if msg.kind == MessageType::Status {
            return self.read_message();
        }
        msg
    }

    fn try_set(&mut self, command: &str, params: &[String]) -> Result<(), DispatchError> {
        self.send_command(command, params)?;
        let reply = self.read_reply();
        if reply.is(MessageType::Ack, command) {
            Ok(())
        } else {
            Err(DispatchError::from_reply(command, &reply))
        }
    }

    fn try_get(&mut self, command: &str, params: &[String]) -> Result<String, DispatchError> {
        self.send_command(command, params)?;
        let mut reply = self.read_reply();
        if !reply.is(MessageType::Ack, command) {
            return Err(DispatchError::from_reply(command, &reply));
        }
        match reply.parameters.len() {
            0 => Err(DispatchError::MissingValue),
            1 => Ok(reply.parameters.swap_remove(0)),
            n => Err(DispatchError::ExtraValues(n)),
        }
    }

    fn try_do(&mut self, command: &str, params: &[String]) -> Result<DoOutcome, DispatchError> {
        self.send_command(command, params)?;
        let ack = self.read_reply();
        if !ack.is(MessageType::Ack, command) {
            return Err(DispatchError::from_reply(command, &ack));
        }
        loop {
            let msg = self.read_message();
            if msg.command != command {
                return Err(DispatchError::from_reply(command, &msg));
            }
            match msg.kind {
                MessageType::Status => continue,
                MessageType::Done => return Ok(DoOutcome::Done),
                MessageType::Error => return Ok(DoOutcome::Failed(msg.parameters)),
                _ => return Err(DispatchError::from_reply(command, &msg)),
            }
        }
    }
}

fn stringify(params: &[&dyn Display]) -> Vec<String> {
    params.iter().map(ToString::to_string).collect()
}
