//! Line codec for the mainboard protocol.
//!
//! Outgoing: `COMMAND (" " PARAM)* "\r"`.
//! Incoming: `TYPE " " COMMAND (" " PARAM)* "\n"` (terminator already removed
//! by the transport). Anything that does not parse becomes a `COMM_ERROR`
//! message carrying the reason; decoding never fails.

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Ack,
    Nak,
    Done,
    Error,
    Status,
    CommError,
    Timeout,
}

impl MessageType {
    pub const fn as_str(self) -> &'static str {
        match self {
            MessageType::Ack => "ACK",
            MessageType::Nak => "NAK",
            MessageType::Done => "DONE",
            MessageType::Error => "ERROR",
            MessageType::Status => "STATUS",
            MessageType::CommError => "COMM_ERROR",
            MessageType::Timeout => "TIMEOUT",
        }
    }

    /// Whether this type ends a DO exchange.
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            MessageType::Done | MessageType::Error | MessageType::CommError | MessageType::Timeout
        )
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "ACK" => MessageType::Ack,
            "NAK" => MessageType::Nak,
            "DONE" => MessageType::Done,
            "ERROR" => MessageType::Error,
            "STATUS" => MessageType::Status,
            "COMM_ERROR" => MessageType::CommError,
            "TIMEOUT" => MessageType::Timeout,
            _ => return Err(()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolMessage {
    pub kind: MessageType,
    pub command: String,
    pub parameters: Vec<String>,
}

impl ProtocolMessage {
    pub fn new(kind: MessageType, command: impl Into<String>, parameters: Vec<String>) -> Self {
        Self {
            kind,
            command: command.into(),
            parameters,
        }
    }

    /// Transport or framing failure; `reason` goes into the command field.
    pub fn comm_error(reason: impl Into<String>) -> Self {
        Self::new(MessageType::CommError, reason, Vec::new())
    }

    pub fn timeout() -> Self {
        Self::new(MessageType::Timeout, "read timed out", Vec::new())
    }

    pub fn is(&self, kind: MessageType, command: &str) -> bool {
        self.kind == kind && self.command == command
    }

    pub fn first_parameter(&self) -> Option<&str> {
        self.parameters.first().map(String::as_str)
    }
}

/// Renders the incoming-line grammar (without terminator).
impl fmt::Display for ProtocolMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.command)?;
        for p in &self.parameters {
            write!(f, " {p}")?;
        }
        Ok(())
    }
}

/// Parse one received line.
pub fn decode(line: &str) -> ProtocolMessage {
    let line = line.trim_end_matches(['\r', '\n']);
    let mut tokens = line.split_whitespace();
    let (Some(kind), Some(command)) = (tokens.next(), tokens.next()) else {
        return ProtocolMessage::comm_error(if line.trim().is_empty() {
            "empty line read".to_string()
        } else {
            format!("malformed line '{line}'")
        });
    };
    let Ok(kind) = kind.parse::<MessageType>() else {
        return ProtocolMessage::comm_error(format!("unknown message type '{kind}'"));
    };
    ProtocolMessage::new(kind, command, tokens.map(str::to_string).collect())
}

/// Build the wire form of a command, terminator included.
pub fn encode_command<P: AsRef<str>>(command: &str, params: &[P]) -> String {
    let mut line = String::with_capacity(command.len() + 1 + params.len() * 6);
    line.push_str(command);
    for p in params {
        line.push(' ');
        line.push_str(p.as_ref());
    }
    line.push('\r');
    line
}

/// Board idle heartbeats: `STATUS IDLE` and the answer to an `IsIdle` poll.
pub fn is_heartbeat(msg: &ProtocolMessage) -> bool {
    (msg.kind == MessageType::Status && msg.command == "IDLE")
        || (msg.kind == MessageType::Ack
            && msg.command == "IsIdle"
            && msg.first_parameter() == Some("1"))
}

/// Suppresses repeated heartbeat lines in the traffic log.
///
/// A heartbeat is logged only when it starts a run of heartbeats; the first
/// non-heartbeat after the run is logged as usual and re-arms the filter.
#[derive(Debug, Default)]
pub struct HeartbeatFilter {
    in_run: bool,
}

impl HeartbeatFilter {
    pub fn should_log(&mut self, msg: &ProtocolMessage) -> bool {
        if is_heartbeat(msg) {
            let first = !self.in_run;
            self.in_run = true;
            first
        } else {
            self.in_run = false;
            true
        }
    }
}
