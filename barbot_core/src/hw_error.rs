//! Maps `Box<dyn Error>` from the transport boundary to protocol messages.
//!
//! A read timeout becomes `TIMEOUT` and leaves the link up; every other
//! failure becomes `COMM_ERROR` carrying the reason and means the link is gone.

use crate::protocol::{MessageType, ProtocolMessage};

/// Map a trait-boundary error to the message the dispatcher acts on.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to string-based heuristics.
pub fn map_transport_error(e: &(dyn std::error::Error + 'static)) -> ProtocolMessage {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<barbot_hardware::HwError>() {
            return match hw {
                barbot_hardware::HwError::Timeout => ProtocolMessage::timeout(),
                other => ProtocolMessage::comm_error(other.to_string()),
            };
        }
    }

    if let Some(io) = e.downcast_ref::<std::io::Error>()
        && io.kind() == std::io::ErrorKind::TimedOut
    {
        return ProtocolMessage::timeout();
    }

    let s = e.to_string();
    let lower = s.to_lowercase();
    if lower.contains("timeout") || lower.contains("timed out") {
        ProtocolMessage::timeout()
    } else {
        ProtocolMessage::comm_error(s)
    }
}

/// Whether the mapped message means the link is unusable.
pub fn is_link_failure(msg: &ProtocolMessage) -> bool {
    msg.kind == MessageType::CommError
}
