//! Transports to the BarBot mainboard.
//!
//! - `SerialTransport` (feature `hardware`): serial / Bluetooth RFCOMM port.
//! - `SimulatedMainboard`: in-process firmware stand-in for demo mode and tests.
pub mod error;
pub mod line_buffer;
#[cfg(feature = "hardware")]
pub mod serial;
pub mod sim;

pub use error::HwError;
pub use line_buffer::LineBuffer;
#[cfg(feature = "hardware")]
pub use serial::SerialTransport;
pub use sim::{ForcedReply, SimulatedMainboard};

/// Substring that identifies a BarBot mainboard during discovery.
pub const DEVICE_MARKER: &str = "Bar Bot";
