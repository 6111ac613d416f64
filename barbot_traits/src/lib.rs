pub mod catalog;
pub mod clock;

pub use catalog::{CommandKind, CommandSpec};
pub use clock::{Clock, MonotonicClock};

/// Error type used at the transport boundary.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Write half of a link that can be used from another thread while the
/// owning `Transport` is blocked in `read_line`.
pub trait LineSender: Send {
    fn send_line(&mut self, line: &str) -> Result<(), BoxError>;
}

/// Line-oriented link to the mainboard (serial port, Bluetooth RFCOMM, simulator).
///
/// `send` writes the line exactly as given (the caller appends the `\r`
/// terminator). `read_line` blocks until a complete line arrived, the read
/// timeout expired, or the link failed; the returned line carries no
/// terminator.
pub trait Transport: Send {
    fn connect(&mut self, identifier: &str) -> Result<(), BoxError>;
    fn disconnect(&mut self);
    fn is_connected(&self) -> bool;
    fn send(&mut self, line: &str) -> Result<(), BoxError>;
    fn read_line(&mut self) -> Result<String, BoxError>;

    /// Best-effort scan for a BarBot mainboard. Failures report "not found".
    fn find_device(&mut self) -> Option<String>;

    /// Drop any buffered input that was received before the next request.
    fn clear_input(&mut self) {}

    /// Independent writer for out-of-band lines such as `ABORT`.
    fn sender(&self) -> Option<Box<dyn LineSender>> {
        None
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn connect(&mut self, identifier: &str) -> Result<(), BoxError> {
        (**self).connect(identifier)
    }
    fn disconnect(&mut self) {
        (**self).disconnect();
    }
    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }
    fn send(&mut self, line: &str) -> Result<(), BoxError> {
        (**self).send(line)
    }
    fn read_line(&mut self) -> Result<String, BoxError> {
        (**self).read_line()
    }
    fn find_device(&mut self) -> Option<String> {
        (**self).find_device()
    }
    fn clear_input(&mut self) {
        (**self).clear_input();
    }
    fn sender(&self) -> Option<Box<dyn LineSender>> {
        (**self).sender()
    }
}
