//! Serial / RFCOMM transport built on the `serialport` crate.

use std::io::{Read, Write};
use std::time::{Duration, Instant};

use barbot_traits::{BoxError, LineSender, Transport};
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, SerialPortType, StopBits};

use crate::DEVICE_MARKER;
use crate::error::{HwError, Result};
use crate::line_buffer::LineBuffer;

/// Granularity of a single blocking read on the port.
const POLL_SLICE: Duration = Duration::from_millis(20);

pub struct SerialTransport {
    baud_rate: u32,
    read_timeout: Duration,
    port: Option<Box<dyn SerialPort>>,
    buffer: LineBuffer,
}

impl SerialTransport {
    /// Create a closed transport. `read_timeout` bounds a single `read_line`.
    pub fn new(baud_rate: u32, read_timeout: Duration) -> Self {
        Self {
            baud_rate,
            read_timeout,
            port: None,
            buffer: LineBuffer::new(),
        }
    }

    fn open(&self, path: &str) -> Result<Box<dyn SerialPort>> {
        let port = serialport::new(path, self.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(POLL_SLICE)
            .open()?;
        Ok(port)
    }

    fn fail(&mut self, e: std::io::Error) -> HwError {
        tracing::warn!(error = %e, "serial link failed, closing port");
        self.port = None;
        self.buffer.clear();
        HwError::Io(e)
    }
}

impl Transport for SerialTransport {
    fn connect(&mut self, identifier: &str) -> std::result::Result<(), BoxError> {
        self.disconnect();
        let port = self.open(identifier)?;
        tracing::info!(port = identifier, baud = self.baud_rate, "opened serial port");
        self.port = Some(port);
        Ok(())
    }

    fn disconnect(&mut self) {
        if self.port.take().is_some() {
            tracing::info!("serial port closed");
        }
        self.buffer.clear();
    }

    fn is_connected(&self) -> bool {
        self.port.is_some()
    }

    fn send(&mut self, line: &str) -> std::result::Result<(), BoxError> {
        let Some(port) = self.port.as_mut() else {
            return Err(HwError::NotConnected.into());
        };
        let res = port.write_all(line.as_bytes()).and_then(|()| port.flush());
        match res {
            Ok(()) => Ok(()),
            Err(e) => Err(self.fail(e).into()),
        }
    }

    fn read_line(&mut self) -> std::result::Result<String, BoxError> {
        let deadline = Instant::now() + self.read_timeout;
        let mut chunk = [0u8; 256];
        loop {
            if let Some(line) = self.buffer.next_line() {
                return Ok(line);
            }
            if Instant::now() >= deadline {
                return Err(HwError::Timeout.into());
            }
            let Some(port) = self.port.as_mut() else {
                return Err(HwError::NotConnected.into());
            };
            match port.read(&mut chunk) {
                Ok(0) => {
                    let e = std::io::Error::from(std::io::ErrorKind::UnexpectedEof);
                    return Err(self.fail(e).into());
                }
                Ok(n) => self.buffer.push(&chunk[..n]),
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {}
                Err(e) => return Err(self.fail(e).into()),
            }
        }
    }

    fn clear_input(&mut self) {
        self.buffer.clear();
        if let Some(port) = self.port.as_ref()
            && let Err(e) = port.clear(ClearBuffer::Input)
        {
            tracing::debug!(error = %e, "failed to clear serial input buffer");
        }
    }

    fn find_device(&mut self) -> Option<String> {
        let ports = match serialport::available_ports() {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(error = %e, "serial port enumeration failed");
                return None;
            }
        };
        ports.into_iter().find_map(|p| {
            let matches = match &p.port_type {
                SerialPortType::UsbPort(info) => [info.product.as_deref(), info.manufacturer.as_deref()]
                    .into_iter()
                    .flatten()
                    .any(|s| s.contains(DEVICE_MARKER)),
                _ => false,
            } || p.port_name.contains(DEVICE_MARKER);
            matches.then_some(p.port_name)
        })
    }

    fn sender(&self) -> Option<Box<dyn LineSender>> {
        let port = self.port.as_ref()?.try_clone().ok()?;
        Some(Box::new(SerialSender { port }))
    }
}

struct SerialSender {
    port: Box<dyn SerialPort>,
}

impl LineSender for SerialSender {
    fn send_line(&mut self, line: &str) -> std::result::Result<(), BoxError> {
        self.port.write_all(line.as_bytes())?;
        self.port.flush()?;
        Ok(())
    }
}
