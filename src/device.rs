//! ==============================================================================
//! device.rs - serial device abstraction
//! ==============================================================================
//!
//! purpose:
//!     the reader loop only needs three things from the port: how many bytes
//!     are waiting, a read that gives up after the port timeout, and a way to
//!     flush the input buffer. SerialDevice captures exactly that so the loop
//!     runs the same against a real /dev/ttyUSB0 or a scripted test device.
//!
//! relationships:
//!     - used by: reader.rs (owns one device for its whole life)
//!     - uses: serialport (real hardware)
//!
//! ==============================================================================

use std::io::{self, Read};
use std::time::Duration;

use crate::config::SerialConfig;
use crate::error::IngestError;

pub trait SerialDevice: Send {
    /// Bytes sitting in the OS input buffer right now.
    fn bytes_available(&mut self) -> io::Result<usize>;

    /// Read up to `buf.len()` bytes, waiting at most the port timeout.
    /// A timeout is reported as `Ok(0)`.
    fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Drop whatever is still queued in the input buffer.
    fn clear_input(&mut self) -> io::Result<()>;
}

/// Opens a fresh device each time the reader (re)connects.
pub trait Connector: Send {
    type Device: SerialDevice;

    fn connect(&mut self) -> Result<Self::Device, IngestError>;

    /// Human readable target for log lines.
    fn describe(&self) -> String;
}

// ==============================================================================
// real hardware
// ==============================================================================

pub struct SerialPortDevice {
    port: Box<dyn serialport::SerialPort>,
}

impl SerialDevice for SerialPortDevice {
    fn bytes_available(&mut self) -> io::Result<usize> {
        Ok(self.port.bytes_to_read()? as usize)
    }

    fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.port.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(e),
        }
    }

    fn clear_input(&mut self) -> io::Result<()> {
        self.port.clear(serialport::ClearBuffer::Input)?;
        Ok(())
    }
}

/// Opens the configured serial path with `serialport`.
#[derive(Debug, Clone)]
pub struct SerialPortConnector {
    path: String,
    baud_rate: u32,
    timeout: Duration,
}

impl SerialPortConnector {
    pub fn new(config: &SerialConfig) -> Self {
        Self {
            path: config.path.clone(),
            baud_rate: config.baud_rate,
            timeout: config.read_timeout(),
        }
    }
}

impl Connector for SerialPortConnector {
    type Device = SerialPortDevice;

    fn connect(&mut self) -> Result<SerialPortDevice, IngestError> {
        let port = serialport::new(&self.path, self.baud_rate)
            .timeout(self.timeout)
            .open()
            .map_err(|e| IngestError::Connect {
                path: self.path.clone(),
                baud_rate: self.baud_rate,
                source: e.into(),
            })?;
        Ok(SerialPortDevice { port })
    }

    fn describe(&self) -> String {
        format!("{} @ {} baud", self.path, self.baud_rate)
    }
}
