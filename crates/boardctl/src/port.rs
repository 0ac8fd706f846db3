//! Port abstraction for board I/O.
//!
//! The executor only needs a byte pipe it can read, write and close. Ports
//! are created per exchange by a [`PortFactory`] so the transport can be
//! swapped for a test double.

use std::io::{self, Read, Write};
use std::time::Duration;

use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use tracing::debug;

use crate::config::BoardConfig;

/// A byte-oriented duplex channel to the board.
pub trait Port: Send {
    /// Read available bytes into `buf`.
    ///
    /// Implementations are expected to return within a short timeout when no
    /// data arrives, either with `Ok(0)` or an error.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write bytes, returning how many were accepted.
    fn write(&mut self, data: &[u8]) -> io::Result<usize>;

    /// Close the port. Further reads and writes fail.
    fn close(&mut self) -> io::Result<()>;
}

/// Opens ports on demand.
pub trait PortFactory: Send + Sync {
    /// Open a new port.
    fn create(&self) -> io::Result<Box<dyn Port>>;

    /// Human-readable name of what this factory opens, for error messages.
    fn device(&self) -> String;
}

/// Opens the board's serial device.
#[derive(Debug, Clone)]
pub struct SerialPortFactory {
    device: String,
    baud_rate: u32,
    read_timeout: Duration,
}

impl SerialPortFactory {
    /// Create a factory for the given device.
    pub fn new(device: impl Into<String>, baud_rate: u32, read_timeout: Duration) -> Self {
        SerialPortFactory {
            device: device.into(),
            baud_rate,
            read_timeout,
        }
    }

    /// Create a factory from the serial settings in `config`.
    pub fn from_config(config: &BoardConfig) -> Self {
        Self::new(config.device.clone(), config.baud_rate, config.read_timeout())
    }
}

impl PortFactory for SerialPortFactory {
    fn create(&self) -> io::Result<Box<dyn Port>> {
        let port = serialport::new(&self.device, self.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(self.read_timeout)
            .open()?;

        debug!("Opened serial port {} at {} baud", self.device, self.baud_rate);

        Ok(Box::new(SerialDevice {
            port: Some(port),
            device: self.device.clone(),
        }))
    }

    fn device(&self) -> String {
        self.device.clone()
    }
}

/// An open serial device.
struct SerialDevice {
    port: Option<Box<dyn SerialPort>>,
    device: String,
}

impl SerialDevice {
    fn port(&mut self) -> io::Result<&mut Box<dyn SerialPort>> {
        self.port
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "port is closed"))
    }
}

impl Port for SerialDevice {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port()?.read(buf)
    }

    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let port = self.port()?;
        let n = port.write(data)?;
        port.flush()?;
        Ok(n)
    }

    fn close(&mut self) -> io::Result<()> {
        if self.port.take().is_some() {
            debug!("Closed serial port {}", self.device);
        }
        Ok(())
    }
}
