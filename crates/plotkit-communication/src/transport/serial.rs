//! Serial transport.
//!
//! Blocking line I/O over USB/RS-232 via the `serialport` crate. The
//! port handle is opened lazily on first use and dropped on any I/O
//! failure, so the next call starts from a fresh connect.

use crate::transport::Transport;
use plotkit_core::machine::ConnectionSettings;
use plotkit_core::{Error, Result, TransportError};
use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

/// Information about an available serial port
#[derive(Debug, Clone)]
pub struct SerialPortInfo {
    /// Port name (e.g., "/dev/ttyUSB0", "COM3")
    pub port_name: String,
    /// Port description (e.g., "USB Serial Port")
    pub description: String,
    /// Manufacturer name if available
    pub manufacturer: Option<String>,
    /// USB vendor/product IDs if applicable
    pub usb_ids: Option<(u16, u16)>,
}

/// List serial ports that look like plotter controllers.
///
/// Filters to the patterns hobby CNC/plotter boards enumerate as:
/// - Windows: COM*
/// - Linux: /dev/ttyUSB*, /dev/ttyACM*
/// - macOS: /dev/cu.usbserial-*, /dev/cu.usbmodem*
pub fn list_ports() -> Result<Vec<SerialPortInfo>> {
    let ports = serialport::available_ports().map_err(|e| {
        tracing::error!("Failed to enumerate serial ports: {}", e);
        Error::other(format!("Failed to enumerate ports: {}", e))
    })?;

    Ok(ports
        .iter()
        .filter(|port| is_plotter_port(&port.port_name))
        .map(|port| {
            let (description, manufacturer, usb_ids) = match &port.port_type {
                serialport::SerialPortType::UsbPort(usb) => (
                    format!(
                        "USB {} {}",
                        usb.manufacturer.as_deref().unwrap_or("Device"),
                        usb.product.as_deref().unwrap_or("Serial Port")
                    ),
                    usb.manufacturer.clone(),
                    Some((usb.vid, usb.pid)),
                ),
                serialport::SerialPortType::BluetoothPort => {
                    ("Bluetooth Serial".to_string(), None, None)
                }
                serialport::SerialPortType::PciPort => ("PCI Serial".to_string(), None, None),
                _ => ("Serial Port".to_string(), None, None),
            };
            SerialPortInfo {
                port_name: port.port_name.clone(),
                description,
                manufacturer,
                usb_ids,
            }
        })
        .collect())
}

fn is_plotter_port(port_name: &str) -> bool {
    if port_name.starts_with("COM") && port_name[3..].chars().all(|c| c.is_ascii_digit()) {
        return true;
    }
    if port_name.starts_with("/dev/ttyUSB") || port_name.starts_with("/dev/ttyACM") {
        return true;
    }
    if port_name.starts_with("/dev/cu.usbserial-") || port_name.starts_with("/dev/cu.usbmodem") {
        return true;
    }
    false
}

/// Serial transport with lazy connect and invalidate-on-failure.
pub struct SerialTransport {
    port_name: String,
    baud_rate: u32,
    timeout: Duration,
    handle: Option<Box<dyn serialport::SerialPort>>,
}

impl SerialTransport {
    pub fn new(port_name: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate,
            timeout: Duration::from_secs(30),
            handle: None,
        }
    }

    pub fn from_settings(settings: &ConnectionSettings) -> Self {
        let mut transport = Self::new(&settings.port, settings.baud_rate);
        transport.timeout = Duration::from_millis(settings.timeout_ms);
        transport
    }

    /// The cached handle, connecting if necessary.
    fn handle(&mut self) -> Result<&mut Box<dyn serialport::SerialPort>> {
        if self.handle.is_none() {
            tracing::info!("Opening serial port {} @ {}", self.port_name, self.baud_rate);
            let port = serialport::new(&self.port_name, self.baud_rate)
                .timeout(self.timeout)
                .open()
                .map_err(|e| TransportError::ConnectFailed {
                    target: self.port_name.clone(),
                    reason: e.to_string(),
                })?;
            self.handle = Some(port);
        }
        // Checked above.
        match self.handle.as_mut() {
            Some(handle) => Ok(handle),
            None => Err(TransportError::Disconnected.into()),
        }
    }

    /// Drop the cached handle so the next call reconnects.
    fn invalidate(&mut self) {
        self.handle = None;
    }

    fn io_error(&mut self, err: std::io::Error) -> Error {
        self.invalidate();
        if err.kind() == ErrorKind::TimedOut {
            TransportError::Timeout {
                timeout_ms: self.timeout.as_millis() as u64,
            }
            .into()
        } else {
            TransportError::Io {
                reason: err.to_string(),
            }
            .into()
        }
    }
}

impl Transport for SerialTransport {
    fn write(&mut self, data: &[u8]) -> Result<usize> {
        let port = self.handle()?;
        match port.write_all(data).and_then(|_| port.flush()) {
            Ok(()) => Ok(data.len()),
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn readline(&mut self) -> Result<String> {
        let port = self.handle()?;
        let mut line = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            match port.read(&mut byte) {
                Ok(0) => break,
                Ok(_) => {
                    if byte[0] == b'\n' {
                        break;
                    }
                    line.push(byte[0]);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(self.io_error(e)),
            }
        }
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Ok(String::from_utf8_lossy(&line).into_owned())
    }

    fn describe(&self) -> String {
        format!("serial:{}@{}", self.port_name, self.baud_rate)
    }
}
