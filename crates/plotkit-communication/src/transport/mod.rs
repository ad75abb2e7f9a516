//! Transport abstraction: byte-oriented line I/O to the plotter.
//!
//! A transport owns the physical link. Any I/O failure or timeout
//! invalidates its cached connection handle; the serial transport will
//! then retry a fresh connect on the next call, while the TCP transport
//! fails hard until reconnected explicitly.

pub mod serial;
pub mod tcp;

use plotkit_core::Result;

pub use serial::{list_ports, SerialPortInfo};

/// Byte-oriented line I/O to the device.
pub trait Transport: Send {
    /// Write raw bytes, returning the number written.
    fn write(&mut self, data: &[u8]) -> Result<usize>;

    /// Read one newline-terminated line, trimmed of the terminator and
    /// any transport-level prompt marker.
    fn readline(&mut self) -> Result<String>;

    /// Human-readable identity of the link, for logging.
    fn describe(&self) -> String;
}
