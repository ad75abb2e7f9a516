//! TCP transport.
//!
//! G-code over a raw telnet-style socket, as spoken by Smoothieware
//! boards. The device prints a one-line banner at connect time, which
//! is validated, and prefixes response lines with a `>` prompt, which
//! is stripped. Unlike the serial transport, a failed TCP link is not
//! silently re-dialed: once invalidated every call fails until
//! [`TcpTransport::reconnect`] is invoked.

use crate::transport::Transport;
use plotkit_core::machine::ConnectionSettings;
use plotkit_core::{Error, Result, TransportError};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::net::TcpStream;
use std::time::Duration;

/// Banner the Smoothie telnet shell prints on connect.
pub const SMOOTHIE_BANNER: &str = "Smoothie command shell";

struct Conn {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

/// TCP transport with connect-time banner validation.
pub struct TcpTransport {
    host: String,
    port: u16,
    banner: String,
    timeout: Duration,
    conn: Option<Conn>,
    /// Set after an established link fails; further calls error out
    /// instead of re-dialing.
    poisoned: bool,
}

impl TcpTransport {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            banner: SMOOTHIE_BANNER.to_string(),
            timeout: Duration::from_secs(10),
            conn: None,
            poisoned: false,
        }
    }

    pub fn from_settings(settings: &ConnectionSettings) -> Self {
        let mut transport = Self::new(&settings.host, settings.tcp_port);
        transport.timeout = Duration::from_millis(settings.timeout_ms);
        transport
    }

    /// Expect a different connect banner (for non-Smoothie shells).
    pub fn with_banner(mut self, banner: impl Into<String>) -> Self {
        self.banner = banner.into();
        self
    }

    fn target(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn dial(&mut self) -> Result<()> {
        tracing::info!("Connecting to {}", self.target());
        let stream = TcpStream::connect((self.host.as_str(), self.port)).map_err(|e| {
            TransportError::ConnectFailed {
                target: self.target(),
                reason: e.to_string(),
            }
        })?;
        stream
            .set_read_timeout(Some(self.timeout))
            .and_then(|_| stream.set_write_timeout(Some(self.timeout)))
            .map_err(|e| TransportError::Io {
                reason: e.to_string(),
            })?;
        let writer = stream.try_clone().map_err(|e| TransportError::Io {
            reason: e.to_string(),
        })?;
        let mut reader = BufReader::new(stream);

        // The shell announces itself with one banner line; anything
        // else means we dialed the wrong service.
        let mut banner = String::new();
        reader
            .read_line(&mut banner)
            .map_err(|e| TransportError::Io {
                reason: e.to_string(),
            })?;
        if !banner.contains(&self.banner) {
            return Err(TransportError::BannerMismatch {
                banner: banner.trim_end().to_string(),
            }
            .into());
        }

        self.conn = Some(Conn { reader, writer });
        Ok(())
    }

    /// Re-dial a previously invalidated link.
    pub fn reconnect(&mut self) -> Result<()> {
        self.conn = None;
        self.poisoned = false;
        self.dial()
    }

    fn conn(&mut self) -> Result<&mut Conn> {
        if self.poisoned {
            return Err(TransportError::Disconnected.into());
        }
        if self.conn.is_none() {
            self.dial()?;
        }
        match self.conn.as_mut() {
            Some(conn) => Ok(conn),
            None => Err(TransportError::Disconnected.into()),
        }
    }

    fn io_error(&mut self, err: std::io::Error) -> Error {
        self.conn = None;
        self.poisoned = true;
        // WouldBlock is how read timeouts surface on some platforms.
        if matches!(err.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) {
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

impl Transport for TcpTransport {
    fn write(&mut self, data: &[u8]) -> Result<usize> {
        let conn = self.conn()?;
        match conn.writer.write_all(data).and_then(|_| conn.writer.flush()) {
            Ok(()) => Ok(data.len()),
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn readline(&mut self) -> Result<String> {
        let conn = self.conn()?;
        let mut line = String::new();
        match conn.reader.read_line(&mut line) {
            Ok(_) => {
                let trimmed = line.trim_end_matches(['\n', '\r']);
                // Strip the per-line shell prompt.
                Ok(trimmed.strip_prefix('>').unwrap_or(trimmed).to_string())
            }
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn describe(&self) -> String {
        format!("tcp:{}", self.target())
    }
}
