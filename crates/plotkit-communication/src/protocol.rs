//! Line protocol with acknowledgement flow control.
//!
//! The device speaks newline-terminated command lines; every line is
//! answered with one response line containing "OK" (any case). The
//! protocol keeps a sliding window of unacknowledged commands and only
//! blocks for responses once the window exceeds the configured
//! lookahead, so slow links stay busy without overrunning the
//! controller's input buffer.
//!
//! Pause and cancellation are cooperative: `plot` polls shared atomic
//! flags between lines, so latency is bounded by one send+ack cycle
//! rather than being immediate.

use crate::transport::Transport;
use plotkit_core::{ProtocolError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// How long the pause busy-wait sleeps between polls.
const PAUSE_POLL: Duration = Duration::from_millis(50);

/// Progress callback invoked before each line is sent:
/// `(index, total, command)`. Returning an error aborts the remaining
/// stream without closing the transport; `ProtocolError::Cancelled` is
/// the conventional abort reason.
pub type PlotCallback<'a> = &'a mut dyn FnMut(usize, usize, &str) -> Result<()>;

/// Configuration for [`AsciiProtocol`].
#[derive(Debug, Clone, Copy)]
pub struct ProtocolConfig {
    /// Whether every line requires an acknowledgement.
    pub wait_for_ok: bool,
    /// Maximum unacknowledged in-flight commands before `plot` blocks
    /// for a response. 0 means strict ack-per-line.
    pub lookahead: usize,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            wait_for_ok: true,
            lookahead: 0,
        }
    }
}

/// Newline-delimited ASCII command protocol.
///
/// The `paused` and `die` flags are shared atomics so other threads can
/// pause or abort a `plot` call that is running on the worker thread.
pub struct AsciiProtocol {
    config: ProtocolConfig,
    paused: Arc<AtomicBool>,
    die: Arc<AtomicBool>,
}

impl AsciiProtocol {
    pub fn new(config: ProtocolConfig) -> Self {
        Self {
            config,
            paused: Arc::new(AtomicBool::new(false)),
            die: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    /// Handle to the shared pause flag.
    pub fn pause_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.paused)
    }

    /// Handle to the shared abort flag.
    pub fn die_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.die)
    }

    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Abort any in-flight `plot` with no further writes.
    pub fn rewind(&self) {
        self.die.store(true, Ordering::SeqCst);
    }

    /// Send one line and, if acks are required, block for its response.
    pub fn single(&self, cmd: &str, transport: &mut dyn Transport) -> Result<()> {
        tracing::debug!(cmd, "sending single command");
        transport.write(format!("{}\n", cmd).as_bytes())?;
        if self.config.wait_for_ok {
            self.read_ack(transport)?;
        }
        Ok(())
    }

    /// Stream a full command list with flow control.
    ///
    /// Before each send: waits out the pause flag (unless `die` is
    /// set, which aborts with no further writes), then invokes the
    /// callback, whose error aborts the remaining stream. After each
    /// send the unacknowledged-command window is reduced until it fits
    /// the lookahead; outstanding acks are drained after the last
    /// write, so a clean return means every line was acknowledged.
    pub fn plot(
        &self,
        cmds: &[String],
        transport: &mut dyn Transport,
        mut callback: Option<PlotCallback<'_>>,
    ) -> Result<()> {
        let total = cmds.len();
        let mut pending_oks = 0usize;
        tracing::info!(total, transport = %transport.describe(), "streaming plot");

        for (index, cmd) in cmds.iter().enumerate() {
            while self.paused.load(Ordering::SeqCst) {
                if self.die.load(Ordering::SeqCst) {
                    tracing::info!("plot aborted while paused");
                    return Ok(());
                }
                std::thread::sleep(PAUSE_POLL);
            }
            if self.die.load(Ordering::SeqCst) {
                tracing::info!(index, "plot aborted");
                return Ok(());
            }

            if let Some(cb) = callback.as_mut() {
                cb(index, total, cmd)?;
            }

            transport.write(format!("{}\n", cmd).as_bytes())?;
            if self.config.wait_for_ok {
                pending_oks += 1;
                while pending_oks > self.config.lookahead {
                    self.read_ack(transport)?;
                    pending_oks -= 1;
                }
            }
        }

        while pending_oks > 0 {
            self.read_ack(transport)?;
            pending_oks -= 1;
        }
        Ok(())
    }

    fn read_ack(&self, transport: &mut dyn Transport) -> Result<()> {
        let response = transport.readline()?;
        if !response.to_uppercase().contains("OK") {
            tracing::error!(response, "bad acknowledgement from plotter");
            return Err(ProtocolError::BadAck { response }.into());
        }
        Ok(())
    }
}

impl Default for AsciiProtocol {
    fn default() -> Self {
        Self::new(ProtocolConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plotkit_core::Error;

    /// Transport that scripts its responses and records traffic.
    struct MockTransport {
        writes: Vec<String>,
        reads: usize,
        response: &'static str,
    }

    impl MockTransport {
        fn ok() -> Self {
            Self {
                writes: Vec::new(),
                reads: 0,
                response: "ok",
            }
        }

        fn answering(response: &'static str) -> Self {
            Self {
                response,
                ..Self::ok()
            }
        }
    }

    impl Transport for MockTransport {
        fn write(&mut self, data: &[u8]) -> Result<usize> {
            self.writes
                .push(String::from_utf8_lossy(data).into_owned());
            Ok(data.len())
        }

        fn readline(&mut self) -> Result<String> {
            self.reads += 1;
            Ok(self.response.to_string())
        }

        fn describe(&self) -> String {
            "mock".to_string()
        }
    }

    fn cmds(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("G01 X{} Y0", i)).collect()
    }

    #[test]
    fn single_requires_ok() {
        let protocol = AsciiProtocol::default();
        let mut t = MockTransport::ok();
        protocol.single("M400", &mut t).unwrap();
        assert_eq!(t.writes, vec!["M400\n"]);
        assert_eq!(t.reads, 1);
    }

    #[test]
    fn single_rejects_non_ok_response() {
        let protocol = AsciiProtocol::default();
        let mut t = MockTransport::answering("error: alarm");
        let err = protocol.single("M400", &mut t).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn ok_is_matched_case_insensitively() {
        let protocol = AsciiProtocol::default();
        let mut t = MockTransport::answering("Ok");
        protocol.single("M400", &mut t).unwrap();
    }

    #[test]
    fn plot_with_lookahead_writes_all_and_blocks_for_acks() {
        let protocol = AsciiProtocol::new(ProtocolConfig {
            wait_for_ok: true,
            lookahead: 5,
        });
        let mut t = MockTransport::ok();
        protocol.plot(&cmds(20), &mut t, None).unwrap();
        assert_eq!(t.writes.len(), 20);
        // Window of 5 forces reads during the stream, and the drain
        // collects the remainder.
        assert!(t.reads >= 1);
        assert_eq!(t.reads, 20);
    }

    #[test]
    fn plot_without_acks_never_reads() {
        let protocol = AsciiProtocol::new(ProtocolConfig {
            wait_for_ok: false,
            lookahead: 1,
        });
        let mut t = MockTransport::ok();
        protocol.plot(&cmds(7), &mut t, None).unwrap();
        assert_eq!(t.writes.len(), 7);
        assert_eq!(t.reads, 0);
    }

    #[test]
    fn callback_runs_before_each_write_and_can_cancel() {
        let protocol = AsciiProtocol::default();
        let mut t = MockTransport::ok();
        let mut seen = Vec::new();
        let mut cb = |index: usize, total: usize, cmd: &str| -> Result<()> {
            seen.push((index, total, cmd.to_string()));
            if index == 2 {
                return Err(ProtocolError::Cancelled.into());
            }
            Ok(())
        };
        let err = protocol.plot(&cmds(10), &mut t, Some(&mut cb)).unwrap_err();
        assert!(err.is_cancelled());
        // The cancelled line was never written.
        assert_eq!(t.writes.len(), 2);
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0], (0, 10, "G01 X0 Y0".to_string()));
    }

    #[test]
    fn rewind_aborts_before_any_write() {
        let protocol = AsciiProtocol::default();
        protocol.rewind();
        let mut t = MockTransport::ok();
        protocol.plot(&cmds(5), &mut t, None).unwrap();
        assert!(t.writes.is_empty());
    }

    #[test]
    fn bad_ack_mid_stream_is_fatal() {
        let protocol = AsciiProtocol::default();
        let mut t = MockTransport::answering("!!");
        let err = protocol.plot(&cmds(3), &mut t, None).unwrap_err();
        assert!(matches!(
            err,
            Error::Protocol(ProtocolError::BadAck { .. })
        ));
    }

    #[test]
    fn paused_plot_aborts_cleanly_on_rewind() {
        let protocol = AsciiProtocol::default();
        protocol.set_paused(true);
        assert!(protocol.is_paused());
        // The die flag is checked inside the pause wait, so a paused
        // stream still winds down without writing anything.
        protocol.rewind();
        let mut t = MockTransport::ok();
        protocol.plot(&cmds(3), &mut t, None).unwrap();
        assert!(t.writes.is_empty());
    }
}
