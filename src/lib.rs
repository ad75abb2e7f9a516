//! # Plotkit
//!
//! A pen plotter driver. Line art goes in as unordered polyline
//! chunks; G-code comes out over a serial or TCP link, streamed with
//! acknowledgement flow control by a background worker that can be
//! paused, cancelled, and queried while it runs.
//!
//! The workspace splits along its seams:
//!
//! 1. **plotkit-core** - errors, geometry, machine profiles
//! 2. **plotkit-toolpath** - chunk-order optimizer and the G-code
//!    postprocessor
//! 3. **plotkit-communication** - transports, wire protocol, and the
//!    plot worker
//! 4. **plotkit** - this crate: re-exports and the sender binary
//!
//! ## Quick tour
//!
//! ```no_run
//! use plotkit::{optimize, GcodePost, Machine, MachineCatalog, OptimizerConfig, PlotWorker};
//! use plotkit::{LineChunk, Plottable, Point};
//!
//! # fn run() -> plotkit::Result<()> {
//! let mut art = Plottable::default();
//! art.push(LineChunk::new(vec![Point::new(0.0, 0.0), Point::new(20.0, 40.0)]));
//!
//! let ordered = optimize(art, &OptimizerConfig::default(), None);
//! let profile = MachineCatalog::builtin().get("plotkit_v1").unwrap().clone();
//! let program = GcodePost::from_settings(&profile.post).program(&ordered);
//!
//! let worker = PlotWorker::spawn(Machine::from_profile(profile))?;
//! worker.send(&format!("LOAD[job]:{program}"))?;
//! worker.send("START[job]")?;
//! # Ok(())
//! # }
//! ```

pub use plotkit_core::{
    ConnectionDriver, ConnectionSettings, Error, LineChunk, MachineCatalog, MachineProfile,
    Plottable, Point, PostSettings, ProtocolError, Result, TransportError, TravelLimits,
    WorkerError, MAX_DISTANCE,
};

pub use plotkit_toolpath::{optimize, GcodePost, OptimizerConfig};

pub use plotkit_communication::{
    list_ports, AsciiProtocol, Machine, PlotWorker, Progress, ProtocolConfig, Request, Response,
    SerialPortInfo, SerialTransport, Status, TcpTransport, Transport, WorkerCommand, WorkerState,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging with the default configuration
///
/// Console output at INFO by default, overridable through the
/// `RUST_LOG` environment variable.
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}
