//! # Plotkit Core
//!
//! Core types for the plotkit pen-plotter driver:
//! - Error taxonomy shared by every layer (transport, protocol, worker)
//! - Geometry data model (points, line chunks, plottables)
//! - Machine profiles and the machine catalog

pub mod error;
pub mod geometry;
pub mod machine;

pub use error::{Error, ProtocolError, Result, TransportError, WorkerError};
pub use geometry::{LineChunk, Plottable, Point, MAX_DISTANCE};
pub use machine::{
    ConnectionDriver, ConnectionSettings, MachineCatalog, MachineProfile, PostSettings,
    TravelLimits,
};
