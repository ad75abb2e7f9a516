//! The plot worker and its textual command/response protocol.
//!
//! Commands are ASCII lines of the form `KIND[correlation-id]` or
//! `KIND[correlation-id]:content`; every command eventually produces
//! exactly one `OK[id]`/`ERR[id]`/`FATAL[id]` result line, and an
//! active plot additionally reports `(index, total, command)` triples
//! on a separate progress channel.

pub mod command;
pub mod response;

mod plot_worker;

pub use plot_worker::{PlotWorker, Progress, WorkerState};
