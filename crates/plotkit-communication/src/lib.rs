//! # Plotkit Communication
//!
//! Everything between ordered line art and a moving pen:
//! - [`transport`]: byte-oriented line I/O over serial or TCP
//! - [`protocol`]: line framing with an acknowledgement flow-control
//!   window and cooperative pause/cancel
//! - [`machine`]: one profile bound to one transport + protocol + post
//! - [`worker`]: the background plot worker and its textual
//!   command/response protocol

pub mod machine;
pub mod protocol;
pub mod transport;
pub mod worker;

pub use machine::Machine;
pub use protocol::{AsciiProtocol, ProtocolConfig};
pub use transport::{
    list_ports, serial::SerialTransport, tcp::TcpTransport, SerialPortInfo, Transport,
};
pub use worker::{
    command::{Request, WorkerCommand},
    response::{Response, Status},
    PlotWorker, Progress, WorkerState,
};
