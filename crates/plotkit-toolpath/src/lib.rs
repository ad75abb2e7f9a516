//! # Plotkit Toolpath
//!
//! Turns line art into device commands:
//! - [`optimizer`]: greedy nearest-neighbor chunk ordering that
//!   minimizes pen-up travel between disjoint segments
//! - [`post`]: serializes ordered chunks into G-code with pen-lift
//!   elision for short gaps

pub mod optimizer;
pub mod post;

pub use optimizer::{optimize, OptimizerConfig};
pub use post::GcodePost;
