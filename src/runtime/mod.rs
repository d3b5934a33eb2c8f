//! Block runtime execution engine
//!
//! This module runs a [`System`]: it wires edges between blocks, spawns one
//! worker thread per block, preloads initial conditions, and coordinates the
//! halt and drain that end a run.

pub mod engine;
pub mod fabric;
pub mod halt;
pub mod system;
pub mod validation;
pub mod worker;

pub use engine::{BlockMetrics, RunReport};
pub use halt::HaltCause;
pub use system::{System, SystemState};
pub use validation::GraphValidator;
pub use worker::WorkerExit;
