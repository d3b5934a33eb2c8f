//! Block Flow - synchronous dataflow engine
//!
//! This crate runs graphs of numeric blocks. Each block has a fixed number of
//! input and output ports; every edge is an unbuffered rendezvous, so a block
//! steps exactly once per value it receives on each input. Feedback loops are
//! broken with initial conditions, and a system can itself be nested as a
//! block inside another system.
//!
//! ```no_run
//! use block_flow::categories::{Constant, Print, Scale, Stop};
//! use block_flow::{SimConfig, System};
//!
//! let mut system = System::new(SimConfig::with_dt(0.1));
//! let src = system.add(Constant(1.0))?;
//! let gain = system.add(Scale(2.0))?;
//! let stop = system.add(Stop::new(1.0))?;
//! let out = system.add(Print::stdout())?;
//! system.connect_blocks(src, gain, 0, 0)?;
//! system.connect_blocks(gain, stop, 0, 0)?;
//! system.connect_blocks(stop, out, 0, 0)?;
//!
//! let report = system.run()?;
//! assert_eq!(report.halted_by(), Some(stop));
//! # Ok::<(), block_flow::SystemError>(())
//! ```

pub mod core;
pub mod categories;
pub mod runtime;
mod tests;

// Re-export commonly used types
pub use core::{Block, PortRef, SimConfig, StepContext, StepOutcome, SystemError, SystemId};
pub use categories::BlockCategory;
pub use runtime::{HaltCause, RunReport, System, SystemState};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
