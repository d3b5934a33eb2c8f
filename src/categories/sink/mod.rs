//! Sink blocks
//!
//! Sinks have no outputs. Their results leave the graph through side effects
//! ([`Print`]) or through a handle shared with the caller ([`Recorder`],
//! [`Plot`]), which should be read once the run has halted.

pub mod plot;
pub mod print;
pub mod recorder;

pub use plot::{Plot, PlotHandle};
pub use print::Print;
pub use recorder::{Recorder, RecorderHandle};
