//! Control blocks
//!
//! Blocks that end the run rather than compute values.

pub mod stop;

pub use stop::{Stop, StopCallback};
