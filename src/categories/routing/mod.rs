//! Routing blocks

pub mod tee;

pub use tee::Tee;
