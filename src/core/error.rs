//! Error types
//!
//! Configuration problems are reported synchronously, before any worker is
//! spawned. Data values themselves never produce errors: NaN and infinities
//! travel through the graph like any other number.

use std::path::PathBuf;

use super::port::{Direction, PortRef};

/// Errors raised while building, validating, or driving a [`System`].
///
/// [`System`]: crate::runtime::System
#[derive(Debug, thiserror::Error)]
pub enum SystemError {
    /// A registered block has a port without an edge.
    #[error("block {block} {direction} {port} is not connected")]
    UnboundPort {
        block: usize,
        direction: Direction,
        port: usize,
    },

    /// One of the container's own boundary ports has no edge.
    #[error("boundary {direction} {port} is not connected")]
    UnboundBoundary { direction: Direction, port: usize },

    /// A block index that was never registered.
    #[error("no block with index {0}")]
    NoSuchBlock(usize),

    /// A port index beyond the block's arity.
    #[error("block {block} has no {direction} port {port}")]
    NoSuchPort {
        block: usize,
        direction: Direction,
        port: usize,
    },

    /// A boundary port index beyond the container's boundary arity.
    #[error("boundary has no {direction} port {port}")]
    NoSuchBoundaryPort { direction: Direction, port: usize },

    /// The port already carries an edge.
    #[error("{port} ({direction}) is already connected")]
    PortAlreadyConnected { port: PortRef, direction: Direction },

    /// A boundary input wired straight to a boundary output.
    #[error("boundary input {input} cannot feed boundary output {output} directly")]
    BoundaryPassThrough { input: usize, output: usize },

    /// A registered block rejected its own configuration.
    #[error("block {block} is misconfigured: {source}")]
    InvalidBlock {
        block: usize,
        #[source]
        source: Box<SystemError>,
    },

    /// A block parameter outside its accepted range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// A directed cycle with no initial condition on any of its edges.
    #[error("cycle without initial condition through blocks {0:?}")]
    UnseededCycle(Vec<usize>),

    /// The operation is not allowed in the container's current state.
    #[error("cannot {operation} while the system is {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },

    /// The OS refused to spawn a worker thread.
    #[error("failed to spawn worker for block {block}: {source}")]
    Spawn {
        block: usize,
        #[source]
        source: std::io::Error,
    },

    /// A worker thread panicked inside its block.
    #[error("worker for block {0} panicked")]
    WorkerPanicked(usize),

    /// Invalid simulation configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Errors in [`SimConfig`](super::config::SimConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid step size {0}: must be finite and positive")]
    InvalidStepSize(f64),

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("failed to read configuration {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised by blocks outside of `step`, e.g. when flushing output.
#[derive(Debug, thiserror::Error)]
pub enum BlockError {
    /// IO failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image encoding failed
    #[error("image encoding failed: {0}")]
    Image(#[from] image::ImageError),
}
