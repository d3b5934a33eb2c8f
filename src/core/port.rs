//! Port naming and connection records
//!
//! Ports are not runtime objects. A port is just a name, a block index plus a
//! port index, or a slot on the container's own boundary. The records in this
//! module describe the topology; the channels that carry values are created
//! only when the container starts.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which side of a block a port sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Input port
    Input,
    /// Output port
    Output,
}

impl Direction {
    /// Get a human-readable name for the direction
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Input => "input",
            Direction::Output => "output",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One end of a connection.
///
/// `Boundary` refers to the enclosing container's own ports. Used as the
/// source of a connection it is a boundary input (a value arriving from the
/// parent); used as the destination it is a boundary output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortRef {
    /// A port on a registered block
    Block { block: usize, port: usize },
    /// A port on the container boundary
    Boundary(usize),
}

impl PortRef {
    /// Port `port` of the block registered at `block`.
    pub fn block(block: usize, port: usize) -> Self {
        PortRef::Block { block, port }
    }

    /// Boundary port `port` of the container.
    pub fn boundary(port: usize) -> Self {
        PortRef::Boundary(port)
    }

    /// The block index, if this is not a boundary port.
    pub fn block_index(&self) -> Option<usize> {
        match self {
            PortRef::Block { block, .. } => Some(*block),
            PortRef::Boundary(_) => None,
        }
    }

    pub fn port(&self) -> usize {
        match self {
            PortRef::Block { port, .. } => *port,
            PortRef::Boundary(port) => *port,
        }
    }
}

impl fmt::Display for PortRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortRef::Block { block, port } => write!(f, "block {} port {}", block, port),
            PortRef::Boundary(port) => write!(f, "boundary port {}", port),
        }
    }
}

/// A directed edge from an output port to an input port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    /// Producing side
    pub from: PortRef,
    /// Consuming side
    pub to: PortRef,
}

impl Connection {
    /// Create a new connection
    pub fn new(from: PortRef, to: PortRef) -> Self {
        Self { from, to }
    }
}

/// A value delivered once onto an input edge before steady-state execution.
///
/// Every directed cycle needs at least one of these, otherwise all blocks in
/// the cycle wait on each other forever.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InitialCondition {
    pub value: f64,
    pub block: usize,
    pub input: usize,
}
