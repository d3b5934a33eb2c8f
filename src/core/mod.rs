//! Core block abstractions and types
//!
//! This module defines the block contract, port naming, configuration, and
//! error types that the runtime and the block categories build on.

pub mod block;
pub mod config;
pub mod error;
pub mod port;

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub use block::{Block, StepContext, StepOutcome};
pub use config::SimConfig;
pub use error::{BlockError, ConfigError, SystemError};
pub use port::{Connection, Direction, InitialCondition, PortRef};

/// Unique identifier for a container, used to tell runs apart in logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SystemId(pub Uuid);

impl SystemId {
    /// Generate a new random system ID
    pub fn new() -> Self {
        SystemId(Uuid::new_v4())
    }
}

impl Default for SystemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
