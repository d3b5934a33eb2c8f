//! Block categories and the standard block library
//!
//! Every block reports a [`BlockCategory`] so run reports can group blocks by
//! role. The submodules hold the blocks shipped with the crate; applications
//! are free to define their own by implementing [`Block`](crate::core::Block).

pub mod control;
pub mod math;
pub mod routing;
pub mod sink;
pub mod source;

use serde::{Deserialize, Serialize};

pub use control::Stop;
pub use math::{Integrate, Scale, Sum};
pub use routing::Tee;
pub use sink::{Plot, PlotHandle, Print, Recorder, RecorderHandle};
pub use source::Constant;

/// Block category enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockCategory {
    /// Blocks with no inputs that produce values (e.g. Constant)
    Source,
    /// Arithmetic and stateful numeric blocks (e.g. Scale, Integrate)
    Math,
    /// Blocks that rearrange values between ports (e.g. Tee)
    Routing,
    /// Terminal blocks with no outputs (e.g. Print, Plot)
    Sink,
    /// Blocks that steer the run itself (e.g. Stop)
    Control,
    /// A nested system used as a block
    Subsystem,
    /// User-defined blocks
    Custom,
}

impl BlockCategory {
    /// Get a human-readable name for the category
    pub fn display_name(&self) -> &'static str {
        match self {
            BlockCategory::Source => "Source",
            BlockCategory::Math => "Math",
            BlockCategory::Routing => "Routing",
            BlockCategory::Sink => "Sink",
            BlockCategory::Control => "Control",
            BlockCategory::Subsystem => "Subsystem",
            BlockCategory::Custom => "Custom",
        }
    }
}

impl std::fmt::Display for BlockCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}
