//! Block trait and related types
//!
//! A block is a unit of computation with a fixed number of numeric inputs and
//! outputs. The engine drives each block from its own worker: it gathers one
//! value per input, calls [`Block::step`], and forwards one value per output.

use crate::categories::BlockCategory;
use crate::runtime::System;

use super::error::SystemError;

/// Core block trait that all blocks must implement
///
/// Arity is queried once, when the block is registered, and must not change
/// afterwards. State lives inside the block and is only touched by the worker
/// that owns it.
pub trait Block: Send {
    /// Number of input ports
    fn inputs(&self) -> usize;

    /// Number of output ports
    fn outputs(&self) -> usize;

    /// Compute one cycle.
    ///
    /// `inputs` holds exactly one fresh value per input port; `outputs` is a
    /// zeroed buffer with one slot per output port. Returning
    /// [`StepOutcome::Halt`] requests termination of the whole run, and the
    /// outputs of that cycle are discarded.
    fn step(&mut self, ctx: &StepContext, inputs: &[f64], outputs: &mut [f64]) -> StepOutcome;

    /// Short name used in logs and run reports
    fn name(&self) -> &str {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full)
    }

    /// Category for reports
    fn category(&self) -> BlockCategory {
        BlockCategory::Custom
    }

    /// Validate the block's own configuration before the run starts
    fn validate(&self) -> Result<(), SystemError> {
        Ok(())
    }

    /// Lifecycle hook: called once when the worker driving this block exits,
    /// whatever the reason
    fn on_stop(&mut self) {}

    /// A nested [`System`] returns itself here, and its worker then runs the
    /// interior on the worker's own edges instead of calling `step`.
    fn as_system(&mut self) -> Option<&mut System> {
        None
    }
}

/// Per-cycle information handed to [`Block::step`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepContext {
    /// Configured step size of the owning container
    pub dt: f64,
    /// Zero-based index of the current cycle for this block
    pub tick: u64,
}

impl StepContext {
    pub fn new(dt: f64) -> Self {
        Self { dt, tick: 0 }
    }

    /// Simulated time at the start of this cycle.
    pub fn time(&self) -> f64 {
        self.tick as f64 * self.dt
    }
}

/// What a block wants the engine to do after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Forward the outputs and keep going
    Continue,
    /// Stop the whole run
    Halt,
}

impl StepOutcome {
    pub fn is_halt(&self) -> bool {
        matches!(self, StepOutcome::Halt)
    }
}

impl From<bool> for StepOutcome {
    /// `true` means "continue".
    fn from(keep_going: bool) -> Self {
        if keep_going {
            StepOutcome::Continue
        } else {
            StepOutcome::Halt
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Doubler;

    impl Block for Doubler {
        fn inputs(&self) -> usize {
            1
        }

        fn outputs(&self) -> usize {
            1
        }

        fn step(&mut self, _ctx: &StepContext, inputs: &[f64], outputs: &mut [f64]) -> StepOutcome {
            outputs[0] = 2.0 * inputs[0];
            StepOutcome::Continue
        }
    }

    #[test]
    fn test_default_name_strips_module_path() {
        assert_eq!(Doubler.name(), "Doubler");
    }

    #[test]
    fn test_default_category_and_validation() {
        assert_eq!(Doubler.category(), BlockCategory::Custom);
        assert!(Doubler.validate().is_ok());
        assert!(Doubler.as_system().is_none());
    }

    #[test]
    fn test_step_context_time() {
        let ctx = StepContext { dt: 0.5, tick: 4 };
        assert_eq!(ctx.time(), 2.0);
        assert_eq!(StepContext::new(0.1).tick, 0);
    }

    #[test]
    fn test_outcome_from_bool() {
        assert_eq!(StepOutcome::from(true), StepOutcome::Continue);
        assert!(StepOutcome::from(false).is_halt());
    }
}
