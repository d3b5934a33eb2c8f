//! Constant source

use crate::categories::BlockCategory;
use crate::core::block::{Block, StepContext, StepOutcome};

/// Emits the same value on every step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Constant(pub f64);

impl Default for Constant {
    fn default() -> Self {
        Constant(0.0)
    }
}

impl Block for Constant {
    fn inputs(&self) -> usize {
        0
    }

    fn outputs(&self) -> usize {
        1
    }

    fn step(&mut self, _ctx: &StepContext, _inputs: &[f64], outputs: &mut [f64]) -> StepOutcome {
        outputs[0] = self.0;
        StepOutcome::Continue
    }

    fn category(&self) -> BlockCategory {
        BlockCategory::Source
    }
}
