//! Scale block

use crate::categories::BlockCategory;
use crate::core::block::{Block, StepContext, StepOutcome};

/// Multiplies its input by a constant gain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scale(pub f64);

impl Block for Scale {
    fn inputs(&self) -> usize {
        1
    }

    fn outputs(&self) -> usize {
        1
    }

    fn step(&mut self, _ctx: &StepContext, inputs: &[f64], outputs: &mut [f64]) -> StepOutcome {
        outputs[0] = self.0 * inputs[0];
        StepOutcome::Continue
    }

    fn category(&self) -> BlockCategory {
        BlockCategory::Math
    }
}
