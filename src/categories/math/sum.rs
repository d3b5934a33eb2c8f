//! Summation block

use crate::categories::BlockCategory;
use crate::core::block::{Block, StepContext, StepOutcome};

/// Adds all of its inputs into a single output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sum {
    inputs: usize,
}

impl Sum {
    pub fn new(inputs: usize) -> Self {
        Self { inputs }
    }
}

impl Default for Sum {
    /// Two-input adder
    fn default() -> Self {
        Self::new(2)
    }
}

impl Block for Sum {
    fn inputs(&self) -> usize {
        self.inputs
    }

    fn outputs(&self) -> usize {
        1
    }

    fn step(&mut self, _ctx: &StepContext, inputs: &[f64], outputs: &mut [f64]) -> StepOutcome {
        outputs[0] = inputs.iter().sum();
        StepOutcome::Continue
    }

    fn category(&self) -> BlockCategory {
        BlockCategory::Math
    }
}
