//! Tee block

use crate::categories::BlockCategory;
use crate::core::block::{Block, StepContext, StepOutcome};

/// Copies its single input to each of its outputs.
///
/// An edge has exactly one reader, so a value needed by several blocks goes
/// through a tee.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tee {
    outputs: usize,
}

impl Tee {
    pub fn new(outputs: usize) -> Self {
        Self { outputs }
    }
}

impl Default for Tee {
    fn default() -> Self {
        Self::new(2)
    }
}

impl Block for Tee {
    fn inputs(&self) -> usize {
        1
    }

    fn outputs(&self) -> usize {
        self.outputs
    }

    fn step(&mut self, _ctx: &StepContext, inputs: &[f64], outputs: &mut [f64]) -> StepOutcome {
        outputs.fill(inputs[0]);
        StepOutcome::Continue
    }

    fn category(&self) -> BlockCategory {
        BlockCategory::Routing
    }
}
