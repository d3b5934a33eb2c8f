//! Explicit Euler integrator
//!
//! Each step adds `input · dt` to the running state and emits the new state,
//! so after `n` steps with a constant input `c` the output is `x0 + n·c·dt`.

use crate::categories::BlockCategory;
use crate::core::block::{Block, StepContext, StepOutcome};

/// Running integral of its input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Integrate {
    state: f64,
}

impl Integrate {
    /// Integrator starting from `x0`.
    pub fn new(x0: f64) -> Self {
        Self { state: x0 }
    }

    /// Current value of the integral.
    pub fn state(&self) -> f64 {
        self.state
    }
}

impl Default for Integrate {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl Block for Integrate {
    fn inputs(&self) -> usize {
        1
    }

    fn outputs(&self) -> usize {
        1
    }

    fn step(&mut self, ctx: &StepContext, inputs: &[f64], outputs: &mut [f64]) -> StepOutcome {
        self.state += inputs[0] * ctx.dt;
        outputs[0] = self.state;
        StepOutcome::Continue
    }

    fn category(&self) -> BlockCategory {
        BlockCategory::Math
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integrates_constant_input() {
        let mut integ = Integrate::new(1.0);
        let mut out = [0.0];
        let mut ctx = StepContext::new(0.5);
        for _ in 0..4 {
            integ.step(&ctx, &[2.0], &mut out);
            ctx.tick += 1;
        }
        assert!((out[0] - 5.0).abs() < 1e-12);
        assert_eq!(integ.state(), out[0]);
    }

    #[test]
    fn test_zero_input_holds_state() {
        let mut integ = Integrate::new(-3.0);
        let mut out = [0.0];
        integ.step(&StepContext::new(0.01), &[0.0], &mut out);
        assert_eq!(out[0], -3.0);
    }
}
