//! Stop block
//!
//! Passes its input through unchanged and requests a halt once simulated time
//! reaches the configured end. Registered callbacks run on the stop block's
//! own worker, in registration order, right before the halt is requested.

use std::fmt;

use tracing::{error, info};

use crate::categories::BlockCategory;
use crate::core::block::{Block, StepContext, StepOutcome};
use crate::core::error::SystemError;

/// Relative slack, in units of `f64::EPSILON`, when dividing the end time by
/// the step size, so that `0.05 / 0.01` counts as five steps rather than six.
const STEP_TOLERANCE_ULPS: f64 = 4.0;

/// Work to run when the stop block fires.
pub type StopCallback = Box<dyn FnOnce() -> anyhow::Result<()> + Send>;

/// Pass-through that halts the run once its end time is reached.
pub struct Stop {
    time: f64,
    callbacks: Vec<StopCallback>,
    steps: u64,
}

impl Stop {
    /// Halt after `time` units of simulated time.
    pub fn new(time: f64) -> Self {
        Self {
            time,
            callbacks: Vec::new(),
            steps: 0,
        }
    }

    /// Register a callback, builder style.
    pub fn with_callback<F>(mut self, callback: F) -> Self
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        self.on_halt(callback);
        self
    }

    pub fn on_halt<F>(&mut self, callback: F)
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        self.callbacks.push(Box::new(callback));
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    /// Number of steps before the halt: `ceil(time / dt)`, at least one.
    pub fn step_limit(time: f64, dt: f64) -> u64 {
        let ratio = time / dt;
        let steps = (ratio - ratio.abs() * STEP_TOLERANCE_ULPS * f64::EPSILON).ceil();
        if steps < 1.0 {
            1
        } else {
            steps as u64
        }
    }

    fn fire(&mut self) {
        info!(steps = self.steps, callbacks = self.callbacks.len(), "stop time reached");
        for (index, callback) in self.callbacks.drain(..).enumerate() {
            if let Err(err) = callback() {
                error!(callback = index, error = %err, "stop callback failed");
            }
        }
    }
}

impl fmt::Debug for Stop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stop")
            .field("time", &self.time)
            .field("callbacks", &self.callbacks.len())
            .field("steps", &self.steps)
            .finish()
    }
}

impl Block for Stop {
    fn inputs(&self) -> usize {
        1
    }

    fn outputs(&self) -> usize {
        1
    }

    fn step(&mut self, ctx: &StepContext, inputs: &[f64], outputs: &mut [f64]) -> StepOutcome {
        outputs[0] = inputs[0];
        self.steps += 1;

        if self.steps >= Self::step_limit(self.time, ctx.dt) {
            self.fire();
            return StepOutcome::Halt;
        }
        StepOutcome::Continue
    }

    fn category(&self) -> BlockCategory {
        BlockCategory::Control
    }

    fn validate(&self) -> Result<(), SystemError> {
        if !(self.time.is_finite() && self.time >= 0.0) {
            return Err(SystemError::InvalidParameter(format!(
                "stop time must be finite and non-negative, got {}",
                self.time
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use parking_lot::Mutex;

    /// Step until halt and return the number of steps taken.
    fn run_until_halt(stop: &mut Stop, dt: f64) -> u64 {
        let mut ctx = StepContext::new(dt);
        let mut out = [0.0];
        loop {
            let outcome = stop.step(&ctx, &[ctx.tick as f64], &mut out);
            ctx.tick += 1;
            if outcome.is_halt() {
                return ctx.tick;
            }
            assert_eq!(out[0], (ctx.tick - 1) as f64);
        }
    }

    #[test]
    fn test_step_limit() {
        assert_eq!(Stop::step_limit(0.05, 0.01), 5);
        assert_eq!(Stop::step_limit(3.0, 0.01), 300);
        assert_eq!(Stop::step_limit(0.055, 0.01), 6);
        assert_eq!(Stop::step_limit(0.0, 0.01), 1);
        assert_eq!(Stop::step_limit(0.001, 0.01), 1);
    }

    #[test]
    fn test_step_limit_for_long_runs() {
        assert_eq!(Stop::step_limit(1_000_000_000.5, 1.0), 1_000_000_001);
        assert_eq!(Stop::step_limit(1e9, 1.0), 1_000_000_000);
        assert_eq!(Stop::step_limit(100_000_000.25, 0.5), 200_000_001);
    }

    #[test]
    fn test_halts_after_limit() {
        let mut stop = Stop::new(0.05);
        assert_eq!(run_until_halt(&mut stop, 0.01), 5);
    }

    #[test]
    fn test_callbacks_run_once_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let (a, b) = (Arc::clone(&log), Arc::clone(&log));
        let mut stop = Stop::new(0.02)
            .with_callback(move || {
                a.lock().push("first");
                Ok(())
            })
            .with_callback(move || {
                b.lock().push("second");
                Ok(())
            });

        run_until_halt(&mut stop, 0.01);
        assert_eq!(*log.lock(), vec!["first", "second"]);

        // Stepping again must not re-run anything.
        stop.step(&StepContext::new(0.01), &[0.0], &mut [0.0]);
        assert_eq!(log.lock().len(), 2);
    }

    #[test]
    fn test_failing_callback_does_not_block_the_rest() {
        let ran = Arc::new(Mutex::new(false));
        let flag = Arc::clone(&ran);
        let mut stop = Stop::new(0.0)
            .with_callback(|| anyhow::bail!("disk full"))
            .with_callback(move || {
                *flag.lock() = true;
                Ok(())
            });

        assert_eq!(run_until_halt(&mut stop, 0.1), 1);
        assert!(*ran.lock());
    }

    #[test]
    fn test_validate_time() {
        assert!(Stop::new(1.0).validate().is_ok());
        assert!(Stop::new(-1.0).validate().is_err());
        assert!(Stop::new(f64::NAN).validate().is_err());
    }
}
