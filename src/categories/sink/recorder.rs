//! Recording sink
//!
//! Stores every step's inputs in memory. The [`RecorderHandle`] stays with the
//! caller while the block itself moves into its worker.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::categories::BlockCategory;
use crate::core::block::{Block, StepContext, StepOutcome};

/// Sink that keeps every row of inputs it receives.
pub struct Recorder {
    channels: usize,
    rows: Arc<Mutex<Vec<Vec<f64>>>>,
}

impl Recorder {
    /// Recorder with `channels` inputs.
    pub fn new(channels: usize) -> Self {
        Self {
            channels,
            rows: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Handle for reading the recorded values.
    pub fn handle(&self) -> RecorderHandle {
        RecorderHandle {
            rows: Arc::clone(&self.rows),
        }
    }
}

impl Block for Recorder {
    fn inputs(&self) -> usize {
        self.channels
    }

    fn outputs(&self) -> usize {
        0
    }

    fn step(&mut self, _ctx: &StepContext, inputs: &[f64], _outputs: &mut [f64]) -> StepOutcome {
        self.rows.lock().push(inputs.to_vec());
        StepOutcome::Continue
    }

    fn category(&self) -> BlockCategory {
        BlockCategory::Sink
    }
}

/// Shared view of a [`Recorder`]'s data.
#[derive(Debug, Clone)]
pub struct RecorderHandle {
    rows: Arc<Mutex<Vec<Vec<f64>>>>,
}

impl RecorderHandle {
    /// Number of steps recorded so far.
    pub fn len(&self) -> usize {
        self.rows.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.lock().is_empty()
    }

    /// Copy of every recorded step, one row per step.
    pub fn rows(&self) -> Vec<Vec<f64>> {
        self.rows.lock().clone()
    }

    /// Values seen on one input, in step order.
    pub fn channel(&self, index: usize) -> Vec<f64> {
        self.rows
            .lock()
            .iter()
            .filter_map(|row| row.get(index).copied())
            .collect()
    }

    pub fn last(&self) -> Option<Vec<f64>> {
        self.rows.lock().last().cloned()
    }
}
