//! Worker loop
//!
//! One worker drives one block: receive a value from every input edge in
//! port order, step the block, send a value to every output edge in port
//! order, repeat. Blocking sends are what give the graph its flow control;
//! a fast producer simply waits for its slowest reader.
//!
//! A worker hosting a nested system does not loop. It hands its edges to the
//! interior and waits for the interior run to end.

use std::collections::VecDeque;
use std::mem;

use crossbeam_channel::{Receiver, Sender};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::categories::BlockCategory;
use crate::core::block::{Block, StepContext};

use super::engine::Splice;
use super::halt::{CancelToken, HaltNotice, HaltSender};

/// Why a worker stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkerExit {
    /// Its block returned `Halt`
    Halted,
    /// The engine broadcast cancellation
    Cancelled,
    /// A neighbouring worker went away and closed a shared edge
    Disconnected,
}

/// Everything a worker owns for the lifetime of the run.
pub(crate) struct Worker {
    pub index: usize,
    pub block: Box<dyn Block>,
    pub inputs: Vec<Receiver<f64>>,
    pub outputs: Vec<Sender<f64>>,
    /// Initial conditions, read from the matching input before its edge.
    pub seeds: Vec<VecDeque<f64>>,
    pub halt: HaltSender,
    pub cancel: CancelToken,
    pub dt: f64,
}

/// Returned through the worker's join handle.
pub(crate) struct WorkerReport {
    pub index: usize,
    pub block: Box<dyn Block>,
    pub steps: u64,
    pub exit: WorkerExit,
}

impl Worker {
    pub fn run(mut self) -> WorkerReport {
        let mut steps = 0;
        let exit = match self.block.as_system() {
            Some(system) => {
                let splice = Splice {
                    inputs: mem::take(&mut self.inputs),
                    outputs: mem::take(&mut self.outputs),
                    seeds: mem::take(&mut self.seeds),
                };
                let (exit, interior_steps) = system.run_embedded(splice, &self.cancel);
                steps = interior_steps;
                if exit == WorkerExit::Halted {
                    self.halt.notify(HaltNotice { block: self.index }, &self.cancel);
                }
                exit
            }
            None => self.cycle(&mut steps),
        };
        self.block.on_stop();
        debug!(block = self.index, steps, exit = ?exit, "worker exited");

        WorkerReport {
            index: self.index,
            block: self.block,
            steps,
            exit,
        }
    }

    fn cycle(&mut self, steps: &mut u64) -> WorkerExit {
        let mut x = vec![0.0; self.inputs.len()];
        let mut y = vec![0.0; self.outputs.len()];
        let mut ctx = StepContext::new(self.dt);

        loop {
            if self.cancel.is_cancelled() {
                return WorkerExit::Cancelled;
            }

            for (slot, edge) in self.inputs.iter().enumerate() {
                if let Some(value) = self.seeds[slot].pop_front() {
                    x[slot] = value;
                    continue;
                }
                match self.cancel.recv(edge) {
                    Ok(value) => x[slot] = value,
                    Err(exit) => return exit,
                }
            }

            y.fill(0.0);
            let outcome = self.block.step(&ctx, &x, &mut y);
            ctx.tick += 1;
            *steps += 1;
            trace!(block = self.index, tick = ctx.tick, ?x, ?y, "step");

            if outcome.is_halt() {
                self.halt.notify(HaltNotice { block: self.index }, &self.cancel);
                return WorkerExit::Halted;
            }

            for (edge, &value) in self.outputs.iter().zip(y.iter()) {
                if let Err(exit) = self.cancel.send(edge, value) {
                    return exit;
                }
            }
        }
    }
}

/// Name and category captured at registration, for reports.
#[derive(Debug, Clone)]
pub(crate) struct BlockLabel {
    pub name: String,
    pub category: BlockCategory,
}

impl BlockLabel {
    pub fn of(block: &dyn Block) -> Self {
        Self {
            name: block.name().to_string(),
            category: block.category(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::block::StepOutcome;
    use crate::runtime::fabric;
    use crate::runtime::halt::{halt_channel, Cancellation};
    use std::thread;

    struct Negate;

    impl Block for Negate {
        fn inputs(&self) -> usize {
            1
        }

        fn outputs(&self) -> usize {
            1
        }

        fn step(&mut self, _ctx: &StepContext, inputs: &[f64], outputs: &mut [f64]) -> StepOutcome {
            outputs[0] = -inputs[0];
            StepOutcome::Continue
        }
    }

    /// Halts on its third step.
    struct HaltOnThird;

    impl Block for HaltOnThird {
        fn inputs(&self) -> usize {
            0
        }

        fn outputs(&self) -> usize {
            1
        }

        fn step(&mut self, ctx: &StepContext, _inputs: &[f64], outputs: &mut [f64]) -> StepOutcome {
            outputs[0] = ctx.tick as f64;
            StepOutcome::from(ctx.tick < 2)
        }
    }

    #[test]
    fn test_worker_transforms_and_exits_on_closed_input() {
        let cancellation = Cancellation::new();
        let (halt, _halt_rx) = halt_channel();
        let (in_tx, in_rx) = fabric::edge();
        let (out_tx, out_rx) = fabric::edge();

        let worker = Worker {
            index: 0,
            block: Box::new(Negate),
            inputs: vec![in_rx],
            outputs: vec![out_tx],
            seeds: vec![VecDeque::new()],
            halt,
            cancel: cancellation.token(),
            dt: 0.1,
        };
        let handle = thread::spawn(move || worker.run());

        for v in [1.0, -2.0, 3.5] {
            in_tx.send(v).unwrap();
            assert_eq!(out_rx.recv().unwrap(), -v);
        }
        drop(in_tx);

        let report = handle.join().unwrap();
        assert_eq!(report.steps, 3);
        assert_eq!(report.exit, WorkerExit::Disconnected);
    }

    #[test]
    fn test_worker_halt_skips_outputs_and_notifies() {
        let cancellation = Cancellation::new();
        let (halt, halt_rx) = halt_channel();
        let (out_tx, out_rx) = fabric::edge();

        let worker = Worker {
            index: 4,
            block: Box::new(HaltOnThird),
            inputs: vec![],
            outputs: vec![out_tx],
            seeds: vec![],
            halt,
            cancel: cancellation.token(),
            dt: 0.1,
        };
        let handle = thread::spawn(move || worker.run());

        assert_eq!(out_rx.recv().unwrap(), 0.0);
        assert_eq!(out_rx.recv().unwrap(), 1.0);
        assert_eq!(halt_rx.recv().unwrap(), HaltNotice { block: 4 });

        let report = handle.join().unwrap();
        assert_eq!(report.steps, 3);
        assert_eq!(report.exit, WorkerExit::Halted);
        // The halting cycle wrote nothing.
        assert!(out_rx.try_recv().is_err());
    }

    #[test]
    fn test_worker_reads_seeds_before_its_edge() {
        let mut cancellation = Cancellation::new();
        let (halt, _halt_rx) = halt_channel();
        let (in_tx, in_rx) = fabric::edge();
        let (out_tx, out_rx) = fabric::edge();

        let worker = Worker {
            index: 0,
            block: Box::new(Negate),
            inputs: vec![in_rx],
            outputs: vec![out_tx],
            seeds: vec![VecDeque::from([4.0, 5.0])],
            halt,
            cancel: cancellation.token(),
            dt: 0.1,
        };
        let handle = thread::spawn(move || worker.run());

        assert_eq!(out_rx.recv().unwrap(), -4.0);
        assert_eq!(out_rx.recv().unwrap(), -5.0);
        in_tx.send(6.0).unwrap();
        assert_eq!(out_rx.recv().unwrap(), -6.0);

        cancellation.cancel();
        let report = handle.join().unwrap();
        assert_eq!(report.steps, 3);
        assert_eq!(report.exit, WorkerExit::Cancelled);
    }

    #[test]
    fn test_label_captures_name() {
        let label = BlockLabel::of(&Negate);
        assert_eq!(label.name, "Negate");
        assert_eq!(label.category, BlockCategory::Custom);
    }
}
