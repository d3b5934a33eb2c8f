//! Execution engine
//!
//! Turns a validated topology into a running network: one channel per edge,
//! one named OS thread per block, initial conditions preloaded into the
//! workers that read them, then a single wait for the first halt. Shutdown
//! broadcasts cancellation and joins every worker, so no thread outlives the
//! run.
//!
//! A nested system is not stepped by its worker. The worker hands its own
//! edges to the interior instead (see [`Splice`]), so interior blocks read
//! and write the parent's edges directly and nesting adds no coupling
//! between the boundary ports.

use std::collections::{HashMap, VecDeque};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender};
use serde::{Deserialize, Serialize};
use tracing::{debug, info_span};

use crate::categories::BlockCategory;
use crate::core::block::Block;
use crate::core::config::SimConfig;
use crate::core::error::SystemError;
use crate::core::port::{Connection, Direction, InitialCondition, PortRef};
use crate::core::SystemId;

use super::fabric::{self, Interrupted};
use super::halt::{halt_channel, CancelToken, Cancellation, HaltCause, HaltNotice};
use super::worker::{BlockLabel, Worker, WorkerExit, WorkerReport};

// ── Result types ────────────────────────────────────────────────────────────

/// Per-block figures collected from a finished run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockMetrics {
    pub index: usize,
    pub name: String,
    pub category: BlockCategory,
    /// Number of times `step` was called.
    pub steps: u64,
    /// `None` if the worker panicked.
    pub exit: Option<WorkerExit>,
}

/// Final result of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub system: SystemId,
    pub cause: HaltCause,
    /// Wall-clock time from start to the last worker joining, in milliseconds.
    pub duration_ms: f64,
    pub blocks: Vec<BlockMetrics>,
}

impl RunReport {
    /// Index of the block that requested the halt.
    pub fn halted_by(&self) -> Option<usize> {
        match self.cause {
            HaltCause::Halted { block } => Some(block),
            HaltCause::Drained | HaltCause::Cancelled => None,
        }
    }

    /// Step count of one block.
    pub fn steps(&self, index: usize) -> Option<u64> {
        self.blocks.get(index).map(|b| b.steps)
    }

    pub(crate) fn build(
        system: SystemId,
        cause: HaltCause,
        duration_ms: f64,
        labels: &[BlockLabel],
        reports: &[WorkerReport],
    ) -> Self {
        let by_index: HashMap<usize, &WorkerReport> = reports.iter().map(|r| (r.index, r)).collect();
        let blocks = labels
            .iter()
            .enumerate()
            .map(|(index, label)| {
                let report = by_index.get(&index);
                BlockMetrics {
                    index,
                    name: label.name.clone(),
                    category: label.category,
                    steps: report.map_or(0, |r| r.steps),
                    exit: report.map(|r| r.exit),
                }
            })
            .collect();

        Self {
            system,
            cause,
            duration_ms,
            blocks,
        }
    }
}

// ── Wiring ──────────────────────────────────────────────────────────────────

/// Channel endpoints for every port, built from the connection list.
pub(crate) struct Wiring {
    inputs: Vec<Vec<Receiver<f64>>>,
    outputs: Vec<Vec<Sender<f64>>>,
    /// Values each block reads from an input before touching its edge.
    seeds: Vec<Vec<VecDeque<f64>>>,
    boundary_inputs: Vec<Sender<f64>>,
    boundary_outputs: Vec<Receiver<f64>>,
}

/// Edges of the worker hosting a nested system, taken over by the interior.
///
/// Boundary input `k` becomes the parent's input edge `k` and boundary
/// output `k` the parent's output edge `k`, so no relay sits between the
/// two graphs.
#[derive(Default)]
pub(crate) struct Splice {
    pub inputs: Vec<Receiver<f64>>,
    pub outputs: Vec<Sender<f64>>,
    /// Initial conditions the parent placed on its inputs.
    pub seeds: Vec<VecDeque<f64>>,
}

impl Wiring {
    /// `arities` holds (inputs, outputs) per block in registration order.
    pub fn build(
        arities: &[(usize, usize)],
        boundary: (usize, usize),
        connections: &[Connection],
        initial_conditions: &[InitialCondition],
        splice: Option<Splice>,
    ) -> Result<Self, SystemError> {
        let mut inputs: Vec<Vec<Option<Receiver<f64>>>> =
            arities.iter().map(|&(n, _)| vec![None; n]).collect();
        let mut outputs: Vec<Vec<Option<Sender<f64>>>> =
            arities.iter().map(|&(_, n)| vec![None; n]).collect();
        let mut seeds: Vec<Vec<VecDeque<f64>>> =
            arities.iter().map(|&(n, _)| vec![VecDeque::new(); n]).collect();
        let mut boundary_inputs: Vec<Option<Sender<f64>>> = vec![None; boundary.0];
        let mut boundary_outputs: Vec<Option<Receiver<f64>>> = vec![None; boundary.1];

        let spliced = splice.is_some();
        let Splice {
            inputs: parent_inputs,
            outputs: parent_outputs,
            seeds: mut parent_seeds,
        } = splice.unwrap_or_default();
        let mut parent_inputs: Vec<Option<Receiver<f64>>> = parent_inputs.into_iter().map(Some).collect();
        let mut parent_outputs: Vec<Option<Sender<f64>>> = parent_outputs.into_iter().map(Some).collect();

        for conn in connections {
            match (conn.from, conn.to) {
                (PortRef::Boundary(outer), PortRef::Block { block, port }) if spliced => {
                    inputs[block][port] = parent_inputs.get_mut(outer).and_then(Option::take);
                    if let Some(values) = parent_seeds.get_mut(outer) {
                        seeds[block][port].extend(values.drain(..));
                    }
                }
                (PortRef::Block { block, port }, PortRef::Boundary(outer)) if spliced => {
                    outputs[block][port] = parent_outputs.get_mut(outer).and_then(Option::take);
                }
                (from, to) => {
                    let (tx, rx) = fabric::edge();
                    match to {
                        PortRef::Block { block, port } => inputs[block][port] = Some(rx),
                        PortRef::Boundary(port) => boundary_outputs[port] = Some(rx),
                    }
                    match from {
                        PortRef::Block { block, port } => outputs[block][port] = Some(tx),
                        PortRef::Boundary(port) => boundary_inputs[port] = Some(tx),
                    }
                }
            }
        }

        for ic in initial_conditions {
            let connected = inputs
                .get(ic.block)
                .and_then(|ports| ports.get(ic.input))
                .is_some_and(|slot| slot.is_some());
            if !connected {
                return Err(SystemError::UnboundPort {
                    block: ic.block,
                    direction: Direction::Input,
                    port: ic.input,
                });
            }
            seeds[ic.block][ic.input].push_back(ic.value);
        }

        let inputs = inputs
            .into_iter()
            .enumerate()
            .map(|(block, slots)| {
                bound(slots, |port| SystemError::UnboundPort {
                    block,
                    direction: Direction::Input,
                    port,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let outputs = outputs
            .into_iter()
            .enumerate()
            .map(|(block, slots)| {
                bound(slots, |port| SystemError::UnboundPort {
                    block,
                    direction: Direction::Output,
                    port,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        // A spliced interior has no boundary edges of its own.
        let (boundary_inputs, boundary_outputs) = if spliced {
            (Vec::new(), Vec::new())
        } else {
            (
                bound(boundary_inputs, |port| SystemError::UnboundBoundary {
                    direction: Direction::Input,
                    port,
                })?,
                bound(boundary_outputs, |port| SystemError::UnboundBoundary {
                    direction: Direction::Output,
                    port,
                })?,
            )
        };

        Ok(Self {
            inputs,
            outputs,
            seeds,
            boundary_inputs,
            boundary_outputs,
        })
    }
}

fn bound<T>(slots: Vec<Option<T>>, unbound: impl Fn(usize) -> SystemError) -> Result<Vec<T>, SystemError> {
    slots
        .into_iter()
        .enumerate()
        .map(|(port, slot)| slot.ok_or_else(|| unbound(port)))
        .collect()
}

// ── Running graph ───────────────────────────────────────────────────────────

/// Workers and channels of one started container.
pub(crate) struct RunningGraph {
    system: SystemId,
    handles: Vec<JoinHandle<WorkerReport>>,
    halt_rx: Receiver<HaltNotice>,
    cancellation: Cancellation,
    boundary_inputs: Vec<Sender<f64>>,
    boundary_outputs: Vec<Receiver<f64>>,
    /// A halt observed while exchanging boundary values.
    pending: Option<HaltCause>,
    started: Instant,
}

/// What [`RunningGraph::shutdown`] collected.
pub(crate) struct Shutdown {
    pub reports: Vec<WorkerReport>,
    pub panicked: Vec<usize>,
    pub duration_ms: f64,
}

impl RunningGraph {
    /// Spawn one worker per block. Each worker starts with its share of the
    /// initial conditions already loaded.
    pub fn launch(
        system: SystemId,
        config: &SimConfig,
        blocks: Vec<Box<dyn Block>>,
        wiring: Wiring,
    ) -> Result<Self, SystemError> {
        let started = Instant::now();
        let (halt_tx, halt_rx) = halt_channel();
        let Wiring {
            inputs,
            outputs,
            seeds,
            boundary_inputs,
            boundary_outputs,
        } = wiring;

        let mut graph = Self {
            system,
            handles: Vec::with_capacity(blocks.len()),
            halt_rx,
            cancellation: Cancellation::new(),
            boundary_inputs,
            boundary_outputs,
            pending: None,
            started,
        };

        let ports = inputs.into_iter().zip(outputs).zip(seeds);
        for (index, (block, ((inputs, outputs), seeds))) in blocks.into_iter().zip(ports).enumerate() {
            let span = info_span!("worker", system = %system, block = index, name = %block.name());
            let worker = Worker {
                index,
                block,
                inputs,
                outputs,
                seeds,
                halt: halt_tx.clone(),
                cancel: graph.cancellation.token(),
                dt: config.dt,
            };

            let mut builder = thread::Builder::new().name(format!("block-{}", index));
            if let Some(size) = config.worker_stack_size {
                builder = builder.stack_size(size);
            }
            let handle = builder
                .spawn(move || span.in_scope(|| worker.run()))
                .map_err(|source| SystemError::Spawn { block: index, source })?;
            graph.handles.push(handle);
        }
        // Only workers hold halt senders now; if they all exit, the halt
        // channel disconnects and the run counts as drained.
        drop(halt_tx);

        Ok(graph)
    }

    /// Block until the first halt notice, or until every worker is gone.
    pub fn wait_for_halt(&mut self) -> HaltCause {
        if let Some(cause) = self.pending.take() {
            return cause;
        }
        cause_of(self.halt_rx.recv().ok())
    }

    /// Like [`wait_for_halt`](Self::wait_for_halt), but gives up when the
    /// enclosing run is cancelled first.
    pub fn wait_for_halt_or_cancel(&mut self, cancel: &CancelToken) -> Result<HaltCause, WorkerExit> {
        if let Some(cause) = self.pending.take() {
            return Ok(cause);
        }
        cancel.recv_halt(&self.halt_rx).map(cause_of)
    }

    /// Push one value into every boundary input and collect one value from
    /// every boundary output.
    ///
    /// With no boundary ports there is nothing to trade, so this waits for
    /// the interior to halt.
    pub fn exchange(&mut self, inputs: &[f64], outputs: &mut [f64]) -> Result<(), HaltCause> {
        if let Some(cause) = self.pending {
            return Err(cause);
        }
        if self.boundary_inputs.is_empty() && self.boundary_outputs.is_empty() {
            let cause = self.wait_for_halt();
            self.pending = Some(cause);
            return Err(cause);
        }
        let result = fabric::exchange(
            &self.boundary_inputs,
            inputs,
            &self.boundary_outputs,
            outputs,
            &self.halt_rx,
        );
        match result {
            Ok(()) => Ok(()),
            Err(interrupted) => {
                let cause = match interrupted {
                    Interrupted::Aborted(notice) => cause_of(notice),
                    Interrupted::Disconnected => HaltCause::Drained,
                };
                self.pending = Some(cause);
                Err(cause)
            }
        }
    }

    /// Cancel every worker and join them all.
    pub fn shutdown(&mut self) -> Shutdown {
        debug!(system = %self.system, workers = self.handles.len(), "cancelling workers");
        self.cancellation.cancel();
        self.boundary_inputs.clear();
        self.boundary_outputs.clear();

        let mut reports = Vec::with_capacity(self.handles.len());
        let mut panicked = Vec::new();
        for (index, handle) in self.handles.drain(..).enumerate() {
            match handle.join() {
                Ok(report) => reports.push(report),
                Err(_) => panicked.push(index),
            }
        }

        Shutdown {
            reports,
            panicked,
            duration_ms: self.started.elapsed().as_secs_f64() * 1000.0,
        }
    }
}

impl Drop for RunningGraph {
    fn drop(&mut self) {
        if !self.handles.is_empty() {
            self.shutdown();
        }
    }
}

fn cause_of(notice: Option<HaltNotice>) -> HaltCause {
    match notice {
        Some(HaltNotice { block }) => HaltCause::Halted { block },
        None => HaltCause::Drained,
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::block::{StepContext, StepOutcome};
    use std::thread;

    struct Counter {
        limit: u64,
    }

    impl Block for Counter {
        fn inputs(&self) -> usize {
            0
        }

        fn outputs(&self) -> usize {
            1
        }

        fn step(&mut self, ctx: &StepContext, _inputs: &[f64], outputs: &mut [f64]) -> StepOutcome {
            outputs[0] = ctx.tick as f64;
            StepOutcome::from(ctx.tick + 1 < self.limit)
        }
    }

    struct Sink;

    impl Block for Sink {
        fn inputs(&self) -> usize {
            1
        }

        fn outputs(&self) -> usize {
            0
        }

        fn step(&mut self, _ctx: &StepContext, _inputs: &[f64], _outputs: &mut [f64]) -> StepOutcome {
            StepOutcome::Continue
        }
    }

    fn pair() -> (Vec<Box<dyn Block>>, Wiring) {
        let connections = [Connection::new(PortRef::block(0, 0), PortRef::block(1, 0))];
        let wiring = Wiring::build(&[(0, 1), (1, 0)], (0, 0), &connections, &[], None).unwrap();
        let blocks: Vec<Box<dyn Block>> = vec![Box::new(Counter { limit: 5 }), Box::new(Sink)];
        (blocks, wiring)
    }

    #[test]
    fn test_wiring_rejects_unbound_port() {
        let err = Wiring::build(&[(0, 1), (1, 0)], (0, 0), &[], &[], None).err().unwrap();
        // Inputs are resolved before outputs.
        assert!(matches!(
            err,
            SystemError::UnboundPort {
                block: 1,
                direction: Direction::Input,
                port: 0
            }
        ));
    }

    #[test]
    fn test_wiring_rejects_seed_without_edge() {
        let connections = [Connection::new(PortRef::block(0, 0), PortRef::block(1, 0))];
        let ics = [InitialCondition {
            value: 1.0,
            block: 0,
            input: 0,
        }];
        let err = Wiring::build(&[(1, 1), (1, 1)], (0, 0), &connections, &ics, None).err().unwrap();
        assert!(matches!(err, SystemError::UnboundPort { block: 0, port: 0, .. }));
    }

    #[test]
    fn test_initial_conditions_become_seeds() {
        let connections = [
            Connection::new(PortRef::block(0, 0), PortRef::block(1, 0)),
            Connection::new(PortRef::block(1, 0), PortRef::block(0, 0)),
        ];
        let ics = [
            InitialCondition {
                value: 1.0,
                block: 0,
                input: 0,
            },
            InitialCondition {
                value: 2.0,
                block: 0,
                input: 0,
            },
        ];
        let wiring = Wiring::build(&[(1, 1), (1, 1)], (0, 0), &connections, &ics, None).unwrap();
        assert_eq!(wiring.seeds[0][0], VecDeque::from([1.0, 2.0]));
        assert!(wiring.seeds[1][0].is_empty());
    }

    #[test]
    fn test_splice_takes_over_boundary_edges() {
        let (parent_tx, interior_rx) = fabric::edge();
        let (interior_tx, parent_rx) = fabric::edge();
        let splice = Splice {
            inputs: vec![interior_rx],
            outputs: vec![interior_tx],
            seeds: vec![VecDeque::from([4.0])],
        };
        // boundary in -> block 0 -> boundary out, with its own seed on the input
        let connections = [
            Connection::new(PortRef::boundary(0), PortRef::block(0, 0)),
            Connection::new(PortRef::block(0, 0), PortRef::boundary(0)),
        ];
        let ics = [InitialCondition {
            value: 5.0,
            block: 0,
            input: 0,
        }];
        let wiring = Wiring::build(&[(1, 1)], (1, 1), &connections, &ics, Some(splice)).unwrap();

        assert!(wiring.boundary_inputs.is_empty());
        assert!(wiring.boundary_outputs.is_empty());
        // Parent seeds are read before the interior's own.
        assert_eq!(wiring.seeds[0][0], VecDeque::from([4.0, 5.0]));

        // The block's edges are the parent's edges.
        let feeder = thread::spawn(move || parent_tx.send(1.5).unwrap());
        assert_eq!(wiring.inputs[0][0].recv().unwrap(), 1.5);
        feeder.join().unwrap();

        let reader = thread::spawn(move || parent_rx.recv().unwrap());
        wiring.outputs[0][0].send(2.5).unwrap();
        assert_eq!(reader.join().unwrap(), 2.5);
    }

    #[test]
    fn test_launch_wait_and_shutdown() {
        let (blocks, wiring) = pair();
        let mut graph = RunningGraph::launch(SystemId::new(), &SimConfig::default(), blocks, wiring).unwrap();

        assert_eq!(graph.wait_for_halt(), HaltCause::Halted { block: 0 });
        let shutdown = graph.shutdown();
        assert!(shutdown.panicked.is_empty());
        assert_eq!(shutdown.reports.len(), 2);

        let counter = &shutdown.reports[0];
        assert_eq!(counter.steps, 5);
        assert_eq!(counter.exit, WorkerExit::Halted);
        // The sink consumed the four values sent before the halt.
        assert_eq!(shutdown.reports[1].steps, 4);
    }

    #[test]
    fn test_empty_graph_drains() {
        let wiring = Wiring::build(&[], (0, 0), &[], &[], None).unwrap();
        let mut graph = RunningGraph::launch(SystemId::new(), &SimConfig::default(), vec![], wiring).unwrap();
        assert_eq!(graph.wait_for_halt(), HaltCause::Drained);
        assert!(graph.shutdown().reports.is_empty());
    }

    #[test]
    fn test_report_marks_panicked_blocks() {
        let labels = vec![
            BlockLabel {
                name: "A".into(),
                category: BlockCategory::Source,
            },
            BlockLabel {
                name: "B".into(),
                category: BlockCategory::Sink,
            },
        ];
        let reports = vec![WorkerReport {
            index: 1,
            block: Box::new(Sink),
            steps: 7,
            exit: WorkerExit::Cancelled,
        }];

        let report = RunReport::build(SystemId::new(), HaltCause::Halted { block: 1 }, 1.0, &labels, &reports);
        assert_eq!(report.halted_by(), Some(1));
        assert_eq!(report.blocks[0].exit, None);
        assert_eq!(report.blocks[0].steps, 0);
        assert_eq!(report.steps(1), Some(7));
        assert_eq!(report.blocks[1].exit, Some(WorkerExit::Cancelled));
    }
}
