//! System container
//!
//! A [`System`] owns an ordered list of blocks, the connections between their
//! ports, and the initial conditions that break feedback cycles. It is built
//! programmatically, validated, then started:
//!
//! ```text
//! Unvalidated ──check──▶ Validated ──start──▶ Starting ──▶ Running
//!      ▲                     │                                │
//!      └──── add/connect ────┘                 wait / halt ───▼
//!                                          Halted ◀── Draining
//! ```
//!
//! A system is itself a [`Block`]: its boundary ports become the block's
//! inputs and outputs. Inside a running parent, the worker that hosts a
//! nested system starts the interior on the worker's own edges, so interior
//! blocks exchange values with the parent's blocks directly. Systems can
//! therefore be nested to any depth.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::categories::BlockCategory;
use crate::core::block::{Block, StepContext, StepOutcome};
use crate::core::config::SimConfig;
use crate::core::error::SystemError;
use crate::core::port::{Connection, Direction, InitialCondition, PortRef};
use crate::core::SystemId;

use super::engine::{RunReport, RunningGraph, Splice, Wiring};
use super::halt::{CancelToken, HaltCause};
use super::validation::{GraphValidator, PortTable};
use super::worker::{BlockLabel, WorkerExit};

/// Lifecycle of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SystemState {
    /// Modified since the last successful check
    Unvalidated,
    /// Every port is bound; ready to start
    Validated,
    /// Spawning workers and seeding initial conditions
    Starting,
    /// Workers are exchanging values
    Running,
    /// A halt was received; workers are being cancelled and joined
    Draining,
    /// Every worker has been joined
    Halted,
}

impl SystemState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SystemState::Unvalidated => "unvalidated",
            SystemState::Validated => "validated",
            SystemState::Starting => "starting",
            SystemState::Running => "running",
            SystemState::Draining => "draining",
            SystemState::Halted => "halted",
        }
    }
}

impl fmt::Display for SystemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered block and the edges bound to its ports.
struct Node {
    /// `None` while a worker owns the block.
    block: Option<Box<dyn Block>>,
    ports: PortTable,
    label: BlockLabel,
}

/// A graph of blocks connected by synchronous edges.
pub struct System {
    id: SystemId,
    config: SimConfig,
    nodes: Vec<Node>,
    boundary: PortTable,
    connections: Vec<Connection>,
    initial_conditions: Vec<InitialCondition>,
    state: SystemState,
    running: Option<RunningGraph>,
    last_report: Option<RunReport>,
}

impl System {
    /// Create a top-level system with no boundary ports.
    pub fn new(config: SimConfig) -> Self {
        Self::with_boundary(config, 0, 0)
    }

    /// Create a system meant to be nested, exposing `inputs` boundary inputs
    /// and `outputs` boundary outputs.
    pub fn with_boundary(config: SimConfig, inputs: usize, outputs: usize) -> Self {
        Self {
            id: SystemId::new(),
            config,
            nodes: Vec::new(),
            boundary: PortTable::new(inputs, outputs),
            connections: Vec::new(),
            initial_conditions: Vec::new(),
            state: SystemState::Unvalidated,
            running: None,
            last_report: None,
        }
    }

    pub fn id(&self) -> SystemId {
        self.id
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn state(&self) -> SystemState {
        self.state
    }

    /// Number of registered blocks.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every connection, in the order it was made.
    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn initial_conditions(&self) -> &[InitialCondition] {
        &self.initial_conditions
    }

    /// A registered block, unless a worker currently owns it.
    pub fn block(&self, index: usize) -> Option<&dyn Block> {
        self.nodes.get(index)?.block.as_deref()
    }

    /// Report of the most recent run, including runs of a nested system.
    pub fn last_report(&self) -> Option<&RunReport> {
        self.last_report.as_ref()
    }

    // ── Building ────────────────────────────────────────────────────────

    /// Register a block and return its index.
    pub fn add(&mut self, block: impl Block + 'static) -> Result<usize, SystemError> {
        self.add_boxed(Box::new(block))
    }

    pub fn add_boxed(&mut self, block: Box<dyn Block>) -> Result<usize, SystemError> {
        self.ensure_mutable("add a block")?;

        let index = self.nodes.len();
        let ports = PortTable::new(block.inputs(), block.outputs());
        let label = BlockLabel::of(block.as_ref());
        debug!(system = %self.id, block = index, name = %label.name, "block registered");

        self.nodes.push(Node {
            block: Some(block),
            ports,
            label,
        });
        self.state = SystemState::Unvalidated;
        Ok(index)
    }

    /// Create one edge from an output (or boundary input) to an input (or
    /// boundary output).
    ///
    /// Fails without changing anything if either end does not exist or is
    /// already connected.
    pub fn connect(&mut self, from: PortRef, to: PortRef) -> Result<(), SystemError> {
        self.ensure_mutable("connect")?;

        if let (PortRef::Boundary(input), PortRef::Boundary(output)) = (from, to) {
            return Err(SystemError::BoundaryPassThrough { input, output });
        }

        let from_side = Self::source_side(from);
        let to_side = Self::destination_side(to);
        self.ensure_free(from, from_side)?;
        self.ensure_free(to, to_side)?;

        let edge = self.connections.len();
        self.table_mut(from).bind(from_side, from.port(), edge);
        self.table_mut(to).bind(to_side, to.port(), edge);
        self.connections.push(Connection::new(from, to));
        self.state = SystemState::Unvalidated;
        Ok(())
    }

    /// Connect output `src_port` of block `src` to input `dst_port` of
    /// block `dst`.
    pub fn connect_blocks(
        &mut self,
        src: usize,
        dst: usize,
        src_port: usize,
        dst_port: usize,
    ) -> Result<(), SystemError> {
        self.connect(PortRef::block(src, src_port), PortRef::block(dst, dst_port))
    }

    /// Deliver `value` once to input `input` of block `block` before the
    /// steady-state loop begins.
    ///
    /// The input must be connected by the time the system starts.
    pub fn add_initial_condition(&mut self, value: f64, block: usize, input: usize) -> Result<(), SystemError> {
        self.ensure_mutable("add an initial condition")?;

        let node = self.nodes.get(block).ok_or(SystemError::NoSuchBlock(block))?;
        if input >= node.ports.arity(Direction::Input) {
            return Err(SystemError::NoSuchPort {
                block,
                direction: Direction::Input,
                port: input,
            });
        }

        self.initial_conditions.push(InitialCondition { value, block, input });
        self.state = SystemState::Unvalidated;
        Ok(())
    }

    // ── Validation ──────────────────────────────────────────────────────

    /// Verify that every port is connected and every block accepts its own
    /// configuration. Safe to call repeatedly.
    pub fn check(&mut self) -> Result<(), SystemError> {
        self.ensure_mutable("validate")?;
        self.verify()?;
        self.state = SystemState::Validated;
        Ok(())
    }

    /// Look for a directed cycle that no initial condition breaks.
    ///
    /// This is a development aid: the engine never detects deadlock at run
    /// time.
    pub fn check_cycles(&self) -> Result<(), SystemError> {
        match GraphValidator::find_unseeded_cycle(self.nodes.len(), &self.connections, &self.initial_conditions) {
            Some(blocks) => Err(SystemError::UnseededCycle(blocks)),
            None => Ok(()),
        }
    }

    fn verify(&self) -> Result<(), SystemError> {
        self.config.validate()?;

        let tables: Vec<&PortTable> = self.nodes.iter().map(|n| &n.ports).collect();
        GraphValidator::check_bindings(&tables, &self.boundary)?;

        for (index, node) in self.nodes.iter().enumerate() {
            if let Some(block) = &node.block {
                block.validate().map_err(|source| SystemError::InvalidBlock {
                    block: index,
                    source: Box::new(source),
                })?;
            }
        }

        if self.config.detect_unseeded_cycles {
            self.check_cycles()?;
        }
        Ok(())
    }

    // ── Execution ───────────────────────────────────────────────────────

    /// Validate if needed, spawn one worker per block, and seed the initial
    /// conditions. Returns once the network is running.
    pub fn start(&mut self) -> Result<(), SystemError> {
        self.launch(None)
    }

    fn launch(&mut self, splice: Option<Splice>) -> Result<(), SystemError> {
        if self.state != SystemState::Validated {
            self.check()?;
        }
        self.state = SystemState::Starting;

        let arities: Vec<(usize, usize)> = self
            .nodes
            .iter()
            .map(|n| (n.ports.arity(Direction::Input), n.ports.arity(Direction::Output)))
            .collect();
        let boundary = (
            self.boundary.arity(Direction::Input),
            self.boundary.arity(Direction::Output),
        );
        let wiring = match Wiring::build(&arities, boundary, &self.connections, &self.initial_conditions, splice) {
            Ok(wiring) => wiring,
            Err(err) => {
                self.state = SystemState::Unvalidated;
                return Err(err);
            }
        };

        let blocks: Vec<Box<dyn Block>> = self.nodes.iter_mut().filter_map(|n| n.block.take()).collect();
        debug_assert_eq!(blocks.len(), self.nodes.len());

        info!(
            system = %self.id,
            blocks = blocks.len(),
            edges = self.connections.len(),
            initial_conditions = self.initial_conditions.len(),
            dt = self.config.dt,
            "starting system"
        );

        match RunningGraph::launch(self.id, &self.config, blocks, wiring) {
            Ok(graph) => {
                self.running = Some(graph);
                self.state = SystemState::Running;
                Ok(())
            }
            Err(err) => {
                error!(system = %self.id, error = %err, "failed to start system");
                self.state = SystemState::Halted;
                Err(err)
            }
        }
    }

    /// Block until the run halts, then stop and join every worker.
    pub fn wait(&mut self) -> Result<RunReport, SystemError> {
        let Some(mut graph) = self.running.take() else {
            return Err(SystemError::InvalidState {
                operation: "wait",
                state: self.state.as_str(),
            });
        };

        let cause = graph.wait_for_halt();
        info!(system = %self.id, ?cause, "halt received, draining workers");
        self.finish(graph, cause)
    }

    /// Start the system and wait for it to halt.
    pub fn run(&mut self) -> Result<RunReport, SystemError> {
        self.start()?;
        self.wait()
    }

    /// Run the interior on the edges of the worker hosting this system,
    /// until the interior halts or the enclosing run is cancelled.
    ///
    /// Returns the hosting worker's exit and the step count of the busiest
    /// interior block.
    pub(crate) fn run_embedded(&mut self, splice: Splice, cancel: &CancelToken) -> (WorkerExit, u64) {
        debug!(system = %self.id, "activating nested system");
        if let Err(err) = self.launch(Some(splice)) {
            error!(system = %self.id, error = %err, "nested system failed to start");
            return (WorkerExit::Halted, 0);
        }
        let Some(mut graph) = self.running.take() else {
            return (WorkerExit::Halted, 0);
        };

        let (cause, exit) = match graph.wait_for_halt_or_cancel(cancel) {
            Ok(cause @ HaltCause::Halted { .. }) => (cause, WorkerExit::Halted),
            // Every interior worker left on its own; so does the host.
            Ok(cause) => (cause, WorkerExit::Disconnected),
            Err(exit) => (HaltCause::Cancelled, exit),
        };
        if let Err(err) = self.finish(graph, cause) {
            error!(system = %self.id, error = %err, "nested system did not shut down cleanly");
        }

        let steps = self
            .last_report
            .as_ref()
            .and_then(|report| report.blocks.iter().map(|b| b.steps).max())
            .unwrap_or(0);
        (exit, steps)
    }

    fn finish(&mut self, mut graph: RunningGraph, cause: HaltCause) -> Result<RunReport, SystemError> {
        self.state = SystemState::Draining;
        let shutdown = graph.shutdown();

        let labels: Vec<BlockLabel> = self.nodes.iter().map(|n| n.label.clone()).collect();
        let report = RunReport::build(self.id, cause, shutdown.duration_ms, &labels, &shutdown.reports);
        for worker in shutdown.reports {
            self.nodes[worker.index].block = Some(worker.block);
        }
        self.state = SystemState::Halted;
        self.last_report = Some(report.clone());
        info!(system = %self.id, duration_ms = report.duration_ms, "system halted");

        match shutdown.panicked.first() {
            Some(&index) => Err(SystemError::WorkerPanicked(index)),
            None => Ok(report),
        }
    }

    // ── Helpers ─────────────────────────────────────────────────────────

    fn ensure_mutable(&self, operation: &'static str) -> Result<(), SystemError> {
        match self.state {
            SystemState::Unvalidated | SystemState::Validated => Ok(()),
            state => Err(SystemError::InvalidState {
                operation,
                state: state.as_str(),
            }),
        }
    }

    /// The side of the port table a connection source binds to.
    fn source_side(port: PortRef) -> Direction {
        match port {
            PortRef::Block { .. } => Direction::Output,
            PortRef::Boundary(_) => Direction::Input,
        }
    }

    fn destination_side(port: PortRef) -> Direction {
        match port {
            PortRef::Block { .. } => Direction::Input,
            PortRef::Boundary(_) => Direction::Output,
        }
    }

    fn ensure_free(&self, port: PortRef, direction: Direction) -> Result<(), SystemError> {
        let table = match port {
            PortRef::Block { block, .. } => &self.nodes.get(block).ok_or(SystemError::NoSuchBlock(block))?.ports,
            PortRef::Boundary(_) => &self.boundary,
        };

        if port.port() >= table.arity(direction) {
            return Err(match port {
                PortRef::Block { block, port } => SystemError::NoSuchPort {
                    block,
                    direction,
                    port,
                },
                PortRef::Boundary(port) => SystemError::NoSuchBoundaryPort { direction, port },
            });
        }
        if table.is_bound(direction, port.port()) {
            return Err(SystemError::PortAlreadyConnected { port, direction });
        }
        Ok(())
    }

    fn table_mut(&mut self, port: PortRef) -> &mut PortTable {
        match port {
            PortRef::Block { block, .. } => &mut self.nodes[block].ports,
            PortRef::Boundary(_) => &mut self.boundary,
        }
    }
}

impl Default for System {
    fn default() -> Self {
        Self::new(SimConfig::default())
    }
}

impl fmt::Debug for System {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("System")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("blocks", &self.nodes.len())
            .field("connections", &self.connections)
            .field("initial_conditions", &self.initial_conditions)
            .finish()
    }
}

// ── Nesting ─────────────────────────────────────────────────────────────────

impl Block for System {
    fn inputs(&self) -> usize {
        self.boundary.arity(Direction::Input)
    }

    fn outputs(&self) -> usize {
        self.boundary.arity(Direction::Output)
    }

    /// Start the interior on first use, then trade one value per boundary
    /// port with it. An interior halt becomes a halt of this block. Without
    /// boundary ports the call blocks until the interior halts.
    ///
    /// Workers never call this; it serves callers that drive a system by
    /// hand. The interior runs on its own configured step size, so `ctx` is
    /// unused.
    fn step(&mut self, _ctx: &StepContext, inputs: &[f64], outputs: &mut [f64]) -> StepOutcome {
        match self.state {
            SystemState::Running => {}
            SystemState::Unvalidated | SystemState::Validated => {
                debug!(system = %self.id, "activating nested system");
                if let Err(err) = self.start() {
                    error!(system = %self.id, error = %err, "nested system failed to start");
                    return StepOutcome::Halt;
                }
            }
            SystemState::Starting | SystemState::Draining | SystemState::Halted => return StepOutcome::Halt,
        }

        let Some(graph) = self.running.as_mut() else {
            return StepOutcome::Halt;
        };
        match graph.exchange(inputs, outputs) {
            Ok(()) => StepOutcome::Continue,
            Err(cause) => {
                if let Some(graph) = self.running.take() {
                    if let Err(err) = self.finish(graph, cause) {
                        error!(system = %self.id, error = %err, "nested system did not shut down cleanly");
                    }
                }
                StepOutcome::Halt
            }
        }
    }

    fn name(&self) -> &str {
        "System"
    }

    fn category(&self) -> BlockCategory {
        BlockCategory::Subsystem
    }

    fn as_system(&mut self) -> Option<&mut System> {
        Some(self)
    }

    /// A nested system must not have been started on its own.
    fn validate(&self) -> Result<(), SystemError> {
        self.ensure_mutable("nest")?;
        self.verify()
    }

    fn on_stop(&mut self) {
        if let Some(graph) = self.running.take() {
            if let Err(err) = self.finish(graph, HaltCause::Cancelled) {
                error!(system = %self.id, error = %err, "nested system did not shut down cleanly");
            }
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
