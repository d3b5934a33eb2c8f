//! Graph validation
//!
//! Two checks run before any worker exists:
//!
//! - port completeness: every declared port of every block, and every
//!   boundary port of the container, is bound to exactly one edge;
//! - unseeded cycles (opt-in): every directed cycle carries at least one
//!   initial condition. The engine itself never detects deadlock; this is a
//!   development aid for catching the most common cause of one.

use std::collections::{HashSet, VecDeque};

use crate::core::error::SystemError;
use crate::core::port::{Connection, Direction, InitialCondition, PortRef};

// ── Port binding table ──────────────────────────────────────────────────────

/// Edge indices bound to one block's (or the boundary's) ports.
#[derive(Debug, Clone, Default)]
pub(crate) struct PortTable {
    inputs: Vec<Option<usize>>,
    outputs: Vec<Option<usize>>,
}

impl PortTable {
    pub fn new(inputs: usize, outputs: usize) -> Self {
        Self {
            inputs: vec![None; inputs],
            outputs: vec![None; outputs],
        }
    }

    pub fn arity(&self, direction: Direction) -> usize {
        self.side(direction).len()
    }

    pub fn is_bound(&self, direction: Direction, port: usize) -> bool {
        matches!(self.side(direction).get(port), Some(Some(_)))
    }

    /// Bind `edge` to a port that is known to exist and be free.
    pub fn bind(&mut self, direction: Direction, port: usize, edge: usize) {
        let side = match direction {
            Direction::Input => &mut self.inputs,
            Direction::Output => &mut self.outputs,
        };
        side[port] = Some(edge);
    }

    /// First unbound port, inputs before outputs.
    pub fn first_unbound(&self) -> Option<(Direction, usize)> {
        let find = |side: &[Option<usize>]| side.iter().position(Option::is_none);
        find(&self.inputs)
            .map(|port| (Direction::Input, port))
            .or_else(|| find(&self.outputs).map(|port| (Direction::Output, port)))
    }

    fn side(&self, direction: Direction) -> &[Option<usize>] {
        match direction {
            Direction::Input => &self.inputs,
            Direction::Output => &self.outputs,
        }
    }
}

// ── Validator ───────────────────────────────────────────────────────────────

pub struct GraphValidator;

impl GraphValidator {
    /// Fail on the first unbound port, walking blocks in registration order
    /// and then the boundary.
    pub(crate) fn check_bindings(blocks: &[&PortTable], boundary: &PortTable) -> Result<(), SystemError> {
        for (block, table) in blocks.iter().enumerate() {
            if let Some((direction, port)) = table.first_unbound() {
                return Err(SystemError::UnboundPort {
                    block,
                    direction,
                    port,
                });
            }
        }
        if let Some((direction, port)) = boundary.first_unbound() {
            return Err(SystemError::UnboundBoundary { direction, port });
        }
        Ok(())
    }

    /// Blocks on a directed cycle that no initial condition breaks.
    ///
    /// Edges into a seeded input are removed, then blocks with no remaining
    /// predecessor or no remaining successor are peeled away (Kahn's
    /// algorithm run forwards and backwards). Whatever survives lies on, or
    /// between, unseeded cycles. Returns `None` when nothing survives.
    pub fn find_unseeded_cycle(
        block_count: usize,
        connections: &[Connection],
        initial_conditions: &[InitialCondition],
    ) -> Option<Vec<usize>> {
        let seeded: HashSet<(usize, usize)> = initial_conditions
            .iter()
            .map(|ic| (ic.block, ic.input))
            .collect();

        let mut succ: Vec<Vec<usize>> = vec![Vec::new(); block_count];
        let mut pred: Vec<Vec<usize>> = vec![Vec::new(); block_count];

        for conn in connections {
            let (src, dst, dst_port) = match (conn.from, conn.to) {
                (PortRef::Block { block: src, .. }, PortRef::Block { block: dst, port }) => (src, dst, port),
                _ => continue,
            };
            if src >= block_count || dst >= block_count || seeded.contains(&(dst, dst_port)) {
                continue;
            }
            succ[src].push(dst);
            pred[dst].push(src);
        }

        let mut alive = vec![true; block_count];
        Self::peel(&succ, &pred, &mut alive);
        Self::peel(&pred, &succ, &mut alive);

        let cycle: Vec<usize> = (0..block_count).filter(|&b| alive[b]).collect();
        if cycle.is_empty() {
            None
        } else {
            Some(cycle)
        }
    }

    /// Remove every live node whose live in-degree (along `pred`) drops to
    /// zero, propagating along `succ`.
    fn peel(succ: &[Vec<usize>], pred: &[Vec<usize>], alive: &mut [bool]) {
        let mut in_degree: Vec<usize> = (0..alive.len())
            .map(|n| pred[n].iter().filter(|&&p| alive[p]).count())
            .collect();

        let mut queue: VecDeque<usize> = (0..alive.len())
            .filter(|&n| alive[n] && in_degree[n] == 0)
            .collect();

        while let Some(node) = queue.pop_front() {
            alive[node] = false;
            for &next in &succ[node] {
                if !alive[next] {
                    continue;
                }
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    queue.push_back(next);
                }
            }
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
