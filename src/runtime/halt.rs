//! Termination path
//!
//! Two channels coordinate shutdown:
//!
//! - the halt channel, a zero-capacity rendezvous on which the first worker
//!   whose block returns [`StepOutcome::Halt`] notifies the engine;
//! - the cancellation channel, which never carries a message. The engine owns
//!   its only sender and drops it to broadcast "stop" to every worker at once,
//!   since a disconnected channel is ready for every receiver.
//!
//! Every blocking operation a worker performs selects over its data edge and
//! the cancellation channel, so once the engine cancels, every worker drains
//! out promptly instead of staying parked on an edge.
//!
//! [`StepOutcome::Halt`]: crate::core::StepOutcome::Halt

use crossbeam_channel::{bounded, select, Receiver, Sender, TryRecvError};
use serde::{Deserialize, Serialize};

use super::worker::WorkerExit;

/// Sent by the worker whose block requested the halt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HaltNotice {
    /// Index of the halting block
    pub block: usize,
}

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HaltCause {
    /// A block returned `Halt` from its step
    Halted { block: usize },
    /// Every worker exited on its own without a halt request
    Drained,
    /// The enclosing system stopped this one
    Cancelled,
}

/// Create the halt rendezvous.
pub(crate) fn halt_channel() -> (HaltSender, Receiver<HaltNotice>) {
    let (tx, rx) = bounded(0);
    (HaltSender { tx }, rx)
}

/// Worker side of the halt rendezvous.
#[derive(Clone)]
pub(crate) struct HaltSender {
    tx: Sender<HaltNotice>,
}

impl HaltSender {
    /// Deliver the notice unless the engine already cancelled the run.
    ///
    /// Only the first notice is received; later ones lose to cancellation
    /// and are dropped.
    pub fn notify(&self, notice: HaltNotice, cancel: &CancelToken) {
        select! {
            send(self.tx, notice) -> _ => {},
            recv(cancel.rx) -> _ => {},
        }
    }
}

/// Engine side of the cancellation broadcast.
pub(crate) struct Cancellation {
    tx: Option<Sender<()>>,
    rx: Receiver<()>,
}

impl Cancellation {
    pub fn new() -> Self {
        let (tx, rx) = bounded(0);
        Self { tx: Some(tx), rx }
    }

    /// A token for one worker.
    pub fn token(&self) -> CancelToken {
        CancelToken {
            rx: self.rx.clone(),
        }
    }

    /// Wake every worker. Idempotent.
    pub fn cancel(&mut self) {
        self.tx.take();
    }
}

/// Worker side of the cancellation broadcast.
#[derive(Clone)]
pub(crate) struct CancelToken {
    rx: Receiver<()>,
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        matches!(self.rx.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Receive one value from an input edge.
    pub fn recv(&self, edge: &Receiver<f64>) -> Result<f64, WorkerExit> {
        if self.is_cancelled() {
            return Err(WorkerExit::Cancelled);
        }
        select! {
            recv(edge) -> msg => msg.map_err(|_| WorkerExit::Disconnected),
            recv(self.rx) -> _ => Err(WorkerExit::Cancelled),
        }
    }

    /// Wait for the first halt notice of a nested run.
    ///
    /// `Ok(None)` means every interior worker exited without one.
    pub fn recv_halt(&self, halt: &Receiver<HaltNotice>) -> Result<Option<HaltNotice>, WorkerExit> {
        if self.is_cancelled() {
            return Err(WorkerExit::Cancelled);
        }
        select! {
            recv(halt) -> notice => Ok(notice.ok()),
            recv(self.rx) -> _ => Err(WorkerExit::Cancelled),
        }
    }

    /// Send one value on an output edge.
    pub fn send(&self, edge: &Sender<f64>, value: f64) -> Result<(), WorkerExit> {
        if self.is_cancelled() {
            return Err(WorkerExit::Cancelled);
        }
        select! {
            send(edge, value) -> res => res.map_err(|_| WorkerExit::Disconnected),
            recv(self.rx) -> _ => Err(WorkerExit::Cancelled),
        }
    }
}
