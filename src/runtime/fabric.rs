//! Connection fabric
//!
//! Every edge is a zero-capacity crossbeam channel: a send completes only when
//! the reader takes the value, so each edge is a FIFO of depth one and the
//! only synchronisation point between its two blocks.
//!
//! Workers use edges one at a time in fixed port order. A system stepped by
//! hand has to feed several boundary edges whose readers may become ready in
//! any order, so it goes through [`exchange`], which services whichever edge
//! is ready first.

use crossbeam_channel::{bounded, Receiver, Select, Sender};

/// Create one synchronous edge.
pub fn edge() -> (Sender<f64>, Receiver<f64>) {
    bounded(0)
}

/// Why [`exchange`] stopped before completing every operation.
#[derive(Debug)]
pub enum Interrupted<A> {
    /// The abort channel fired. `None` when it was disconnected.
    Aborted(Option<A>),
    /// The peer of an edge went away.
    Disconnected,
}

/// Send `values[i]` on `sends[i]` and fill `received[j]` from `recvs[j]`,
/// completing the operations in whatever order the peers become ready.
///
/// Returns early when `abort` yields a message or disconnects.
pub fn exchange<A>(
    sends: &[Sender<f64>],
    values: &[f64],
    recvs: &[Receiver<f64>],
    received: &mut [f64],
    abort: &Receiver<A>,
) -> Result<(), Interrupted<A>> {
    debug_assert_eq!(sends.len(), values.len());
    debug_assert_eq!(recvs.len(), received.len());

    let mut pending_sends: Vec<usize> = (0..sends.len()).collect();
    let mut pending_recvs: Vec<usize> = (0..recvs.len()).collect();

    while !pending_sends.is_empty() || !pending_recvs.is_empty() {
        // Operation indices follow insertion order: sends, then receives,
        // then the abort channel.
        let mut sel = Select::new();
        for &slot in &pending_sends {
            sel.send(&sends[slot]);
        }
        for &slot in &pending_recvs {
            sel.recv(&recvs[slot]);
        }
        let abort_index = sel.recv(abort);

        let oper = sel.select();
        let index = oper.index();

        if index == abort_index {
            return Err(Interrupted::Aborted(oper.recv(abort).ok()));
        }

        if index < pending_sends.len() {
            let slot = pending_sends[index];
            oper.send(&sends[slot], values[slot])
                .map_err(|_| Interrupted::Disconnected)?;
            pending_sends.swap_remove(index);
        } else {
            let k = index - pending_sends.len();
            let slot = pending_recvs[k];
            received[slot] = oper
                .recv(&recvs[slot])
                .map_err(|_| Interrupted::Disconnected)?;
            pending_recvs.swap_remove(k);
        }
    }
    Ok(())
}
