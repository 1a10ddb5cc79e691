//! Rendezvous handoff between the reader pump and the dispatcher.
//!
//! `send` only returns once the receiving side has taken the item, so at most
//! one item is ever in flight and a slow consumer stalls the producer instead
//! of growing a buffer. Tokio's mpsc cannot be built with zero capacity; a
//! one-slot channel plus a per-item acknowledgement gives the same semantics.

use tokio::sync::{mpsc, oneshot};

#[derive(Debug, PartialEq, Eq)]
pub struct HandoffClosed;

pub struct HandoffSender<T> {
    slot: mpsc::Sender<(T, oneshot::Sender<()>)>,
}

pub struct HandoffReceiver<T> {
    slot: mpsc::Receiver<(T, oneshot::Sender<()>)>,
}

pub fn rendezvous<T>() -> (HandoffSender<T>, HandoffReceiver<T>) {
    let (slot_tx, slot_rx) = mpsc::channel(1);
    (HandoffSender { slot: slot_tx }, HandoffReceiver { slot: slot_rx })
}

impl<T> HandoffSender<T> {
    /// Waits until the receiver has taken `item`.
    ///
    /// Fails if the receiver is dropped before or while the item is pending;
    /// in that case the item is lost.
    pub async fn send(&self, item: T) -> Result<(), HandoffClosed> {
        let (taken_tx, taken_rx) = oneshot::channel();
        self.slot.send((item, taken_tx)).await.map_err(|_| HandoffClosed)?;
        taken_rx.await.map_err(|_| HandoffClosed)
    }
}

impl<T> HandoffReceiver<T> {
    /// Takes the next item, or `None` once the sender is gone.
    pub async fn recv(&mut self) -> Option<T> {
        let (item, taken) = self.slot.recv().await?;
        // The sender may have given up waiting; the item is still ours.
        let _ = taken.send(());
        Some(item)
    }
}
