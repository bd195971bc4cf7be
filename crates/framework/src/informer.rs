//! Watch source contract

use crate::shutdown::Shutdown;
use crossbeam_channel::{Receiver, Sender, unbounded};
use std::sync::Arc;

/// Receiving ends of a watch: the event loop only reads from these.
pub struct WatchChannels<O> {
    pub deletes: Receiver<O>,
    pub updates: Receiver<O>,
    pub errors: Receiver<anyhow::Error>,
}

/// Sending ends handed to the watch source
pub struct WatchSenders<O> {
    pub deletes: Sender<O>,
    pub updates: Sender<O>,
    pub errors: Sender<anyhow::Error>,
}

/// Create a connected pair of watch channel ends
pub fn channels<O>() -> (WatchSenders<O>, WatchChannels<O>) {
    let (delete_tx, delete_rx) = unbounded();
    let (update_tx, update_rx) = unbounded();
    let (error_tx, error_rx) = unbounded();
    (
        WatchSenders {
            deletes: delete_tx,
            updates: update_tx,
            errors: error_tx,
        },
        WatchChannels {
            deletes: delete_rx,
            updates: update_rx,
            errors: error_rx,
        },
    )
}

/// Source of object events
///
/// `watch` starts producing events and returns immediately. The source stops
/// once `shutdown` is triggered. Dropping every sender is reported by the
/// event loop as a watch error.
pub trait Informer<O>: Send + Sync {
    fn watch(&self, shutdown: &Shutdown) -> anyhow::Result<WatchChannels<O>>;
}

impl<O, T: Informer<O> + ?Sized> Informer<O> for Arc<T> {
    fn watch(&self, shutdown: &Shutdown) -> anyhow::Result<WatchChannels<O>> {
        (**self).watch(shutdown)
    }
}
