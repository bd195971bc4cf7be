//! Shutdown token shared by the event loop and watch sources

use crossbeam_channel::{Receiver, Sender, TryRecvError, bounded};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Cloneable cancellation token
///
/// Nothing is ever sent on the channel: triggering drops the only sender,
/// which disconnects every receiver at once and wakes any `select!` that
/// waits on [`Shutdown::receiver`].
#[derive(Debug, Clone)]
pub struct Shutdown {
    sender: Arc<Mutex<Option<Sender<()>>>>,
    receiver: Receiver<()>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    pub fn new() -> Self {
        let (sender, receiver) = bounded(0);
        Self {
            sender: Arc::new(Mutex::new(Some(sender))),
            receiver,
        }
    }

    /// Signal shutdown to every clone of this token
    pub fn trigger(&self) {
        let mut sender = match self.sender.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        sender.take();
    }

    pub fn is_triggered(&self) -> bool {
        matches!(self.receiver.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Receiver that becomes ready (disconnected) on shutdown
    pub fn receiver(&self) -> &Receiver<()> {
        &self.receiver
    }

    /// Sleep for up to `timeout`; returns true if shutdown was triggered.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        match self.receiver.recv_timeout(timeout) {
            Ok(()) => false,
            Err(err) => err.is_disconnected(),
        }
    }
}
