//! Pass context and cancellation signals
//!
//! A [`Context`] is created per reconciliation pass and threaded through
//! every handler call. It carries logging metadata and the pass's
//! cancellation state. Handlers (or code running alongside them) can cancel
//! either the remaining steps of the current handler or the whole pass.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

/// Cancellation state of a reconciliation pass
///
/// `ReconciliationCanceled` is terminal: once reached, no transition leaves
/// it, so it always takes precedence over `ResourceCanceled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cancellation {
    /// No signal set
    Running,
    /// Skip the remaining steps of the current handler
    ResourceCanceled,
    /// Stop the whole pass
    ReconciliationCanceled,
}

const RUNNING: u8 = 0;
const RESOURCE_CANCELED: u8 = 1;
const RECONCILIATION_CANCELED: u8 = 2;

#[derive(Debug, Default)]
struct CancelCell(AtomicU8);

impl CancelCell {
    fn load(&self) -> Cancellation {
        match self.0.load(Ordering::SeqCst) {
            RUNNING => Cancellation::Running,
            RESOURCE_CANCELED => Cancellation::ResourceCanceled,
            _ => Cancellation::ReconciliationCanceled,
        }
    }

    fn cancel_resource(&self) {
        // Only from Running; never downgrades a canceled reconciliation.
        let _ = self.0.compare_exchange(
            RUNNING,
            RESOURCE_CANCELED,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    fn cancel_reconciliation(&self) {
        self.0.store(RECONCILIATION_CANCELED, Ordering::SeqCst);
    }

    fn reset_resource(&self) {
        let _ = self.0.compare_exchange(
            RESOURCE_CANCELED,
            RUNNING,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }
}

/// Handle for setting cancellation signals from outside the pass
#[derive(Debug, Clone)]
pub struct CancelHandle {
    cell: Arc<CancelCell>,
}

impl CancelHandle {
    /// Skip the remaining steps of the handler currently executing
    pub fn cancel_resource(&self) {
        self.cell.cancel_resource();
    }

    /// Stop the whole pass before its next step
    pub fn cancel_reconciliation(&self) {
        self.cell.cancel_reconciliation();
    }

    pub fn state(&self) -> Cancellation {
        self.cell.load()
    }
}

/// Request-scoped context for one reconciliation pass
///
/// Cloning is cheap. Clones and contexts derived with [`Context::with_meta`]
/// share the same cancellation state.
#[derive(Debug, Clone, Default)]
pub struct Context {
    cancel: Arc<CancelCell>,
    meta: Arc<Vec<(String, String)>>,
}

impl Context {
    /// Create a fresh context with no metadata and no cancellation set
    pub fn background() -> Self {
        Self::default()
    }

    /// Derive a context with an additional (or replaced) metadata entry
    pub fn with_meta(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();

        let mut meta: Vec<(String, String)> = self
            .meta
            .iter()
            .filter(|(k, _)| *k != key)
            .cloned()
            .collect();
        meta.push((key, value));

        Self {
            cancel: Arc::clone(&self.cancel),
            meta: Arc::new(meta),
        }
    }

    /// Look up a metadata value
    pub fn meta(&self, key: &str) -> Option<&str> {
        self.meta
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// All metadata entries in insertion order
    pub fn meta_entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.meta.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn cancellation(&self) -> Cancellation {
        self.cancel.load()
    }

    pub fn is_reconciliation_canceled(&self) -> bool {
        self.cancellation() == Cancellation::ReconciliationCanceled
    }

    pub fn is_resource_canceled(&self) -> bool {
        self.cancellation() == Cancellation::ResourceCanceled
    }

    /// Skip the remaining steps of the current handler
    pub fn cancel_resource(&self) {
        self.cancel.cancel_resource();
    }

    /// Stop the whole pass
    pub fn cancel_reconciliation(&self) {
        self.cancel.cancel_reconciliation();
    }

    /// Clear a resource cancellation once the engine has acted on it
    pub(crate) fn reset_resource(&self) {
        self.cancel.reset_resource();
    }

    /// Get a handle that can cancel this pass from another thread
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            cell: Arc::clone(&self.cancel),
        }
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.meta.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{key}={value}")?;
        }
        Ok(())
    }
}
