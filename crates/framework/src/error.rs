//! Error types for the operator framework

use thiserror::Error;

/// Errors raised while configuring or running the framework
#[derive(Debug, Error)]
pub enum Error {
    /// A required dependency was missing or inconsistent at construction
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// No resource set handles the object
    #[error("no resource set handles the object")]
    NoResourceSet,

    /// More than one resource set claims the object
    #[error("too many resource sets handle the object ({0})")]
    TooManyResourceSets(usize),

    /// A resource set failed to prepare the pass context
    #[error("initializing context failed: {0:#}")]
    InitCtx(#[source] anyhow::Error),

    /// The reconciliation pass failed
    #[error(transparent)]
    Reconcile(#[from] reconcile::Error),

    /// Ensuring the custom resource definition failed
    #[error("ensuring custom resource definition failed: {0:#}")]
    Crd(#[source] anyhow::Error),

    /// The watch source reported an error
    #[error("watch failed: {0:#}")]
    Watch(#[source] anyhow::Error),

    /// A watch channel was closed by the watch source
    #[error("watch {0} channel closed")]
    WatchClosed(&'static str),

    /// The event loop gave up; never retried by boot
    #[error(transparent)]
    Fatal(#[from] FatalError),
}

impl Error {
    /// Whether retrying the boot sequence may help
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Error::Fatal(_) | Error::InvalidConfig(_))
    }
}

/// Unrecoverable failure handed back to the hosting process
///
/// The framework never exits the process itself. Entry points are expected
/// to shut down with a non-zero status when they receive one of these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FatalError {
    /// Boot retries were exhausted
    #[error("stopped operator boot retries due to too many errors: {0}")]
    Boot(String),

    /// Event processing retries were exhausted
    #[error("stopped operator event processing retries due to too many errors: {0}")]
    EventLoop(String),
}

/// Result type for framework operations
pub type Result<T> = std::result::Result<T, Error>;
