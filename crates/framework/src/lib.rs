//! # Framework
//!
//! Runtime for operators built on the [`reconcile`] engine.
//!
//! The [`Framework`] boots once, ensures the operator's custom resource
//! definition, starts an [`Informer`] and runs a single event loop over its
//! delete, update and error channels. Every event is routed to exactly one
//! [`ResourceSet`] and reconciled under a dispatch lock, so handler chains
//! never run concurrently.
//!
//! Failure handling has three layers: handlers retry their own operations
//! (see [`reconcile::RetryResource`]), the event loop restarts on watch
//! errors, and boot restarts on setup errors. When the outer layers run out
//! of retries, [`Framework::boot`] returns a [`FatalError`] and the host
//! decides how to exit.

pub mod crd;
pub mod error;
pub mod framework;
pub mod informer;
pub mod metrics;
pub mod router;
pub mod shutdown;

#[cfg(test)]
mod testing;

pub use crd::{CrdClient, CustomResourceDefinition, Scope};
pub use error::{Error, FatalError, Result};
pub use framework::{COMPONENT, Config, Framework};
pub use informer::{Informer, WatchChannels, WatchSenders, channels};
pub use metrics::{EventHistogram, EventKind, HistogramSnapshot};
pub use router::{BasicResourceSet, BoxedResourceSet, ResourceRouter, ResourceSet};
pub use shutdown::Shutdown;
