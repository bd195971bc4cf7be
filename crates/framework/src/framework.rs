//! Operator framework: boot, event loop and serialized dispatch

use crate::crd::{CrdClient, CustomResourceDefinition};
use crate::error::{Error, FatalError, Result};
use crate::informer::{Informer, WatchChannels};
use crate::metrics::{EventHistogram, EventKind};
use crate::router::ResourceRouter;
use crate::shutdown::Shutdown;
use crossbeam_channel::select;
use reconcile::{
    BackoffFactory, Context, default_backoff_factory, retry_notify_when,
};
use std::sync::{Mutex, OnceLock, PoisonError};

/// Value of the `component` logging key for framework log lines
pub const COMPONENT: &str = "operatorkit";

/// Dependencies of a [`Framework`]
pub struct Config<O, S, C> {
    /// Definition ensured at boot; requires `crd_client`
    pub crd: Option<CustomResourceDefinition>,
    pub crd_client: Option<Box<dyn CrdClient>>,
    pub informer: Option<Box<dyn Informer<O>>>,
    pub resource_router: Option<ResourceRouter<O, S, C>>,
    /// Policies for boot, the event loop and CRD creation
    pub backoff_factory: Option<BackoffFactory>,
}

impl<O, S, C> Default for Config<O, S, C> {
    fn default() -> Self {
        Self {
            crd: None,
            crd_client: None,
            informer: None,
            resource_router: None,
            backoff_factory: None,
        }
    }
}

pub struct Framework<O, S, C> {
    crd: Option<(CustomResourceDefinition, Box<dyn CrdClient>)>,
    informer: Box<dyn Informer<O>>,
    router: ResourceRouter<O, S, C>,
    backoff_factory: BackoffFactory,
    booted: OnceLock<std::result::Result<(), FatalError>>,
    dispatch: Mutex<()>,
    metrics: EventHistogram,
}

impl<O, S, C> Framework<O, S, C> {
    pub fn new(config: Config<O, S, C>) -> Result<Self> {
        let crd = match (config.crd, config.crd_client) {
            (Some(crd), Some(client)) => Some((crd, client)),
            (None, None) => None,
            (Some(_), None) => {
                return Err(Error::InvalidConfig(
                    "config.crd_client must not be empty when config.crd is set".to_string(),
                ));
            }
            (None, Some(_)) => {
                return Err(Error::InvalidConfig(
                    "config.crd must not be empty when config.crd_client is set".to_string(),
                ));
            }
        };
        let informer = config
            .informer
            .ok_or_else(|| Error::InvalidConfig("config.informer must not be empty".to_string()))?;
        let router = config.resource_router.ok_or_else(|| {
            Error::InvalidConfig("config.resource_router must not be empty".to_string())
        })?;

        Ok(Self {
            crd,
            informer,
            router,
            backoff_factory: config
                .backoff_factory
                .unwrap_or_else(default_backoff_factory),
            booted: OnceLock::new(),
            dispatch: Mutex::new(()),
            metrics: EventHistogram::new(),
        })
    }

    /// Boot the operator and run the event loop until `shutdown` fires.
    ///
    /// Only the first call runs the boot sequence. Concurrent callers wait for
    /// it and every caller gets the same outcome. An `Err` means the operator
    /// cannot make progress and the host should exit with a non-zero status.
    pub fn boot(&self, shutdown: &Shutdown) -> std::result::Result<(), FatalError> {
        self.booted
            .get_or_init(|| self.boot_with_retry(shutdown))
            .clone()
    }

    pub fn is_booted(&self) -> bool {
        self.booted.get().is_some()
    }

    fn boot_with_retry(&self, shutdown: &Shutdown) -> std::result::Result<(), FatalError> {
        let ctx = log_ctx("boot");
        log::info!("{ctx} action=start booting operator");

        let mut backoff = (self.backoff_factory)();
        let result = retry_notify_when(
            &mut *backoff,
            || self.boot_sequence(shutdown),
            |err: &Error| err.is_retryable() && !shutdown.is_triggered(),
            |err, delay| log::warn!("{ctx} retrying operator boot in {delay:?} due to error ({err})"),
        );

        match result {
            Ok(()) => {
                log::info!("{ctx} action=end operator stopped");
                Ok(())
            }
            Err(Error::Fatal(fatal)) => Err(fatal),
            Err(err) => {
                log::error!("{ctx} stopped operator boot retries due to too many errors ({err})");
                Err(FatalError::Boot(err.to_string()))
            }
        }
    }

    fn boot_sequence(&self, shutdown: &Shutdown) -> Result<()> {
        if let Some((crd, client)) = &self.crd {
            client
                .ensure_created(crd, (self.backoff_factory)())
                .map_err(Error::Crd)?;
            log::debug!("{} ensured custom resource definition {}", log_ctx("boot"), crd.name());
        }

        let channels = self.informer.watch(shutdown).map_err(Error::Watch)?;
        self.process_events(shutdown, &channels)?;
        Ok(())
    }

    /// Run the event loop over `channels`, retrying it on watch errors.
    ///
    /// The retry policy covers one streak of errors: an attempt that
    /// dispatched at least one event resets it, so a long healthy run does not
    /// count against the next transient error.
    pub fn process_events(
        &self,
        shutdown: &Shutdown,
        channels: &WatchChannels<O>,
    ) -> std::result::Result<(), FatalError> {
        let ctx = log_ctx("process_events");
        let mut backoff = (self.backoff_factory)();
        backoff.reset();

        loop {
            let mut dispatched = false;
            let err = match self.event_loop(shutdown, channels, &mut dispatched) {
                Ok(()) => return Ok(()),
                Err(err) => err,
            };

            if dispatched {
                backoff.reset();
            }
            let Some(delay) = backoff.next_backoff() else {
                log::error!("{ctx} stopped event processing retries due to too many errors ({err})");
                return Err(FatalError::EventLoop(err.to_string()));
            };

            log::warn!("{ctx} retrying event processing in {delay:?} due to error ({err})");
            if shutdown.wait_timeout(delay) {
                return Ok(());
            }
        }
    }

    fn event_loop(
        &self,
        shutdown: &Shutdown,
        channels: &WatchChannels<O>,
        dispatched: &mut bool,
    ) -> Result<()> {
        let stop = shutdown.receiver();
        loop {
            if shutdown.is_triggered() {
                return Ok(());
            }

            select! {
                recv(channels.deletes) -> msg => match msg {
                    Ok(obj) => {
                        let _timer = self.metrics.start_timer(EventKind::Delete);
                        *dispatched = true;
                        if let Err(err) = self.delete_func(&obj) {
                            log::error!("{} {err}", event_ctx(EventKind::Delete));
                        }
                    }
                    Err(_) => return closed(shutdown, "delete"),
                },
                recv(channels.updates) -> msg => match msg {
                    Ok(obj) => {
                        let _timer = self.metrics.start_timer(EventKind::Update);
                        *dispatched = true;
                        if let Err(err) = self.update_func(None, &obj) {
                            log::error!("{} {err}", event_ctx(EventKind::Update));
                        }
                    }
                    Err(_) => return closed(shutdown, "update"),
                },
                recv(channels.errors) -> msg => match msg {
                    Ok(err) if shutdown.is_triggered() => {
                        log::debug!("{} ignoring watch error after shutdown ({err:#})", log_ctx("event_loop"));
                        return Ok(());
                    }
                    Ok(err) => return Err(Error::Watch(err)),
                    Err(_) => return closed(shutdown, "error"),
                },
                recv(stop) -> _ => return Ok(()),
            }
        }
    }

    /// Run a delete pass for `obj` under the dispatch lock
    pub fn delete_func(&self, obj: &O) -> Result<()> {
        let _guard = self.dispatch.lock().unwrap_or_else(PoisonError::into_inner);
        self.dispatch(EventKind::Delete, obj)
    }

    /// Run an update pass for `new` under the dispatch lock
    ///
    /// The previous version of the object is accepted for watch sources that
    /// report it, but the pass only looks at the new one.
    pub fn update_func(&self, _old: Option<&O>, new: &O) -> Result<()> {
        let _guard = self.dispatch.lock().unwrap_or_else(PoisonError::into_inner);
        self.dispatch(EventKind::Update, new)
    }

    fn dispatch(&self, kind: EventKind, obj: &O) -> Result<()> {
        let set = self.router.resource_set(obj)?;
        let ctx = set
            .init_ctx(event_ctx(kind), obj)
            .map_err(Error::InitCtx)?;

        log::debug!("{ctx} action=start");
        match kind {
            EventKind::Delete => reconcile::process_delete(&ctx, obj, set.resources())?,
            EventKind::Update => reconcile::process_update(&ctx, obj, set.resources())?,
        }
        log::debug!("{ctx} action=end");
        Ok(())
    }

    /// Processing duration histogram for delete and update events
    pub fn metrics(&self) -> &EventHistogram {
        &self.metrics
    }

    pub fn router(&self) -> &ResourceRouter<O, S, C> {
        &self.router
    }
}

fn log_ctx(function: &str) -> Context {
    Context::background()
        .with_meta("component", COMPONENT)
        .with_meta("function", function)
}

fn event_ctx(kind: EventKind) -> Context {
    Context::background()
        .with_meta("component", COMPONENT)
        .with_meta("event", kind.as_str())
}

fn closed(shutdown: &Shutdown, channel: &'static str) -> Result<()> {
    if shutdown.is_triggered() {
        Ok(())
    } else {
        Err(Error::WatchClosed(channel))
    }
}
