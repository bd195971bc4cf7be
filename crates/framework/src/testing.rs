//! Test doubles shared by the framework tests

use crate::crd::{CrdClient, CustomResourceDefinition};
use crate::informer::{Informer, WatchChannels, WatchSenders, channels};
use crate::shutdown::Shutdown;
use anyhow::{anyhow, bail};
use reconcile::{Backoff, BackoffFactory, ConstantBackoff, Context, Patch, Resource};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

pub fn fast_factory(max_attempts: u32) -> BackoffFactory {
    Arc::new(move || -> Box<dyn Backoff> {
        Box::new(ConstantBackoff::new(Duration::from_millis(1)).with_max_attempts(max_attempts))
    })
}

/// Poll `condition` for up to five seconds
pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}

/// Handler that does nothing
pub struct NoopResource {
    name: String,
}

impl NoopResource {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

impl Resource<String, (), ()> for NoopResource {
    fn name(&self) -> &str {
        &self.name
    }

    fn current_state(&self, _: &Context, _: &String) -> anyhow::Result<()> {
        Ok(())
    }

    fn desired_state(&self, _: &Context, _: &String) -> anyhow::Result<()> {
        Ok(())
    }

    fn new_update_patch(
        &self,
        _: &Context,
        _: &String,
        _: &(),
        _: &(),
    ) -> anyhow::Result<Option<Patch<()>>> {
        Ok(None)
    }

    fn new_delete_patch(
        &self,
        _: &Context,
        _: &String,
        _: &(),
        _: &(),
    ) -> anyhow::Result<Option<Patch<()>>> {
        Ok(None)
    }

    fn apply_create_change(&self, _: &Context, _: &String, _: &()) -> anyhow::Result<()> {
        Ok(())
    }

    fn apply_delete_change(&self, _: &Context, _: &String, _: &()) -> anyhow::Result<()> {
        Ok(())
    }

    fn apply_update_change(&self, _: &Context, _: &String, _: &()) -> anyhow::Result<()> {
        Ok(())
    }

    fn underlying(&self) -> &dyn Resource<String, (), ()> {
        self
    }
}

/// Observations made by [`ProbeResource`]
#[derive(Default)]
pub struct Probe {
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    seen: Mutex<Vec<String>>,
    last_ctx: Mutex<Option<String>>,
}

impl Probe {
    /// `<event>:<object>` for every pass that reached the handler
    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }

    pub fn last_ctx(&self) -> Option<String> {
        self.last_ctx.lock().unwrap().clone()
    }
}

/// Handler that records passes and fails for objects named `fail*`
pub struct ProbeResource {
    probe: Arc<Probe>,
    delay: Duration,
}

impl ProbeResource {
    pub fn new(probe: &Arc<Probe>, delay: Duration) -> Self {
        Self {
            probe: Arc::clone(probe),
            delay,
        }
    }
}

impl Resource<String, (), ()> for ProbeResource {
    fn name(&self) -> &str {
        "probe"
    }

    fn current_state(&self, ctx: &Context, obj: &String) -> anyhow::Result<()> {
        let now = self.probe.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.probe.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let event = ctx.meta("event").unwrap_or("-");
        self.probe.seen.lock().unwrap().push(format!("{event}:{obj}"));
        *self.probe.last_ctx.lock().unwrap() = Some(ctx.to_string());
        thread::sleep(self.delay);

        self.probe.in_flight.fetch_sub(1, Ordering::SeqCst);
        if obj.starts_with("fail") {
            bail!("probe rejected {obj}");
        }
        Ok(())
    }

    fn desired_state(&self, _: &Context, _: &String) -> anyhow::Result<()> {
        Ok(())
    }

    fn new_update_patch(
        &self,
        _: &Context,
        _: &String,
        _: &(),
        _: &(),
    ) -> anyhow::Result<Option<Patch<()>>> {
        Ok(Some(Patch::new().with_update(())))
    }

    fn new_delete_patch(
        &self,
        _: &Context,
        _: &String,
        _: &(),
        _: &(),
    ) -> anyhow::Result<Option<Patch<()>>> {
        Ok(Some(Patch::new().with_delete(())))
    }

    fn apply_create_change(&self, _: &Context, _: &String, _: &()) -> anyhow::Result<()> {
        Ok(())
    }

    fn apply_delete_change(&self, _: &Context, _: &String, _: &()) -> anyhow::Result<()> {
        Ok(())
    }

    fn apply_update_change(&self, _: &Context, _: &String, _: &()) -> anyhow::Result<()> {
        Ok(())
    }

    fn underlying(&self) -> &dyn Resource<String, (), ()> {
        self
    }
}

/// Informer whose channels are fed by the test
pub struct ChannelInformer {
    channels: Mutex<Option<WatchChannels<String>>>,
    watch_calls: AtomicU32,
    failures_left: AtomicU32,
}

impl ChannelInformer {
    pub fn new() -> (Self, WatchSenders<String>) {
        let (senders, receivers) = channels();
        let informer = Self {
            channels: Mutex::new(Some(receivers)),
            watch_calls: AtomicU32::new(0),
            failures_left: AtomicU32::new(0),
        };
        (informer, senders)
    }

    /// Fail the first `n` watch calls
    pub fn failing_times(self, n: u32) -> Self {
        self.failures_left.store(n, Ordering::SeqCst);
        self
    }

    pub fn watch_calls(&self) -> u32 {
        self.watch_calls.load(Ordering::SeqCst)
    }
}

impl Informer<String> for ChannelInformer {
    fn watch(&self, _shutdown: &Shutdown) -> anyhow::Result<WatchChannels<String>> {
        self.watch_calls.fetch_add(1, Ordering::SeqCst);
        if self.failures_left.load(Ordering::SeqCst) > 0 {
            self.failures_left.fetch_sub(1, Ordering::SeqCst);
            bail!("watch source unavailable");
        }
        self.channels
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| anyhow!("already watching"))
    }
}

/// CRD client that can never create the definition
#[derive(Default)]
pub struct FailingCrdClient {
    pub calls: AtomicU32,
}

impl CrdClient for FailingCrdClient {
    fn ensure_created(
        &self,
        crd: &CustomResourceDefinition,
        _backoff: Box<dyn Backoff>,
    ) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        bail!("cannot create {}", crd.name())
    }
}
