//! Recording handler used by the crate's unit tests

use crate::context::{Cancellation, Context};
use crate::patch::Patch;
use crate::resource::{Operation, Resource};
use anyhow::{Result, bail};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

pub(crate) type CallLog = Arc<Mutex<Vec<String>>>;

pub(crate) fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub(crate) fn calls(log: &CallLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// Handler that records every call as `<name>.<operation>`
pub(crate) struct MockResource {
    name: String,
    log: CallLog,
    patch: Option<Patch<String>>,
    fail_on: Option<Operation>,
    failures_left: AtomicU32,
    cancel_on: Option<(Operation, Cancellation)>,
}

impl MockResource {
    pub(crate) fn new(name: &str, log: &CallLog) -> Self {
        Self {
            name: name.to_string(),
            log: Arc::clone(log),
            patch: None,
            fail_on: None,
            failures_left: AtomicU32::new(0),
            cancel_on: None,
        }
    }

    pub(crate) fn with_patch(mut self, patch: Patch<String>) -> Self {
        self.patch = Some(patch);
        self
    }

    /// Fail every call to `op`
    pub(crate) fn failing(self, op: Operation) -> Self {
        self.failing_times(op, u32::MAX)
    }

    /// Fail the first `times` calls to `op`, then succeed
    pub(crate) fn failing_times(mut self, op: Operation, times: u32) -> Self {
        self.fail_on = Some(op);
        self.failures_left = AtomicU32::new(times);
        self
    }

    /// Set a cancellation signal while running `op`
    pub(crate) fn canceling(mut self, op: Operation, signal: Cancellation) -> Self {
        self.cancel_on = Some((op, signal));
        self
    }

    fn record(&self, ctx: &Context, op: Operation) -> Result<()> {
        self.log
            .lock()
            .unwrap()
            .push(format!("{}.{}", self.name, op));

        match self.cancel_on {
            Some((cancel_op, Cancellation::ResourceCanceled)) if cancel_op == op => {
                ctx.cancel_resource();
            }
            Some((cancel_op, Cancellation::ReconciliationCanceled)) if cancel_op == op => {
                ctx.cancel_reconciliation();
            }
            _ => {}
        }

        if self.fail_on == Some(op) {
            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                if left != u32::MAX {
                    self.failures_left.store(left - 1, Ordering::SeqCst);
                }
                bail!("{} failed during {}", self.name, op);
            }
        }

        Ok(())
    }
}

impl Resource<String, u32, String> for MockResource {
    fn name(&self) -> &str {
        &self.name
    }

    fn current_state(&self, ctx: &Context, _obj: &String) -> Result<u32> {
        self.record(ctx, Operation::GetCurrentState)?;
        Ok(1)
    }

    fn desired_state(&self, ctx: &Context, _obj: &String) -> Result<u32> {
        self.record(ctx, Operation::GetDesiredState)?;
        Ok(2)
    }

    fn new_update_patch(
        &self,
        ctx: &Context,
        _obj: &String,
        _current: &u32,
        _desired: &u32,
    ) -> Result<Option<Patch<String>>> {
        self.record(ctx, Operation::NewUpdatePatch)?;
        Ok(self.patch.clone())
    }

    fn new_delete_patch(
        &self,
        ctx: &Context,
        _obj: &String,
        _current: &u32,
        _desired: &u32,
    ) -> Result<Option<Patch<String>>> {
        self.record(ctx, Operation::NewDeletePatch)?;
        Ok(self.patch.clone())
    }

    fn apply_create_change(&self, ctx: &Context, _obj: &String, _change: &String) -> Result<()> {
        self.record(ctx, Operation::ApplyCreateChange)
    }

    fn apply_delete_change(&self, ctx: &Context, _obj: &String, _change: &String) -> Result<()> {
        self.record(ctx, Operation::ApplyDeleteChange)
    }

    fn apply_update_change(&self, ctx: &Context, _obj: &String, _change: &String) -> Result<()> {
        self.record(ctx, Operation::ApplyUpdateChange)
    }

    fn underlying(&self) -> &dyn Resource<String, u32, String> {
        self
    }
}
