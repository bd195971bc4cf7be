//! Reconciliation engine - runs a handler chain for one object
//!
//! Every handler goes through the same pipeline: current state, desired
//! state, patch, then the create, delete and update changes the patch
//! carries. Both cancellation signals are checked before every step.

use crate::context::{Cancellation, Context};
use crate::error::{Error, Result};
use crate::patch::{ChangeKind, Patch};
use crate::resource::{BoxedResource, Operation, Resource};

/// Which patch a pass asks its handlers for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PatchKind {
    Update,
    Delete,
}

/// What the chain does after a handler's pipeline stops
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    NextResource,
    StopPass,
}

/// Reconcile an updated (or newly observed) object.
///
/// Runs every handler with its update patch. Cancellation is not an error:
/// a canceled pass returns `Ok(())`.
///
/// # Example
///
/// ```ignore
/// let ctx = Context::background().with_meta("object", &obj.name);
/// reconcile::process_update(&ctx, &obj, resource_set.resources())?;
/// ```
pub fn process_update<O, S, C>(
    ctx: &Context,
    obj: &O,
    resources: &[BoxedResource<O, S, C>],
) -> Result<()> {
    process(ctx, obj, resources, PatchKind::Update)
}

/// Reconcile an object that is being deleted.
///
/// Same pipeline as [`process_update`], using each handler's delete patch.
pub fn process_delete<O, S, C>(
    ctx: &Context,
    obj: &O,
    resources: &[BoxedResource<O, S, C>],
) -> Result<()> {
    process(ctx, obj, resources, PatchKind::Delete)
}

fn process<O, S, C>(
    ctx: &Context,
    obj: &O,
    resources: &[BoxedResource<O, S, C>],
    kind: PatchKind,
) -> Result<()> {
    if resources.is_empty() {
        return Err(Error::ExecutionFailed(
            "resources must not be empty".to_string(),
        ));
    }

    for resource in resources {
        match run_pipeline(ctx, obj, resource.as_ref(), kind)? {
            Flow::NextResource => continue,
            Flow::StopPass => return Ok(()),
        }
    }

    Ok(())
}

/// Check the cancellation signals before a step.
///
/// A resource cancellation is cleared as soon as it is observed so it only
/// affects the handler that was running.
fn interrupted(ctx: &Context) -> Option<Flow> {
    match ctx.cancellation() {
        Cancellation::Running => None,
        Cancellation::ResourceCanceled => {
            ctx.reset_resource();
            Some(Flow::NextResource)
        }
        Cancellation::ReconciliationCanceled => Some(Flow::StopPass),
    }
}

fn run_pipeline<O, S, C>(
    ctx: &Context,
    obj: &O,
    resource: &dyn Resource<O, S, C>,
    kind: PatchKind,
) -> Result<Flow> {
    let ctx = ctx.with_meta("resource", resource.underlying().name());

    if let Some(flow) = interrupted(&ctx) {
        return Ok(flow);
    }
    let current = call(&ctx, resource, Operation::GetCurrentState, |ctx| {
        resource.current_state(ctx, obj)
    })?;

    if let Some(flow) = interrupted(&ctx) {
        return Ok(flow);
    }
    let desired = call(&ctx, resource, Operation::GetDesiredState, |ctx| {
        resource.desired_state(ctx, obj)
    })?;

    if let Some(flow) = interrupted(&ctx) {
        return Ok(flow);
    }
    let patch: Option<Patch<C>> = match kind {
        PatchKind::Update => call(&ctx, resource, Operation::NewUpdatePatch, |ctx| {
            resource.new_update_patch(ctx, obj, &current, &desired)
        })?,
        PatchKind::Delete => call(&ctx, resource, Operation::NewDeletePatch, |ctx| {
            resource.new_delete_patch(ctx, obj, &current, &desired)
        })?,
    };

    for change_kind in ChangeKind::ALL {
        if let Some(flow) = interrupted(&ctx) {
            return Ok(flow);
        }

        let Some(change) = patch.as_ref().and_then(|p| p.change(change_kind)) else {
            continue;
        };

        match change_kind {
            ChangeKind::Create => call(&ctx, resource, Operation::ApplyCreateChange, |ctx| {
                resource.apply_create_change(ctx, obj, change)
            })?,
            ChangeKind::Delete => call(&ctx, resource, Operation::ApplyDeleteChange, |ctx| {
                resource.apply_delete_change(ctx, obj, change)
            })?,
            ChangeKind::Update => call(&ctx, resource, Operation::ApplyUpdateChange, |ctx| {
                resource.apply_update_change(ctx, obj, change)
            })?,
        }
    }

    // A signal raised during the last step belongs to this handler only.
    Ok(interrupted(&ctx).unwrap_or(Flow::NextResource))
}

/// Run one handler operation with `function=<operation>` in the log metadata
fn call<O, S, C, T>(
    ctx: &Context,
    resource: &dyn Resource<O, S, C>,
    operation: Operation,
    f: impl FnOnce(&Context) -> anyhow::Result<T>,
) -> Result<T> {
    let ctx = ctx.with_meta("function", operation.as_str());
    log::debug!("{ctx} action=start");

    let result =
        f(&ctx).map_err(|e| Error::resource(resource.underlying().name(), operation, e));

    log::debug!("{ctx} action=end");
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockResource, call_log, calls};

    fn chain(resources: Vec<MockResource>) -> Vec<BoxedResource<String, u32, String>> {
        resources
            .into_iter()
            .map(|r| Box::new(r) as BoxedResource<String, u32, String>)
            .collect()
    }

    fn full_patch() -> Patch<String> {
        Patch::new()
            .with_create("c".into())
            .with_delete("d".into())
            .with_update("u".into())
    }

    #[test]
    fn test_empty_chain_fails() {
        let resources: Vec<BoxedResource<String, u32, String>> = Vec::new();
        let err = process_update(&Context::background(), &"obj".to_string(), &resources)
            .unwrap_err();
        assert!(err.is_execution_failed());

        let err = process_delete(&Context::background(), &"obj".to_string(), &resources)
            .unwrap_err();
        assert!(err.is_execution_failed());
    }

    #[test]
    fn test_update_visits_all_steps_in_order() {
        let log = call_log();
        let resources = chain(vec![
            MockResource::new("a", &log).with_patch(full_patch()),
            MockResource::new("b", &log),
        ]);

        process_update(&Context::background(), &"obj".to_string(), &resources).unwrap();

        assert_eq!(
            calls(&log),
            vec![
                "a.get_current_state",
                "a.get_desired_state",
                "a.new_update_patch",
                "a.apply_create_change",
                "a.apply_delete_change",
                "a.apply_update_change",
                "b.get_current_state",
                "b.get_desired_state",
                "b.new_update_patch",
            ]
        );
    }

    #[test]
    fn test_delete_uses_delete_patch() {
        let log = call_log();
        let resources = chain(vec![
            MockResource::new("a", &log).with_patch(Patch::new().with_delete("d".into())),
        ]);

        process_delete(&Context::background(), &"obj".to_string(), &resources).unwrap();

        assert_eq!(
            calls(&log),
            vec![
                "a.get_current_state",
                "a.get_desired_state",
                "a.new_delete_patch",
                "a.apply_delete_change",
            ]
        );
    }

    #[test]
    fn test_delete_visits_all_change_kinds_in_order() {
        let log = call_log();
        let resources = chain(vec![
            MockResource::new("a", &log).with_patch(full_patch()),
            MockResource::new("b", &log),
        ]);

        process_delete(&Context::background(), &"obj".to_string(), &resources).unwrap();

        assert_eq!(
            calls(&log),
            vec![
                "a.get_current_state",
                "a.get_desired_state",
                "a.new_delete_patch",
                "a.apply_create_change",
                "a.apply_delete_change",
                "a.apply_update_change",
                "b.get_current_state",
                "b.get_desired_state",
                "b.new_delete_patch",
            ]
        );
    }

    #[test]
    fn test_applies_only_present_kinds() {
        let log = call_log();
        let resources = chain(vec![
            MockResource::new("a", &log)
                .with_patch(Patch::new().with_update("u".into()).with_create("c".into())),
        ]);

        process_update(&Context::background(), &"obj".to_string(), &resources).unwrap();

        let log = calls(&log);
        assert!(log.contains(&"a.apply_create_change".to_string()));
        assert!(!log.contains(&"a.apply_delete_change".to_string()));
        assert_eq!(log.last().unwrap(), "a.apply_update_change");
    }

    #[test]
    fn test_empty_patch_skips_applies() {
        let log = call_log();
        let resources = chain(vec![MockResource::new("a", &log).with_patch(Patch::new())]);

        process_update(&Context::background(), &"obj".to_string(), &resources).unwrap();

        assert_eq!(calls(&log).len(), 3);
    }

    #[test]
    fn test_error_aborts_whole_pass() {
        let log = call_log();
        let resources = chain(vec![
            MockResource::new("a", &log).failing(Operation::GetDesiredState),
            MockResource::new("b", &log),
        ]);

        let err =
            process_update(&Context::background(), &"obj".to_string(), &resources).unwrap_err();

        match &err {
            Error::Resource {
                resource,
                operation,
                ..
            } => {
                assert_eq!(resource, "a");
                assert_eq!(*operation, Operation::GetDesiredState);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(calls(&log), vec!["a.get_current_state", "a.get_desired_state"]);
    }

    #[test]
    fn test_canceled_before_start_runs_nothing() {
        let log = call_log();
        let resources = chain(vec![MockResource::new("a", &log)]);
        let ctx = Context::background();
        ctx.cancel_reconciliation();

        process_update(&ctx, &"obj".to_string(), &resources).unwrap();

        assert!(calls(&log).is_empty());
    }

    #[test]
    fn test_reconciliation_cancel_stops_chain() {
        let log = call_log();
        let resources = chain(vec![
            MockResource::new("a", &log)
                .with_patch(full_patch())
                .canceling(Operation::GetDesiredState, Cancellation::ReconciliationCanceled),
            MockResource::new("b", &log),
        ]);
        let ctx = Context::background();

        process_update(&ctx, &"obj".to_string(), &resources).unwrap();

        assert_eq!(calls(&log), vec!["a.get_current_state", "a.get_desired_state"]);
        assert!(ctx.is_reconciliation_canceled());
    }

    #[test]
    fn test_resource_cancel_skips_to_next_handler() {
        let log = call_log();
        let resources = chain(vec![
            MockResource::new("a", &log)
                .with_patch(full_patch())
                .canceling(Operation::ApplyCreateChange, Cancellation::ResourceCanceled),
            MockResource::new("b", &log).with_patch(Patch::new().with_update("u".into())),
        ]);
        let ctx = Context::background();

        process_update(&ctx, &"obj".to_string(), &resources).unwrap();

        assert_eq!(
            calls(&log),
            vec![
                "a.get_current_state",
                "a.get_desired_state",
                "a.new_update_patch",
                "a.apply_create_change",
                "b.get_current_state",
                "b.get_desired_state",
                "b.new_update_patch",
                "b.apply_update_change",
            ]
        );
        assert_eq!(ctx.cancellation(), Cancellation::Running);
    }

    #[test]
    fn test_resource_cancel_on_last_step_is_cleared() {
        let log = call_log();
        let resources = chain(vec![
            MockResource::new("a", &log)
                .with_patch(Patch::new().with_update("u".into()))
                .canceling(Operation::ApplyUpdateChange, Cancellation::ResourceCanceled),
            MockResource::new("b", &log),
        ]);
        let ctx = Context::background();

        process_update(&ctx, &"obj".to_string(), &resources).unwrap();

        assert_eq!(
            calls(&log),
            vec![
                "a.get_current_state",
                "a.get_desired_state",
                "a.new_update_patch",
                "a.apply_update_change",
                "b.get_current_state",
                "b.get_desired_state",
                "b.new_update_patch",
            ]
        );
        assert_eq!(ctx.cancellation(), Cancellation::Running);
    }

    #[test]
    fn test_error_names_underlying_handler() {
        let log = call_log();
        let resources = chain(vec![
            MockResource::new("volumes", &log).failing(Operation::NewDeletePatch),
        ]);

        let err =
            process_delete(&Context::background(), &"obj".to_string(), &resources).unwrap_err();
        assert!(err.to_string().contains("volumes"));
        assert!(err.root_cause().is_some());
    }
}
