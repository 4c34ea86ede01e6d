//! The async capability bridge.
//!
//! For every registered capability the bridge installs a function on the
//! script-side `api` object, derived mechanically from the capability's
//! descriptor. No per-method glue exists anywhere.
//!
//! Async methods get the promise treatment: the wrapper creates a pending
//! promise (registering its resolve/reject pair in the context's pending
//! table under a handle scoped by method name and sequence number), spawns
//! the native implementation on a tokio task, and returns the promise
//! without blocking. The task posts its result to the completion channel;
//! the driver settles the promise on the script thread.
//!
//! Sync methods are exposed as direct calls; their errors are thrown as
//! script exceptions.

use std::rc::Rc;
use std::sync::mpsc;
use std::sync::Arc;

use capscript_core::{
    AsyncCapability, CapabilityArgs, CapabilityDescriptor, CapabilityEntry, CapabilitySet,
    ScriptValue, SyncCapability,
};
use rquickjs::function::Rest;
use rquickjs::{Ctx, Exception, Function, Object, Value};
use tracing::warn;

use crate::context::{RunState, API_GLOBAL, BRIDGE_GLOBAL};
use crate::convert::{js_to_value, value_to_js};
use crate::error::{internal, EngineResult};

/// Force a capability closure to be higher-ranked over a single `'js`, so
/// its `Ctx`, arguments, and return value all share one lifetime. Without
/// this, each `'_` in the closure signature is inferred as an independent
/// lifetime and the cross-lifetime conversions fail to type-check.
fn bind_cap_fn<F>(f: F) -> F
where
    F: for<'js> Fn(Ctx<'js>, Rest<Value<'js>>) -> rquickjs::Result<Value<'js>>,
{
    f
}

/// One finished native capability call, posted back to the script thread.
pub(crate) struct Completion {
    /// Settlement handle identifying the pending promise.
    pub handle: String,
    /// The native result, already widened, or the rejection reason.
    pub outcome: Result<ScriptValue, String>,
}

/// Build the capability object and store it under [`API_GLOBAL`].
pub(crate) fn install_api(
    ctx: &Ctx<'_>,
    caps: &CapabilitySet,
    state: &Rc<RunState>,
    completion_tx: &mpsc::Sender<Completion>,
    tasks: &tokio::runtime::Handle,
) -> EngineResult<()> {
    let api = Object::new(ctx.clone()).map_err(internal)?;
    for entry in caps.iter() {
        match entry {
            CapabilityEntry::Sync(cap) => install_sync(ctx, &api, cap.clone())?,
            CapabilityEntry::Async(cap) => install_async(
                ctx,
                &api,
                cap.clone(),
                state.clone(),
                completion_tx.clone(),
                tasks.clone(),
            )?,
        }
    }
    ctx.globals().set(API_GLOBAL, api).map_err(internal)?;
    Ok(())
}

fn install_sync<'js>(
    ctx: &Ctx<'js>,
    api: &Object<'js>,
    cap: Arc<dyn SyncCapability>,
) -> EngineResult<()> {
    let descriptor = cap.descriptor();
    let name = descriptor.name.clone();
    let func = Function::new(ctx.clone(), bind_cap_fn(move |ctx, args| {
        let values = marshal_args(&ctx, &descriptor, args.0)?;
        match cap.invoke(CapabilityArgs::new(values)) {
            Ok(value) => value_to_js(&ctx, value),
            Err(err) => Err(Exception::throw_message(&ctx, &err.to_string())),
        }
    }))
    .map_err(internal)?;
    api.set(name.as_str(), func).map_err(internal)?;
    Ok(())
}

fn install_async<'js>(
    ctx: &Ctx<'js>,
    api: &Object<'js>,
    cap: Arc<dyn AsyncCapability>,
    state: Rc<RunState>,
    completion_tx: mpsc::Sender<Completion>,
    tasks: tokio::runtime::Handle,
) -> EngineResult<()> {
    let descriptor = cap.descriptor();
    let name = descriptor.name.clone();
    let func = Function::new(ctx.clone(), bind_cap_fn(move |ctx, args| {
        let values = marshal_args(&ctx, &descriptor, args.0)?;

        // Settlement handles are scoped by method name plus a sequence
        // number, so concurrent calls of one method never collide.
        let seq = state.seq.get();
        state.seq.set(seq + 1);
        let handle = format!("{}#{}", descriptor.name, seq);

        let bridge: Object = ctx.globals().get(BRIDGE_GLOBAL)?;
        let make: Function = bridge.get("promise")?;
        let promise: Value = make.call((handle.as_str(),))?;

        state.inflight.set(state.inflight.get() + 1);
        let cap = cap.clone();
        let completion_tx = completion_tx.clone();
        tasks.spawn(async move {
            let outcome = cap
                .invoke(CapabilityArgs::new(values))
                .await
                .map_err(|err| err.to_string());
            if completion_tx.send(Completion { handle, outcome }).is_err() {
                warn!("discarding capability completion; execution already finished");
            }
        });

        Ok(promise)
    }))
    .map_err(internal)?;
    api.set(name.as_str(), func).map_err(internal)?;
    Ok(())
}

/// Narrow and validate call arguments against the descriptor; violations
/// surface as script exceptions at the call site.
fn marshal_args<'js>(
    ctx: &Ctx<'js>,
    descriptor: &CapabilityDescriptor,
    args: Vec<Value<'js>>,
) -> rquickjs::Result<Vec<ScriptValue>> {
    let mut values = Vec::with_capacity(args.len());
    for value in args {
        values.push(js_to_value(ctx, value)?);
    }
    if let Err(err) = descriptor.check_args(&values) {
        return Err(Exception::throw_message(ctx, &err.to_string()));
    }
    Ok(values)
}
