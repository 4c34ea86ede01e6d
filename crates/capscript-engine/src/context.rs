//! Per-execution script context.
//!
//! A [`ScriptContext`] owns the QuickJS runtime and context for exactly one
//! execution, together with the pending-settlement table and the completion
//! channel native tasks report back on. It is created on the script thread
//! and never leaves it; only the completion channel's sender half crosses
//! threads.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::mpsc;
use std::sync::Arc;

use capscript_core::{CapabilitySet, ScriptValue};
use rquickjs::function::Rest;
use rquickjs::{Context, Ctx, Function, IntoJs, Object, Runtime, Value};
use tracing::{debug, warn};

use crate::bridge::{self, Completion};
use crate::convert::js_to_value;
use crate::error::{internal, EngineError, EngineResult};
use crate::sink::LogSink;

/// Force a closure to be higher-ranked over a single `'js` so its `Ctx`
/// and `Value` arguments share one lifetime; without it each `'_` is
/// inferred independently and `js_to_value` fails to type-check.
fn bind_log_fn<F>(f: F) -> F
where
    F: for<'js> Fn(Ctx<'js>, Rest<Value<'js>>) -> rquickjs::Result<()>,
{
    f
}

/// Same unification for the driver's settlement callback.
fn bind_done_fn<F>(f: F) -> F
where
    F: for<'js> Fn(Ctx<'js>, bool, Value<'js>) -> rquickjs::Result<()>,
{
    f
}

/// Global holding the pending-settlement table and promise helpers.
pub(crate) const BRIDGE_GLOBAL: &str = "__capscript";
/// Global holding the script-side capability object.
pub(crate) const API_GLOBAL: &str = "__capscript_api";
/// Global holding the driver's settlement callback.
const DONE_GLOBAL: &str = "__capscript_done";

/// Script-side plumbing installed before any user code runs. The pending
/// table maps settlement handles to their promise's resolve/reject pair, so
/// no per-method globals are ever created.
const PRELUDE: &str = r#"
globalThis.__capscript = (() => {
    const pending = new Map();
    return {
        promise: (handle) => new Promise((resolve, reject) => {
            pending.set(handle, { resolve, reject });
        }),
        settle: (handle, ok, value) => {
            const entry = pending.get(handle);
            if (entry === undefined) {
                return false;
            }
            pending.delete(handle);
            if (ok) {
                entry.resolve(value);
            } else {
                entry.reject(new Error(String(value)));
            }
            return true;
        },
        errmsg: (e) =>
            (e instanceof Error && typeof e.message === "string") ? e.message : String(e),
    };
})();
"#;

/// Mutable per-run bookkeeping shared between the driver and the installed
/// wrapper closures. Lives on the script thread only.
pub(crate) struct RunState {
    /// The entry point's final resolution, set exactly once.
    pub outcome: RefCell<Option<Result<ScriptValue, String>>>,
    /// Number of native capability calls still in flight.
    pub inflight: Cell<usize>,
    /// Sequence counter scoping settlement handles per invocation.
    pub seq: Cell<u64>,
}

pub(crate) struct ScriptContext {
    runtime: Runtime,
    context: Context,
    state: Rc<RunState>,
    completion_tx: mpsc::Sender<Completion>,
    completions: mpsc::Receiver<Completion>,
    sink: Arc<dyn LogSink>,
    tasks: tokio::runtime::Handle,
}

impl ScriptContext {
    /// Build a fresh context with the host globals installed.
    pub fn new(sink: Arc<dyn LogSink>, tasks: tokio::runtime::Handle) -> EngineResult<Self> {
        let runtime = Runtime::new()
            .map_err(|err| EngineError::ContextNotInitialized(err.to_string()))?;
        let context = Context::full(&runtime)
            .map_err(|err| EngineError::ContextNotInitialized(err.to_string()))?;

        let (completion_tx, completions) = mpsc::channel();
        let this = Self {
            runtime,
            context,
            state: Rc::new(RunState {
                outcome: RefCell::new(None),
                inflight: Cell::new(0),
                seq: Cell::new(0),
            }),
            completion_tx,
            completions,
            sink,
            tasks,
        };
        this.install_globals()?;
        Ok(this)
    }

    fn install_globals(&self) -> EngineResult<()> {
        let sink = self.sink.clone();
        self.context.with(|ctx| -> EngineResult<()> {
            ctx.eval::<Value, _>(PRELUDE).map_err(internal)?;

            let log = Function::new(
                ctx.clone(),
                bind_log_fn(move |ctx, args| {
                    let mut parts = Vec::with_capacity(args.0.len());
                    for value in args.0 {
                        parts.push(js_to_value(&ctx, value)?.to_string());
                    }
                    sink.log(&parts.join(" "));
                    Ok(())
                }),
            )
            .map_err(internal)?;

            let globals = ctx.globals();
            globals.set("log", log.clone()).map_err(internal)?;
            let console = Object::new(ctx.clone()).map_err(internal)?;
            console.set("log", log).map_err(internal)?;
            globals.set("console", console).map_err(internal)?;
            Ok(())
        })
    }

    /// Install the capability object derived from `caps`.
    pub fn install_capabilities(&self, caps: &CapabilitySet) -> EngineResult<()> {
        self.context.with(|ctx| {
            bridge::install_api(
                &ctx,
                caps,
                &self.state,
                &self.completion_tx,
                &self.tasks,
            )
        })?;
        debug!(capabilities = caps.len(), "capability object installed");
        Ok(())
    }

    /// Evaluate the snippet source at the top level.
    pub fn evaluate(&self, source: &str) -> EngineResult<()> {
        self.context.with(|ctx| match ctx.eval::<Value, _>(source) {
            Ok(_) => Ok(()),
            Err(err) => Err(EngineError::ScriptEvaluationFailed(exception_text(
                &ctx, err,
            ))),
        })
    }

    /// Locate the entry point and kick it off; its eventual resolution is
    /// captured into [`RunState::outcome`].
    pub fn call_entry_point(&self, entry: &str) -> EngineResult<()> {
        self.context.with(|ctx| -> EngineResult<()> {
            let globals = ctx.globals();
            let target: Value = globals.get(entry).map_err(internal)?;
            if target.as_function().is_none() {
                return Err(EngineError::EntryPointNotFound(entry.to_string()));
            }

            let state = self.state.clone();
            let done = Function::new(
                ctx.clone(),
                bind_done_fn(move |ctx, ok, value| {
                    let mut slot = state.outcome.borrow_mut();
                    if slot.is_some() {
                        return Ok(());
                    }
                    let outcome = if ok {
                        Ok(js_to_value(&ctx, value)?)
                    } else {
                        Err(value
                            .as_string()
                            .and_then(|s| s.to_string().ok())
                            .unwrap_or_else(|| "unknown script error".to_string()))
                    };
                    *slot = Some(outcome);
                    Ok(())
                }),
            )
            .map_err(internal)?;
            globals.set(DONE_GLOBAL, done).map_err(internal)?;

            // The entry name is quoted as a JSON string so it reaches the
            // runner verbatim.
            let runner = format!(
                r#"(() => {{
                    let result;
                    try {{
                        result = globalThis[{entry}](globalThis.{api});
                    }} catch (e) {{
                        {done}(false, {bridge}.errmsg(e));
                        return;
                    }}
                    Promise.resolve(result).then(
                        (value) => {{ {done}(true, value); }},
                        (e) => {{ {done}(false, {bridge}.errmsg(e)); }}
                    );
                }})();"#,
                entry = serde_json::to_string(entry)
                    .map_err(|err| EngineError::Internal(err.to_string()))?,
                api = API_GLOBAL,
                done = DONE_GLOBAL,
                bridge = BRIDGE_GLOBAL,
            );
            ctx.eval::<Value, _>(runner)
                .map(|_| ())
                .map_err(|err| EngineError::ScriptExecutionFailed(exception_text(&ctx, err)))
        })
    }

    /// Pump microtasks and native completions until the entry point's
    /// promise settles, then return its resolution.
    pub fn drive(&self) -> EngineResult<ScriptValue> {
        loop {
            self.pump_jobs();

            if let Some(outcome) = self.state.outcome.borrow_mut().take() {
                return outcome.map_err(EngineError::ScriptExecutionFailed);
            }

            if self.state.inflight.get() == 0 {
                // Nothing can ever settle the entry promise: no queued jobs
                // and no native work in flight.
                return Err(EngineError::ScriptExecutionFailed(
                    "entry point suspended with no pending capability call".to_string(),
                ));
            }

            match self.completions.recv() {
                Ok(completion) => {
                    self.state.inflight.set(self.state.inflight.get() - 1);
                    self.apply_completion(completion);
                }
                Err(_) => {
                    return Err(EngineError::Internal(
                        "completion channel closed".to_string(),
                    ))
                }
            }
        }
    }

    fn pump_jobs(&self) {
        loop {
            match self.runtime.execute_pending_job() {
                Ok(true) => {}
                Ok(false) => break,
                Err(_) => warn!("script job raised an uncaught exception"),
            }
        }
    }

    /// Settle one bridged promise on the script thread.
    fn apply_completion(&self, completion: Completion) {
        let Completion { handle, outcome } = completion;
        let settled = self.context.with(|ctx| -> rquickjs::Result<bool> {
            let bridge: Object = ctx.globals().get(BRIDGE_GLOBAL)?;
            let settle: Function = bridge.get("settle")?;
            let (ok, payload) = match outcome {
                Ok(value) => (true, crate::convert::value_to_js(&ctx, value)?),
                Err(message) => (false, message.into_js(&ctx)?),
            };
            settle.call::<_, bool>((handle.as_str(), ok, payload))
        });
        match settled {
            Ok(true) => {}
            Ok(false) => {
                warn!(handle = %handle, "discarding settlement for unknown pending promise");
            }
            Err(err) => {
                warn!(handle = %handle, error = %err, "failed to settle bridged promise");
            }
        }
    }
}

/// Extract a readable message from a pending script exception.
pub(crate) fn exception_text(ctx: &Ctx<'_>, err: rquickjs::Error) -> String {
    if !matches!(err, rquickjs::Error::Exception) {
        return err.to_string();
    }
    let exc = ctx.catch();
    if let Some(object) = exc.as_object() {
        if let Ok(message) = object.get::<_, String>("message") {
            return message;
        }
    }
    if let Some(s) = exc.as_string() {
        if let Ok(text) = s.to_string() {
            return text;
        }
    }
    "unknown script exception".to_string()
}
