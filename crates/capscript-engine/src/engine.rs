//! The execution driver.
//!
//! [`ScriptEngine::execute`] is the host's single entry point: it builds a
//! fresh script context, registers the handler's capabilities, evaluates
//! the snippet, invokes its entry point, and marshals the settled result
//! into the caller's requested type.

use std::sync::Arc;

use capscript_core::{CapabilityHandler, CapabilitySet, FromScript, ScriptValue};
use tracing::debug;

use crate::context::ScriptContext;
use crate::error::{EngineError, EngineResult};
use crate::sink::{LogSink, TracingSink};

/// The well-known entry-point function name.
pub const ENTRY_POINT: &str = "handle";

/// Executes snippets against a capability handler.
///
/// The engine itself is cheap and reusable; every execution gets its own
/// single-use script context, so no state leaks between runs.
pub struct ScriptEngine {
    sink: Arc<dyn LogSink>,
}

impl ScriptEngine {
    /// Engine with script logging forwarded to `tracing`.
    pub fn new() -> Self {
        Self {
            sink: Arc::new(TracingSink),
        }
    }

    /// Engine with a custom log sink.
    pub fn with_log_sink(sink: Arc<dyn LogSink>) -> Self {
        Self { sink }
    }

    /// Execute `source`, invoking its `handle` function with the handler's
    /// capability object, and marshal the settled result into `T`.
    pub async fn execute<T>(
        &self,
        source: &str,
        handler: &dyn CapabilityHandler,
    ) -> EngineResult<T>
    where
        T: FromScript + Send + 'static,
    {
        self.execute_entry(source, ENTRY_POINT, handler).await
    }

    /// Like [`execute`](Self::execute) with a custom entry-point name.
    pub async fn execute_entry<T>(
        &self,
        source: &str,
        entry_point: &str,
        handler: &dyn CapabilityHandler,
    ) -> EngineResult<T>
    where
        T: FromScript + Send + 'static,
    {
        // Duplicate capability names fail here, before any script runs.
        let caps = CapabilitySet::from_handler(handler)?;

        let source = source.to_string();
        let entry = entry_point.to_string();
        let sink = self.sink.clone();
        let tasks = tokio::runtime::Handle::current();

        let value = tokio::task::spawn_blocking(move || {
            run_script(&source, &entry, &caps, sink, tasks)
        })
        .await
        .map_err(|err| EngineError::Internal(format!("script thread terminated: {err}")))??;

        Ok(T::from_script(value)?)
    }
}

impl Default for ScriptEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// One full execution on the dedicated script thread.
fn run_script(
    source: &str,
    entry: &str,
    caps: &CapabilitySet,
    sink: Arc<dyn LogSink>,
    tasks: tokio::runtime::Handle,
) -> EngineResult<ScriptValue> {
    let context = ScriptContext::new(sink, tasks)?;
    context.install_capabilities(caps)?;
    context.evaluate(source)?;
    context.call_entry_point(entry)?;
    let value = context.drive()?;
    debug!(kind = value.kind_name(), "entry point settled");
    Ok(value)
}
