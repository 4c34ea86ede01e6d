//! Host logging boundary.
//!
//! Script code always has `log(...)` (and `console.log`) available; both
//! forward synchronously to the host's [`LogSink`], fire-and-forget.

/// Receives log lines emitted by script code.
pub trait LogSink: Send + Sync {
    /// Handle one log line.
    fn log(&self, message: &str);
}

/// Default sink: forwards script output to `tracing`.
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, message: &str) {
        tracing::info!(target: "capscript::script", "{}", message);
    }
}
