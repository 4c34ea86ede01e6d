//! # capscript-engine
//!
//! Embeds a QuickJS runtime and bridges script code to native asynchronous
//! capabilities.
//!
//! This crate provides:
//! - A per-execution script context with host logging installed
//! - The async bridge: every registered [`AsyncCapability`] becomes a
//!   promise-returning function on the script-side capability object
//! - The execution driver: [`ScriptEngine::execute`] evaluates a snippet,
//!   invokes its `handle` entry point, and marshals the settled result into
//!   a typed native value
//!
//! ## Threading Model
//!
//! Each execution owns one script context, driven from a dedicated blocking
//! thread. Native capability work runs on tokio tasks; completions are
//! posted back over a channel and promises are settled only on the script
//! thread. No other synchronization is needed.
//!
//! ## Example
//!
//! ```ignore
//! let engine = ScriptEngine::new();
//! let path: String = engine
//!     .execute(
//!         "async function handle(api) { return await api.openFolder(); }",
//!         &handler,
//!     )
//!     .await?;
//! ```
//!
//! [`AsyncCapability`]: capscript_core::AsyncCapability

mod bridge;
mod context;
mod convert;

pub mod engine;
pub mod error;
pub mod sink;

pub use engine::{ScriptEngine, ENTRY_POINT};
pub use error::{EngineError, EngineResult};
pub use sink::{LogSink, TracingSink};
