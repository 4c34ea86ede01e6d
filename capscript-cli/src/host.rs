//! Demo capability surface for the command-line host.
//!
//! These implementations stand in for the pickers and UI actions a
//! graphical host would provide: the "folder picker" answers with the
//! current directory, the color setter records the last color and logs it.

use std::sync::{Arc, Mutex};

use capscript_core::{
    CapabilityArgs, CapabilityDescriptor, CapabilityEntry, CapabilityError, CapabilityHandler,
    IntoScript, ScriptValue, ValueKind,
};
use tracing::info;

/// Capability handler wired into every snippet the CLI runs.
pub struct SnippetHost {
    editor_color: Arc<Mutex<Option<String>>>,
}

impl SnippetHost {
    pub fn new() -> Self {
        Self {
            editor_color: Arc::new(Mutex::new(None)),
        }
    }

    /// The color most recently set by a snippet, if any.
    pub fn editor_color(&self) -> Option<String> {
        self.editor_color.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Default for SnippetHost {
    fn default() -> Self {
        Self::new()
    }
}

impl CapabilityHandler for SnippetHost {
    fn capabilities(&self) -> Vec<CapabilityEntry> {
        let editor_color = self.editor_color.clone();
        vec![
            CapabilityEntry::async_fn(
                CapabilityDescriptor::asynchronous("openFolder").returns(ValueKind::String),
                |_args| async {
                    let dir = std::env::current_dir()
                        .map_err(|err| CapabilityError::failed(err.to_string()))?;
                    Ok(dir.to_string_lossy().into_owned().into_script())
                },
            ),
            CapabilityEntry::async_fn(
                CapabilityDescriptor::asynchronous("getName")
                    .param("name", ValueKind::String)
                    .returns(ValueKind::String),
                |args: CapabilityArgs| async move {
                    let name: String = args.get(0)?;
                    Ok(name.into_script())
                },
            ),
            CapabilityEntry::async_fn(
                CapabilityDescriptor::asynchronous("pickColor").returns(ValueKind::String),
                |_args| async { Ok("#3366ff".into_script()) },
            ),
            CapabilityEntry::sync_fn(
                CapabilityDescriptor::synchronous("setEditorColor")
                    .param("color", ValueKind::String),
                move |args| {
                    let color: String = args.get(0)?;
                    info!(color = %color, "snippet set editor color");
                    *editor_color.lock().unwrap_or_else(|e| e.into_inner()) = Some(color);
                    Ok(ScriptValue::Undefined)
                },
            ),
        ]
    }
}
