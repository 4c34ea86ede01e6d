//! Error types for the execution engine.

use capscript_core::{MarshalError, RegistryError};
use thiserror::Error;

/// Errors that can occur while executing a script.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The underlying script runtime could not be constructed.
    #[error("script context could not be initialized: {0}")]
    ContextNotInitialized(String),

    /// Two capabilities were registered under the same name.
    #[error("duplicate capability: {0}")]
    DuplicateCapability(String),

    /// The script does not define the expected entry-point function.
    #[error("entry point '{0}' not found in script")]
    EntryPointNotFound(String),

    /// Top-level evaluation of the script source raised an error.
    #[error("script evaluation failed: {0}")]
    ScriptEvaluationFailed(String),

    /// The entry point's promise rejected (or can never settle).
    #[error("script execution failed: {0}")]
    ScriptExecutionFailed(String),

    /// The settled value could not be marshalled into the requested type.
    #[error(transparent)]
    Marshal(#[from] MarshalError),

    /// Engine plumbing failure.
    #[error("engine error: {0}")]
    Internal(String),
}

impl From<RegistryError> for EngineError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::DuplicateCapability(name) => EngineError::DuplicateCapability(name),
        }
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = std::result::Result<T, EngineError>;

pub(crate) fn internal(err: rquickjs::Error) -> EngineError {
    EngineError::Internal(err.to_string())
}
