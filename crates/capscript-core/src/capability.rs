//! Capability declaration: descriptors, invocation arguments, and the
//! native implementation traits.
//!
//! A capability is one native operation exposed to script code. The
//! descriptor is the declarative surface the engine generates wrappers
//! from; the implementation is a [`SyncCapability`] or [`AsyncCapability`]
//! trait object (or a plain closure wrapped through the adapters on
//! [`CapabilityEntry`]).

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::marshal::{FromScript, MarshalError};
use crate::value::ScriptValue;

/// Declared type of a capability parameter or return value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// Accepts any script value.
    Any,
    /// Boolean.
    Bool,
    /// Integer number.
    Int,
    /// Floating point number (integers are accepted).
    Float,
    /// String.
    String,
    /// Ordered sequence.
    Array,
    /// String-keyed mapping.
    Object,
}

impl ValueKind {
    /// Whether `value` satisfies this declared kind.
    pub fn matches(self, value: &ScriptValue) -> bool {
        match self {
            ValueKind::Any => true,
            ValueKind::Bool => matches!(value, ScriptValue::Bool(_)),
            ValueKind::Int => matches!(value, ScriptValue::Int(_)),
            ValueKind::Float => matches!(value, ScriptValue::Int(_) | ScriptValue::Float(_)),
            ValueKind::String => matches!(value, ScriptValue::String(_)),
            ValueKind::Array => matches!(value, ScriptValue::Array(_)),
            ValueKind::Object => matches!(value, ScriptValue::Object(_)),
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Any => "any",
            ValueKind::Bool => "bool",
            ValueKind::Int => "int",
            ValueKind::Float => "float",
            ValueKind::String => "string",
            ValueKind::Array => "array",
            ValueKind::Object => "object",
        };
        write!(f, "{name}")
    }
}

/// One declared parameter of a capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    /// Parameter name, used in diagnostics.
    pub name: String,
    /// Declared kind the bridge validates arguments against.
    pub kind: ValueKind,
}

/// Declarative description of one native method exposed to scripts.
///
/// The method name is unique within a capability set and is also the
/// script-visible name. Descriptors are derived once at registration time
/// and immutable thereafter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityDescriptor {
    /// Script-visible method name.
    pub name: String,
    /// Ordered parameter list.
    pub params: Vec<ParamSpec>,
    /// Declared return kind.
    pub returns: ValueKind,
    /// Whether the native implementation is asynchronous.
    pub is_async: bool,
}

impl CapabilityDescriptor {
    /// Describe an asynchronous method; the engine exposes it to scripts as
    /// a promise-returning wrapper.
    pub fn asynchronous(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            returns: ValueKind::Any,
            is_async: true,
        }
    }

    /// Describe a synchronous method; the engine exposes it to scripts as a
    /// direct call.
    pub fn synchronous(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            returns: ValueKind::Any,
            is_async: false,
        }
    }

    /// Append a declared parameter.
    pub fn param(mut self, name: impl Into<String>, kind: ValueKind) -> Self {
        self.params.push(ParamSpec {
            name: name.into(),
            kind,
        });
        self
    }

    /// Set the declared return kind.
    pub fn returns(mut self, kind: ValueKind) -> Self {
        self.returns = kind;
        self
    }

    /// Number of declared parameters.
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Validate marshalled call arguments against the declared parameter
    /// list.
    pub fn check_args(&self, args: &[ScriptValue]) -> CapabilityResult<()> {
        if args.len() != self.arity() {
            return Err(CapabilityError::ArgumentCount {
                capability: self.name.clone(),
                expected: self.arity(),
                got: args.len(),
            });
        }
        for (spec, value) in self.params.iter().zip(args) {
            if !spec.kind.matches(value) {
                return Err(CapabilityError::ArgumentType {
                    capability: self.name.clone(),
                    param: spec.name.clone(),
                    expected: spec.kind,
                    found: value.kind_name().to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Errors raised by capability invocation.
#[derive(Debug, Error)]
pub enum CapabilityError {
    /// Wrong number of call arguments.
    #[error("capability '{capability}' expects {expected} argument(s), got {got}")]
    ArgumentCount {
        /// Capability name.
        capability: String,
        /// Declared arity.
        expected: usize,
        /// Arguments supplied by the script.
        got: usize,
    },

    /// An argument did not match its declared kind.
    #[error("capability '{capability}' parameter '{param}' expects {expected}, got {found}")]
    ArgumentType {
        /// Capability name.
        capability: String,
        /// Parameter name.
        param: String,
        /// Declared kind.
        expected: ValueKind,
        /// Kind the script supplied.
        found: String,
    },

    /// The native implementation failed; the message becomes the script-side
    /// rejection reason.
    #[error("{0}")]
    Failed(String),

    /// Marshalling failed inside the implementation.
    #[error(transparent)]
    Marshal(#[from] MarshalError),
}

impl CapabilityError {
    /// Shorthand for a native implementation failure.
    pub fn failed(message: impl Into<String>) -> Self {
        CapabilityError::Failed(message.into())
    }
}

/// Result type for capability invocation.
pub type CapabilityResult<T> = std::result::Result<T, CapabilityError>;

/// Marshalled arguments passed to a capability implementation.
#[derive(Debug, Clone, Default)]
pub struct CapabilityArgs {
    values: Vec<ScriptValue>,
}

impl CapabilityArgs {
    /// Wrap already-marshalled argument values.
    pub fn new(values: Vec<ScriptValue>) -> Self {
        Self { values }
    }

    /// Narrow the argument at `index` into a native type.
    pub fn get<T: FromScript>(&self, index: usize) -> CapabilityResult<T> {
        let value = self
            .values
            .get(index)
            .cloned()
            .unwrap_or(ScriptValue::Undefined);
        Ok(T::from_script(value)?)
    }

    /// Number of arguments.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the call had no arguments.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Consume into the raw argument values.
    pub fn into_inner(self) -> Vec<ScriptValue> {
        self.values
    }
}

/// A native method with a synchronous implementation, exposed to scripts as
/// a direct call.
pub trait SyncCapability: Send + Sync {
    /// Declarative surface of this method.
    fn descriptor(&self) -> CapabilityDescriptor;

    /// Execute the method on the script thread.
    fn invoke(&self, args: CapabilityArgs) -> CapabilityResult<ScriptValue>;
}

/// A native method with an asynchronous implementation, exposed to scripts
/// as a promise-returning wrapper.
#[async_trait]
pub trait AsyncCapability: Send + Sync {
    /// Declarative surface of this method.
    fn descriptor(&self) -> CapabilityDescriptor;

    /// Execute the method on a concurrency task.
    async fn invoke(&self, args: CapabilityArgs) -> CapabilityResult<ScriptValue>;
}

/// One registered capability: the descriptor plus its implementation.
#[derive(Clone)]
pub enum CapabilityEntry {
    /// Synchronous implementation.
    Sync(Arc<dyn SyncCapability>),
    /// Asynchronous implementation.
    Async(Arc<dyn AsyncCapability>),
}

impl CapabilityEntry {
    /// Build an asynchronous entry from a closure.
    ///
    /// The descriptor's async flag is forced on to match the
    /// implementation.
    pub fn async_fn<F, Fut>(descriptor: CapabilityDescriptor, f: F) -> Self
    where
        F: Fn(CapabilityArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CapabilityResult<ScriptValue>> + Send + 'static,
    {
        let mut descriptor = descriptor;
        descriptor.is_async = true;
        CapabilityEntry::Async(Arc::new(AsyncFnCapability { descriptor, f }))
    }

    /// Build a synchronous entry from a closure.
    pub fn sync_fn<F>(descriptor: CapabilityDescriptor, f: F) -> Self
    where
        F: Fn(CapabilityArgs) -> CapabilityResult<ScriptValue> + Send + Sync + 'static,
    {
        let mut descriptor = descriptor;
        descriptor.is_async = false;
        CapabilityEntry::Sync(Arc::new(SyncFnCapability { descriptor, f }))
    }

    /// Declarative surface of this entry.
    pub fn descriptor(&self) -> CapabilityDescriptor {
        match self {
            CapabilityEntry::Sync(cap) => cap.descriptor(),
            CapabilityEntry::Async(cap) => cap.descriptor(),
        }
    }

    /// Script-visible method name.
    pub fn name(&self) -> String {
        self.descriptor().name
    }
}

struct AsyncFnCapability<F> {
    descriptor: CapabilityDescriptor,
    f: F,
}

#[async_trait]
impl<F, Fut> AsyncCapability for AsyncFnCapability<F>
where
    F: Fn(CapabilityArgs) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = CapabilityResult<ScriptValue>> + Send + 'static,
{
    fn descriptor(&self) -> CapabilityDescriptor {
        self.descriptor.clone()
    }

    async fn invoke(&self, args: CapabilityArgs) -> CapabilityResult<ScriptValue> {
        (self.f)(args).await
    }
}

struct SyncFnCapability<F> {
    descriptor: CapabilityDescriptor,
    f: F,
}

impl<F> SyncCapability for SyncFnCapability<F>
where
    F: Fn(CapabilityArgs) -> CapabilityResult<ScriptValue> + Send + Sync + 'static,
{
    fn descriptor(&self) -> CapabilityDescriptor {
        self.descriptor.clone()
    }

    fn invoke(&self, args: CapabilityArgs) -> CapabilityResult<ScriptValue> {
        (self.f)(args)
    }
}
