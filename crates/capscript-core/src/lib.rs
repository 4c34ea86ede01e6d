//! # capscript-core
//!
//! Engine-agnostic building blocks for the capscript snippet engine.
//!
//! This crate provides:
//! - The [`ScriptValue`] tagged union exchanged between script code and
//!   native capabilities
//! - Marshalling between script values and typed native values
//!   ([`FromScript`] / [`IntoScript`]), including serde-decodable types
//! - Capability declaration: [`CapabilityDescriptor`], the
//!   [`SyncCapability`] / [`AsyncCapability`] traits, and closure adapters
//! - The [`CapabilitySet`] registry consumed by the execution engine
//!
//! ## Capability Model
//!
//! A host exposes native operations to script code by implementing
//! [`CapabilityHandler`]. Each capability carries a descriptor (name,
//! parameter list, return kind, sync/async flag); the engine derives the
//! script-visible wrapper from the descriptor alone, so adding a capability
//! never requires script-side glue.

pub mod capability;
pub mod marshal;
pub mod registry;
pub mod value;

pub use capability::{
    AsyncCapability, CapabilityArgs, CapabilityDescriptor, CapabilityEntry, CapabilityError,
    CapabilityResult, ParamSpec, SyncCapability, ValueKind,
};
pub use marshal::{FromScript, IntoScript, MarshalError};
pub use registry::{CapabilityHandler, CapabilitySet, RegistryError};
pub use value::ScriptValue;
