//! Core of the mxbridge agent.
//!
//! The agent exposes objects held by one or more backend registries as JSON.
//! A request names a kind (list, read, write, exec or search), a target
//! object or pattern, an optional attribute or operation and an optional
//! extra path into the resulting value. The [`Dispatcher`] checks the request
//! against the configured [`Restrictor`] before any backend is touched,
//! routes it to the handler for its kind and converts raw backend values with
//! the [`ObjectToJsonConverter`].
//!
//! Conversion is bounded: nesting depth, collection sizes and the number of
//! expanded objects are capped, and cyclic graphs are cut at the re-entry
//! point. Values the converter cannot represent natively are reduced through
//! [`Simplifier`]s looked up by nearest registered type, with accessor
//! reflection as the fallback.
//!
//! Successful reads are recorded in a bounded [`HistoryStore`] that callers
//! may query to detect changes between polls.
//!
//! [`bootstrap_with`] wires everything from a layered
//! [`mxbridge_config::Config`], installing structured telemetry on the way.

pub mod backend;
mod bootstrap;
pub mod convert;
pub mod dispatch;
mod health;
pub mod history;
pub mod object_name;
pub mod restrictor;
pub mod telemetry;
pub mod value;

pub use backend::{BackendError, BackendRegistry, InMemoryRegistry, MemoryObject};
pub use bootstrap::{
    Agent, BootstrapError, ConfigLoader, StaticConfigLoader, SystemConfigLoader, bootstrap,
    bootstrap_with,
};
pub use convert::{ExtractorRegistry, ObjectToJsonConverter, Simplifier};
pub use dispatch::{AgentError, Dispatcher, Envelope, Request, RequestKind};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use history::{HistoryEntry, HistoryKey, HistoryStore};
pub use object_name::ObjectName;
pub use restrictor::{AllowAll, PolicyRestrictor, Restrictor};
pub use telemetry::{TelemetryError, TelemetryHandle};
pub use value::{DynamicObject, ManagedValue, ObjectRef, RawValue};

#[cfg(test)]
mod tests;
