//! Contract between the agent core and the registries that own managed
//! objects.
//!
//! A [`BackendRegistry`] answers introspection, get, set and invoke calls.
//! Descriptors are produced fresh for every call and never cached by the core.

mod memory;

use std::error::Error as StdError;

use thiserror::Error;

use crate::dispatch::Request;
use crate::object_name::ObjectName;
use crate::value::RawValue;

pub use memory::{InMemoryRegistry, MemoryObject, OperationHandler};

/// Description of one operation parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterInfo {
    /// Parameter name.
    pub name: String,
    /// Declared type name.
    pub type_name: String,
    /// Free-form description.
    pub description: String,
}

impl ParameterInfo {
    /// Creates a parameter description.
    #[must_use]
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            description: String::new(),
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Description of one attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeInfo {
    /// Attribute name.
    pub name: String,
    /// Declared type name.
    pub type_name: String,
    /// Free-form description.
    pub description: String,
    /// Whether the attribute may be read.
    pub readable: bool,
    /// Whether the attribute may be written.
    pub writable: bool,
}

impl AttributeInfo {
    /// Describes a readable, non-writable attribute.
    #[must_use]
    pub fn read_only(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            description: String::new(),
            readable: true,
            writable: false,
        }
    }

    /// Describes a readable and writable attribute.
    #[must_use]
    pub fn read_write(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            writable: true,
            ..Self::read_only(name, type_name)
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Whether the attribute is both readable and writable.
    #[must_use]
    pub const fn is_read_write(&self) -> bool {
        self.readable && self.writable
    }
}

/// Description of one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationInfo {
    /// Operation name.
    pub name: String,
    /// Declared return type name.
    pub return_type: String,
    /// Positional parameters.
    pub parameters: Vec<ParameterInfo>,
    /// Free-form description.
    pub description: String,
}

impl OperationInfo {
    /// Describes an operation without parameters.
    #[must_use]
    pub fn new(name: impl Into<String>, return_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            return_type: return_type.into(),
            parameters: Vec::new(),
            description: String::new(),
        }
    }

    /// Appends a positional parameter.
    #[must_use]
    pub fn with_parameter(mut self, parameter: ParameterInfo) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Parameter type names in declaration order.
    pub fn signature(&self) -> impl Iterator<Item = &str> {
        self.parameters
            .iter()
            .map(|parameter| parameter.type_name.as_str())
    }
}

/// Everything a registry reports about one managed object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectDescriptor {
    /// Identity of the object.
    pub name: ObjectName,
    /// Attributes in registry order.
    pub attributes: Vec<AttributeInfo>,
    /// Operations in registry order; overloads share a name.
    pub operations: Vec<OperationInfo>,
}

impl ObjectDescriptor {
    /// Looks up an attribute by name.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&AttributeInfo> {
        self.attributes
            .iter()
            .find(|attribute| attribute.name == name)
    }

    /// Operations carrying the given name.
    pub fn operations_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a OperationInfo> {
        self.operations
            .iter()
            .filter(move |operation| operation.name == name)
    }

    /// Returns `true` when nothing can be read or invoked on the object.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty() && self.operations.is_empty()
    }
}

/// Failures reported by a backend registry.
#[derive(Debug, Error)]
pub enum BackendError {
    /// No object with the given identity is registered.
    #[error("instance '{0}' not found")]
    InstanceNotFound(String),
    /// The object exists but has no such attribute.
    #[error("attribute '{attribute}' not found on '{object}'")]
    AttributeNotFound {
        /// Canonical object name.
        object: String,
        /// Missing attribute.
        attribute: String,
    },
    /// The object exists but has no such operation.
    #[error("operation '{operation}' not found on '{object}'")]
    OperationNotFound {
        /// Canonical object name.
        object: String,
        /// Missing operation.
        operation: String,
    },
    /// The registry refused the call, e.g. a value it cannot store.
    #[error("rejected: {message}")]
    Rejected {
        /// Explanation supplied by the registry.
        message: String,
    },
    /// Any other registry failure.
    #[error("backend failure: {message}")]
    Failure {
        /// Explanation supplied by the registry.
        message: String,
        /// Underlying cause, when available.
        #[source]
        source: Option<Box<dyn StdError + Send + Sync>>,
    },
}

impl BackendError {
    /// Creates a rejection error.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }

    /// Creates a generic failure without a source.
    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure {
            message: message.into(),
            source: None,
        }
    }

    /// Returns `true` for the not-found family of errors.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::InstanceNotFound(_) | Self::AttributeNotFound { .. } | Self::OperationNotFound { .. }
        )
    }
}

/// A registry of managed objects the agent can dispatch to.
pub trait BackendRegistry: Send + Sync {
    /// Short name used in logs.
    fn label(&self) -> &str;

    /// Whether the registry wants to serve this request at all.
    fn can_handle(&self, request: &Request) -> bool {
        let _ = request;
        true
    }

    /// Describes every object selected by `pattern`.
    ///
    /// # Errors
    ///
    /// Returns a [`BackendError`] when the registry cannot be queried.
    fn list_objects(&self, pattern: &ObjectName) -> Result<Vec<ObjectDescriptor>, BackendError>;

    /// Reads an attribute.
    ///
    /// # Errors
    ///
    /// Returns a [`BackendError`] when the object or attribute is missing or
    /// the read fails.
    fn get_attribute(&self, name: &ObjectName, attribute: &str) -> Result<RawValue, BackendError>;

    /// Writes an attribute and returns its previous value.
    ///
    /// # Errors
    ///
    /// Returns a [`BackendError`] when the object or attribute is missing or
    /// the registry rejects the value.
    fn set_attribute(
        &self,
        name: &ObjectName,
        attribute: &str,
        value: RawValue,
    ) -> Result<RawValue, BackendError>;

    /// Invokes the given operation overload with positional arguments.
    ///
    /// # Errors
    ///
    /// Returns a [`BackendError`] when the object or operation is missing or
    /// the invocation fails.
    fn invoke(
        &self,
        name: &ObjectName,
        operation: &OperationInfo,
        arguments: Vec<RawValue>,
    ) -> Result<RawValue, BackendError>;
}
