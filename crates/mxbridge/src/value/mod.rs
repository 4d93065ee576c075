//! Raw values returned by backend registries.
//!
//! Backends hand the core a [`RawValue`] tree. Scalars, sequences and maps
//! are plain data; everything else is an opaque [`ObjectRef`] whose runtime
//! type is described by a [`TypeInfo`] lineage. Object handles are shared, so
//! graphs may contain cycles; the converter guards against those using
//! [`ObjectRef::identity`].

mod object;

use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

pub use object::{DynamicObject, TYPE_DESCRIPTOR_TYPE, TypeDescriptor};

/// Runtime type name plus its ancestor and interface chain.
///
/// Ancestors are listed nearest first, which is the order the extractor
/// registry walks when looking for the most specific simplifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeInfo {
    name: Cow<'static, str>,
    ancestors: Vec<Cow<'static, str>>,
}

impl TypeInfo {
    /// Describes a type without ancestors.
    #[must_use]
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            ancestors: Vec::new(),
        }
    }

    /// Describes a built-in type from a static name.
    #[must_use]
    pub const fn builtin(name: &'static str) -> Self {
        Self {
            name: Cow::Borrowed(name),
            ancestors: Vec::new(),
        }
    }

    /// Appends ancestors, nearest first.
    #[must_use]
    pub fn with_ancestors<I, S>(mut self, ancestors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Cow<'static, str>>,
    {
        self.ancestors.extend(ancestors.into_iter().map(Into::into));
        self
    }

    /// The declared type name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ancestor and interface names, nearest first.
    pub fn ancestors(&self) -> impl Iterator<Item = &str> {
        self.ancestors.iter().map(|ancestor| &**ancestor)
    }

    /// The type name followed by its ancestors.
    pub fn lineage(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name()).chain(self.ancestors())
    }
}

/// Behaviour shared by every opaque value a backend may return.
pub trait ManagedValue: fmt::Debug + Send + Sync + 'static {
    /// Runtime type of the value.
    fn type_info(&self) -> &TypeInfo;

    /// Names of the public read accessors, in a stable order.
    fn accessors(&self) -> Vec<String> {
        Vec::new()
    }

    /// Reads a public accessor, returning `None` when it does not exist.
    fn read(&self, name: &str) -> Option<RawValue> {
        let _ = name;
        None
    }

    /// Plain text rendering used when no accessor is available.
    fn as_text(&self) -> Option<String> {
        None
    }

    /// Enables downcasting to the concrete type inside simplifiers.
    fn as_any(&self) -> &dyn Any;
}

/// Shared handle to an opaque value.
#[derive(Clone)]
pub struct ObjectRef(Arc<dyn ManagedValue>);

impl ObjectRef {
    /// Wraps a managed value.
    pub fn new<T: ManagedValue>(value: T) -> Self {
        Self(Arc::new(value))
    }

    /// Address-based identity; equal for handles to the same allocation.
    #[must_use]
    pub fn identity(&self) -> usize {
        Arc::as_ptr(&self.0).cast::<()>() as usize
    }

    /// Runtime type of the referenced value.
    #[must_use]
    pub fn type_info(&self) -> &TypeInfo {
        self.0.type_info()
    }

    /// Stable short representation: type name plus identity.
    #[must_use]
    pub fn short_repr(&self) -> String {
        format!("{}@{:x}", self.type_info().name(), self.identity())
    }

    /// Downcasts to a concrete managed type.
    #[must_use]
    pub fn downcast_ref<T: ManagedValue>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }

    /// Borrows the managed value.
    #[must_use]
    pub fn value(&self) -> &dyn ManagedValue {
        self.0.as_ref()
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never recurse: the graph behind the handle may be cyclic.
        formatter.write_str(&self.short_repr())
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

/// A value produced by a backend registry before JSON conversion.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    /// Absent value.
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// Text.
    String(String),
    /// Ordered sequence.
    Array(Vec<RawValue>),
    /// Key/value pairs; keys are stringified when converted.
    Map(Vec<(RawValue, RawValue)>),
    /// Opaque runtime object.
    Object(ObjectRef),
}

impl RawValue {
    /// Builds a map from string keys.
    pub fn map<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, RawValue)>,
        K: Into<String>,
    {
        Self::Map(
            entries
                .into_iter()
                .map(|(key, value)| (Self::String(key.into()), value))
                .collect(),
        )
    }

    /// Converts parsed JSON into a raw value.
    #[must_use]
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(flag) => Self::Bool(*flag),
            Value::Number(number) => number
                .as_i64()
                .map(Self::Int)
                .or_else(|| number.as_f64().map(Self::Float))
                .unwrap_or(Self::Null),
            Value::String(text) => Self::String(text.clone()),
            Value::Array(items) => Self::Array(items.iter().map(Self::from_json).collect()),
            Value::Object(entries) => Self::Map(
                entries
                    .iter()
                    .map(|(key, item)| (Self::String(key.clone()), Self::from_json(item)))
                    .collect(),
            ),
        }
    }

    /// Human-readable kind, used in error messages.
    #[must_use]
    pub fn kind_name(&self) -> &str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Map(_) => "map",
            Self::Object(object) => object.type_info().name(),
        }
    }

    /// Text used when the value appears as a map key.
    #[must_use]
    pub fn key_string(&self) -> String {
        match self {
            Self::Null => "null".to_owned(),
            Self::Bool(flag) => flag.to_string(),
            Self::Int(number) => number.to_string(),
            Self::Float(number) => number.to_string(),
            Self::String(text) => text.clone(),
            Self::Object(object) => object
                .value()
                .as_text()
                .unwrap_or_else(|| object.short_repr()),
            Self::Array(_) | Self::Map(_) => self.short_repr(),
        }
    }

    /// Short representation emitted in place of a composite that is not
    /// expanded.
    #[must_use]
    pub fn short_repr(&self) -> String {
        match self {
            Self::Array(items) => format!("Array[{}]", items.len()),
            Self::Map(entries) => format!("Map[{}]", entries.len()),
            Self::Object(object) => object.short_repr(),
            scalar => scalar.key_string(),
        }
    }
}

impl From<bool> for RawValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for RawValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for RawValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<ObjectRef> for RawValue {
    fn from(value: ObjectRef) -> Self {
        Self::Object(value)
    }
}

impl From<Vec<RawValue>> for RawValue {
    fn from(value: Vec<RawValue>) -> Self {
        Self::Array(value)
    }
}
