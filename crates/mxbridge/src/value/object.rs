//! Concrete managed values shipped with the core.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{PoisonError, RwLock};

use super::{ManagedValue, ObjectRef, RawValue, TypeInfo};

/// Type name of [`TypeDescriptor`] values.
pub const TYPE_DESCRIPTOR_TYPE: &str = "TypeDescriptor";

/// Property bag exposing every property as a public read accessor.
///
/// Properties may be replaced after the object is shared, which is how
/// registries (and tests) build self-referential graphs.
pub struct DynamicObject {
    type_info: TypeInfo,
    properties: RwLock<BTreeMap<String, RawValue>>,
    text: Option<String>,
}

impl DynamicObject {
    /// Creates an empty object of the given type.
    #[must_use]
    pub fn new(type_info: TypeInfo) -> Self {
        Self {
            type_info,
            properties: RwLock::new(BTreeMap::new()),
            text: None,
        }
    }

    /// Adds a property before the object is shared.
    #[must_use]
    pub fn with_property(self, name: impl Into<String>, value: impl Into<RawValue>) -> Self {
        self.set(name, value);
        self
    }

    /// Sets the plain text rendering of the object.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Replaces a property on a possibly shared object.
    pub fn set(&self, name: impl Into<String>, value: impl Into<RawValue>) {
        self.properties
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), value.into());
    }

    /// Shares the object behind an [`ObjectRef`].
    #[must_use]
    pub fn into_ref(self) -> ObjectRef {
        ObjectRef::new(self)
    }
}

impl fmt::Debug for DynamicObject {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("DynamicObject")
            .field("type", &self.type_info.name())
            .field("properties", &self.accessors())
            .finish()
    }
}

impl ManagedValue for DynamicObject {
    fn type_info(&self) -> &TypeInfo {
        &self.type_info
    }

    fn accessors(&self) -> Vec<String> {
        self.properties
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    fn read(&self, name: &str) -> Option<RawValue> {
        self.properties
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    fn as_text(&self) -> Option<String> {
        self.text.clone()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Runtime description of a type, exposed as a value in its own right.
///
/// Interfaces are held as shared handles so repeated conversions see the
/// same identities.
#[derive(Debug)]
pub struct TypeDescriptor {
    name: String,
    interfaces: Vec<ObjectRef>,
    is_interface: bool,
}

static TYPE_DESCRIPTOR_INFO: TypeInfo = TypeInfo::builtin(TYPE_DESCRIPTOR_TYPE);

impl TypeDescriptor {
    /// Describes a concrete type.
    #[must_use]
    pub fn concrete(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            interfaces: Vec::new(),
            is_interface: false,
        }
    }

    /// Describes an interface type.
    #[must_use]
    pub fn interface(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            interfaces: Vec::new(),
            is_interface: true,
        }
    }

    /// Records an implemented interface.
    #[must_use]
    pub fn implementing(mut self, interface: Self) -> Self {
        self.interfaces.push(ObjectRef::new(interface));
        self
    }

    /// Fully qualified type name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the descriptor denotes an interface.
    #[must_use]
    pub const fn is_interface(&self) -> bool {
        self.is_interface
    }

    /// Implemented interfaces as raw values.
    #[must_use]
    pub fn interfaces(&self) -> RawValue {
        RawValue::Array(
            self.interfaces
                .iter()
                .cloned()
                .map(RawValue::Object)
                .collect(),
        )
    }
}

impl ManagedValue for TypeDescriptor {
    fn type_info(&self) -> &TypeInfo {
        &TYPE_DESCRIPTOR_INFO
    }

    fn accessors(&self) -> Vec<String> {
        vec!["interface".to_owned(), "name".to_owned()]
    }

    fn read(&self, name: &str) -> Option<RawValue> {
        match name {
            "name" => Some(RawValue::from(self.name.as_str())),
            "interface" => Some(RawValue::Bool(self.is_interface)),
            _ => None,
        }
    }

    fn as_text(&self) -> Option<String> {
        Some(self.name.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dynamic_object_exposes_properties_as_accessors() {
        let object = DynamicObject::new(TypeInfo::new("Pool"))
            .with_property("size", 4)
            .with_property("name", "main");
        assert_eq!(object.accessors(), vec!["name", "size"]);
        assert_eq!(object.read("size"), Some(RawValue::Int(4)));
        assert_eq!(object.read("missing"), None);
    }

    #[test]
    fn dynamic_object_can_reference_itself() {
        let handle = DynamicObject::new(TypeInfo::new("Node")).into_ref();
        let node = handle
            .downcast_ref::<DynamicObject>()
            .expect("dynamic object");
        node.set("next", handle.clone());
        assert_eq!(node.read("next"), Some(RawValue::Object(handle.clone())));
    }

    #[test]
    fn type_descriptor_lists_interfaces() {
        let descriptor = TypeDescriptor::concrete("app::Pool")
            .implementing(TypeDescriptor::interface("app::Resource"));
        let RawValue::Array(items) = descriptor.interfaces() else {
            panic!("expected array");
        };
        assert_eq!(items.len(), 1);
        assert!(!descriptor.is_interface());
    }
}
