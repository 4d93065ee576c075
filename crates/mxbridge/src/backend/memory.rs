//! Process-local registry holding objects in memory.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use super::{AttributeInfo, BackendError, BackendRegistry, ObjectDescriptor, OperationInfo};
use crate::object_name::ObjectName;
use crate::value::RawValue;

/// Closure executed when an operation is invoked.
pub type OperationHandler =
    Arc<dyn Fn(Vec<RawValue>) -> Result<RawValue, BackendError> + Send + Sync>;

/// One object registered with an [`InMemoryRegistry`].
#[derive(Clone)]
pub struct MemoryObject {
    name: ObjectName,
    attributes: Vec<AttributeInfo>,
    values: BTreeMap<String, RawValue>,
    operations: Vec<(OperationInfo, OperationHandler)>,
}

impl MemoryObject {
    /// Creates an object without attributes or operations.
    #[must_use]
    pub fn new(name: ObjectName) -> Self {
        Self {
            name,
            attributes: Vec::new(),
            values: BTreeMap::new(),
            operations: Vec::new(),
        }
    }

    /// Adds an attribute with its initial value.
    #[must_use]
    pub fn with_attribute(mut self, info: AttributeInfo, value: impl Into<RawValue>) -> Self {
        self.values.insert(info.name.clone(), value.into());
        self.attributes.retain(|existing| existing.name != info.name);
        self.attributes.push(info);
        self
    }

    /// Adds an operation overload.
    #[must_use]
    pub fn with_operation<F>(mut self, info: OperationInfo, handler: F) -> Self
    where
        F: Fn(Vec<RawValue>) -> Result<RawValue, BackendError> + Send + Sync + 'static,
    {
        self.operations.push((info, Arc::new(handler)));
        self
    }

    fn descriptor(&self) -> ObjectDescriptor {
        ObjectDescriptor {
            name: self.name.clone(),
            attributes: self.attributes.clone(),
            operations: self
                .operations
                .iter()
                .map(|(info, _)| info.clone())
                .collect(),
        }
    }
}

impl fmt::Debug for MemoryObject {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("MemoryObject")
            .field("name", &self.name.canonical())
            .field("attributes", &self.attributes.len())
            .field("operations", &self.operations.len())
            .finish()
    }
}

/// Registry keeping its objects behind a lock, keyed by canonical name.
#[derive(Debug)]
pub struct InMemoryRegistry {
    label: String,
    objects: RwLock<BTreeMap<String, MemoryObject>>,
}

impl InMemoryRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            objects: RwLock::new(BTreeMap::new()),
        }
    }

    /// Registers an object, replacing one with the same name.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Failure`] if the registry lock is poisoned.
    pub fn register(&self, object: MemoryObject) -> Result<(), BackendError> {
        let mut objects = self
            .objects
            .write()
            .map_err(|_| BackendError::failure("registry lock poisoned"))?;
        objects.insert(object.name.canonical(), object);
        Ok(())
    }

    /// Builder-style variant of [`InMemoryRegistry::register`].
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Failure`] if the registry lock is poisoned.
    pub fn with_object(self, object: MemoryObject) -> Result<Self, BackendError> {
        self.register(object)?;
        Ok(self)
    }

    fn with_object_ref<T>(
        &self,
        name: &ObjectName,
        action: impl FnOnce(&MemoryObject) -> Result<T, BackendError>,
    ) -> Result<T, BackendError> {
        let objects = self
            .objects
            .read()
            .map_err(|_| BackendError::failure("registry lock poisoned"))?;
        let object = objects
            .get(&name.canonical())
            .ok_or_else(|| BackendError::InstanceNotFound(name.canonical()))?;
        action(object)
    }
}

impl BackendRegistry for InMemoryRegistry {
    fn label(&self) -> &str {
        &self.label
    }

    fn list_objects(&self, pattern: &ObjectName) -> Result<Vec<ObjectDescriptor>, BackendError> {
        let objects = self
            .objects
            .read()
            .map_err(|_| BackendError::failure("registry lock poisoned"))?;
        Ok(objects
            .values()
            .filter(|object| pattern.matches(&object.name))
            .map(MemoryObject::descriptor)
            .collect())
    }

    fn get_attribute(&self, name: &ObjectName, attribute: &str) -> Result<RawValue, BackendError> {
        self.with_object_ref(name, |object| {
            object
                .values
                .get(attribute)
                .cloned()
                .ok_or_else(|| BackendError::AttributeNotFound {
                    object: name.canonical(),
                    attribute: attribute.to_owned(),
                })
        })
    }

    fn set_attribute(
        &self,
        name: &ObjectName,
        attribute: &str,
        value: RawValue,
    ) -> Result<RawValue, BackendError> {
        let mut objects = self
            .objects
            .write()
            .map_err(|_| BackendError::failure("registry lock poisoned"))?;
        let object = objects
            .get_mut(&name.canonical())
            .ok_or_else(|| BackendError::InstanceNotFound(name.canonical()))?;
        let slot = object
            .values
            .get_mut(attribute)
            .ok_or_else(|| BackendError::AttributeNotFound {
                object: name.canonical(),
                attribute: attribute.to_owned(),
            })?;
        Ok(std::mem::replace(slot, value))
    }

    fn invoke(
        &self,
        name: &ObjectName,
        operation: &OperationInfo,
        arguments: Vec<RawValue>,
    ) -> Result<RawValue, BackendError> {
        // Clone the handler out so the lock is not held during the call.
        let handler = self.with_object_ref(name, |object| {
            object
                .operations
                .iter()
                .find(|(info, _)| info == operation)
                .map(|(_, handler)| Arc::clone(handler))
                .ok_or_else(|| BackendError::OperationNotFound {
                    object: name.canonical(),
                    operation: operation.name.clone(),
                })
        })?;
        handler(arguments)
    }
}
