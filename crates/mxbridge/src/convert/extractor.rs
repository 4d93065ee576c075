//! Type-directed registry of simplifiers.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::value::{ObjectRef, RawValue, TypeInfo};

/// Result of extracting one virtual attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    /// The attribute's value.
    Value(RawValue),
    /// The attribute does not apply to this instance and must be omitted.
    Skip,
}

/// Function computing one virtual attribute of an object.
pub type AttributeExtractor = Arc<dyn Fn(&ObjectRef) -> Extraction + Send + Sync>;

/// Reduces values of one type to a fixed set of virtual attributes.
#[derive(Clone)]
pub struct Simplifier {
    type_name: String,
    attributes: Vec<(String, AttributeExtractor)>,
    ignore_case: bool,
}

impl Simplifier {
    /// Creates a simplifier for the named type with no attributes.
    #[must_use]
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            attributes: Vec::new(),
            ignore_case: false,
        }
    }

    /// Lets [`Simplifier::extract`] match names without regard to ASCII
    /// case once no exact match exists.
    #[must_use]
    pub fn ignoring_case(mut self) -> Self {
        self.ignore_case = true;
        self
    }

    /// Adds a virtual attribute; redefining a name replaces it in place.
    #[must_use]
    pub fn attribute<F>(mut self, name: impl Into<String>, extractor: F) -> Self
    where
        F: Fn(&ObjectRef) -> Extraction + Send + Sync + 'static,
    {
        let name = name.into();
        let extractor: AttributeExtractor = Arc::new(extractor);
        match self
            .attributes
            .iter_mut()
            .find(|(existing, _)| *existing == name)
        {
            Some(slot) => slot.1 = extractor,
            None => self.attributes.push((name, extractor)),
        }
        self
    }

    /// Type the simplifier is registered for.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Virtual attribute names in declaration order.
    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.iter().map(|(name, _)| name.as_str())
    }

    /// Extracts a single virtual attribute, or `None` if it is not declared.
    #[must_use]
    pub fn extract(&self, object: &ObjectRef, name: &str) -> Option<Extraction> {
        self.attributes
            .iter()
            .find(|(attribute, _)| attribute == name)
            .or_else(|| {
                if self.ignore_case {
                    self.attributes
                        .iter()
                        .find(|(attribute, _)| attribute.eq_ignore_ascii_case(name))
                } else {
                    None
                }
            })
            .map(|(_, extractor)| extractor(object))
    }

    /// Extracts every virtual attribute in order, dropping skipped ones.
    #[must_use]
    pub fn extract_all(&self, object: &ObjectRef) -> Vec<(String, RawValue)> {
        self.attributes
            .iter()
            .filter_map(|(name, extractor)| match extractor(object) {
                Extraction::Value(value) => Some((name.clone(), value)),
                Extraction::Skip => None,
            })
            .collect()
    }
}

impl fmt::Debug for Simplifier {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Simplifier")
            .field("type_name", &self.type_name)
            .field("attributes", &self.attribute_names().collect::<Vec<_>>())
            .field("ignore_case", &self.ignore_case)
            .finish()
    }
}

/// Maps runtime type names to simplifiers.
///
/// Lookups walk the value's lineage nearest first, so the most specific
/// registration wins regardless of registration order.
#[derive(Debug, Clone, Default)]
pub struct ExtractorRegistry {
    simplifiers: HashMap<String, Arc<Simplifier>>,
}

impl ExtractorRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the built-in simplifiers.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for simplifier in super::simplifiers::builtins() {
            registry.register(simplifier);
        }
        registry
    }

    /// Registers a simplifier, replacing any earlier one for the same type.
    pub fn register(&mut self, simplifier: Simplifier) {
        self.simplifiers
            .insert(simplifier.type_name.clone(), Arc::new(simplifier));
    }

    /// Finds the simplifier for a raw value; only objects have one.
    #[must_use]
    pub fn lookup(&self, value: &RawValue) -> Option<Arc<Simplifier>> {
        match value {
            RawValue::Object(object) => self.lookup_type(object.type_info()),
            _ => None,
        }
    }

    /// Finds the most specific simplifier along a type lineage.
    #[must_use]
    pub fn lookup_type(&self, type_info: &TypeInfo) -> Option<Arc<Simplifier>> {
        type_info
            .lineage()
            .find_map(|name| self.simplifiers.get(name))
            .cloned()
    }

    /// Number of registered simplifiers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.simplifiers.len()
    }

    /// Returns `true` when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.simplifiers.is_empty()
    }
}
