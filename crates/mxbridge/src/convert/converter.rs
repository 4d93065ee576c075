//! Bounded conversion of raw values into JSON.

use std::sync::Arc;

use serde_json::{Map, Number, Value};
use tracing::{debug, trace, warn};

use super::context::{ConversionContext, ConversionLimits};
use super::extractor::{Extraction, ExtractorRegistry};
use super::{CONVERT_TARGET, ConvertError};
use crate::value::{ObjectRef, RawValue};

/// Walks raw values, following an extra path and then serialising the
/// remainder within the configured limits.
#[derive(Debug, Clone)]
pub struct ObjectToJsonConverter {
    registry: Arc<ExtractorRegistry>,
}

impl Default for ObjectToJsonConverter {
    fn default() -> Self {
        Self::new(ExtractorRegistry::with_builtins())
    }
}

impl ObjectToJsonConverter {
    /// Creates a converter backed by the given registry.
    #[must_use]
    pub fn new(registry: ExtractorRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    /// Registry used to find simplifiers.
    #[must_use]
    pub fn registry(&self) -> &ExtractorRegistry {
        &self.registry
    }

    /// Converts `value` after descending along `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConvertError::AttributePath`] when a path segment does not
    /// exist, and [`ConvertError::UnsupportedType`] when an object has no
    /// usable representation.
    pub fn convert(
        &self,
        value: &RawValue,
        path: &[String],
        limits: ConversionLimits,
    ) -> Result<Value, ConvertError> {
        match self.resolve_path(value, path)? {
            Some(target) => self.to_json(&target, &mut ConversionContext::new(limits)),
            None => Ok(Value::Null),
        }
    }

    /// Descends along `path`; `Ok(None)` means an extractor skipped the value.
    ///
    /// # Errors
    ///
    /// Returns [`ConvertError::AttributePath`] for a segment that does not
    /// exist on the current value.
    pub fn resolve_path(
        &self,
        value: &RawValue,
        path: &[String],
    ) -> Result<Option<RawValue>, ConvertError> {
        let mut current = value.clone();
        for (position, segment) in path.iter().enumerate() {
            let next = match &current {
                RawValue::Map(entries) => entries
                    .iter()
                    .find(|(key, _)| key.key_string() == *segment)
                    .map(|(_, item)| item.clone()),
                RawValue::Array(items) => segment
                    .parse::<usize>()
                    .ok()
                    .and_then(|index| items.get(index))
                    .cloned(),
                RawValue::Object(object) => match self.descend_object(object, segment) {
                    Some(Extraction::Value(item)) => Some(item),
                    Some(Extraction::Skip) => return Ok(None),
                    None => None,
                },
                _ => None,
            };
            match next {
                Some(item) => current = item,
                None => {
                    return Err(ConvertError::attribute_path(
                        path,
                        position,
                        current.kind_name(),
                    ));
                }
            }
        }
        Ok(Some(current))
    }

    fn descend_object(&self, object: &ObjectRef, segment: &str) -> Option<Extraction> {
        match self.registry.lookup_type(object.type_info()) {
            Some(simplifier) => simplifier.extract(object, segment),
            None => object.value().read(segment).map(Extraction::Value),
        }
    }

    /// Serialises `value` without any path, sharing `context` with the caller.
    ///
    /// # Errors
    ///
    /// Returns [`ConvertError::UnsupportedType`] when an object has no
    /// usable representation.
    pub fn to_json(
        &self,
        value: &RawValue,
        context: &mut ConversionContext,
    ) -> Result<Value, ConvertError> {
        match value {
            RawValue::Null => Ok(Value::Null),
            RawValue::Bool(flag) => Ok(Value::Bool(*flag)),
            RawValue::Int(number) => Ok(Value::from(*number)),
            RawValue::Float(number) => Ok(Number::from_f64(*number).map_or(Value::Null, Value::Number)),
            RawValue::String(text) => Ok(Value::String(text.clone())),
            RawValue::Array(items) => {
                if !context.can_descend() {
                    return Ok(Value::String(value.short_repr()));
                }
                context.enter(None);
                let result = self.array_to_json(items, context);
                context.leave(None);
                result
            }
            RawValue::Map(entries) => {
                if !context.can_descend() {
                    return Ok(Value::String(value.short_repr()));
                }
                context.enter(None);
                let result = self.map_to_json(entries, context);
                context.leave(None);
                result
            }
            RawValue::Object(object) => {
                let identity = object.identity();
                if context.is_visited(identity) {
                    trace!(target: CONVERT_TARGET, object = %object.short_repr(), "cycle detected");
                    return Ok(Value::String(object.short_repr()));
                }
                if !context.can_descend() {
                    return Ok(Value::String(object.short_repr()));
                }
                context.enter(Some(identity));
                let result = self.object_to_json(object, context);
                context.leave(Some(identity));
                result
            }
        }
    }

    fn array_to_json(
        &self,
        items: &[RawValue],
        context: &mut ConversionContext,
    ) -> Result<Value, ConvertError> {
        let budget = context.collection_budget(items.len());
        if budget < items.len() {
            debug!(
                target: CONVERT_TARGET,
                length = items.len(),
                kept = budget,
                "truncating sequence"
            );
        }
        items
            .iter()
            .take(budget)
            .map(|item| self.to_json(item, context))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array)
    }

    fn map_to_json(
        &self,
        entries: &[(RawValue, RawValue)],
        context: &mut ConversionContext,
    ) -> Result<Value, ConvertError> {
        let budget = context.collection_budget(entries.len());
        if budget < entries.len() {
            debug!(
                target: CONVERT_TARGET,
                length = entries.len(),
                kept = budget,
                "truncating map"
            );
        }
        let mut map = Map::new();
        for (key, item) in entries.iter().take(budget) {
            let name = key.key_string();
            if map.contains_key(&name) {
                warn!(
                    target: CONVERT_TARGET,
                    key = %name,
                    kind = key.kind_name(),
                    "map key collides with an earlier entry; keeping the first"
                );
                continue;
            }
            let converted = self.to_json(item, context)?;
            map.insert(name, converted);
        }
        Ok(Value::Object(map))
    }

    fn object_to_json(
        &self,
        object: &ObjectRef,
        context: &mut ConversionContext,
    ) -> Result<Value, ConvertError> {
        if let Some(simplifier) = self.registry.lookup_type(object.type_info()) {
            let mut map = Map::new();
            for (name, item) in simplifier.extract_all(object) {
                map.insert(name, self.to_json(&item, context)?);
            }
            return Ok(Value::Object(map));
        }

        let accessors = object.value().accessors();
        if !accessors.is_empty() {
            let mut map = Map::new();
            for name in accessors {
                if let Some(item) = object.value().read(&name) {
                    map.insert(name, self.to_json(&item, context)?);
                }
            }
            return Ok(Value::Object(map));
        }

        object
            .value()
            .as_text()
            .map(Value::String)
            .ok_or_else(|| ConvertError::UnsupportedType(object.type_info().name().to_owned()))
    }
}
