//! Simplifiers installed by default.

use super::extractor::{Extraction, Simplifier};
use crate::object_name::{OBJECT_NAME_TYPE, ObjectName};
use crate::value::{ObjectRef, RawValue, TYPE_DESCRIPTOR_TYPE, TypeDescriptor};

/// Type name of statistics containers.
pub const STATS_TYPE: &str = "Stats";

/// Type name of statistics gathered for a message producer.
pub const JMS_PRODUCER_STATS_TYPE: &str = "JMSProducerStats";

/// Simplifiers registered by [`super::ExtractorRegistry::with_builtins`].
#[must_use]
pub fn builtins() -> Vec<Simplifier> {
    vec![type_descriptor(), object_name(), stats(), jms_producer_stats()]
}

/// `name` and `interfaces` of a type descriptor; `interfaces` is omitted for
/// interfaces themselves.
#[must_use]
pub fn type_descriptor() -> Simplifier {
    Simplifier::new(TYPE_DESCRIPTOR_TYPE)
        .attribute("name", |object| {
            object
                .downcast_ref::<TypeDescriptor>()
                .map(|descriptor| RawValue::from(descriptor.name()))
                .or_else(|| object.value().read("name"))
                .map_or(Extraction::Skip, Extraction::Value)
        })
        .attribute("interfaces", |object| {
            match object.downcast_ref::<TypeDescriptor>() {
                Some(descriptor) if descriptor.is_interface() => Extraction::Skip,
                Some(descriptor) => Extraction::Value(descriptor.interfaces()),
                None => accessor(object, "interfaces"),
            }
        })
}

/// `objectName` (canonical form) and `domain` of an object name.
#[must_use]
pub fn object_name() -> Simplifier {
    Simplifier::new(OBJECT_NAME_TYPE)
        .attribute("objectName", |object| {
            object
                .downcast_ref::<ObjectName>()
                .map_or(Extraction::Skip, |name| {
                    Extraction::Value(RawValue::String(name.canonical()))
                })
        })
        .attribute("domain", |object| {
            object
                .downcast_ref::<ObjectName>()
                .map_or(Extraction::Skip, |name| {
                    Extraction::Value(RawValue::from(name.domain()))
                })
        })
}

/// `statisticNames` and `statistics` of a statistics container.
///
/// A container lists its statistic names under the `statisticNames`
/// accessor and exposes each statistic as an accessor of that name;
/// `statistics` maps every listed name to its statistic.
#[must_use]
pub fn stats() -> Simplifier {
    with_statistics(Simplifier::new(STATS_TYPE))
}

/// Statistics attributes plus the producer's `destination`, which path
/// segments match without regard to case.
#[must_use]
pub fn jms_producer_stats() -> Simplifier {
    with_statistics(Simplifier::new(JMS_PRODUCER_STATS_TYPE))
        .attribute("destination", |object| accessor(object, "destination"))
        .ignoring_case()
}

fn with_statistics(simplifier: Simplifier) -> Simplifier {
    simplifier
        .attribute("statisticNames", |object| accessor(object, "statisticNames"))
        .attribute("statistics", |object| {
            let Some(RawValue::Array(names)) = object.value().read("statisticNames") else {
                return Extraction::Skip;
            };
            let entries = names
                .iter()
                .filter_map(|name| match name {
                    RawValue::String(name) => object
                        .value()
                        .read(name)
                        .map(|statistic| (RawValue::String(name.clone()), statistic)),
                    _ => None,
                })
                .collect();
            Extraction::Value(RawValue::Map(entries))
        })
}

fn accessor(object: &ObjectRef, name: &str) -> Extraction {
    object
        .value()
        .read(name)
        .map_or(Extraction::Skip, Extraction::Value)
}
