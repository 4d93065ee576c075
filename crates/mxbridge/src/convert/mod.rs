//! Conversion between raw backend values and JSON.
//!
//! [`ObjectToJsonConverter`] turns [`crate::value::RawValue`] trees into
//! bounded JSON, consulting the [`ExtractorRegistry`] for objects that are not
//! naturally JSON-shaped. [`coerce`] performs the opposite direction for
//! values supplied by clients.

mod coerce;
mod context;
mod converter;
mod extractor;
pub mod simplifiers;

use thiserror::Error;

pub use coerce::{CoerceError, coerce};
pub use context::{ConversionContext, ConversionLimits, LimitOverrides};
pub use converter::ObjectToJsonConverter;
pub use extractor::{AttributeExtractor, Extraction, ExtractorRegistry, Simplifier};

/// Tracing target for conversion events.
pub(crate) const CONVERT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::convert");

/// Errors raised while converting a value.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConvertError {
    /// An extra path segment does not exist on the value reached so far.
    #[error("invalid path '{path}': segment '{segment}' not found on {found}")]
    AttributePath {
        /// Full extra path, `/`-joined.
        path: String,
        /// Offending segment.
        segment: String,
        /// Kind of value the segment was applied to.
        found: String,
    },
    /// No strategy can represent the value.
    #[error("no conversion strategy for type '{0}'")]
    UnsupportedType(String),
}

impl ConvertError {
    pub(crate) fn attribute_path(path: &[String], position: usize, found: &str) -> Self {
        Self::AttributePath {
            path: path.join("/"),
            segment: path.get(position).cloned().unwrap_or_default(),
            found: found.to_owned(),
        }
    }
}
