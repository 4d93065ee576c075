//! Coercion of client-supplied JSON into declared backend types.
//!
//! Type names follow the registry's vocabulary: primitive names (`int`,
//! `long`, `boolean`, ...), their boxed counterparts (optionally qualified
//! with `java.lang.`), `String`, `ObjectName`, and `T[]` arrays. Unknown
//! types receive the JSON value unchanged.

use serde_json::Value;
use thiserror::Error;

use crate::object_name::ObjectName;
use crate::value::{ObjectRef, RawValue};

/// A value could not be converted to the declared type.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("cannot convert {found} to {expected}: {reason}")]
pub struct CoerceError {
    /// Declared type name.
    pub expected: String,
    /// Short rendering of the offending value.
    pub found: String,
    /// Why the conversion failed.
    pub reason: String,
}

impl CoerceError {
    fn new(expected: &str, found: &Value, reason: impl Into<String>) -> Self {
        Self {
            expected: expected.to_owned(),
            found: found.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scalar {
    Bool,
    Int { min: i64, max: i64 },
    Float { single: bool },
    Text,
    Char,
    Name,
}

/// Coerces `value` to the declared type `type_name`.
///
/// # Errors
///
/// Returns a [`CoerceError`] when the value cannot represent the type.
pub fn coerce(type_name: &str, value: &Value) -> Result<RawValue, CoerceError> {
    let declared = type_name.trim();
    if let Some(element) = declared.strip_suffix("[]") {
        return coerce_array(declared, element, value);
    }
    let (scalar, primitive) = match classify(declared) {
        Some(classified) => classified,
        None => return Ok(RawValue::from_json(value)),
    };
    if value.is_null() {
        return if primitive {
            Err(CoerceError::new(declared, value, "null is not allowed for a primitive"))
        } else {
            Ok(RawValue::Null)
        };
    }
    coerce_scalar(declared, scalar, value)
}

fn classify(type_name: &str) -> Option<(Scalar, bool)> {
    let short = type_name.strip_prefix("java.lang.").unwrap_or(type_name);
    let classified = match short {
        "boolean" => (Scalar::Bool, true),
        "Boolean" => (Scalar::Bool, false),
        "byte" | "Byte" => (int_range(i64::from(i8::MIN), i64::from(i8::MAX)), short == "byte"),
        "short" | "Short" => (int_range(i64::from(i16::MIN), i64::from(i16::MAX)), short == "short"),
        "int" | "Integer" => (int_range(i64::from(i32::MIN), i64::from(i32::MAX)), short == "int"),
        "long" | "Long" => (int_range(i64::MIN, i64::MAX), short == "long"),
        "float" => (Scalar::Float { single: true }, true),
        "Float" => (Scalar::Float { single: true }, false),
        "double" => (Scalar::Float { single: false }, true),
        "Double" => (Scalar::Float { single: false }, false),
        "char" => (Scalar::Char, true),
        "Character" => (Scalar::Char, false),
        "String" | "string" => (Scalar::Text, false),
        "ObjectName" | "javax.management.ObjectName" => (Scalar::Name, false),
        _ => return None,
    };
    Some(classified)
}

const fn int_range(min: i64, max: i64) -> Scalar {
    Scalar::Int { min, max }
}

fn coerce_scalar(declared: &str, scalar: Scalar, value: &Value) -> Result<RawValue, CoerceError> {
    let fail = |reason: &str| CoerceError::new(declared, value, reason);
    match scalar {
        Scalar::Bool => match value {
            Value::Bool(flag) => Ok(RawValue::Bool(*flag)),
            Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(RawValue::Bool(true)),
                "false" => Ok(RawValue::Bool(false)),
                _ => Err(fail("expected true or false")),
            },
            _ => Err(fail("expected a boolean")),
        },
        Scalar::Int { min, max } => {
            let number = match value {
                Value::Number(number) => number.as_i64(),
                Value::String(text) => text.trim().parse::<i64>().ok(),
                _ => None,
            }
            .ok_or_else(|| fail("expected an integer"))?;
            if (min..=max).contains(&number) {
                Ok(RawValue::Int(number))
            } else {
                Err(fail("integer out of range"))
            }
        }
        Scalar::Float { single } => {
            let number = match value {
                Value::Number(number) => number.as_f64(),
                Value::String(text) => text.trim().parse::<f64>().ok(),
                _ => None,
            }
            .ok_or_else(|| fail("expected a number"))?;
            let limit = if single { f64::from(f32::MAX) } else { f64::MAX };
            if number.is_finite() && number.abs() <= limit {
                Ok(RawValue::Float(number))
            } else {
                Err(fail("number out of range"))
            }
        }
        Scalar::Text => match value {
            Value::String(text) => Ok(RawValue::String(text.clone())),
            Value::Bool(_) | Value::Number(_) => Ok(RawValue::String(value.to_string())),
            _ => Err(fail("expected a string")),
        },
        Scalar::Char => match value {
            Value::String(text) if text.chars().count() == 1 => Ok(RawValue::String(text.clone())),
            _ => Err(fail("expected a single character")),
        },
        Scalar::Name => match value {
            Value::String(text) => ObjectName::parse(text)
                .map(|name| RawValue::Object(ObjectRef::new(name)))
                .map_err(|error| fail(&error.to_string())),
            _ => Err(fail("expected an object name string")),
        },
    }
}

fn coerce_array(declared: &str, element: &str, value: &Value) -> Result<RawValue, CoerceError> {
    match value {
        Value::Null => Ok(RawValue::Null),
        Value::Array(items) => items
            .iter()
            .map(|item| coerce(element, item))
            .collect::<Result<Vec<_>, _>>()
            .map(RawValue::Array),
        Value::String(text) => text
            .split(',')
            .map(|part| coerce(element, &Value::String(part.trim().to_owned())))
            .collect::<Result<Vec<_>, _>>()
            .map(RawValue::Array),
        _ => Err(CoerceError::new(declared, value, "expected an array")),
    }
}
