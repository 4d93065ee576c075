//! Response envelopes handed to the transport.
//!
//! Successful requests produce
//! `{"request":..,"value":..,"status":200,"timestamp":..}`; failures produce
//! `{"request":..,"status":..,"error_type":..,"error":..}`.

use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;

use super::errors::AgentError;
use super::request::Request;

/// Envelope wrapping a request outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Envelope {
    /// Successful outcome.
    Success {
        /// Echo of the request.
        request: Value,
        /// Converted result.
        value: Value,
        /// Always `200`.
        status: u16,
        /// Seconds since the Unix epoch.
        timestamp: i64,
    },
    /// Failed outcome.
    Failure {
        /// Echo of the request, `null` when it could not be parsed.
        request: Value,
        /// Status code of the error.
        status: u16,
        /// Stable error variant name.
        error_type: &'static str,
        /// Human-readable message.
        error: String,
    },
}

impl Envelope {
    /// Wraps a successful result.
    #[must_use]
    pub fn success(request: &Request, value: Value) -> Self {
        Self::Success {
            request: echo(request),
            value,
            status: 200,
            timestamp: OffsetDateTime::now_utc().unix_timestamp(),
        }
    }

    /// Wraps an error; `request` is `None` when parsing failed.
    #[must_use]
    pub fn failure(request: Option<&Request>, error: &AgentError) -> Self {
        Self::Failure {
            request: request.map_or(Value::Null, echo),
            status: error.status(),
            error_type: error.error_type(),
            error: error.to_string(),
        }
    }

    /// Builds the envelope for a handler outcome.
    #[must_use]
    pub fn from_outcome(request: &Request, outcome: &Result<Value, AgentError>) -> Self {
        match outcome {
            Ok(value) => Self::success(request, value.clone()),
            Err(error) => Self::failure(Some(request), error),
        }
    }

    /// Status code carried by the envelope.
    #[must_use]
    pub const fn status(&self) -> u16 {
        match self {
            Self::Success { status, .. } | Self::Failure { status, .. } => *status,
        }
    }

    /// Serialises the envelope into a JSON value.
    #[must_use]
    pub fn into_json(self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

fn echo(request: &Request) -> Value {
    serde_json::to_value(request).unwrap_or(Value::Null)
}
