//! Error taxonomy surfaced to callers of the agent.
//!
//! Every failure a request can produce maps to one [`AgentError`] variant and
//! an HTTP-like status code. Backend-specific errors are translated here so
//! clients never see registry internals beyond the message text.

use thiserror::Error;

use crate::backend::BackendError;
use crate::convert::{CoerceError, ConvertError};
use crate::history::HistoryError;

/// Errors surfaced while handling a request.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Object, attribute or operation does not exist.
    #[error("not found: {message}")]
    TargetNotFound {
        /// What was missing.
        message: String,
    },

    /// The restrictor denied the request.
    #[error("access denied: {kind} on {target}")]
    AccessDenied {
        /// Request kind that was denied.
        kind: String,
        /// Object name plus optional member.
        target: String,
    },

    /// An extra path segment does not exist.
    #[error("{message}")]
    AttributePath {
        /// Description of the failing segment.
        message: String,
    },

    /// A write value or argument cannot be coerced.
    #[error("type mismatch: {message}")]
    TypeMismatch {
        /// Coercion failure.
        message: String,
    },

    /// No operation with the requested name and arity exists.
    #[error("operation '{operation}' not found on {target}: {reason}")]
    OperationNotFound {
        /// Requested operation.
        operation: String,
        /// Canonical object name.
        target: String,
        /// Why no overload was selected.
        reason: String,
    },

    /// A non-pattern name resolved to more than one backend.
    #[error("'{target}' is served by several backends: {}", .backends.join(", "))]
    AmbiguousTarget {
        /// Canonical object name.
        target: String,
        /// Labels of the matching backends.
        backends: Vec<String>,
    },

    /// The request is malformed or inconsistent.
    #[error("invalid request: {message}")]
    InvalidRequest {
        /// What is wrong with the request.
        message: String,
        /// JSON error, when parsing failed.
        #[source]
        source: Option<serde_json::Error>,
    },

    /// No conversion strategy can represent a value.
    #[error("unsupported type: {type_name}")]
    UnsupportedType {
        /// Runtime type name.
        type_name: String,
    },

    /// A backend failed unexpectedly.
    #[error("backend '{backend}' failed: {source}")]
    InternalBackend {
        /// Label of the failing backend.
        backend: String,
        /// Registry error.
        #[source]
        source: BackendError,
    },

    /// Internal error (e.g., lock poisoned).
    #[error("internal error: {message}")]
    Internal {
        /// Description of the failure.
        message: String,
    },
}

impl AgentError {
    /// HTTP-like status code for this error.
    #[must_use]
    pub const fn status(&self) -> u16 {
        match self {
            Self::TargetNotFound { .. } => 404,
            Self::AccessDenied { .. } => 403,
            Self::AttributePath { .. }
            | Self::TypeMismatch { .. }
            | Self::OperationNotFound { .. }
            | Self::AmbiguousTarget { .. }
            | Self::InvalidRequest { .. } => 400,
            Self::UnsupportedType { .. } | Self::InternalBackend { .. } | Self::Internal { .. } => {
                500
            }
        }
    }

    /// Stable snake_case name of the variant, reported as `error_type`.
    #[must_use]
    pub const fn error_type(&self) -> &'static str {
        match self {
            Self::TargetNotFound { .. } => "target_not_found",
            Self::AccessDenied { .. } => "access_denied",
            Self::AttributePath { .. } => "attribute_path",
            Self::TypeMismatch { .. } => "type_mismatch",
            Self::OperationNotFound { .. } => "operation_not_found",
            Self::AmbiguousTarget { .. } => "ambiguous_target",
            Self::InvalidRequest { .. } => "invalid_request",
            Self::UnsupportedType { .. } => "unsupported_type",
            Self::InternalBackend { .. } => "internal_backend",
            Self::Internal { .. } => "internal",
        }
    }

    /// Translates a registry error, folding every not-found condition into
    /// [`AgentError::TargetNotFound`].
    #[must_use]
    pub fn from_backend(backend: &str, error: BackendError) -> Self {
        match error {
            BackendError::InstanceNotFound(_)
            | BackendError::AttributeNotFound { .. }
            | BackendError::OperationNotFound { .. } => Self::target_not_found(error.to_string()),
            BackendError::Rejected { message } => Self::invalid_request(message),
            BackendError::Failure { .. } => Self::InternalBackend {
                backend: backend.to_owned(),
                source: error,
            },
        }
    }

    /// Creates a not-found error.
    pub fn target_not_found(message: impl Into<String>) -> Self {
        Self::TargetNotFound {
            message: message.into(),
        }
    }

    /// Creates an access-denied error.
    pub fn access_denied(kind: impl Into<String>, target: impl Into<String>) -> Self {
        Self::AccessDenied {
            kind: kind.into(),
            target: target.into(),
        }
    }

    /// Creates an operation-not-found error.
    pub fn operation_not_found(
        operation: impl Into<String>,
        target: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::OperationNotFound {
            operation: operation.into(),
            target: target.into(),
            reason: reason.into(),
        }
    }

    /// Creates an ambiguous-target error.
    pub fn ambiguous_target(target: impl Into<String>, backends: Vec<String>) -> Self {
        Self::AmbiguousTarget {
            target: target.into(),
            backends,
        }
    }

    /// Creates an invalid-request error with a custom message.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an invalid-request error from a JSON parse failure.
    pub fn from_json_error(source: serde_json::Error) -> Self {
        Self::InvalidRequest {
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl From<ConvertError> for AgentError {
    fn from(error: ConvertError) -> Self {
        match error {
            ConvertError::AttributePath { .. } => Self::AttributePath {
                message: error.to_string(),
            },
            ConvertError::UnsupportedType(type_name) => Self::UnsupportedType { type_name },
        }
    }
}

impl From<CoerceError> for AgentError {
    fn from(error: CoerceError) -> Self {
        Self::TypeMismatch {
            message: error.to_string(),
        }
    }
}

impl From<HistoryError> for AgentError {
    fn from(error: HistoryError) -> Self {
        Self::internal(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(AgentError::target_not_found("x"), 404, "target_not_found")]
    #[case(AgentError::access_denied("read", "app:type=A"), 403, "access_denied")]
    #[case(AgentError::invalid_request("bad"), 400, "invalid_request")]
    #[case(AgentError::ambiguous_target("app:type=A", vec![]), 400, "ambiguous_target")]
    #[case(AgentError::internal("boom"), 500, "internal")]
    fn maps_status_and_type(
        #[case] error: AgentError,
        #[case] status: u16,
        #[case] error_type: &str,
    ) {
        assert_eq!(error.status(), status);
        assert_eq!(error.error_type(), error_type);
    }

    #[rstest]
    #[case(BackendError::InstanceNotFound("app:type=A".into()), 404)]
    #[case(BackendError::rejected("read only"), 400)]
    #[case(BackendError::failure("exploded"), 500)]
    fn backend_errors_are_translated(#[case] error: BackendError, #[case] status: u16) {
        assert_eq!(AgentError::from_backend("memory", error).status(), status);
    }

    #[test]
    fn path_errors_keep_their_message() {
        let error = AgentError::from(ConvertError::attribute_path(
            &["a".to_owned(), "b".to_owned()],
            1,
            "integer",
        ));
        assert_eq!(error.status(), 400);
        assert!(error.to_string().contains("segment 'b'"));
    }
}
