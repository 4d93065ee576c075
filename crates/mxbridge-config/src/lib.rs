//! Shared configuration for the mxbridge agent.
//!
//! Values are layered by [`ortho_config`]: built-in defaults, then an optional
//! configuration file, then `MXBRIDGE_*` environment variables, then command
//! line flags. The resulting [`Config`] carries the logging setup, the
//! traversal limits applied by the object-to-JSON converter, the history
//! bound, and the access directives enforced by the restrictor.

mod access;
mod defaults;
mod logging;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use access::{
    ANY_KIND, AccessDirective, AccessDirectiveParseError, AccessOverride, AccessPolicy,
};
pub use defaults::{
    DEFAULT_HISTORY_MAX_ENTRIES, DEFAULT_LOG_FILTER, DEFAULT_MAX_COLLECTION_SIZE,
    DEFAULT_MAX_DEPTH, DEFAULT_MAX_OBJECTS, default_log_filter, default_log_filter_string,
    default_log_format,
};
pub use logging::{LogFormat, LogFormatParseError};

/// Resolved agent configuration.
///
/// A limit set to `0` disables the corresponding cap.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "MXBRIDGE")]
#[serde(default)]
pub struct Config {
    /// Tracing filter expression, e.g. `info` or `mxbridge=debug`.
    pub log_filter: String,
    /// Output format of the telemetry subscriber.
    pub log_format: LogFormat,
    /// Maximum nesting depth emitted by the converter.
    pub max_depth: usize,
    /// Maximum number of elements kept from a sequence or map.
    pub max_collection_size: usize,
    /// Maximum number of composite values expanded per conversion.
    pub max_objects: usize,
    /// Number of history entries kept per monitored key.
    pub history_max_entries: usize,
    /// Allow and deny rules consulted before any backend access.
    pub access_rules: Vec<AccessDirective>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            max_depth: DEFAULT_MAX_DEPTH,
            max_collection_size: DEFAULT_MAX_COLLECTION_SIZE,
            max_objects: DEFAULT_MAX_OBJECTS,
            history_max_entries: DEFAULT_HISTORY_MAX_ENTRIES,
            access_rules: Vec::new(),
        }
    }
}

impl Config {
    /// Tracing filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Telemetry output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Access directives ordered for evaluation, latest rule per target last.
    #[must_use]
    pub fn access_policy(&self) -> AccessPolicy {
        AccessPolicy::from_directives(&self.access_rules)
    }
}
