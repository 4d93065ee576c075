use crate::logging::LogFormat;

/// Default log filter expression.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default maximum nesting depth of converted values.
pub const DEFAULT_MAX_DEPTH: usize = 15;

/// Default number of elements kept from a sequence or map.
pub const DEFAULT_MAX_COLLECTION_SIZE: usize = 1000;

/// Default cap on composite values expanded per conversion (`0` disables it).
pub const DEFAULT_MAX_OBJECTS: usize = 0;

/// Default number of history entries retained per monitored key.
pub const DEFAULT_HISTORY_MAX_ENTRIES: usize = 10;

/// Default log filter expression.
#[must_use]
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}
