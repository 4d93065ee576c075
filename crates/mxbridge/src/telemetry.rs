//! Structured telemetry initialisation for the agent.
//!
//! The subscriber is process-global. The first successful call decides the
//! output format; every handle reports that format together with the one its
//! own configuration asked for.

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use tracing::{Subscriber, subscriber::SetGlobalDefaultError};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

use mxbridge_config::{Config, LogFormat};

const TELEMETRY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::telemetry");

static INSTALLED_FORMAT: OnceCell<LogFormat> = OnceCell::new();

/// Describes the subscriber serving the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelemetryHandle {
    installed: LogFormat,
    requested: LogFormat,
}

impl TelemetryHandle {
    /// Format of the installed subscriber.
    #[must_use]
    pub const fn format(self) -> LogFormat {
        self.installed
    }

    /// Returns `true` when events are emitted as JSON objects.
    #[must_use]
    pub const fn is_structured(self) -> bool {
        self.installed.is_structured()
    }

    /// Returns `true` when the installed format is the one requested.
    #[must_use]
    pub fn honours_request(self) -> bool {
        self.installed == self.requested
    }
}

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// The configured filter expression did not parse.
    #[error("invalid log filter: {0}")]
    Filter(String),
    /// Another global subscriber was already installed.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(SetGlobalDefaultError),
}

/// Installs the global tracing subscriber on first use.
///
/// Later calls leave the global state alone. When they ask for a different
/// format the mismatch is logged and visible through
/// [`TelemetryHandle::honours_request`].
///
/// # Examples
///
/// ```rust
/// use mxbridge::telemetry;
/// use mxbridge_config::Config;
///
/// # fn main() -> Result<(), mxbridge::telemetry::TelemetryError> {
/// let config = Config::default();
/// let first = telemetry::initialise(&config)?;
/// let second = telemetry::initialise(&config)?;
/// assert_eq!(first.format(), second.format());
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Returns [`TelemetryError`] when the filter is invalid or a foreign
/// subscriber already owns the global slot.
pub fn initialise(config: &Config) -> Result<TelemetryHandle, TelemetryError> {
    let requested = config.log_format();
    let installed = *INSTALLED_FORMAT.get_or_try_init(|| {
        install_subscriber(config)?;
        tracing::debug!(
            target: TELEMETRY_TARGET,
            format = %requested,
            filter = %config.log_filter(),
            "telemetry installed"
        );
        Ok::<_, TelemetryError>(requested)
    })?;
    let handle = TelemetryHandle {
        installed,
        requested,
    };
    if !handle.honours_request() {
        tracing::warn!(
            target: TELEMETRY_TARGET,
            installed = %installed,
            requested = %requested,
            "telemetry already installed with another format"
        );
    }
    Ok(handle)
}

fn install_subscriber(config: &Config) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_new(config.log_filter())
        .map_err(|error| TelemetryError::Filter(error.to_string()))?;

    let base = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_timer(fmt::time::UtcTime::rfc_3339());

    let subscriber: Box<dyn Subscriber + Send + Sync> = if config.log_format().is_structured() {
        Box::new(base.json().flatten_event(true).finish())
    } else {
        Box::new(base.compact().finish())
    };

    tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)
}
