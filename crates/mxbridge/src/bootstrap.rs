//! Agent bootstrap orchestration.

use std::sync::Arc;

use ortho_config::{OrthoConfig, OrthoError};
use serde_json::Value;
use thiserror::Error;

use mxbridge_config::Config;

use crate::backend::BackendRegistry;
use crate::convert::{ConversionLimits, ExtractorRegistry, ObjectToJsonConverter};
use crate::dispatch::{AgentError, Dispatcher, Envelope, Request};
use crate::health::{HealthReporter, StructuredHealthReporter};
use crate::history::HistoryStore;
use crate::restrictor::{PolicyRestrictor, RestrictorError};
use crate::telemetry::{self, TelemetryError, TelemetryHandle};

/// Abstracts configuration loading for testability.
pub trait ConfigLoader: Send + Sync {
    /// Loads the agent configuration.
    fn load(&self) -> Result<Config, Arc<OrthoError>>;
}

/// Loader that delegates to [`Config::load`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load()
    }
}

/// Loader handing out a fixed configuration.
#[derive(Debug, Default, Clone)]
pub struct StaticConfigLoader(pub Config);

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.0.clone())
    }
}

/// Errors surfaced during bootstrap.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// The configured access rules do not compile.
    #[error("failed to compile access policy: {source}")]
    Policy {
        /// Offending directive.
        #[source]
        source: RestrictorError,
    },
}

/// A configured agent ready to serve requests.
#[derive(Debug)]
pub struct Agent {
    config: Config,
    dispatcher: Dispatcher,
    telemetry: TelemetryHandle,
}

impl Agent {
    /// Resolved configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Telemetry handle, mostly useful in tests.
    #[must_use]
    pub const fn telemetry(&self) -> TelemetryHandle {
        self.telemetry
    }

    /// Underlying dispatcher.
    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// History recorded by READ requests.
    #[must_use]
    pub fn history(&self) -> &HistoryStore {
        self.dispatcher.history()
    }

    /// Serves a request.
    ///
    /// # Errors
    ///
    /// Returns an [`AgentError`] describing why the request failed.
    pub fn handle(&self, request: &Request) -> Result<Value, AgentError> {
        self.dispatcher.handle(request)
    }

    /// Serves a request and wraps the outcome in an envelope.
    #[must_use]
    pub fn handle_envelope(&self, request: &Request) -> Envelope {
        self.dispatcher.handle_envelope(request)
    }

    /// Parses and serves a raw JSON request.
    #[must_use]
    pub fn handle_json(&self, input: &[u8]) -> Value {
        self.dispatcher.handle_json(input)
    }
}

/// Bootstraps the agent from the layered system configuration.
///
/// # Errors
///
/// See [`bootstrap_with`].
pub fn bootstrap(backends: Vec<Arc<dyn BackendRegistry>>) -> Result<Agent, BootstrapError> {
    bootstrap_with(
        &SystemConfigLoader,
        Arc::new(StructuredHealthReporter::new()),
        backends,
    )
}

/// Bootstraps the agent using the supplied collaborators.
///
/// # Errors
///
/// Returns a [`BootstrapError`] when configuration cannot be loaded,
/// telemetry cannot be installed or the access rules do not compile.
pub fn bootstrap_with(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn HealthReporter>,
    backends: Vec<Arc<dyn BackendRegistry>>,
) -> Result<Agent, BootstrapError> {
    reporter.bootstrap_starting();

    let config = match loader.load() {
        Ok(config) => config,
        Err(source) => {
            let error = BootstrapError::Configuration { source };
            reporter.bootstrap_failed(&error);
            return Err(error);
        }
    };

    let telemetry = match telemetry::initialise(&config) {
        Ok(handle) => handle,
        Err(source) => {
            let error = BootstrapError::Telemetry { source };
            reporter.bootstrap_failed(&error);
            return Err(error);
        }
    };

    let restrictor = match PolicyRestrictor::from_policy(&config.access_policy()) {
        Ok(restrictor) => restrictor,
        Err(source) => {
            let error = BootstrapError::Policy { source };
            reporter.bootstrap_failed(&error);
            return Err(error);
        }
    };

    let backend_count = backends.len();
    let dispatcher = Dispatcher::builder()
        .backends(backends)
        .restrictor(Arc::new(restrictor))
        .converter(ObjectToJsonConverter::new(ExtractorRegistry::with_builtins()))
        .history(Arc::new(HistoryStore::new(config.history_max_entries)))
        .limits(ConversionLimits::from_config(&config))
        .build();
    reporter.bootstrap_succeeded(&config, backend_count);

    Ok(Agent {
        config,
        dispatcher,
        telemetry,
    })
}
