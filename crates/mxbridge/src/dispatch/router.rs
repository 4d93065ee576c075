//! Request routing across backend registries.
//!
//! Every request is validated, checked once against the restrictor and only
//! then shown to backends. Aggregate kinds hand the handler every eligible
//! backend; single-target kinds first resolve which backend owns the target.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::debug;

use mxbridge_config::DEFAULT_HISTORY_MAX_ENTRIES;

use super::errors::AgentError;
use super::handlers::{HandlerContext, RequestHandler, denied, handler_for};
use super::request::Request;
use super::response::Envelope;
use crate::backend::{BackendRegistry, ObjectDescriptor};
use crate::convert::{ConversionLimits, ObjectToJsonConverter};
use crate::history::HistoryStore;
use crate::restrictor::{AllowAll, Restrictor};

/// Tracing target for dispatch operations.
pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

/// Routes requests to handlers and backends.
pub struct Dispatcher {
    backends: Vec<Arc<dyn BackendRegistry>>,
    restrictor: Arc<dyn Restrictor>,
    converter: ObjectToJsonConverter,
    history: Arc<HistoryStore>,
    limits: ConversionLimits,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let labels: Vec<&str> = self.backends.iter().map(|backend| backend.label()).collect();
        formatter
            .debug_struct("Dispatcher")
            .field("backends", &labels)
            .field("converter", &self.converter)
            .field("history", &self.history)
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Dispatcher`].
pub struct DispatcherBuilder {
    backends: Vec<Arc<dyn BackendRegistry>>,
    restrictor: Arc<dyn Restrictor>,
    converter: ObjectToJsonConverter,
    history: Option<Arc<HistoryStore>>,
    limits: ConversionLimits,
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self {
            backends: Vec::new(),
            restrictor: Arc::new(AllowAll),
            converter: ObjectToJsonConverter::default(),
            history: None,
            limits: ConversionLimits::default(),
        }
    }
}

impl DispatcherBuilder {
    /// Adds a backend; backends are consulted in insertion order.
    #[must_use]
    pub fn backend(mut self, backend: Arc<dyn BackendRegistry>) -> Self {
        self.backends.push(backend);
        self
    }

    /// Adds several backends.
    #[must_use]
    pub fn backends<I>(mut self, backends: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn BackendRegistry>>,
    {
        self.backends.extend(backends);
        self
    }

    /// Replaces the default allow-all restrictor.
    #[must_use]
    pub fn restrictor(mut self, restrictor: Arc<dyn Restrictor>) -> Self {
        self.restrictor = restrictor;
        self
    }

    /// Replaces the default converter.
    #[must_use]
    pub fn converter(mut self, converter: ObjectToJsonConverter) -> Self {
        self.converter = converter;
        self
    }

    /// Shares a history store with the dispatcher.
    #[must_use]
    pub fn history(mut self, history: Arc<HistoryStore>) -> Self {
        self.history = Some(history);
        self
    }

    /// Sets default conversion limits.
    #[must_use]
    pub const fn limits(mut self, limits: ConversionLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Builds the dispatcher.
    #[must_use]
    pub fn build(self) -> Dispatcher {
        Dispatcher {
            backends: self.backends,
            restrictor: self.restrictor,
            converter: self.converter,
            history: self
                .history
                .unwrap_or_else(|| Arc::new(HistoryStore::new(DEFAULT_HISTORY_MAX_ENTRIES))),
            limits: self.limits,
        }
    }
}

impl Dispatcher {
    /// Starts building a dispatcher.
    #[must_use]
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::default()
    }

    /// History store fed by READ requests.
    #[must_use]
    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// Converter used for results.
    #[must_use]
    pub fn converter(&self) -> &ObjectToJsonConverter {
        &self.converter
    }

    /// Serves a request.
    ///
    /// # Errors
    ///
    /// Returns an [`AgentError`] describing why the request failed.
    pub fn handle(&self, request: &Request) -> Result<Value, AgentError> {
        request.validate()?;

        debug!(
            target: DISPATCH_TARGET,
            kind = %request.kind,
            object = %request.target,
            member = request.member().unwrap_or_default(),
            "dispatching request"
        );

        let member = request.member_name();
        if !self
            .restrictor
            .is_allowed(request.kind, &request.target, member)
        {
            debug!(
                target: DISPATCH_TARGET,
                kind = %request.kind,
                object = %request.target,
                "request denied by restrictor"
            );
            return Err(denied(request.kind, &request.target.canonical(), member));
        }

        let handler = handler_for(request.kind);
        let context = HandlerContext {
            request,
            converter: &self.converter,
            restrictor: self.restrictor.as_ref(),
            history: &self.history,
            limits: self.limits.with_overrides(&request.config),
        };
        let backends: Vec<Arc<dyn BackendRegistry>> = self
            .backends
            .iter()
            .filter(|backend| backend.can_handle(request))
            .cloned()
            .collect();

        if handler.supports_aggregate_dispatch() {
            handler.handle_aggregate(&context, &backends)
        } else if request.target.is_pattern() {
            read_pattern(handler, &context, &backends)
        } else {
            let (backend, target) = resolve_single(request, &backends)?;
            handler.handle_single(&context, backend.as_ref(), &target)
        }
    }

    /// Serves a request and wraps the outcome in a response envelope.
    #[must_use]
    pub fn handle_envelope(&self, request: &Request) -> Envelope {
        Envelope::from_outcome(request, &self.handle(request))
    }

    /// Parses and serves a raw JSON request, always producing an envelope.
    #[must_use]
    pub fn handle_json(&self, input: &[u8]) -> Value {
        match Request::parse(input) {
            Ok(request) => self.handle_envelope(&request).into_json(),
            Err(error) => Envelope::failure(None, &error).into_json(),
        }
    }
}

/// Pattern READ: `{canonical name: value}` over every matching object.
fn read_pattern(
    handler: &dyn RequestHandler,
    context: &HandlerContext<'_>,
    backends: &[Arc<dyn BackendRegistry>],
) -> Result<Value, AgentError> {
    let mut merged = Map::new();
    let mut matched = false;
    for backend in backends {
        let descriptors = backend
            .list_objects(&context.request.target)
            .map_err(|error| AgentError::from_backend(backend.label(), error))?;
        for descriptor in descriptors {
            matched = true;
            match handler.handle_single(context, backend.as_ref(), &descriptor) {
                Ok(value) => {
                    merged.insert(descriptor.name.canonical(), value);
                }
                // Objects lacking the attribute, or hiding it, are left out.
                Err(
                    error @ (AgentError::TargetNotFound { .. }
                    | AgentError::AccessDenied { .. }),
                ) => {
                    debug!(
                        target: DISPATCH_TARGET,
                        object = %descriptor.name,
                        error = %error,
                        "object skipped in pattern read"
                    );
                }
                Err(error) => return Err(error),
            }
        }
    }
    if matched {
        Ok(Value::Object(merged))
    } else {
        Err(AgentError::target_not_found(format!(
            "no object matches '{}'",
            context.request.target
        )))
    }
}

fn resolve_single(
    request: &Request,
    backends: &[Arc<dyn BackendRegistry>],
) -> Result<(Arc<dyn BackendRegistry>, ObjectDescriptor), AgentError> {
    let mut owners = Vec::new();
    for backend in backends {
        let found = backend
            .list_objects(&request.target)
            .map_err(|error| AgentError::from_backend(backend.label(), error))?
            .into_iter()
            .find(|descriptor| descriptor.name == request.target);
        if let Some(descriptor) = found {
            owners.push((Arc::clone(backend), descriptor));
        }
    }

    match owners.len() {
        0 => Err(AgentError::target_not_found(format!(
            "instance '{}' not found",
            request.target
        ))),
        1 => owners
            .pop()
            .ok_or_else(|| AgentError::internal("resolved owner vanished")),
        _ => Err(AgentError::ambiguous_target(
            request.target.canonical(),
            owners
                .iter()
                .map(|(backend, _)| backend.label().to_owned())
                .collect(),
        )),
    }
}
