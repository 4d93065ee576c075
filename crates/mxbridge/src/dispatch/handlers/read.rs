//! READ: one attribute, every readable attribute, or a pattern selection.

use serde_json::Value;
use tracing::debug;

use super::{HandlerContext, RequestHandler};
use crate::backend::{BackendRegistry, ObjectDescriptor};
use crate::dispatch::errors::AgentError;
use crate::dispatch::request::RequestKind;
use crate::dispatch::router::DISPATCH_TARGET;
use crate::history::HistoryKey;
use crate::value::RawValue;

/// Handler for READ requests.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReadHandler;

impl RequestHandler for ReadHandler {
    fn kind(&self) -> RequestKind {
        RequestKind::Read
    }

    fn supports_aggregate_dispatch(&self) -> bool {
        false
    }

    fn handle_single(
        &self,
        context: &HandlerContext<'_>,
        backend: &dyn BackendRegistry,
        target: &ObjectDescriptor,
    ) -> Result<Value, AgentError> {
        let request = context.request;
        let raw = match request.attribute.as_deref() {
            Some(attribute) => read_one(context, backend, target, attribute)?,
            None => read_all(context, backend, target)?,
        };
        let value = context
            .converter
            .convert(&raw, &request.path, context.limits)?;

        // Pattern reads are assembled by the router and never recorded.
        if !request.target.is_pattern() {
            let key = HistoryKey::new(
                target.name.canonical(),
                request.attribute.as_deref(),
                &request.path,
            );
            context.history.record_now(key, value.clone())?;
        }
        Ok(value)
    }
}

fn read_one(
    context: &HandlerContext<'_>,
    backend: &dyn BackendRegistry,
    target: &ObjectDescriptor,
    attribute: &str,
) -> Result<RawValue, AgentError> {
    context.ensure_allowed(target, Some(attribute))?;
    match target.attribute(attribute) {
        Some(info) if info.readable => {}
        Some(_) => {
            return Err(AgentError::invalid_request(format!(
                "attribute '{attribute}' of {} is not readable",
                target.name
            )));
        }
        None => {
            return Err(AgentError::target_not_found(format!(
                "attribute '{attribute}' not found on '{}'",
                target.name
            )));
        }
    }
    backend
        .get_attribute(&target.name, attribute)
        .map_err(|error| AgentError::from_backend(backend.label(), error))
}

fn read_all(
    context: &HandlerContext<'_>,
    backend: &dyn BackendRegistry,
    target: &ObjectDescriptor,
) -> Result<RawValue, AgentError> {
    let mut entries = Vec::new();
    for info in target.attributes.iter().filter(|info| info.readable) {
        if !context
            .restrictor
            .is_allowed(RequestKind::Read, &target.name, Some(&info.name))
        {
            debug!(
                target: DISPATCH_TARGET,
                object = %target.name,
                attribute = info.name.as_str(),
                "attribute hidden by restrictor"
            );
            continue;
        }
        match backend.get_attribute(&target.name, &info.name) {
            Ok(value) => entries.push((RawValue::String(info.name.clone()), value)),
            // Attributes may disappear between introspection and read.
            Err(error) if error.is_not_found() => {}
            Err(error) => return Err(AgentError::from_backend(backend.label(), error)),
        }
    }
    Ok(RawValue::Map(entries))
}
