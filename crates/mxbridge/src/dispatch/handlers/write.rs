//! WRITE: set an attribute and return its previous value.

use serde_json::Value;

use super::{HandlerContext, RequestHandler};
use crate::backend::{BackendRegistry, ObjectDescriptor};
use crate::convert::coerce;
use crate::dispatch::errors::AgentError;
use crate::dispatch::request::RequestKind;

/// Handler for WRITE requests.
#[derive(Debug, Default, Clone, Copy)]
pub struct WriteHandler;

impl RequestHandler for WriteHandler {
    fn kind(&self) -> RequestKind {
        RequestKind::Write
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
        let (Some(attribute), Some(new_value)) = (request.attribute.as_deref(), &request.value)
        else {
            return Err(AgentError::invalid_request(
                "write requires an attribute and a value",
            ));
        };
        context.ensure_allowed(target, Some(attribute))?;

        let info = target.attribute(attribute).ok_or_else(|| {
            AgentError::target_not_found(format!(
                "attribute '{attribute}' not found on '{}'",
                target.name
            ))
        })?;
        if !info.writable {
            return Err(AgentError::invalid_request(format!(
                "attribute '{attribute}' of {} is read-only",
                target.name
            )));
        }

        let coerced = coerce(&info.type_name, new_value)?;
        let previous = backend
            .set_attribute(&target.name, attribute, coerced)
            .map_err(|error| AgentError::from_backend(backend.label(), error))?;
        Ok(context
            .converter
            .convert(&previous, &request.path, context.limits)?)
    }
}
