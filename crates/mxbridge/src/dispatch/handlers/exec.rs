//! EXEC: invoke an operation with coerced positional arguments.

use serde_json::Value;

use super::{HandlerContext, RequestHandler};
use crate::backend::{BackendRegistry, ObjectDescriptor, OperationInfo};
use crate::convert::coerce;
use crate::dispatch::errors::AgentError;
use crate::dispatch::request::{Request, RequestKind};

/// Handler for EXEC requests.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExecHandler;

impl RequestHandler for ExecHandler {
    fn kind(&self) -> RequestKind {
        RequestKind::Exec
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
        let name = request
            .member_name()
            .ok_or_else(|| AgentError::invalid_request("exec requires an operation"))?;
        context.ensure_allowed(target, Some(name))?;

        let operation = select_overload(request, target, name)?;
        let arguments = operation
            .parameters
            .iter()
            .zip(&request.arguments)
            .map(|(parameter, argument)| coerce(&parameter.type_name, argument))
            .collect::<Result<Vec<_>, _>>()?;

        let result = backend
            .invoke(&target.name, operation, arguments)
            .map_err(|error| AgentError::from_backend(backend.label(), error))?;
        Ok(context
            .converter
            .convert(&result, &request.path, context.limits)?)
    }
}

/// Picks the overload named by the request: by explicit signature when one
/// is given, otherwise by arity.
fn select_overload<'a>(
    request: &Request,
    target: &'a ObjectDescriptor,
    name: &'a str,
) -> Result<&'a OperationInfo, AgentError> {
    let target_name = target.name.canonical();
    let named: Vec<&OperationInfo> = target.operations_named(name).collect();
    if named.is_empty() {
        return Err(AgentError::operation_not_found(
            name,
            target_name,
            "no operation with this name",
        ));
    }

    let signature = request.signature();
    let arity = request.arguments.len();
    let mut candidates = named.into_iter().filter(|operation| match &signature {
        Some(types) => operation.signature().eq(types.iter().map(String::as_str)),
        None => operation.parameters.len() == arity,
    });

    match (candidates.next(), candidates.next()) {
        (Some(operation), None) if operation.parameters.len() == arity => Ok(operation),
        (Some(operation), None) => Err(AgentError::operation_not_found(
            name,
            target_name,
            format!(
                "expects {} arguments, got {arity}",
                operation.parameters.len()
            ),
        )),
        (None, _) => Err(AgentError::operation_not_found(
            name,
            target_name,
            match &signature {
                Some(types) => format!("no overload with signature ({})", types.join(",")),
                None => format!("no overload taking {arity} arguments"),
            },
        )),
        (Some(_), Some(_)) => Err(AgentError::operation_not_found(
            name,
            target_name,
            "overloaded; add a signature such as name(type,...)",
        )),
    }
}
