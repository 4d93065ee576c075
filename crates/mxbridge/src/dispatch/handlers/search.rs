//! SEARCH: canonical names matching a pattern.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::Value;

use super::{HandlerContext, RequestHandler, gather};
use crate::backend::BackendRegistry;
use crate::dispatch::errors::AgentError;
use crate::dispatch::request::RequestKind;

/// Handler for SEARCH requests.
#[derive(Debug, Default, Clone, Copy)]
pub struct SearchHandler;

impl RequestHandler for SearchHandler {
    fn kind(&self) -> RequestKind {
        RequestKind::Search
    }

    fn supports_aggregate_dispatch(&self) -> bool {
        true
    }

    fn handle_aggregate(
        &self,
        context: &HandlerContext<'_>,
        backends: &[Arc<dyn BackendRegistry>],
    ) -> Result<Value, AgentError> {
        let pattern = &context.request.target;
        let per_backend = gather(backends, |backend| backend.list_objects(pattern))?;

        let names: BTreeSet<String> = per_backend
            .iter()
            .flatten()
            .filter(|descriptor| {
                context
                    .restrictor
                    .is_allowed(RequestKind::Search, &descriptor.name, None)
            })
            .map(|descriptor| descriptor.name.canonical())
            .collect();
        Ok(Value::Array(names.into_iter().map(Value::String).collect()))
    }
}
