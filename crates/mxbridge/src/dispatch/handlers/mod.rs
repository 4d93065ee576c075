//! One handler per request kind.
//!
//! LIST and SEARCH run once over every eligible backend and merge what they
//! find. READ, WRITE and EXEC run against the single backend object the
//! router resolved for the request.

mod exec;
mod list;
mod read;
mod search;
mod write;

use std::sync::Arc;
use std::thread;

use serde_json::Value;
use tracing::warn;

pub use exec::ExecHandler;
pub use list::ListHandler;
pub use read::ReadHandler;
pub use search::SearchHandler;
pub use write::WriteHandler;

use super::errors::AgentError;
use super::request::{Request, RequestKind};
use super::router::DISPATCH_TARGET;
use crate::backend::{BackendError, BackendRegistry, ObjectDescriptor};
use crate::convert::{ConversionLimits, ObjectToJsonConverter};
use crate::history::HistoryStore;
use crate::restrictor::Restrictor;

/// Everything a handler needs besides the backends.
pub struct HandlerContext<'a> {
    /// Request being served.
    pub request: &'a Request,
    /// Converter for raw values.
    pub converter: &'a ObjectToJsonConverter,
    /// Access decisions.
    pub restrictor: &'a dyn Restrictor,
    /// History sink for reads.
    pub history: &'a HistoryStore,
    /// Conversion limits with request overrides applied.
    pub limits: ConversionLimits,
}

impl HandlerContext<'_> {
    /// Fails with [`AgentError::AccessDenied`] unless the restrictor allows
    /// the request kind on `descriptor` and `member`.
    pub(crate) fn ensure_allowed(
        &self,
        descriptor: &ObjectDescriptor,
        member: Option<&str>,
    ) -> Result<(), AgentError> {
        if self
            .restrictor
            .is_allowed(self.request.kind, &descriptor.name, member)
        {
            Ok(())
        } else {
            Err(denied(self.request.kind, &descriptor.name.canonical(), member))
        }
    }
}

pub(crate) fn denied(kind: RequestKind, target: &str, member: Option<&str>) -> AgentError {
    let target = match member {
        Some(member) => format!("{target}#{member}"),
        None => target.to_owned(),
    };
    AgentError::access_denied(kind.to_string(), target)
}

/// Runs `query` against every backend in parallel.
///
/// Results come back in backend order. A failing backend is logged and
/// omitted; only when every backend fails is the first failure returned.
pub(crate) fn gather<T, F>(
    backends: &[Arc<dyn BackendRegistry>],
    query: F,
) -> Result<Vec<T>, AgentError>
where
    T: Send,
    F: Fn(&dyn BackendRegistry) -> Result<T, BackendError> + Sync,
{
    let query = &query;
    let outcomes: Vec<Result<T, BackendError>> = thread::scope(|scope| {
        let handles: Vec<_> = backends
            .iter()
            .map(|backend| scope.spawn(move || query(backend.as_ref())))
            .collect();
        handles
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .unwrap_or_else(|_| Err(BackendError::failure("backend query panicked")))
            })
            .collect()
    });

    let mut results = Vec::with_capacity(outcomes.len());
    let mut first_failure = None;
    for (backend, outcome) in backends.iter().zip(outcomes) {
        match outcome {
            Ok(value) => results.push(value),
            Err(error) => {
                warn!(
                    target: DISPATCH_TARGET,
                    backend = backend.label(),
                    error = %error,
                    "backend omitted from aggregate result"
                );
                if first_failure.is_none() {
                    first_failure = Some(AgentError::from_backend(backend.label(), error));
                }
            }
        }
    }
    match first_failure {
        Some(error) if results.is_empty() => Err(error),
        _ => Ok(results),
    }
}

/// Behaviour shared by request handlers.
pub trait RequestHandler: Send + Sync {
    /// Kind of request served.
    fn kind(&self) -> RequestKind;

    /// Whether the handler runs once over the union of all backends.
    fn supports_aggregate_dispatch(&self) -> bool;

    /// Serves the request against one resolved object.
    ///
    /// # Errors
    ///
    /// Returns an [`AgentError`] when the request cannot be served.
    fn handle_single(
        &self,
        context: &HandlerContext<'_>,
        backend: &dyn BackendRegistry,
        target: &ObjectDescriptor,
    ) -> Result<Value, AgentError> {
        let _ = (context, backend, target);
        Err(AgentError::internal(format!(
            "{} does not support single-target dispatch",
            self.kind()
        )))
    }

    /// Serves the request over every eligible backend.
    ///
    /// # Errors
    ///
    /// Returns an [`AgentError`] when no backend produced a result.
    fn handle_aggregate(
        &self,
        context: &HandlerContext<'_>,
        backends: &[Arc<dyn BackendRegistry>],
    ) -> Result<Value, AgentError> {
        let _ = (context, backends);
        Err(AgentError::internal(format!(
            "{} does not support aggregate dispatch",
            self.kind()
        )))
    }
}

/// Handler serving `kind`.
#[must_use]
pub fn handler_for(kind: RequestKind) -> &'static dyn RequestHandler {
    match kind {
        RequestKind::List => &ListHandler,
        RequestKind::Read => &ReadHandler,
        RequestKind::Write => &WriteHandler,
        RequestKind::Exec => &ExecHandler,
        RequestKind::Search => &SearchHandler,
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(RequestKind::List)]
    #[case(RequestKind::Read)]
    #[case(RequestKind::Write)]
    #[case(RequestKind::Exec)]
    #[case(RequestKind::Search)]
    fn handlers_match_their_kind(#[case] kind: RequestKind) {
        let handler = handler_for(kind);
        assert_eq!(handler.kind(), kind);
        assert_eq!(handler.supports_aggregate_dispatch(), kind.is_aggregate());
    }
}
