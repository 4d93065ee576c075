//! Request model, handlers and routing.
//!
//! A [`Request`] names a kind, a target object (or pattern) and optionally a
//! member and an extra path. The [`Dispatcher`] consults the restrictor once,
//! selects the [`RequestHandler`] for the kind and feeds it the backends that
//! accept the request. Outcomes are reported either as plain JSON values or
//! wrapped in an [`Envelope`].

pub(crate) mod errors;
pub mod handlers;
pub(crate) mod request;
mod response;
pub(crate) mod router;

pub use errors::AgentError;
pub use handlers::{
    ExecHandler, HandlerContext, ListHandler, ReadHandler, RequestHandler, SearchHandler,
    WriteHandler, handler_for,
};
pub use request::{Request, RequestKind, split_path};
pub use response::Envelope;
pub use router::{Dispatcher, DispatcherBuilder};
