//! eventsite-core: HTTP core of the eventsite backend
//!
//! Request/response types, a synchronous middleware chain, built-in
//! handlers (health report, static bundle with history fallback) and a
//! hyper based server that dispatches to async route handlers.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod error;
pub mod handlers;
pub mod method;
pub mod middleware;
pub mod request;
pub mod response;
pub mod server;
pub mod validate;

// Re-exports
pub use error::{Error, Result};
pub use method::Method;
pub use request::{Request, RequestBuilder};
pub use response::{Response, ResponseBuilder, StatusCode};

pub use middleware::{Middleware, MiddlewareChain};

pub use handlers::{Health, HealthCheck, HealthCheckResult, HealthStatus, StaticFileConfig, StaticFiles};

pub use server::{
    bind, create_optimized_socket, handler, to_hyper_response, App, ConnectionTracker,
    DynamicHandler, Server, ServerConfig,
};

pub use validate::{is_email, ValidationError, Validator};
