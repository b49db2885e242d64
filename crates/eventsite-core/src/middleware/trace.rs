//! Request tracing middleware
//!
//! Propagates or assigns a request id and emits one structured log
//! event per request.

use super::Middleware;
use crate::{Request, Response};
use std::time::Instant;

/// Request id attached to the request extensions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

#[derive(Debug, Clone, Copy)]
struct Started(Instant);

#[derive(Debug, Clone)]
pub struct TraceConfig {
    /// Header carrying the request id in both directions
    pub header_name: String,
    /// Generate a request id if the client did not send one
    pub generate_id: bool,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            header_name: "X-Request-ID".to_string(),
            generate_id: true,
        }
    }
}

impl TraceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header_name(mut self, name: impl Into<String>) -> Self {
        self.header_name = name.into();
        self
    }

    pub fn generate_id(mut self, generate: bool) -> Self {
        self.generate_id = generate;
        self
    }
}

/// Tracing middleware
#[derive(Default)]
pub struct Trace {
    config: TraceConfig,
}

impl Trace {
    pub fn new(config: TraceConfig) -> Self {
        Self { config }
    }
}

impl Middleware for Trace {
    fn before(&self, req: &mut Request) -> Option<Response> {
        let incoming = req
            .header(&self.config.header_name)
            .filter(|id| !id.is_empty() && id.len() <= 128)
            .map(str::to_string);

        let id = incoming.or_else(|| {
            self.config
                .generate_id
                .then(|| uuid::Uuid::new_v4().to_string())
        });

        if let Some(id) = id {
            req.extensions.insert(RequestId(id));
        }
        req.extensions.insert(Started(Instant::now()));
        None
    }

    fn after(&self, req: &Request, res: &mut Response) {
        let request_id = req.extension::<RequestId>().map(|id| id.0.as_str());
        if let Some(id) = request_id {
            res.set_header(&self.config.header_name, id);
        }

        let latency_ms = req
            .extension::<Started>()
            .map(|s| s.0.elapsed().as_secs_f64() * 1000.0)
            .unwrap_or_default();

        let status = res.status.as_u16();
        let request_id = request_id.unwrap_or("-");
        if res.status.is_server_error() {
            tracing::warn!(request_id, method = %req.method, path = %req.path, status, latency_ms, "request");
        } else {
            tracing::info!(request_id, method = %req.method, path = %req.path, status, latency_ms, "request");
        }
    }
}
