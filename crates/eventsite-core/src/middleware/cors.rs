//! CORS (Cross-Origin Resource Sharing) middleware
//!
//! Answers preflight requests and adds CORS headers to responses for
//! allowed origins. Requests from other origins are refused with 403.

use super::Middleware;
use crate::{Method, Request, Response, ResponseBuilder, StatusCode};
use smallvec::SmallVec;

/// CORS configuration
#[derive(Debug, Clone)]
pub struct CorsConfig {
    /// Allowed origins (empty = all)
    pub origins: SmallVec<[String; 4]>,
    pub methods: SmallVec<[Method; 8]>,
    pub headers: SmallVec<[String; 8]>,
    pub credentials: bool,
    /// Preflight cache lifetime in seconds
    pub max_age: u32,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            origins: SmallVec::new(),
            methods: smallvec::smallvec![
                Method::Get,
                Method::Post,
                Method::Put,
                Method::Delete,
                Method::Patch,
                Method::Head,
                Method::Options,
            ],
            headers: smallvec::smallvec![
                "Origin".to_string(),
                "Content-Type".to_string(),
                "Accept".to_string(),
            ],
            credentials: false,
            max_age: 12 * 60 * 60,
        }
    }
}

impl CorsConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow_origin(mut self, origin: impl Into<String>) -> Self {
        let origin = origin.into();
        let origin = origin.trim_end_matches('/').to_string();
        if !origin.is_empty() && !self.origins.contains(&origin) {
            self.origins.push(origin);
        }
        self
    }

    /// Replace the allowed methods
    pub fn methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.methods = methods.into_iter().collect();
        self
    }

    pub fn allow_header(mut self, header: impl Into<String>) -> Self {
        let header = header.into();
        if !self.headers.iter().any(|h| h.eq_ignore_ascii_case(&header)) {
            self.headers.push(header);
        }
        self
    }

    pub fn allow_credentials(mut self) -> Self {
        self.credentials = true;
        self
    }

    pub fn max_age(mut self, seconds: u32) -> Self {
        self.max_age = seconds;
        self
    }
}

/// CORS middleware
pub struct Cors {
    config: CorsConfig,
}

impl Cors {
    pub fn new(config: CorsConfig) -> Self {
        Self { config }
    }

    fn is_origin_allowed(&self, origin: &str) -> bool {
        self.config.origins.is_empty() || self.config.origins.iter().any(|o| o == origin || o == "*")
    }

    fn methods_string(&self) -> String {
        self.config
            .methods
            .iter()
            .map(|m| m.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn add_cors_headers(&self, res: &mut Response, origin: &str, preflight: bool) {
        // A wildcard cannot be combined with credentials, so echo the origin then.
        let origin_value = if self.config.origins.is_empty() && !self.config.credentials {
            "*".to_string()
        } else {
            res.headers.push(("Vary".to_string(), "Origin".to_string()));
            origin.to_string()
        };
        res.headers.push(("Access-Control-Allow-Origin".to_string(), origin_value));

        if self.config.credentials {
            res.headers.push((
                "Access-Control-Allow-Credentials".to_string(),
                "true".to_string(),
            ));
        }

        if preflight {
            res.headers.push((
                "Access-Control-Allow-Methods".to_string(),
                self.methods_string(),
            ));
            if !self.config.headers.is_empty() {
                res.headers.push((
                    "Access-Control-Allow-Headers".to_string(),
                    self.config.headers.join(", "),
                ));
            }
            res.headers.push((
                "Access-Control-Max-Age".to_string(),
                self.config.max_age.to_string(),
            ));
        }
    }
}

impl Middleware for Cors {
    fn before(&self, req: &mut Request) -> Option<Response> {
        // No origin header = same-origin request, skip CORS
        let origin = req.header("origin").unwrap_or("");
        if origin.is_empty() {
            return None;
        }

        if !self.is_origin_allowed(origin) {
            tracing::debug!(origin, path = %req.path, "cors: origin not allowed");
            return Some(
                ResponseBuilder::new(StatusCode::FORBIDDEN)
                    .header("content-type", "text/plain; charset=utf-8")
                    .body("CORS: Origin not allowed")
                    .build(),
            );
        }

        if req.method == Method::Options {
            let mut res = ResponseBuilder::new(StatusCode::NO_CONTENT).build();
            self.add_cors_headers(&mut res, origin, true);
            return Some(res);
        }

        None
    }

    fn after(&self, req: &Request, res: &mut Response) {
        let origin = req.header("origin").unwrap_or("");
        if origin.is_empty() || req.method == Method::Options || !self.is_origin_allowed(origin) {
            return;
        }
        self.add_cors_headers(res, origin, false);
    }
}
