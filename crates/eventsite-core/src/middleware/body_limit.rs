//! Body size limit middleware
//!
//! Rejects requests whose declared or buffered body exceeds the limit
//! with a 413 JSON error.

use super::Middleware;
use crate::{Request, Response, StatusCode};

/// Body limit configuration
#[derive(Debug, Clone)]
pub struct BodyLimitConfig {
    /// Maximum body size in bytes
    pub max_size: usize,
    pub message: String,
}

impl BodyLimitConfig {
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            message: "Request body too large".to_string(),
        }
    }

    pub fn kb(size: usize) -> Self {
        Self::new(size * 1024)
    }

    pub fn mb(size: usize) -> Self {
        Self::new(size * 1024 * 1024)
    }

    /// Parse size from string (e.g., "10mb", "500kb", "2048")
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_ascii_lowercase();

        let (num, multiplier) = if let Some(n) = s.strip_suffix("mb") {
            (n, 1024 * 1024)
        } else if let Some(n) = s.strip_suffix("kb") {
            (n, 1024)
        } else if let Some(n) = s.strip_suffix('b') {
            (n, 1)
        } else {
            (s.as_str(), 1)
        };

        let num: usize = num.trim().parse().ok()?;
        Some(Self::new(num.checked_mul(multiplier)?))
    }

    pub fn message(mut self, msg: impl Into<String>) -> Self {
        self.message = msg.into();
        self
    }
}

/// Format size for display
pub fn format_size(bytes: usize) -> String {
    if bytes >= 1024 * 1024 {
        format!("{:.1}MB", bytes as f64 / (1024.0 * 1024.0))
    } else if bytes >= 1024 {
        format!("{:.1}KB", bytes as f64 / 1024.0)
    } else {
        format!("{}B", bytes)
    }
}

/// Body limit middleware
pub struct BodyLimit {
    config: BodyLimitConfig,
}

impl BodyLimit {
    pub fn new(config: BodyLimitConfig) -> Self {
        Self { config }
    }

    /// 1MB, enough for any JSON payload the API accepts
    pub fn json() -> Self {
        Self::new(BodyLimitConfig::mb(1))
    }

    pub fn max_size(&self) -> usize {
        self.config.max_size
    }

    fn too_large(&self) -> Response {
        Response::json_value(
            StatusCode::PAYLOAD_TOO_LARGE,
            &serde_json::json!({
                "error": self.config.message,
                "max_size": format_size(self.config.max_size),
            }),
        )
    }
}

impl Middleware for BodyLimit {
    fn before(&self, req: &mut Request) -> Option<Response> {
        let declared = req.content_length().unwrap_or(0);
        if declared > self.config.max_size || req.body.len() > self.config.max_size {
            tracing::debug!(
                path = %req.path,
                declared,
                buffered = req.body.len(),
                "request body over limit"
            );
            return Some(self.too_large());
        }
        None
    }

    fn after(&self, _req: &Request, _res: &mut Response) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Method, RequestBuilder};

    #[test]
    fn test_parse_size() {
        assert_eq!(BodyLimitConfig::parse("10mb").unwrap().max_size, 10 * 1024 * 1024);
        assert_eq!(BodyLimitConfig::parse("500KB").unwrap().max_size, 500 * 1024);
        assert_eq!(BodyLimitConfig::parse("100b").unwrap().max_size, 100);
        assert_eq!(BodyLimitConfig::parse(" 2048 ").unwrap().max_size, 2048);
        assert!(BodyLimitConfig::parse("lots").is_none());
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(500), "500B");
        assert_eq!(format_size(1024), "1.0KB");
        assert_eq!(format_size(1024 * 1024), "1.0MB");
    }

    #[test]
    fn test_declared_length_over_limit() {
        let limit = BodyLimit::new(BodyLimitConfig::new(16));
        let mut req = RequestBuilder::new(Method::Post, "/api/contact-requests")
            .header("Content-Length", "4096")
            .build();

        let res = limit.before(&mut req).unwrap();
        assert_eq!(res.status, StatusCode::PAYLOAD_TOO_LARGE);
        let body = res.body_json().unwrap();
        assert_eq!(body["error"], "Request body too large");
        assert_eq!(body["max_size"], "16B");
    }

    #[test]
    fn test_buffered_body_over_limit() {
        let limit = BodyLimit::new(BodyLimitConfig::new(4));
        let mut req = RequestBuilder::new(Method::Post, "/").body("12345").build();
        assert!(limit.before(&mut req).is_some());
    }

    #[test]
    fn test_within_limit() {
        let limit = BodyLimit::json();
        let mut req = RequestBuilder::new(Method::Post, "/")
            .json(&serde_json::json!({"name": "Ada"}))
            .build();
        assert!(limit.before(&mut req).is_none());
    }
}
