//! Health check handler
//!
//! Runs named checks and reports an aggregate status. A failing critical
//! check makes the service unhealthy (`503`); anything else that is not
//! healthy only degrades it.

use crate::{Response, StatusCode};
use serde::Serialize;
use std::time::{Duration, Instant};

/// Health status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unhealthy => "unhealthy",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
            // Degraded still serves traffic
            HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        }
    }
}

/// Outcome of one check
#[derive(Debug, Clone, Serialize)]
pub struct HealthCheckResult {
    pub name: String,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(rename = "duration_ms", serialize_with = "as_millis")]
    pub duration: Duration,
}

impl HealthCheckResult {
    pub fn new(name: impl Into<String>, status: HealthStatus) -> Self {
        Self {
            name: name.into(),
            status,
            message: None,
            duration: Duration::ZERO,
        }
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

fn as_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

pub type HealthCheckFn = Box<dyn Fn() -> HealthCheckResult + Send + Sync>;

/// Individual health check
pub struct HealthCheck {
    pub name: String,
    pub check: HealthCheckFn,
    pub critical: bool,
}

impl HealthCheck {
    pub fn new(
        name: impl Into<String>,
        check: impl Fn() -> HealthCheckResult + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            check: Box::new(check),
            critical: true,
        }
    }

    pub fn non_critical(mut self) -> Self {
        self.critical = false;
        self
    }

    pub fn run(&self) -> HealthCheckResult {
        let start = Instant::now();
        let mut result = (self.check)();
        result.duration = start.elapsed();
        result
    }
}

#[derive(Debug, Serialize)]
struct Report<'a> {
    status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    service: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<&'a str>,
    checks: Vec<HealthCheckResult>,
}

/// Health handler
#[derive(Default)]
pub struct Health {
    service: Option<String>,
    version: Option<String>,
    checks: Vec<HealthCheck>,
}

impl Health {
    pub fn new() -> Self {
        Self::default()
    }

    /// Service name and version included in every report
    pub fn service(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.service = Some(name.into());
        self.version = Some(version.into());
        self
    }

    pub fn check(mut self, check: HealthCheck) -> Self {
        self.checks.push(check);
        self
    }

    /// Run all health checks
    pub fn run_checks(&self) -> (HealthStatus, Vec<HealthCheckResult>) {
        let mut overall = HealthStatus::Healthy;
        let mut results = Vec::with_capacity(self.checks.len());

        for check in &self.checks {
            let result = check.run();
            match result.status {
                HealthStatus::Unhealthy if check.critical => overall = HealthStatus::Unhealthy,
                HealthStatus::Healthy => {}
                _ if overall == HealthStatus::Healthy => overall = HealthStatus::Degraded,
                _ => {}
            }
            results.push(result);
        }

        (overall, results)
    }

    /// Full health report
    pub fn health(&self) -> Response {
        let (status, checks) = self.run_checks();
        if status != HealthStatus::Healthy {
            tracing::warn!(status = status.as_str(), "health check not healthy");
        }
        let report = Report {
            status,
            service: self.service.as_deref(),
            version: self.version.as_deref(),
            checks,
        };
        Response::json_value(status.status_code(), &report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pass_fail(name: &'static str, ok: bool) -> HealthCheck {
        HealthCheck::new(name, move || {
            let status = if ok { HealthStatus::Healthy } else { HealthStatus::Unhealthy };
            HealthCheckResult::new(name, status)
        })
    }

    #[test]
    fn test_all_healthy() {
        let health = Health::new()
            .service("eventsite", "0.1.0")
            .check(pass_fail("database", true));

        let res = health.health();
        assert_eq!(res.status, StatusCode::OK);
        let body = res.body_json().unwrap();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["service"], "eventsite");
        assert_eq!(body["checks"][0]["name"], "database");
        assert!(body["checks"][0]["duration_ms"].is_u64());
        assert!(body["checks"][0].get("message").is_none());
    }

    #[test]
    fn test_critical_failure_is_unhealthy() {
        let health = Health::new()
            .check(pass_fail("ok", true))
            .check(pass_fail("down", false));

        let (status, results) = health.run_checks();
        assert_eq!(status, HealthStatus::Unhealthy);
        assert_eq!(results.len(), 2);
        assert_eq!(health.health().status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_non_critical_failure_degrades() {
        let health = Health::new()
            .check(pass_fail("database", true))
            .check(
                HealthCheck::new("frontend", || {
                    HealthCheckResult::new("frontend", HealthStatus::Unhealthy)
                        .message("index.html missing")
                })
                .non_critical(),
            );

        let res = health.health();
        assert_eq!(res.status, StatusCode::OK);
        let body = res.body_json().unwrap();
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["checks"][1]["message"], "index.html missing");
    }

    #[test]
    fn test_degraded_critical_check() {
        let health = Health::new().check(HealthCheck::new("database", || {
            HealthCheckResult::new("database", HealthStatus::Degraded)
        }));
        assert_eq!(health.run_checks().0, HealthStatus::Degraded);
    }
}
