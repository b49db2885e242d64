//! Built-in request handlers

pub mod health;
pub mod static_files;

pub use health::{Health, HealthCheck, HealthCheckResult, HealthStatus};
pub use static_files::{StaticFileConfig, StaticFiles};
