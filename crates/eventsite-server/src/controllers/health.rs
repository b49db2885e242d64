use crate::state::AppState;
use eventsite_core::{Health, HealthCheck, HealthCheckResult, HealthStatus, Response, StaticFiles, StatusCode};
use std::sync::Arc;

/// Health report for `GET /api/health`
///
/// A missing database degrades the service, a database that stops
/// answering makes it unhealthy. The frontend bundle is non-critical.
pub fn report(state: &AppState, frontend: Option<StaticFiles>) -> Health {
    let store = state.store.clone();
    let database = HealthCheck::new("database", move || match &store {
        None => HealthCheckResult::new("database", HealthStatus::Degraded).message("not connected"),
        Some(store) if store.ping() => HealthCheckResult::new("database", HealthStatus::Healthy),
        Some(_) => HealthCheckResult::new("database", HealthStatus::Unhealthy).message("not responding"),
    });

    let bundle = HealthCheck::new("frontend", move || match &frontend {
        Some(files) if files.index_exists() => HealthCheckResult::new("frontend", HealthStatus::Healthy),
        _ => HealthCheckResult::new("frontend", HealthStatus::Degraded).message("index.html not found"),
    })
    .non_critical();

    Health::new()
        .service(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
        .check(database)
        .check(bundle)
}

/// `GET /api/health`
///
/// The checks lock the database and stat the bundle, so they run on the
/// blocking pool.
pub async fn check(report: Arc<Health>) -> Response {
    tokio::task::spawn_blocking(move || report.health())
        .await
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "health check task failed");
            Response::error(StatusCode::SERVICE_UNAVAILABLE, "Health check failed")
        })
}
