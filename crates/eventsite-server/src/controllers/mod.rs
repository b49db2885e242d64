//! API handlers
//!
//! Each handler takes the shared [`AppState`](crate::state::AppState) and
//! the request, and always answers with JSON.

pub mod auth;
pub mod contact;
pub mod health;

use crate::store::{ContactStore, StoreError};
use eventsite_core::{Response, StatusCode};
use std::sync::Arc;

pub(crate) fn database_unavailable() -> Response {
    Response::error(StatusCode::INTERNAL_SERVER_ERROR, "Database connection not available")
}

/// Run a store call off the async workers
pub(crate) async fn blocking<T, F>(store: Arc<dyn ContactStore>, f: F) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: FnOnce(&dyn ContactStore) -> Result<T, StoreError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || f(store.as_ref()))
        .await
        .unwrap_or_else(|e| Err(StoreError::Interrupted(e.to_string())))
}
