//! Contact form submissions

use super::{blocking, database_unavailable};
use crate::notify::spawn_notification;
use crate::state::AppState;
use crate::store::NewContactRequest;
use eventsite_core::{Request, Response, StatusCode, Validator};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

const INVALID_FORM: &str = "Invalid request. Name, email, and message are required.";
const NOT_FOUND: &str = "Contact request not found";

/// Widths of the stored columns
const MAX_PHONE: usize = 20;
const MAX_IP: usize = 45;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ContactForm {
    name: String,
    email: String,
    phone: Option<String>,
    message: String,
}

/// `POST /api/contact-requests`
pub async fn create(state: Arc<AppState>, req: Request) -> Response {
    let Ok(form) = req.json::<ContactForm>() else {
        return Response::error(StatusCode::BAD_REQUEST, INVALID_FORM);
    };
    let phone = form.phone.filter(|p| !p.is_empty());

    if let Err(errors) = Validator::new()
        .required("name", Some(form.name.as_str()))
        .required("email", Some(form.email.as_str()))
        .email("email", Some(form.email.as_str()))
        .required("message", Some(form.message.as_str()))
        .max_length("phone", phone.as_deref(), MAX_PHONE)
        .finish()
    {
        tracing::debug!(?errors, "rejected contact form");
        return Response::error(StatusCode::BAD_REQUEST, INVALID_FORM);
    }

    let Some(store) = state.store.clone() else {
        return database_unavailable();
    };

    let new = NewContactRequest {
        name: form.name,
        email: form.email,
        phone,
        message: form.message,
        ip_address: req.client_ip().map(|ip| ip.chars().take(MAX_IP).collect()),
        user_agent: req.user_agent().map(str::to_string),
        metadata: serde_json::Map::new(),
    };

    let created = match blocking(store, move |store| store.create(new)).await {
        Ok(created) => created,
        Err(e) => {
            tracing::error!(error = %e, "failed to save contact request");
            return Response::error_with_details(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to save contact request",
                &e.to_string(),
            );
        }
    };

    tracing::info!(id = created.id, "contact request stored");
    let id = created.id;
    spawn_notification(state.email.clone(), created);

    Response::json_value(
        StatusCode::CREATED,
        &json!({
            "message": "Contact request received successfully",
            "id": id,
        }),
    )
}

/// `GET /api/contact-requests`, newest first
pub async fn list(state: Arc<AppState>, _req: Request) -> Response {
    let Some(store) = state.store.clone() else {
        return database_unavailable();
    };

    match blocking(store, |store| store.list()).await {
        Ok(requests) => Response::json_value(StatusCode::OK, &json!({ "requests": requests })),
        Err(e) => {
            tracing::error!(error = %e, "failed to list contact requests");
            Response::error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch contact requests")
        }
    }
}

/// `GET /api/contact-requests/:id`
pub async fn get(state: Arc<AppState>, req: Request) -> Response {
    let Some(store) = state.store.clone() else {
        return database_unavailable();
    };
    let Some(id) = req.param("id").and_then(|id| id.parse::<i64>().ok()) else {
        return Response::error(StatusCode::NOT_FOUND, NOT_FOUND);
    };

    match blocking(store, move |store| store.get(id)).await {
        Ok(Some(request)) => Response::json_value(StatusCode::OK, &json!({ "request": request })),
        Ok(None) => Response::error(StatusCode::NOT_FOUND, NOT_FOUND),
        Err(e) => {
            tracing::error!(id, error = %e, "failed to fetch contact request");
            Response::error(StatusCode::NOT_FOUND, NOT_FOUND)
        }
    }
}
