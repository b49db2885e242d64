//! Login, logout and profile

use crate::auth::{is_authorized, SiteClaims};
use crate::state::AppState;
use eventsite_core::{Request, Response, StatusCode, Validator};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LoginRequest {
    email: String,
    password: String,
}

/// User as the frontend sees it
#[derive(Debug, Serialize)]
pub struct UserView {
    pub id: String,
    pub email: String,
    pub role: String,
    pub sites: Vec<String>,
}

impl From<&SiteClaims> for UserView {
    fn from(claims: &SiteClaims) -> Self {
        Self {
            id: claims.sub.clone(),
            email: claims.email.clone(),
            role: claims.role().to_string(),
            sites: claims.sites(),
        }
    }
}

#[derive(Debug, Serialize)]
struct LoginResponse {
    token: String,
    user: UserView,
}

fn config_missing() -> Response {
    Response::error(StatusCode::INTERNAL_SERVER_ERROR, "Auth0 configuration missing")
}

/// `POST /api/auth/login`
pub async fn login(state: Arc<AppState>, req: Request) -> Response {
    let Ok(body) = req.json::<LoginRequest>() else {
        return Response::error(StatusCode::BAD_REQUEST, "Invalid request format");
    };
    if Validator::new()
        .required("email", Some(body.email.as_str()))
        .email("email", Some(body.email.as_str()))
        .required("password", Some(body.password.as_str()))
        .finish()
        .is_err()
    {
        return Response::error(StatusCode::BAD_REQUEST, "Invalid request format");
    }

    let Some(identity) = state.identity.as_ref() else {
        return config_missing();
    };

    tracing::info!(email = %body.email, "login attempt");
    if let Err(e) = identity.authenticate(&body.email, &body.password).await {
        tracing::warn!(email = %body.email, error = %e, "authentication failed");
        return Response::error(StatusCode::UNAUTHORIZED, &format!("Authentication failed: {e}"));
    }

    let user = match identity.find_user(&body.email).await {
        Ok(user) => user,
        Err(e) => {
            tracing::error!(email = %body.email, error = %e, "user lookup failed");
            return Response::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("Failed to get user information: {e}"),
            );
        }
    };

    if !is_authorized(user.role(), &user.sites(), state.config.site_id()) {
        tracing::warn!(email = %body.email, role = user.role(), "access denied");
        return Response::error(StatusCode::FORBIDDEN, "Access denied: Insufficient permissions");
    }

    let claims = SiteClaims::for_user(&user, state.config.jwt_ttl_hours);
    let token = match state.jwt.encode(&claims) {
        Ok(token) => token,
        Err(e) => {
            tracing::error!(error = %e, "failed to sign session token");
            return Response::error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to create token");
        }
    };

    tracing::info!(user = %claims.sub, "login succeeded");
    Response::json_value(
        StatusCode::OK,
        &LoginResponse {
            token,
            user: UserView::from(&claims),
        },
    )
}

/// `GET /api/auth/logout`: hand the browser to the provider's logout
pub async fn logout(state: Arc<AppState>, _req: Request) -> Response {
    let auth0 = &state.config.auth0;
    let (Some(domain), Some(client_id)) = (auth0.domain(), auth0.client_id()) else {
        return config_missing();
    };

    let url = reqwest::Url::parse_with_params(
        &format!("https://{domain}/v2/logout"),
        &[("client_id", client_id), ("returnTo", state.config.logout_return_url())],
    );
    match url {
        Ok(url) => Response::redirect(url.as_str(), false),
        Err(e) => {
            tracing::error!(domain, error = %e, "invalid logout url");
            config_missing()
        }
    }
}

/// `GET /api/profile`
pub async fn profile(_state: Arc<AppState>, req: Request) -> Response {
    match req.extension::<SiteClaims>() {
        Some(claims) => Response::json_value(
            StatusCode::OK,
            &serde_json::json!({ "user": UserView::from(claims) }),
        ),
        None => Response::error(StatusCode::UNAUTHORIZED, "User not authenticated"),
    }
}
