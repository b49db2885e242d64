//! Identity provider (Auth0)
//!
//! Login verifies the password with the provider, then looks the user up
//! in the provider's directory to read role and site grants from
//! `app_metadata`.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::Duration;
use thiserror::Error;

const PASSWORD_REALM: &str = "Username-Password-Authentication";
const LOGIN_SCOPE: &str = "openid profile email";
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum IdentityError {
    /// The provider refused the credentials
    #[error("auth0 error: {0}")]
    Rejected(String),

    #[error("failed to get management token: {0}")]
    ManagementToken(String),

    #[error("failed to get user from Auth0: {0}")]
    Lookup(String),

    #[error("user not found")]
    UserNotFound,

    #[error("{0}")]
    Http(#[from] reqwest::Error),
}

/// A user record from the provider's directory
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DirectoryUser {
    pub user_id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub app_metadata: Option<Map<String, Value>>,
}

impl DirectoryUser {
    /// `app_metadata.role`, empty when absent
    pub fn role(&self) -> &str {
        metadata_role(self.app_metadata.as_ref())
    }

    /// String entries of `app_metadata.sites`
    pub fn sites(&self) -> Vec<String> {
        metadata_sites(self.app_metadata.as_ref())
    }
}

pub(crate) fn metadata_role(metadata: Option<&Map<String, Value>>) -> &str {
    metadata
        .and_then(|m| m.get("role"))
        .and_then(Value::as_str)
        .unwrap_or("")
}

pub(crate) fn metadata_sites(metadata: Option<&Map<String, Value>>) -> Vec<String> {
    metadata
        .and_then(|m| m.get("sites"))
        .and_then(Value::as_array)
        .map(|sites| {
            sites
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Verify email and password
    async fn authenticate(&self, email: &str, password: &str) -> Result<(), IdentityError>;

    /// Look a user up by email
    async fn find_user(&self, email: &str) -> Result<DirectoryUser, IdentityError>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ProviderError {
    #[serde(default)]
    error_description: String,
}

/// Auth0 over its authentication and management APIs
pub struct Auth0Client {
    http: reqwest::Client,
    base_url: String,
    domain: String,
    client_id: String,
    client_secret: String,
}

impl Auth0Client {
    pub fn new(domain: &str, client_id: &str, client_secret: &str) -> Result<Self, IdentityError> {
        Self::with_base_url(format!("https://{domain}"), domain, client_id, client_secret)
    }

    /// Talk to `base_url` instead of `https://<domain>`
    pub fn with_base_url(
        base_url: impl Into<String>,
        domain: &str,
        client_id: &str,
        client_secret: &str,
    ) -> Result<Self, IdentityError> {
        let http = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            domain: domain.to_string(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
        })
    }

    fn token_url(&self) -> String {
        format!("{}/oauth/token", self.base_url)
    }

    async fn password_grant(&self, email: &str, password: &str) -> Result<(), IdentityError> {
        let payload = json!({
            "grant_type": "password",
            "username": email,
            "password": password,
            "client_id": self.client_id,
            "client_secret": self.client_secret,
            "scope": LOGIN_SCOPE,
            "realm": PASSWORD_REALM,
        });

        let res = self.http.post(self.token_url()).json(&payload).send().await?;
        if !res.status().is_success() {
            let err: ProviderError = res.json().await.unwrap_or_default();
            return Err(IdentityError::Rejected(err.error_description));
        }
        res.json::<TokenResponse>().await?;
        Ok(())
    }

    async fn management_token(&self) -> Result<String, IdentityError> {
        let payload = json!({
            "grant_type": "client_credentials",
            "client_id": self.client_id,
            "client_secret": self.client_secret,
            "audience": format!("https://{}/api/v2/", self.domain),
        });

        let res = self.http.post(self.token_url()).json(&payload).send().await?;
        if !res.status().is_success() {
            return Err(IdentityError::ManagementToken(res.text().await.unwrap_or_default()));
        }
        res.json::<TokenResponse>()
            .await?
            .access_token
            .ok_or_else(|| IdentityError::ManagementToken("no access token in response".to_string()))
    }

    async fn users_by_email(&self, email: &str) -> Result<DirectoryUser, IdentityError> {
        let token = self.management_token().await?;

        let res = self
            .http
            .get(format!("{}/api/v2/users-by-email", self.base_url))
            .query(&[("email", email)])
            .bearer_auth(token)
            .send()
            .await?;
        if !res.status().is_success() {
            return Err(IdentityError::Lookup(res.text().await.unwrap_or_default()));
        }

        res.json::<Vec<DirectoryUser>>()
            .await?
            .into_iter()
            .next()
            .ok_or(IdentityError::UserNotFound)
    }
}

#[async_trait]
impl IdentityProvider for Auth0Client {
    async fn authenticate(&self, email: &str, password: &str) -> Result<(), IdentityError> {
        self.password_grant(email, password).await
    }

    async fn find_user(&self, email: &str) -> Result<DirectoryUser, IdentityError> {
        self.users_by_email(email).await
    }
}
