//! Session tokens and the access rule
//!
//! Tokens carry the user's role and site grants so protected routes can
//! authorize without calling the identity provider again.

use crate::identity::{metadata_role, metadata_sites, DirectoryUser};
use chrono::{Duration, Utc};
use eventsite_core::middleware::{Jwt, JwtAuth};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Claim holding role and sites
pub const APP_METADATA_CLAIM: &str = "https://your-namespace.com/app_metadata";

const ADMIN_ROLE: &str = "admin";
const MAX_TTL_HOURS: u64 = 24 * 365;

/// Claims of a session token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteClaims {
    pub sub: String,
    #[serde(default)]
    pub email: String,
    #[serde(rename = "https://your-namespace.com/app_metadata", default)]
    pub app_metadata: Option<Map<String, Value>>,
    pub exp: i64,
}

impl SiteClaims {
    /// Claims for `user`, valid for `ttl_hours`
    pub fn for_user(user: &DirectoryUser, ttl_hours: u64) -> Self {
        let mut metadata = Map::new();
        metadata.insert("role".to_string(), Value::from(user.role()));
        metadata.insert("sites".to_string(), Value::from(user.sites()));

        let ttl = Duration::hours(ttl_hours.min(MAX_TTL_HOURS) as i64);
        Self {
            sub: user.user_id.clone(),
            email: user.email.clone(),
            app_metadata: Some(metadata),
            exp: (Utc::now() + ttl).timestamp(),
        }
    }

    pub fn role(&self) -> &str {
        metadata_role(self.app_metadata.as_ref())
    }

    pub fn sites(&self) -> Vec<String> {
        metadata_sites(self.app_metadata.as_ref())
    }
}

/// Admins may access everything; others need the configured site in their grants
pub fn is_authorized(role: &str, sites: &[String], site_id: Option<&str>) -> bool {
    if role == ADMIN_ROLE {
        return true;
    }
    match site_id {
        Some(site) if !site.is_empty() => sites.iter().any(|s| s == site),
        _ => false,
    }
}

/// Bearer middleware for the protected API
pub fn require_session(
    jwt: Jwt,
    site_id: Option<String>,
) -> JwtAuth<SiteClaims, impl Fn(&SiteClaims) -> bool + Send + Sync> {
    JwtAuth::new(jwt, move |claims: &SiteClaims| {
        is_authorized(claims.role(), &claims.sites(), site_id.as_deref())
    })
}
