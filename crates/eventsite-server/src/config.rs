//! Runtime configuration
//!
//! Every setting is a flag with an environment fallback. Unset and
//! empty values are treated the same.

use clap::{Args, Parser};
use eventsite_core::middleware::CorsConfig;
use eventsite_core::Method;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Secret used when `JWT_SECRET` is not set; only fit for development.
pub const DEV_JWT_SECRET: &str = "your-secret-key";

const DEFAULT_FROM: &str = "noreply@cc-lippstadt.com";
const DEFAULT_SITE_URL: &str = "http://localhost:3000";
const DEV_ORIGINS: [&str; 3] = [
    "http://localhost:3000",
    "http://localhost:5173",
    "http://frontend:3000",
];

/// eventsite backend server
#[derive(Parser, Debug, Clone)]
#[command(name = "eventsited", version, about = "eventsite backend server")]
pub struct Config {
    /// Listen address
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Worker threads (defaults to the number of CPUs)
    #[arg(long, env = "WORKERS")]
    pub workers: Option<usize>,

    /// Directory of the built frontend bundle
    #[arg(long, env = "STATIC_DIR", default_value = "frontend/dist")]
    pub static_dir: PathBuf,

    /// SQLite database file
    #[arg(long, env = "DB_PATH", default_value = "data/eventsite.db")]
    pub db_path: PathBuf,

    /// HMAC secret for session tokens
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: Option<String>,

    /// Session token lifetime in hours
    #[arg(long, env = "JWT_TTL_HOURS", default_value_t = 24)]
    pub jwt_ttl_hours: u64,

    /// Site identifier granting access to non-admin users
    #[arg(long, env = "SITE_ID")]
    pub site_id: Option<String>,

    /// Public URL of the site
    #[arg(long, env = "SITE_URL")]
    pub site_url: Option<String>,

    /// Maximum accepted request body in bytes
    #[arg(long, env = "MAX_BODY_BYTES", default_value_t = 1024 * 1024)]
    pub max_body_bytes: usize,

    #[command(flatten)]
    pub auth0: Auth0Config,

    #[command(flatten)]
    pub smtp: SmtpConfig,
}

#[derive(Args, Debug, Clone, Default)]
pub struct Auth0Config {
    /// Auth0 tenant domain
    #[arg(long = "auth0-domain", env = "AUTH0_DOMAIN")]
    pub domain: Option<String>,

    #[arg(long = "auth0-client-id", env = "AUTH0_CLIENT_ID")]
    pub client_id: Option<String>,

    #[arg(long = "auth0-client-secret", env = "AUTH0_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct SmtpConfig {
    /// SMTP relay host; notifications are off when unset
    #[arg(long = "smtp-host", env = "SMTP_HOST")]
    pub host: Option<String>,

    #[arg(long = "smtp-port", env = "SMTP_PORT", default_value_t = 587)]
    pub port: u16,

    #[arg(long = "smtp-user", env = "SMTP_USER")]
    pub user: Option<String>,

    #[arg(long = "smtp-pass", env = "SMTP_PASS", hide_env_values = true)]
    pub password: Option<String>,

    /// Sender address (defaults to the SMTP user)
    #[arg(long = "smtp-from", env = "SMTP_FROM")]
    pub from: Option<String>,

    /// Comma separated notification recipients
    #[arg(long = "notification-emails", env = "NOTIFICATION_EMAILS")]
    pub notification_emails: Option<String>,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: 587,
            user: None,
            password: None,
            from: None,
            notification_emails: None,
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl Config {
    pub fn jwt_secret(&self) -> &str {
        non_empty(&self.jwt_secret).unwrap_or(DEV_JWT_SECRET)
    }

    pub fn uses_dev_secret(&self) -> bool {
        non_empty(&self.jwt_secret).is_none()
    }

    pub fn site_id(&self) -> Option<&str> {
        non_empty(&self.site_id)
    }

    pub fn site_url(&self) -> Option<&str> {
        non_empty(&self.site_url)
    }

    /// Where the identity provider sends users after logout
    pub fn logout_return_url(&self) -> &str {
        self.site_url().unwrap_or(DEFAULT_SITE_URL)
    }

    pub fn workers(&self) -> usize {
        self.workers
            .filter(|&n| n > 0)
            .unwrap_or_else(|| eventsite_core::ServerConfig::default().workers)
    }

    /// Browser origins allowed to call the API
    pub fn cors(&self) -> CorsConfig {
        let mut cors = DEV_ORIGINS
            .iter()
            .fold(CorsConfig::new(), |cors, origin| cors.allow_origin(*origin));
        if let Some(site) = self.site_url() {
            cors = cors.allow_origin(site);
        }
        cors.methods([
            Method::Get,
            Method::Post,
            Method::Put,
            Method::Delete,
            Method::Options,
            Method::Patch,
        ])
        .allow_header("Authorization")
        .allow_header("X-Requested-With")
        .allow_credentials()
        .max_age(12 * 60 * 60)
    }
}

impl Auth0Config {
    pub fn domain(&self) -> Option<&str> {
        non_empty(&self.domain)
    }

    pub fn client_id(&self) -> Option<&str> {
        non_empty(&self.client_id)
    }

    pub fn client_secret(&self) -> Option<&str> {
        non_empty(&self.client_secret)
    }

    /// Domain, client id and secret, if all are set
    pub fn credentials(&self) -> Option<(&str, &str, &str)> {
        Some((self.domain()?, self.client_id()?, self.client_secret()?))
    }
}

impl SmtpConfig {
    pub fn host(&self) -> Option<&str> {
        non_empty(&self.host)
    }

    pub fn user(&self) -> Option<&str> {
        non_empty(&self.user)
    }

    pub fn password(&self) -> Option<&str> {
        non_empty(&self.password)
    }

    /// `SMTP_FROM`, else `SMTP_USER`, else the site's noreply address
    pub fn from(&self) -> &str {
        non_empty(&self.from)
            .or_else(|| self.user())
            .unwrap_or(DEFAULT_FROM)
    }

    pub fn recipients(&self) -> Vec<String> {
        non_empty(&self.notification_emails)
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}
