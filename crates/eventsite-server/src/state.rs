use crate::config::Config;
use crate::identity::{Auth0Client, IdentityProvider};
use crate::mail::EmailService;
use crate::store::ContactStore;
use eventsite_core::middleware::{Jwt, JwtConfig};
use std::sync::Arc;

/// Everything the handlers share
pub struct AppState {
    pub config: Config,
    /// `None` when the database could not be opened at startup
    pub store: Option<Arc<dyn ContactStore>>,
    /// `None` when the Auth0 settings are incomplete
    pub identity: Option<Arc<dyn IdentityProvider>>,
    pub jwt: Jwt,
    pub email: Arc<EmailService>,
}

impl AppState {
    pub fn new(config: Config, store: Option<Arc<dyn ContactStore>>) -> Self {
        let identity = config.auth0.credentials().and_then(|(domain, id, secret)| {
            match Auth0Client::new(domain, id, secret) {
                Ok(client) => Some(Arc::new(client) as Arc<dyn IdentityProvider>),
                Err(e) => {
                    tracing::error!(error = %e, "failed to create identity client");
                    None
                }
            }
        });
        if identity.is_none() {
            tracing::warn!("Auth0 not configured, login is disabled");
        }

        Self {
            jwt: Jwt::new(JwtConfig::new(config.jwt_secret())),
            email: Arc::new(EmailService::new(&config.smtp)),
            identity,
            store,
            config,
        }
    }

    /// Swap the identity provider
    pub fn with_identity(mut self, identity: Arc<dyn IdentityProvider>) -> Self {
        self.identity = Some(identity);
        self
    }
}
