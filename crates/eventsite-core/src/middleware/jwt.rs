//! JWT (JSON Web Token) signing and bearer authentication
//!
//! Tokens are HS256 only. [`JwtAuth`] decodes the bearer token into a
//! caller-chosen claims type, runs an authorization predicate on it and
//! stores the claims in the request extensions for the handler.

use super::Middleware;
use crate::{Request, Response, StatusCode};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use thiserror::Error;

/// JWT configuration
#[derive(Clone)]
pub struct JwtConfig {
    pub secret: Vec<u8>,
    /// Seconds of leeway for exp/nbf
    pub leeway: u64,
}

impl JwtConfig {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
            leeway: 0,
        }
    }

    pub fn leeway(mut self, seconds: u64) -> Self {
        self.leeway = seconds;
        self
    }
}

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("token is expired")]
    Expired,

    #[error("signature is invalid")]
    InvalidSignature,

    #[error("unexpected signing method")]
    AlgorithmMismatch,

    #[error("token is malformed: {0}")]
    Malformed(String),

    #[error("failed to sign token: {0}")]
    Signing(String),
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::ExpiredSignature => JwtError::Expired,
            ErrorKind::InvalidSignature => JwtError::InvalidSignature,
            ErrorKind::InvalidAlgorithm => JwtError::AlgorithmMismatch,
            _ => JwtError::Malformed(e.to_string()),
        }
    }
}

/// HS256 encoder/decoder
#[derive(Clone)]
pub struct Jwt {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl Jwt {
    pub fn new(config: JwtConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = config.leeway;
        Self {
            encoding: EncodingKey::from_secret(&config.secret),
            decoding: DecodingKey::from_secret(&config.secret),
            validation,
        }
    }

    pub fn encode<C: Serialize>(&self, claims: &C) -> Result<String, JwtError> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| JwtError::Signing(e.to_string()))
    }

    /// Verify signature and expiry, then deserialize the claims
    pub fn decode<C: DeserializeOwned>(&self, token: &str) -> Result<C, JwtError> {
        Ok(jsonwebtoken::decode::<C>(token, &self.decoding, &self.validation)?.claims)
    }
}

/// Bearer-token authentication middleware
pub struct JwtAuth<C, F> {
    jwt: Jwt,
    authorize: F,
    _claims: PhantomData<fn() -> C>,
}

impl<C, F> JwtAuth<C, F>
where
    C: DeserializeOwned + Clone + Send + Sync + 'static,
    F: Fn(&C) -> bool + Send + Sync,
{
    /// `authorize` decides whether a validly signed token may pass
    pub fn new(jwt: Jwt, authorize: F) -> Self {
        Self {
            jwt,
            authorize,
            _claims: PhantomData,
        }
    }
}

impl<C, F> Middleware for JwtAuth<C, F>
where
    C: DeserializeOwned + Clone + Send + Sync + 'static,
    F: Fn(&C) -> bool + Send + Sync,
{
    fn before(&self, req: &mut Request) -> Option<Response> {
        let Some(token) = req.bearer_token() else {
            return Some(Response::error(
                StatusCode::UNAUTHORIZED,
                "Authorization token required",
            ));
        };

        let claims = match self.jwt.decode::<C>(token) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::debug!(error = %e, path = %req.path, "rejected bearer token");
                return Some(Response::error_with_details(
                    StatusCode::UNAUTHORIZED,
                    "Invalid token",
                    &e.to_string(),
                ));
            }
        };

        if !(self.authorize)(&claims) {
            return Some(Response::error(StatusCode::FORBIDDEN, "Insufficient permissions"));
        }

        req.extensions.insert(claims);
        None
    }

    fn after(&self, _req: &Request, _res: &mut Response) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Method, RequestBuilder};
    use serde::Deserialize;
    use std::time::{SystemTime, UNIX_EPOCH};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct TestClaims {
        sub: String,
        admin: bool,
        exp: u64,
    }

    fn now() -> u64 {
        SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs()
    }

    fn claims(admin: bool) -> TestClaims {
        TestClaims {
            sub: "auth0|42".to_string(),
            admin,
            exp: now() + 3600,
        }
    }

    #[test]
    fn test_encode_decode() {
        let jwt = Jwt::new(JwtConfig::new("secret"));
        let token = jwt.encode(&claims(true)).unwrap();
        let decoded: TestClaims = jwt.decode(&token).unwrap();
        assert_eq!(decoded, claims(true));
    }

    #[test]
    fn test_wrong_secret() {
        let token = Jwt::new(JwtConfig::new("secret1")).encode(&claims(true)).unwrap();
        let err = Jwt::new(JwtConfig::new("secret2")).decode::<TestClaims>(&token).unwrap_err();
        assert!(matches!(err, JwtError::InvalidSignature));
    }

    #[test]
    fn test_expired() {
        let jwt = Jwt::new(JwtConfig::new("secret"));
        let mut c = claims(true);
        c.exp = now() - 120;
        let token = jwt.encode(&c).unwrap();
        assert!(matches!(jwt.decode::<TestClaims>(&token), Err(JwtError::Expired)));
    }

    #[test]
    fn test_other_algorithm_rejected() {
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS384),
            &claims(true),
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();
        let jwt = Jwt::new(JwtConfig::new("secret"));
        assert!(matches!(
            jwt.decode::<TestClaims>(&token),
            Err(JwtError::AlgorithmMismatch)
        ));
    }

    #[test]
    fn test_garbage_token() {
        let jwt = Jwt::new(JwtConfig::new("secret"));
        assert!(matches!(jwt.decode::<TestClaims>("not-a-jwt"), Err(JwtError::Malformed(_))));
    }

    fn auth() -> JwtAuth<TestClaims, impl Fn(&TestClaims) -> bool + Send + Sync> {
        JwtAuth::new(Jwt::new(JwtConfig::new("secret")), |c: &TestClaims| c.admin)
    }

    fn request_with(token: &str) -> Request {
        RequestBuilder::new(Method::Get, "/api/profile")
            .header("Authorization", format!("Bearer {}", token))
            .build()
    }

    #[test]
    fn test_middleware_missing_token() {
        let mut req = RequestBuilder::new(Method::Get, "/api/profile").build();
        let res = auth().before(&mut req).unwrap();
        assert_eq!(res.status, StatusCode::UNAUTHORIZED);
        assert_eq!(res.body_json().unwrap()["error"], "Authorization token required");
    }

    #[test]
    fn test_middleware_invalid_token() {
        let mut req = request_with("abc.def.ghi");
        let res = auth().before(&mut req).unwrap();
        assert_eq!(res.status, StatusCode::UNAUTHORIZED);
        let body = res.body_json().unwrap();
        assert_eq!(body["error"], "Invalid token");
        assert!(body["details"].is_string());
    }

    #[test]
    fn test_middleware_forbidden() {
        let token = Jwt::new(JwtConfig::new("secret")).encode(&claims(false)).unwrap();
        let mut req = request_with(&token);
        let res = auth().before(&mut req).unwrap();
        assert_eq!(res.status, StatusCode::FORBIDDEN);
        assert_eq!(res.body_json().unwrap()["error"], "Insufficient permissions");
    }

    #[test]
    fn test_middleware_stores_claims() {
        let token = Jwt::new(JwtConfig::new("secret")).encode(&claims(true)).unwrap();
        let mut req = request_with(&token);
        assert!(auth().before(&mut req).is_none());
        assert_eq!(req.extension::<TestClaims>().unwrap().sub, "auth0|42");
    }
}
