use async_trait::async_trait;
use axum::http::{header, request::Parts};
use jsonwebtoken::{DecodingKey, Validation, decode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    config::{AppConfig, Env},
    error::AppError,
    registry::cookie_value,
};

/// Cookie the identity provider's browser SDK stores the session token in.
pub const SESSION_TOKEN_COOKIE: &str = "__session";

/// Development-only header naming the identity to act as.
pub const LOCAL_IDENTITY_HEADER: &str = "x-identity-id";

/// Claims
///
/// Payload of the identity provider's session token. Signed with the shared
/// secret and validated on every request that carries one.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the federated identity id. Becomes `BackendUser::identity_id`.
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Expiration Time (exp): Timestamp after which the token must not be accepted.
    pub exp: usize,
    /// Issued At (iat)
    pub iat: usize,
}

/// Identity
///
/// The authenticated principal as the identity provider knows it, before any
/// backend record is attached.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub subject: String,
    pub email: Option<String>,
    /// Raw token, forwarded to the backend sync call as the ambient credential.
    pub credential: Option<String>,
}

/// IdentityProvider
///
/// Resolves the ambient principal of a request. `Ok(None)` means the caller is
/// simply not signed in; `Err` means a credential was presented but rejected.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn resolve(&self, parts: &Parts) -> Result<Option<Identity>, AppError>;
}

pub type IdentityState = Arc<dyn IdentityProvider>;

/// JwtIdentityProvider
///
/// Validates the identity provider's HS256 session token, read from the
/// `Authorization: Bearer` header or the `__session` cookie.
///
/// In `Env::Local` the `x-identity-id` header is accepted instead of a token, so
/// dashboards can be exercised without a running identity provider.
pub struct JwtIdentityProvider {
    env: Env,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtIdentityProvider {
    pub fn new(config: &AppConfig) -> Self {
        let mut validation = Validation::default();
        validation.validate_exp = true;
        Self {
            env: config.env.clone(),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
        }
    }

    fn local_bypass(&self, parts: &Parts) -> Option<Identity> {
        if self.env != Env::Local {
            return None;
        }
        let subject = parts
            .headers
            .get(LOCAL_IDENTITY_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())?;

        tracing::debug!(subject, "local identity bypass");
        Some(Identity {
            subject: subject.to_string(),
            email: None,
            credential: None,
        })
    }
}

/// Bearer token from the Authorization header, falling back to the session cookie.
fn session_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .or_else(|| cookie_value(&parts.headers, SESSION_TOKEN_COOKIE))
}

#[async_trait]
impl IdentityProvider for JwtIdentityProvider {
    async fn resolve(&self, parts: &Parts) -> Result<Option<Identity>, AppError> {
        if let Some(identity) = self.local_bypass(parts) {
            return Ok(Some(identity));
        }

        let Some(token) = session_token(parts) else {
            return Ok(None);
        };

        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => {
                    AppError::IdentityUnresolved("session token expired".to_string())
                }
                _ => AppError::IdentityUnresolved(format!("invalid session token: {e}")),
            })?;

        Ok(Some(Identity {
            subject: token_data.claims.sub,
            email: token_data.claims.email,
            credential: Some(token.to_string()),
        }))
    }
}
