//! Identity gate: verifies bearer tokens and resolves the calling user.
//!
//! Tokens are issued elsewhere; this service only verifies them. Every
//! request is checked on its own: signature and expiry first, then the
//! subject must still name an existing user. Handlers receive a
//! [`Principal`] and pass it explicitly into every service call.

use crate::{catalog::Catalog, errors::AppError, services::error::ServiceError, state::AppState};
use axum::{extract::FromRequestParts, http::request::Parts};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: i64,
    pub email: String,
}

/// JWT claims consumed by the gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user ID, as a decimal string.
    pub sub: String,
    /// Expiration timestamp (seconds since epoch).
    pub exp: i64,
}

/// Verifies HS256 tokens and resolves their subject against the catalog.
#[derive(Clone)]
pub struct TokenVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
    catalog: Arc<dyn Catalog>,
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("validation", &self.validation)
            .finish()
    }
}

impl TokenVerifier {
    pub fn new(secret: &str, catalog: Arc<dyn Catalog>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 5;

        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            catalog,
        }
    }

    /// Check signature and expiry and return the claims.
    pub fn decode(&self, token: &str) -> Result<Claims, ServiceError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!("failed to validate token: {e}");
                ServiceError::Unauthenticated
            })
    }

    /// Verify a raw bearer token and resolve the principal it names.
    pub async fn authenticate(&self, token: &str) -> Result<Principal, ServiceError> {
        let claims = self.decode(token)?;
        let user_id: i64 = claims.sub.parse().map_err(|_| {
            debug!(sub = %claims.sub, "token subject is not a user id");
            ServiceError::Unauthenticated
        })?;

        let user = self
            .catalog
            .get_user(user_id)
            .await?
            .ok_or(ServiceError::Unauthenticated)?;

        Ok(Principal {
            user_id: user.id,
            email: user.email,
        })
    }
}

/// Pull the token out of an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: Option<&str>) -> Result<&str, ServiceError> {
    header
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(ServiceError::Unauthenticated)
}

/// Extractor handing the verified [`Principal`] to a handler.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Principal);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        let token = bearer_token(header)?;
        let principal = state.verifier.authenticate(token).await?;
        Ok(AuthUser(principal))
    }
}
