//! Session verification.
//!
//! The gate consumes sessions through the [`SessionVerifier`] capability:
//! issuance lives with the auth collaborator, this kernel only checks
//! whether a presented credential is currently valid. The production
//! implementation verifies HMAC-SHA256 JWTs carried in a session cookie.

use anyhow::Result;
use async_trait::async_trait;
use axum::http::HeaderMap;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity attached to a valid session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    pub subject: Uuid,
}

/// Capability for validating a session credential.
///
/// `Ok(None)` means the credential is invalid (expired, malformed, wrong
/// signature) — a normal outcome, not an error. `Err` is reserved for the
/// verifier itself being unavailable, so callers can distinguish
/// "unauthenticated" from infrastructure failure.
#[async_trait]
pub trait SessionVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Option<SessionIdentity>>;
}

/// Claims carried in a session JWT.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// User ID (UUID).
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// Verifies session JWTs signed with HMAC-SHA256.
pub struct JwtSessionVerifier {
    decoding_key: DecodingKey,
}

impl JwtSessionVerifier {
    /// Create a verifier from the shared signing secret.
    ///
    /// The secret is loaded from environment configuration and must be at
    /// least 32 bytes (enforced in [`crate::config::Config::from_env`]).
    pub fn new(secret: &[u8]) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret),
        }
    }
}

#[async_trait]
impl SessionVerifier for JwtSessionVerifier {
    async fn verify(&self, token: &str) -> Result<Option<SessionIdentity>> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_aud = false;

        let data =
            match jsonwebtoken::decode::<SessionClaims>(token, &self.decoding_key, &validation) {
                Ok(data) => data,
                Err(e) => {
                    tracing::debug!(error = %e, "rejecting session token");
                    return Ok(None);
                }
            };

        let Ok(subject) = data.claims.sub.parse::<Uuid>() else {
            tracing::debug!(sub = %data.claims.sub, "invalid subject in session token");
            return Ok(None);
        };

        Ok(Some(SessionIdentity { subject }))
    }
}

/// Extract the raw session token from the `Cookie` header, if present.
pub fn token_from_headers(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    let cookies = headers.get("cookie")?.to_str().ok()?;

    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == cookie_name).then(|| value.to_string())
    })
}
