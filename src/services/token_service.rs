//! Bearer token issuance and verification.
//!
//! Tokens are HS256 JWTs whose subject is the user id. They carry an expiry;
//! verification rejects expired, malformed and badly signed tokens alike.

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::AppError;

/// JWT claims.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user id the token was issued to
    pub sub: Uuid,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
}

/// Signs and verifies bearer tokens with a shared HMAC secret.
///
/// Cheap to clone; the keys are shared.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: Arc<EncodingKey>,
    decoding: Arc<DecodingKey>,
    ttl_secs: i64,
}

impl TokenIssuer {
    pub fn new(secret: &str, ttl_secs: i64) -> Self {
        Self {
            encoding: Arc::new(EncodingKey::from_secret(secret.as_bytes())),
            decoding: Arc::new(DecodingKey::from_secret(secret.as_bytes())),
            ttl_secs,
        }
    }

    /// Issue a token for `user_id`, valid for the configured TTL.
    pub fn issue(&self, user_id: Uuid) -> Result<String, AppError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user_id,
            exp: now + self.ttl_secs,
            iat: now,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(format!("token signing failed: {e}")))
    }

    /// Verify a token and return the principal it was issued to.
    pub fn verify(&self, token: &str) -> Result<Uuid, AppError> {
        let validation = Validation::new(Algorithm::HS256);

        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims.sub)
            .map_err(|e| {
                tracing::debug!(error = %e, "rejected bearer token");
                AppError::Unauthenticated
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test_secret_that_is_long_enough_for_hs256";

    #[test]
    fn test_issue_then_verify_returns_subject() {
        let issuer = TokenIssuer::new(SECRET, 3600);
        let user_id = Uuid::new_v4();

        let token = issuer.issue(user_id).unwrap();
        assert_eq!(issuer.verify(&token).unwrap(), user_id);
    }

    #[test]
    fn test_token_signed_with_other_secret_rejected() {
        let issuer = TokenIssuer::new(SECRET, 3600);
        let other = TokenIssuer::new("a_completely_different_secret_value", 3600);

        let token = other.issue(Uuid::new_v4()).unwrap();
        assert!(matches!(issuer.verify(&token), Err(AppError::Unauthenticated)));
    }

    #[test]
    fn test_expired_token_rejected() {
        // Well past the default 60s leeway
        let issuer = TokenIssuer::new(SECRET, -3600);
        let token = issuer.issue(Uuid::new_v4()).unwrap();
        assert!(matches!(issuer.verify(&token), Err(AppError::Unauthenticated)));
    }

    #[test]
    fn test_garbage_rejected() {
        let issuer = TokenIssuer::new(SECRET, 3600);
        assert!(matches!(issuer.verify("not.a.jwt"), Err(AppError::Unauthenticated)));
        assert!(matches!(issuer.verify(""), Err(AppError::Unauthenticated)));
    }
}
