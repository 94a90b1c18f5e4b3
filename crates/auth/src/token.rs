//! HS256 token issue/verify.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use thiserror::Error;

use finbook_core::UserId;

use crate::claims::{JwtClaims, TokenValidationError, validate_claims};

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("malformed or badly signed token")]
    Invalid,

    #[error(transparent)]
    Claims(#[from] TokenValidationError),

    #[error("failed to sign token: {0}")]
    Signing(String),
}

/// Validates a bearer token into claims. Object-safe so the HTTP middleware can
/// hold it as `Arc<dyn JwtValidator>`.
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenError>;
}

/// HS256 issuer + validator over a shared secret.
pub struct Hs256Jwt {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl Hs256Jwt {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }

    /// Issue a token for `sub` valid for `ttl` from `now`.
    pub fn issue(
        &self,
        sub: UserId,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<String, TokenError> {
        let claims = JwtClaims::new(sub, now, ttl);
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }
}

impl JwtValidator for Hs256Jwt {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenError> {
        // Signature check here; temporal checks go through the deterministic
        // claims validator with the injected clock.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        let data = decode::<JwtClaims>(token, &self.decoding, &validation)
            .map_err(|_| TokenError::Invalid)?;
        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn issue_then_validate_round_trips() {
        let jwt = Hs256Jwt::new(b"test-secret");
        let sub = UserId::new();
        let token = jwt.issue(sub, now(), Duration::hours(12)).unwrap();
        let claims = jwt.validate(&token, now()).unwrap();
        assert_eq!(claims.sub, sub);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let issuer = Hs256Jwt::new(b"secret-a");
        let verifier = Hs256Jwt::new(b"secret-b");
        let token = issuer.issue(UserId::new(), now(), Duration::hours(1)).unwrap();
        assert!(matches!(
            verifier.validate(&token, now()),
            Err(TokenError::Invalid)
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let jwt = Hs256Jwt::new(b"test-secret");
        let token = jwt.issue(UserId::new(), now(), Duration::hours(1)).unwrap();
        assert!(matches!(
            jwt.validate(&token, now() + Duration::hours(2)),
            Err(TokenError::Claims(TokenValidationError::Expired))
        ));
    }

    #[test]
    fn garbage_is_rejected() {
        let jwt = Hs256Jwt::new(b"test-secret");
        assert!(matches!(
            jwt.validate("not-a-token", now()),
            Err(TokenError::Invalid)
        ));
    }
}
