use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use finbook_core::UserId;

/// JWT claims model.
///
/// The minimal set of claims the tracker expects once a token has been decoded
/// and signature-verified. There is no tenant concept: the subject *is* the
/// ownership boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject: the authenticated user.
    pub sub: UserId,

    /// Issued-at, seconds since the Unix epoch.
    pub iat: i64,

    /// Expiration, seconds since the Unix epoch.
    pub exp: i64,
}

impl JwtClaims {
    pub fn new(sub: UserId, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            sub,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued in the future)")]
    NotYetValid,

    #[error("invalid token time window (exp <= iat)")]
    InvalidTimeWindow,
}

/// Deterministically validate JWT claims against an injected clock.
///
/// Note: this validates the *claims* only. Signature verification is done by
/// [`crate::token::Hs256Jwt`] before the claims ever reach this function.
pub fn validate_claims(claims: &JwtClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    let now = now.timestamp();
    if claims.exp <= claims.iat {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now < claims.iat {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.exp {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn valid_window_passes() {
        let claims = JwtClaims::new(UserId::new(), now(), Duration::hours(12));
        assert_eq!(validate_claims(&claims, now()), Ok(()));
    }

    #[test]
    fn expired_token_is_rejected() {
        let claims = JwtClaims::new(UserId::new(), now(), Duration::hours(1));
        let later = now() + Duration::hours(2);
        assert_eq!(validate_claims(&claims, later), Err(TokenValidationError::Expired));
    }

    #[test]
    fn future_issued_token_is_rejected() {
        let claims = JwtClaims::new(UserId::new(), now() + Duration::hours(1), Duration::hours(2));
        assert_eq!(
            validate_claims(&claims, now()),
            Err(TokenValidationError::NotYetValid)
        );
    }

    #[test]
    fn inverted_window_is_rejected() {
        let claims = JwtClaims {
            sub: UserId::new(),
            iat: now().timestamp(),
            exp: now().timestamp(),
        };
        assert_eq!(
            validate_claims(&claims, now()),
            Err(TokenValidationError::InvalidTimeWindow)
        );
    }

    #[test]
    fn expiry_boundary_is_exclusive() {
        let claims = JwtClaims::new(UserId::new(), now(), Duration::hours(1));
        let at_expiry = Utc.timestamp_opt(claims.exp, 0).unwrap();
        assert_eq!(
            validate_claims(&claims, at_expiry),
            Err(TokenValidationError::Expired)
        );
    }
}
