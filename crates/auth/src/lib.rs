//! `finbook-auth` — authentication boundary.
//!
//! JWT claims model and HS256 issue/verify, plus password hashing. This crate
//! is intentionally decoupled from HTTP and storage.

pub mod claims;
pub mod password;
pub mod token;

pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use password::{PasswordError, hash_password, verify_password};
pub use token::{Hs256Jwt, JwtValidator, TokenError};
