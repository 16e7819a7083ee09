pub mod jwt;
pub mod password;
pub mod throttle;
pub mod validation;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

pub use jwt::{Claims, JwtIssuer, JwtSettings};
pub use password::{PasswordError, PasswordHasher};
pub use throttle::{Lockout, MemoryThrottle, ThrottleKey, ThrottleTracker};
pub use validation::{Registration, ValidationErrors};

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token is malformed or has a bad signature")]
    Invalid,

    #[error("token has expired")]
    Expired,

    #[error("token can no longer be refreshed")]
    RefreshExpired,

    #[error("token has been revoked")]
    Revoked,

    #[error("token signing secret is empty")]
    InvalidSecret,

    #[error("failed to sign token: {0}")]
    Encoding(String),
}

/// Bearer token handed back to the client
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub token_type: &'static str,
    /// Seconds until the token stops authenticating requests
    pub expires_in: i64,
}

impl IssuedToken {
    pub fn bearer(token: String, expires_in: i64) -> Self {
        Self {
            token,
            token_type: "bearer",
            expires_in,
        }
    }
}

/// Issues, checks and revokes bearer tokens.
///
/// Expiry, refresh windows and the revocation policy belong to the
/// implementation; callers only see success or a `TokenError`.
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    /// Mint a fresh token for a user
    async fn issue(&self, user_id: Uuid) -> Result<IssuedToken, TokenError>;

    /// Resolve a live token to the user it was issued for
    async fn authenticate(&self, token: &str) -> Result<Uuid, TokenError>;

    /// Swap a token that is live or only recently expired for a new one.
    /// The presented token stops working.
    async fn refresh(&self, token: &str) -> Result<IssuedToken, TokenError>;

    /// Stop a token from working. Invalidating twice is not an error.
    async fn invalidate(&self, token: &str) -> Result<(), TokenError>;

    /// Forget revocations for tokens that could no longer be used anyway
    async fn purge_expired(&self) -> usize;
}
