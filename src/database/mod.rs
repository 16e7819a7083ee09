pub mod memory;
pub mod models;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::auth::password::{PasswordError, PasswordHasher};
use crate::auth::validation::normalize_email;
use models::{Credentials, NewUser, User};

pub use memory::MemoryCredentialStore;
pub use postgres::PgCredentialStore;

/// Errors from a CredentialStore
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("email is already registered")]
    DuplicateEmail,

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("query error: {0}")]
    Query(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::DuplicateEmail,
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable(err.to_string())
            }
            _ => StoreError::Query(err.to_string()),
        }
    }
}

/// User storage plus credential checks.
///
/// `create` must enforce email uniqueness atomically; a concurrent duplicate
/// surfaces as `StoreError::DuplicateEmail`.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    /// Lookup by an already-normalized email
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Hash the password and persist the user
    async fn create(&self, new_user: NewUser) -> Result<User, StoreError>;

    fn hasher(&self) -> &PasswordHasher;

    /// The user the credentials belong to, or None on any mismatch
    async fn verify(&self, credentials: &Credentials) -> Result<Option<User>, StoreError> {
        let email = normalize_email(&credentials.email);

        match self.find_by_email(&email).await? {
            Some(user) => {
                let matched = self
                    .hasher()
                    .spawn_verify(&credentials.password, &user.password_hash)
                    .await?;
                Ok(matched.then_some(user))
            }
            None => {
                self.hasher().spawn_verify_dummy(&credentials.password).await;
                Ok(None)
            }
        }
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }

    /// Release connections on shutdown
    async fn close(&self) {}
}
