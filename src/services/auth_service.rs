use std::net::IpAddr;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::auth::throttle::{ThrottleKey, ThrottleTracker};
use crate::auth::validation::{Registration, ValidationErrors};
use crate::auth::{IssuedToken, TokenError, TokenIssuer};
use crate::database::models::{Credentials, User};
use crate::database::{CredentialStore, StoreError};

pub const FAILED_LOGIN_MESSAGE: &str = "These credentials do not match our records.";
pub const EMAIL_TAKEN_MESSAGE: &str = "The email has already been taken.";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("The given data was invalid.")]
    Validation(ValidationErrors),

    /// Same message for unknown identifier and wrong password
    #[error("{}", FAILED_LOGIN_MESSAGE)]
    InvalidCredentials,

    #[error("Too many login attempts. Please try again in {retry_after} seconds.")]
    LockedOut { retry_after: u64 },

    #[error("Unauthenticated.")]
    Unauthenticated,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("token could not be issued: {0}")]
    TokenIssue(TokenError),
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::InvalidSecret | TokenError::Encoding(_) => AuthError::TokenIssue(err),
            TokenError::Invalid | TokenError::Expired | TokenError::RefreshExpired | TokenError::Revoked => {
                AuthError::Unauthenticated
            }
        }
    }
}

/// The bearer token presented with a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerToken(pub String);

impl BearerToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginOutcome {
    pub user: User,
    pub token: IssuedToken,
}

/// Login, registration and session lifecycle on top of three collaborators
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    tokens: Arc<dyn TokenIssuer>,
    throttle: Arc<dyn ThrottleTracker>,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        tokens: Arc<dyn TokenIssuer>,
        throttle: Arc<dyn ThrottleTracker>,
    ) -> Self {
        Self { store, tokens, throttle }
    }

    pub fn store(&self) -> &dyn CredentialStore {
        self.store.as_ref()
    }

    /// Check credentials for `client`, subject to lockout.
    ///
    /// A locked-out key is rejected before the store is consulted, even when
    /// the credentials are correct.
    pub async fn login(&self, credentials: Credentials, client: IpAddr) -> Result<LoginOutcome, AuthError> {
        let key = ThrottleKey::new(&credentials.email, client);

        if let Some(lockout) = self.throttle.lockout(&key).await {
            warn!(key = %key, retry_after = lockout.retry_after_secs(), "Login rejected during lockout");
            return Err(AuthError::LockedOut {
                retry_after: lockout.retry_after_secs(),
            });
        }

        let Some(user) = self.store.verify(&credentials).await? else {
            warn!(key = %key, "Failed login attempt");
            if let Some(lockout) = self.throttle.hit(&key).await {
                warn!(key = %key, retry_after = lockout.retry_after_secs(), "Too many failed logins, locking out");
            }
            return Err(AuthError::InvalidCredentials);
        };

        self.throttle.clear(&key).await;
        let token = self.tokens.issue(user.id).await?;

        info!(user_id = %user.id, "User logged in");
        Ok(LoginOutcome { user, token })
    }

    /// Create an account and sign straight into it
    pub async fn register(&self, registration: Registration) -> Result<IssuedToken, AuthError> {
        let mut errors = registration.validate();

        let email_taken = match registration.email() {
            Some(email) if !errors.has("email") => self.store.find_by_email(&email).await?.is_some(),
            _ => false,
        };
        if email_taken {
            errors.add("email", EMAIL_TAKEN_MESSAGE);
        }
        if !errors.is_empty() {
            return Err(AuthError::Validation(errors));
        }

        let new_user = registration.into_new_user();
        let credentials = Credentials::new(new_user.email.clone(), new_user.password.clone());

        match self.store.create(new_user).await {
            Ok(user) => info!(user_id = %user.id, "User registered"),
            // Lost a race with a concurrent registration for the same email
            Err(StoreError::DuplicateEmail) => {
                let mut errors = ValidationErrors::new();
                errors.add("email", EMAIL_TAKEN_MESSAGE);
                return Err(AuthError::Validation(errors));
            }
            Err(e) => return Err(e.into()),
        }

        let user = self
            .store
            .verify(&credentials)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        Ok(self.tokens.issue(user.id).await?)
    }

    /// Revoke the caller's token. Revoking an already revoked token succeeds.
    pub async fn logout(&self, token: &BearerToken) -> Result<(), AuthError> {
        self.tokens.invalidate(token.as_str()).await?;
        info!("Session logged out");
        Ok(())
    }

    /// Swap the caller's token for a new one without asking for the password
    pub async fn refresh(&self, token: &BearerToken) -> Result<IssuedToken, AuthError> {
        let issued = self.tokens.refresh(token.as_str()).await?;
        info!("Session refreshed");
        Ok(issued)
    }

    /// The user behind a live token
    pub async fn whoami(&self, token: &BearerToken) -> Result<User, AuthError> {
        let user_id = self.tokens.authenticate(token.as_str()).await?;
        self.store
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::Unauthenticated)
    }

    /// Drop expired lockout counters and revocations
    pub async fn purge_expired(&self) -> (usize, usize) {
        let counters = self.throttle.purge_expired().await;
        let revocations = self.tokens.purge_expired().await;
        (counters, revocations)
    }
}
