use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use crate::auth::{JwtIssuer, JwtSettings, MemoryThrottle, PasswordHasher};
use crate::clock::{Clock, SystemClock};
use crate::config::AppConfig;
use crate::database::{CredentialStore, MemoryCredentialStore, PgCredentialStore};
use crate::services::AuthService;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub auth: AuthService,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(auth: AuthService, config: AppConfig) -> Self {
        Self {
            auth,
            config: Arc::new(config),
        }
    }

    /// Wire up the store, token issuer and throttle described by `config`.
    ///
    /// Users live in Postgres when a database URL is configured, otherwise
    /// in process memory.
    pub async fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let security = &config.security;

        let hasher = PasswordHasher::new(security.hash_memory_kib, security.hash_iterations)
            .context("invalid password hashing parameters")?;

        let store: Arc<dyn CredentialStore> = match config.database.url.as_deref() {
            Some(url) => Arc::new(
                PgCredentialStore::connect(url, &config.database, hasher, clock.clone())
                    .await
                    .context("failed to connect credential store")?,
            ),
            None => {
                info!("DATABASE_URL not set; keeping users in memory");
                Arc::new(MemoryCredentialStore::new(hasher, clock.clone()))
            }
        };

        let tokens = Arc::new(
            JwtIssuer::new(JwtSettings::from_config(security), clock.clone())
                .context("invalid token settings")?,
        );

        let throttle = Arc::new(MemoryThrottle::new(
            config.throttle.max_attempts,
            chrono::Duration::seconds(config.throttle.lockout_secs),
            clock,
        ));

        let auth = AuthService::new(store, tokens, throttle);
        Ok(Self::new(auth, config))
    }
}
