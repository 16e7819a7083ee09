use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::info;
use uuid::Uuid;

use super::models::{NewUser, User};
use super::{CredentialStore, StoreError};
use crate::auth::password::PasswordHasher;
use crate::clock::Clock;
use crate::config::DatabaseConfig;

const CREATE_USERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id            UUID PRIMARY KEY,
    name          VARCHAR(255) NOT NULL,
    email         VARCHAR(255) NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    created_at    TIMESTAMPTZ NOT NULL,
    updated_at    TIMESTAMPTZ NOT NULL
)
"#;

const USER_COLUMNS: &str = "id, name, email, password_hash, created_at, updated_at";

/// Postgres-backed user table
pub struct PgCredentialStore {
    pool: PgPool,
    hasher: PasswordHasher,
    clock: Arc<dyn Clock>,
}

impl PgCredentialStore {
    /// Connect, then create the users table if it is missing
    pub async fn connect(
        url: &str,
        config: &DatabaseConfig,
        hasher: PasswordHasher,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect(url)
            .await?;

        let store = Self { pool, hasher, clock };
        store.ensure_schema().await?;

        info!("Connected credential store to Postgres");
        Ok(store)
    }

    async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(CREATE_USERS_TABLE).execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let query = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let query = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        let password_hash = self.hasher.spawn_hash(&new_user.password).await?;
        let now = self.clock.now();

        // The UNIQUE constraint on email settles concurrent registrations
        let query = format!(
            "INSERT INTO users ({}) VALUES ($1, $2, $3, $4, $5, $5) RETURNING {}",
            USER_COLUMNS, USER_COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&query)
            .bind(Uuid::new_v4())
            .bind(&new_user.name)
            .bind(&new_user.email)
            .bind(&password_hash)
            .bind(now)
            .fetch_one(&self.pool)
            .await?;

        Ok(user)
    }

    fn hasher(&self) -> &PasswordHasher {
        &self.hasher
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
        info!("Closed credential store pool");
    }
}
