use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::models::{NewUser, User};
use super::{CredentialStore, StoreError};
use crate::auth::password::PasswordHasher;
use crate::clock::Clock;

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    by_email: HashMap<String, Uuid>,
}

/// User table held in process memory. Used when no database is configured.
pub struct MemoryCredentialStore {
    tables: RwLock<Tables>,
    hasher: PasswordHasher,
    clock: Arc<dyn Clock>,
}

impl MemoryCredentialStore {
    pub fn new(hasher: PasswordHasher, clock: Arc<dyn Clock>) -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            hasher,
            clock,
        }
    }

    pub async fn len(&self) -> usize {
        self.tables.read().await.users.len()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .by_email
            .get(email)
            .and_then(|id| tables.users.get(id))
            .cloned())
    }

    async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        // Hash before taking the lock; it is the slow part
        let password_hash = self.hasher.spawn_hash(&new_user.password).await?;
        let now = self.clock.now();

        let mut tables = self.tables.write().await;
        if tables.by_email.contains_key(&new_user.email) {
            return Err(StoreError::DuplicateEmail);
        }

        let user = User {
            id: Uuid::new_v4(),
            name: new_user.name,
            email: new_user.email,
            password_hash,
            created_at: now,
            updated_at: now,
        };
        tables.by_email.insert(user.email.clone(), user.id);
        tables.users.insert(user.id, user.clone());

        Ok(user)
    }

    fn hasher(&self) -> &PasswordHasher {
        &self.hasher
    }
}
