use argon2::password_hash::{rand_core::OsRng, PasswordHash, SaltString};
use argon2::{Algorithm, Argon2, Params, PasswordHasher as _, PasswordVerifier as _, Version};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("invalid hashing parameters: {0}")]
    Params(String),

    #[error("failed to hash password: {0}")]
    Hash(String),

    #[error("stored password hash is malformed: {0}")]
    MalformedHash(String),

    #[error("hashing task failed: {0}")]
    Task(String),
}

/// Argon2id hashing and verification for stored credentials
#[derive(Clone)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
    /// Verified against when the identifier is unknown, so a miss costs
    /// the same as a wrong password
    dummy_hash: String,
}

impl PasswordHasher {
    pub fn new(memory_kib: u32, iterations: u32) -> Result<Self, PasswordError> {
        let params = Params::new(memory_kib, iterations, 1, None)
            .map_err(|e| PasswordError::Params(e.to_string()))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let salt = SaltString::generate(&mut OsRng);
        let dummy_hash = argon2
            .hash_password(b"not-a-real-password", &salt)
            .map_err(|e| PasswordError::Hash(e.to_string()))?
            .to_string();

        Ok(Self { argon2, dummy_hash })
    }

    /// Hash a plain-text password into a PHC string
    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| PasswordError::Hash(e.to_string()))
    }

    /// Check a plain-text password against a stored PHC string
    pub fn verify(&self, password: &str, hash: &str) -> Result<bool, PasswordError> {
        let parsed = PasswordHash::new(hash).map_err(|e| PasswordError::MalformedHash(e.to_string()))?;
        Ok(self.argon2.verify_password(password.as_bytes(), &parsed).is_ok())
    }

    /// Spend one verification's worth of work and discard the result
    pub fn verify_dummy(&self, password: &str) {
        let _ = self.verify(password, &self.dummy_hash);
    }

    /// `hash` on the blocking thread pool, keeping Argon2 off the async workers
    pub async fn spawn_hash(&self, password: &str) -> Result<String, PasswordError> {
        let hasher = self.clone();
        let password = password.to_owned();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| PasswordError::Task(e.to_string()))?
    }

    /// `verify` on the blocking thread pool
    pub async fn spawn_verify(&self, password: &str, hash: &str) -> Result<bool, PasswordError> {
        let hasher = self.clone();
        let password = password.to_owned();
        let hash = hash.to_owned();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|e| PasswordError::Task(e.to_string()))?
    }

    /// `verify_dummy` on the blocking thread pool
    pub async fn spawn_verify_dummy(&self, password: &str) {
        let hasher = self.clone();
        let password = password.to_owned();
        if let Err(e) = tokio::task::spawn_blocking(move || hasher.verify_dummy(&password)).await {
            tracing::warn!("Dummy verification task failed: {}", e);
        }
    }
}

impl std::fmt::Debug for PasswordHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordHasher").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_hasher;

    #[test]
    fn hashes_and_verifies() {
        let hasher = test_hasher();
        let hash = hasher.hash("secret1").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify("secret1", &hash).unwrap());
        assert!(!hasher.verify("secret2", &hash).unwrap());
    }

    #[test]
    fn same_password_gets_a_fresh_salt() {
        let hasher = test_hasher();
        assert_ne!(hasher.hash("secret1").unwrap(), hasher.hash("secret1").unwrap());
    }

    #[test]
    fn malformed_hash_is_an_error() {
        let hasher = test_hasher();
        assert!(matches!(
            hasher.verify("secret1", "not-a-phc-string"),
            Err(PasswordError::MalformedHash(_))
        ));
    }

    #[tokio::test]
    async fn spawned_hashing_matches_inline() {
        let hasher = test_hasher();
        let hash = hasher.spawn_hash("secret1").await.unwrap();

        assert!(hasher.verify("secret1", &hash).unwrap());
        assert!(hasher.spawn_verify("secret1", &hash).await.unwrap());
        assert!(!hasher.spawn_verify("secret2", &hash).await.unwrap());
        assert!(matches!(
            hasher.spawn_verify("secret1", "not-a-phc-string").await,
            Err(PasswordError::MalformedHash(_))
        ));
    }

    #[test]
    fn rejects_impossible_params() {
        assert!(matches!(PasswordHasher::new(0, 0), Err(PasswordError::Params(_))));
    }
}
