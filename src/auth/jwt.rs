use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{IssuedToken, TokenError, TokenIssuer};
use crate::clock::Clock;
use crate::config::SecurityConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: Uuid,
    /// Token id, used for revocation
    pub jti: Uuid,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    /// Issue time of the login that started this refresh chain
    pub orig_iat: i64,
}

impl Claims {
    /// Last instant at which this token can still be refreshed
    fn refreshable_until(&self, settings: &JwtSettings) -> i64 {
        let grace_end = self.exp + settings.refresh_grace.num_seconds();
        let chain_end = self.orig_iat + settings.refresh_ttl.num_seconds();
        grace_end.min(chain_end)
    }
}

#[derive(Debug, Clone)]
pub struct JwtSettings {
    pub secret: String,
    pub issuer: String,
    pub ttl: Duration,
    pub refresh_grace: Duration,
    pub refresh_ttl: Duration,
}

impl JwtSettings {
    pub fn from_config(security: &SecurityConfig) -> Self {
        Self {
            secret: security.jwt_secret.clone(),
            issuer: security.jwt_issuer.clone(),
            ttl: Duration::minutes(security.jwt_ttl_minutes),
            refresh_grace: Duration::minutes(security.refresh_grace_minutes),
            refresh_ttl: Duration::minutes(security.refresh_ttl_minutes),
        }
    }
}

/// HS256 token issuer with an in-process revocation list
pub struct JwtIssuer {
    settings: JwtSettings,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    /// jti -> unix time after which the token is dead regardless
    revoked: RwLock<HashMap<Uuid, i64>>,
    clock: Arc<dyn Clock>,
}

impl JwtIssuer {
    pub fn new(settings: JwtSettings, clock: Arc<dyn Clock>) -> Result<Self, TokenError> {
        if settings.secret.is_empty() {
            return Err(TokenError::InvalidSecret);
        }

        let encoding_key = EncodingKey::from_secret(settings.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(settings.secret.as_bytes());

        // Expiry is checked against our own clock, not the library's
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.set_issuer(&[settings.issuer.as_str()]);

        Ok(Self {
            settings,
            encoding_key,
            decoding_key,
            validation,
            revoked: RwLock::new(HashMap::new()),
            clock,
        })
    }

    fn sign(&self, user_id: Uuid, orig_iat: Option<i64>) -> Result<IssuedToken, TokenError> {
        let now = self.clock.now();
        let iat = now.timestamp();
        let claims = Claims {
            sub: user_id,
            jti: Uuid::new_v4(),
            iss: self.settings.issuer.clone(),
            iat,
            exp: (now + self.settings.ttl).timestamp(),
            orig_iat: orig_iat.unwrap_or(iat),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Encoding(e.to_string()))?;

        Ok(IssuedToken::bearer(token, self.settings.ttl.num_seconds()))
    }

    /// Signature and issuer only; expiry is up to the caller
    fn decode(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!("Rejected token: {}", e);
                TokenError::Invalid
            })
    }

    async fn is_revoked(&self, jti: &Uuid) -> bool {
        self.revoked.read().await.contains_key(jti)
    }

    /// Returns false when the token was already revoked
    async fn revoke(&self, claims: &Claims) -> bool {
        let forget_after = claims.refreshable_until(&self.settings).max(claims.exp);
        self.revoked.write().await.insert(claims.jti, forget_after).is_none()
    }
}

#[async_trait]
impl TokenIssuer for JwtIssuer {
    async fn issue(&self, user_id: Uuid) -> Result<IssuedToken, TokenError> {
        self.sign(user_id, None)
    }

    async fn authenticate(&self, token: &str) -> Result<Uuid, TokenError> {
        let claims = self.decode(token)?;

        if self.is_revoked(&claims.jti).await {
            return Err(TokenError::Revoked);
        }
        if self.clock.now().timestamp() >= claims.exp {
            return Err(TokenError::Expired);
        }

        Ok(claims.sub)
    }

    async fn refresh(&self, token: &str) -> Result<IssuedToken, TokenError> {
        let claims = self.decode(token)?;

        if self.clock.now().timestamp() > claims.refreshable_until(&self.settings) {
            return Err(TokenError::RefreshExpired);
        }
        // Check-and-revoke under one lock so a token refreshes at most once
        if !self.revoke(&claims).await {
            return Err(TokenError::Revoked);
        }

        self.sign(claims.sub, Some(claims.orig_iat))
    }

    async fn invalidate(&self, token: &str) -> Result<(), TokenError> {
        let claims = self.decode(token)?;
        self.revoke(&claims).await;
        Ok(())
    }

    async fn purge_expired(&self) -> usize {
        let now = self.clock.now().timestamp();
        let mut revoked = self.revoked.write().await;
        let before = revoked.len();
        revoked.retain(|_, forget_after| *forget_after >= now);
        before - revoked.len()
    }
}
