use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
    pub throttle: ThrottleConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Take the client address from the last `X-Forwarded-For` entry, the
    /// one appended by the proxy in front of us. Off in every preset; only
    /// enable behind exactly one proxy that appends to the header.
    pub trust_forwarded_for: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Postgres URL; the in-memory store is used when absent
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_ttl_minutes: i64,
    /// How long after expiry a token may still be exchanged on refresh
    pub refresh_grace_minutes: i64,
    /// Absolute refresh lifetime, counted from the original login
    pub refresh_ttl_minutes: i64,
    pub hash_memory_kib: u32,
    pub hash_iterations: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThrottleConfig {
    pub max_attempts: u32,
    pub lockout_secs: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("JWT_SECRET must be set outside development")]
    MissingJwtSecret,

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Ok(v) = env::var("SERVER_HOST") {
            self.server.host = v;
        }
        if let Some(v) = env::var("SERVER_PORT").ok().or_else(|| env::var("PORT").ok()) {
            self.server.port = v.parse().unwrap_or(self.server.port);
        }
        if let Ok(v) = env::var("SERVER_TRUST_FORWARDED_FOR") {
            self.server.trust_forwarded_for = v.parse().unwrap_or(self.server.trust_forwarded_for);
        }

        // Database overrides
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = Some(v).filter(|s| !s.trim().is_empty());
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("SECURITY_JWT_TTL_MINUTES") {
            self.security.jwt_ttl_minutes = v.parse().unwrap_or(self.security.jwt_ttl_minutes);
        }
        if let Ok(v) = env::var("SECURITY_REFRESH_GRACE_MINUTES") {
            self.security.refresh_grace_minutes = v.parse().unwrap_or(self.security.refresh_grace_minutes);
        }
        if let Ok(v) = env::var("SECURITY_REFRESH_TTL_MINUTES") {
            self.security.refresh_ttl_minutes = v.parse().unwrap_or(self.security.refresh_ttl_minutes);
        }
        if let Ok(v) = env::var("SECURITY_HASH_MEMORY_KIB") {
            self.security.hash_memory_kib = v.parse().unwrap_or(self.security.hash_memory_kib);
        }
        if let Ok(v) = env::var("SECURITY_HASH_ITERATIONS") {
            self.security.hash_iterations = v.parse().unwrap_or(self.security.hash_iterations);
        }

        // Throttle overrides
        if let Ok(v) = env::var("THROTTLE_MAX_ATTEMPTS") {
            self.throttle.max_attempts = v.parse().unwrap_or(self.throttle.max_attempts);
        }
        if let Ok(v) = env::var("THROTTLE_LOCKOUT_SECS") {
            self.throttle.lockout_secs = v.parse().unwrap_or(self.throttle.lockout_secs);
        }

        self
    }

    /// Reject settings the service cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.security.jwt_secret.is_empty() {
            return Err(ConfigError::MissingJwtSecret);
        }
        if self.security.jwt_ttl_minutes <= 0 {
            return Err(ConfigError::Invalid {
                name: "SECURITY_JWT_TTL_MINUTES",
                reason: "must be positive".to_string(),
            });
        }
        if self.security.refresh_grace_minutes < 0 {
            return Err(ConfigError::Invalid {
                name: "SECURITY_REFRESH_GRACE_MINUTES",
                reason: "must not be negative".to_string(),
            });
        }
        if self.throttle.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                name: "THROTTLE_MAX_ATTEMPTS",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.throttle.lockout_secs <= 0 {
            return Err(ConfigError::Invalid {
                name: "THROTTLE_LOCKOUT_SECS",
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
                trust_forwarded_for: false,
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 10,
                connection_timeout: 30,
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
                jwt_secret: "development-secret-do-not-deploy".to_string(),
                jwt_issuer: "auth-api-rust".to_string(),
                jwt_ttl_minutes: 60,
                refresh_grace_minutes: 60 * 24,
                refresh_ttl_minutes: 60 * 24 * 14, // 2 weeks
                hash_memory_kib: 19 * 1024,
                hash_iterations: 2,
            },
            throttle: ThrottleConfig {
                max_attempts: 5,
                lockout_secs: 60,
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
                trust_forwarded_for: false,
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 20,
                connection_timeout: 10,
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["https://staging.example.com".to_string()],
                jwt_secret: String::new(),
                jwt_issuer: "auth-api-rust".to_string(),
                jwt_ttl_minutes: 60,
                refresh_grace_minutes: 60 * 24,
                refresh_ttl_minutes: 60 * 24 * 14,
                hash_memory_kib: 19 * 1024,
                hash_iterations: 2,
            },
            throttle: ThrottleConfig {
                max_attempts: 5,
                lockout_secs: 60,
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
                trust_forwarded_for: false,
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 50,
                connection_timeout: 5,
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["https://app.example.com".to_string()],
                jwt_secret: String::new(),
                jwt_issuer: "auth-api-rust".to_string(),
                jwt_ttl_minutes: 30,
                refresh_grace_minutes: 60 * 4,
                refresh_ttl_minutes: 60 * 24 * 7, // 1 week
                hash_memory_kib: 64 * 1024,
                hash_iterations: 3,
            },
            throttle: ThrottleConfig {
                max_attempts: 5,
                lockout_secs: 60 * 5,
            },
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert_eq!(config.environment, Environment::Development);
        assert!(config.database.url.is_none());
        assert_eq!(config.throttle.max_attempts, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_production_requires_secret() {
        let config = AppConfig::production();
        assert!(matches!(config.validate(), Err(ConfigError::MissingJwtSecret)));
    }

    #[test]
    fn test_no_preset_trusts_forwarded_for() {
        for config in [AppConfig::development(), AppConfig::staging(), AppConfig::production()] {
            assert!(!config.server.trust_forwarded_for, "{:?}", config.environment);
        }
    }

    #[test]
    fn test_rejects_zero_attempts() {
        let mut config = AppConfig::development();
        config.throttle.max_attempts = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { name: "THROTTLE_MAX_ATTEMPTS", .. })
        ));
    }
}
