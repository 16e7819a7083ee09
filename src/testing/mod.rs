use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::auth::jwt::{JwtIssuer, JwtSettings};
use crate::auth::password::PasswordHasher;
use crate::auth::throttle::MemoryThrottle;
use crate::clock::Clock;
use crate::database::memory::MemoryCredentialStore;
use crate::services::AuthService;

/// Clock that only moves when told to
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    /// A fixed, arbitrary starting point so tests are reproducible
    pub fn at_epoch() -> Self {
        Self::new(Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap())
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now = *now + by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Cheap Argon2 parameters; production settings make debug-build tests crawl
pub fn test_hasher() -> PasswordHasher {
    PasswordHasher::new(1024, 1).unwrap()
}

pub fn test_settings() -> JwtSettings {
    JwtSettings {
        secret: "test-secret".to_string(),
        issuer: "auth-api-test".to_string(),
        ttl: Duration::minutes(60),
        refresh_grace: Duration::minutes(30),
        refresh_ttl: Duration::days(14),
    }
}

/// Everything a service-level test needs to poke at
pub struct TestContext {
    pub clock: Arc<ManualClock>,
    pub store: Arc<MemoryCredentialStore>,
    pub service: AuthService,
}

impl TestContext {
    /// Service with a throttle of `max_attempts` failures per 60 second lockout
    pub fn new(max_attempts: u32) -> Self {
        let clock = Arc::new(ManualClock::at_epoch());
        let store = Arc::new(MemoryCredentialStore::new(test_hasher(), clock.clone()));
        let issuer = Arc::new(JwtIssuer::new(test_settings(), clock.clone()).unwrap());
        let throttle = Arc::new(MemoryThrottle::new(max_attempts, Duration::seconds(60), clock.clone()));
        let service = AuthService::new(store.clone(), issuer, throttle);

        Self { clock, store, service }
    }
}
