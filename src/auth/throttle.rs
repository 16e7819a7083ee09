//! Failed-login counting and lockout.
//!
//! Attempts are keyed by the lowercased identifier *and* the client address,
//! so a third party cannot lock a user out from elsewhere and an attacker
//! cannot reset the counter by rotating addresses without also knowing the
//! identifier.

use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;

use crate::clock::Clock;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ThrottleKey(String);

impl ThrottleKey {
    pub fn new(identifier: &str, client: IpAddr) -> Self {
        Self(format!("{}|{}", identifier.trim().to_lowercase(), client))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ThrottleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An active lockout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lockout {
    pub until: DateTime<Utc>,
    pub retry_after: Duration,
}

impl Lockout {
    /// Whole seconds to wait, never zero
    pub fn retry_after_secs(&self) -> u64 {
        let millis = self.retry_after.num_milliseconds().max(0) as u64;
        millis.div_ceil(1000).max(1)
    }
}

/// Tracks failed logins per key.
///
/// Implementations must make `hit` an atomic increment so concurrent failures
/// for the same key are all counted.
#[async_trait]
pub trait ThrottleTracker: Send + Sync {
    /// The lockout in force for `key`, if any
    async fn lockout(&self, key: &ThrottleKey) -> Option<Lockout>;

    /// Record a failure; returns the lockout if this failure triggered one
    async fn hit(&self, key: &ThrottleKey) -> Option<Lockout>;

    /// Forget all failures for `key`
    async fn clear(&self, key: &ThrottleKey);

    /// Drop counters whose window has passed
    async fn purge_expired(&self) -> usize;
}

#[derive(Debug, Clone)]
struct AttemptCounter {
    count: u32,
    window_start: DateTime<Utc>,
    locked_until: Option<DateTime<Utc>>,
}

/// In-process attempt counter
pub struct MemoryThrottle {
    max_attempts: u32,
    window: Duration,
    counters: Mutex<HashMap<ThrottleKey, AttemptCounter>>,
    clock: Arc<dyn Clock>,
}

impl MemoryThrottle {
    /// `window` is both how long failures are remembered and how long a
    /// lockout lasts
    pub fn new(max_attempts: u32, window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            window,
            counters: Mutex::new(HashMap::new()),
            clock,
        }
    }

    fn is_stale(&self, counter: &AttemptCounter, now: DateTime<Utc>) -> bool {
        let locked = counter.locked_until.is_some_and(|until| until > now);
        !locked && now >= counter.window_start + self.window
    }
}

#[async_trait]
impl ThrottleTracker for MemoryThrottle {
    async fn lockout(&self, key: &ThrottleKey) -> Option<Lockout> {
        let now = self.clock.now();
        let counters = self.counters.lock().await;
        let until = counters.get(key)?.locked_until.filter(|until| *until > now)?;

        Some(Lockout {
            until,
            retry_after: until - now,
        })
    }

    async fn hit(&self, key: &ThrottleKey) -> Option<Lockout> {
        let now = self.clock.now();
        let mut counters = self.counters.lock().await;

        let counter = counters.entry(key.clone()).or_insert_with(|| AttemptCounter {
            count: 0,
            window_start: now,
            locked_until: None,
        });

        if self.is_stale(counter, now) {
            counter.count = 0;
            counter.window_start = now;
            counter.locked_until = None;
        }

        counter.count += 1;
        if counter.count < self.max_attempts {
            return None;
        }

        // Threshold reached: lock and start counting afresh afterwards
        let until = now + self.window;
        counter.count = 0;
        counter.window_start = until;
        counter.locked_until = Some(until);

        Some(Lockout {
            until,
            retry_after: self.window,
        })
    }

    async fn clear(&self, key: &ThrottleKey) {
        self.counters.lock().await.remove(key);
    }

    async fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut counters = self.counters.lock().await;
        let before = counters.len();
        counters.retain(|_, counter| !self.is_stale(counter, now));
        before - counters.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ManualClock;
    use std::net::Ipv4Addr;

    const HOME: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
    const AWAY: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2));

    fn throttle(max_attempts: u32) -> (Arc<ManualClock>, MemoryThrottle) {
        let clock = Arc::new(ManualClock::at_epoch());
        let throttle = MemoryThrottle::new(max_attempts, Duration::seconds(60), clock.clone());
        (clock, throttle)
    }

    #[test]
    fn key_joins_lowercased_identifier_and_address() {
        let key = ThrottleKey::new(" Ada@X.com ", HOME);
        assert_eq!(key.as_str(), "ada@x.com|10.0.0.1");
    }

    #[test]
    fn retry_after_rounds_up() {
        let lockout = Lockout {
            until: Utc::now(),
            retry_after: Duration::milliseconds(1500),
        };
        assert_eq!(lockout.retry_after_secs(), 2);

        let elapsed = Lockout {
            until: Utc::now(),
            retry_after: Duration::zero(),
        };
        assert_eq!(elapsed.retry_after_secs(), 1);
    }

    #[tokio::test]
    async fn locks_on_reaching_max_attempts() {
        let (_, throttle) = throttle(3);
        let key = ThrottleKey::new("ada@x.com", HOME);

        assert!(throttle.hit(&key).await.is_none());
        assert!(throttle.hit(&key).await.is_none());
        assert!(throttle.lockout(&key).await.is_none());

        let lockout = throttle.hit(&key).await.expect("third failure locks");
        assert_eq!(lockout.retry_after_secs(), 60);
        assert_eq!(throttle.lockout(&key).await, Some(lockout));
    }

    #[tokio::test]
    async fn lockout_expires_after_window() {
        let (clock, throttle) = throttle(2);
        let key = ThrottleKey::new("ada@x.com", HOME);
        throttle.hit(&key).await;
        throttle.hit(&key).await;

        clock.advance(Duration::seconds(59));
        assert_eq!(throttle.lockout(&key).await.map(|l| l.retry_after_secs()), Some(1));

        clock.advance(Duration::seconds(1));
        assert!(throttle.lockout(&key).await.is_none());
        // Counting restarts from zero
        assert!(throttle.hit(&key).await.is_none());
    }

    #[tokio::test]
    async fn failures_outside_window_are_forgotten() {
        let (clock, throttle) = throttle(2);
        let key = ThrottleKey::new("ada@x.com", HOME);

        throttle.hit(&key).await;
        clock.advance(Duration::seconds(61));

        assert!(throttle.hit(&key).await.is_none());
    }

    #[tokio::test]
    async fn keys_are_independent() {
        let (_, throttle) = throttle(1);
        let home = ThrottleKey::new("ada@x.com", HOME);

        throttle.hit(&home).await;

        assert!(throttle.lockout(&home).await.is_some());
        assert!(throttle.lockout(&ThrottleKey::new("ada@x.com", AWAY)).await.is_none());
        assert!(throttle.lockout(&ThrottleKey::new("bob@x.com", HOME)).await.is_none());
    }

    #[tokio::test]
    async fn clear_resets_count() {
        let (_, throttle) = throttle(2);
        let key = ThrottleKey::new("ada@x.com", HOME);

        throttle.hit(&key).await;
        throttle.clear(&key).await;

        assert!(throttle.hit(&key).await.is_none());
    }

    #[tokio::test]
    async fn purge_drops_stale_counters_but_keeps_lockouts() {
        let (clock, throttle) = throttle(2);
        let stale = ThrottleKey::new("old@x.com", HOME);
        let locked = ThrottleKey::new("ada@x.com", HOME);

        throttle.hit(&stale).await;
        clock.advance(Duration::seconds(30));
        throttle.hit(&locked).await;
        throttle.hit(&locked).await;
        clock.advance(Duration::seconds(40));

        assert_eq!(throttle.purge_expired().await, 1);
        assert!(throttle.lockout(&locked).await.is_some());
    }
}
