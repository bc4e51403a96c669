//! CooldownCache - Per Camera/Weapon Log Cooldown
//!
//! ## Responsibilities
//!
//! - Remember when each `camera_id:weapon_type` key was last logged
//! - Answer whether a key is still inside the cooldown window
//! - Sweep expired keys after a successful log
//!
//! Uses the tokio clock so tests can advance time with a paused runtime.

use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// Default minimum interval between two accepted logs for one key
pub const DEFAULT_LOG_COOLDOWN: Duration = Duration::from_secs(5 * 60);

/// Cooldown map keyed by `camera_id:weapon_type`
#[derive(Debug)]
pub struct CooldownCache {
    last_logged: HashMap<String, Instant>,
    window: Duration,
}

impl CooldownCache {
    pub fn new(window: Duration) -> Self {
        Self {
            last_logged: HashMap::new(),
            window,
        }
    }

    /// Remaining cooldown for `key`, `None` when a log is allowed
    pub fn remaining(&self, key: &str, now: Instant) -> Option<Duration> {
        let last = self.last_logged.get(key)?;
        let elapsed = now.saturating_duration_since(*last);
        if elapsed < self.window {
            Some(self.window - elapsed)
        } else {
            None
        }
    }

    /// Time since `key` was last logged
    pub fn elapsed(&self, key: &str, now: Instant) -> Option<Duration> {
        self.last_logged
            .get(key)
            .map(|last| now.saturating_duration_since(*last))
    }

    /// Record an accepted log for `key`
    pub fn record(&mut self, key: &str, now: Instant) {
        self.last_logged.insert(key.to_string(), now);
        tracing::debug!(key = %key, "Cooldown started");
    }

    /// Drop keys whose window has fully elapsed, returns how many were removed
    pub fn sweep(&mut self, now: Instant) -> usize {
        let before = self.last_logged.len();
        let window = self.window;
        self.last_logged
            .retain(|_, last| now.saturating_duration_since(*last) <= window);
        before - self.last_logged.len()
    }

    pub fn len(&self) -> usize {
        self.last_logged.len()
    }
}

impl Default for CooldownCache {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_COOLDOWN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_key_is_not_cooling() {
        let cache = CooldownCache::default();
        assert!(cache.remaining("1:pistol", Instant::now()).is_none());
    }

    #[test]
    fn test_recorded_key_cools_until_window_elapses() {
        let mut cache = CooldownCache::new(Duration::from_secs(300));
        let t0 = Instant::now();
        cache.record("1:pistol", t0);

        assert!(cache.remaining("1:pistol", t0 + Duration::from_secs(299)).is_some());
        assert_eq!(
            cache.remaining("1:pistol", t0 + Duration::from_secs(100)),
            Some(Duration::from_secs(200))
        );
        assert!(cache.remaining("1:pistol", t0 + Duration::from_secs(300)).is_none());
        assert!(cache.remaining("1:knife", t0).is_none());
    }

    #[test]
    fn test_sweep_removes_only_expired() {
        let mut cache = CooldownCache::new(Duration::from_secs(60));
        let t0 = Instant::now();
        cache.record("1:pistol", t0);
        cache.record("1:knife", t0 + Duration::from_secs(50));

        let removed = cache.sweep(t0 + Duration::from_secs(61));
        assert_eq!(removed, 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.remaining("1:knife", t0 + Duration::from_secs(61)).is_some());
    }
}
