//! Per-owner signal cooldowns.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;

/// Last alert time per (owner, symbol).
///
/// Automatic scans skip pairs still inside the window; forced scans ignore the
/// window but still stamp the pair.
#[derive(Debug)]
pub struct CooldownStore {
    window: Duration,
    last_alert: RwLock<HashMap<(i64, String), DateTime<Utc>>>,
}

impl CooldownStore {
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_alert: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn from_secs(secs: u64) -> Self {
        Self::new(Duration::seconds(secs.min(u64::from(u32::MAX)) as i64))
    }

    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Whether `owner_id` was alerted on `symbol` less than one window before `now`.
    #[must_use]
    pub fn is_cooling(&self, owner_id: i64, symbol: &str, now: DateTime<Utc>) -> bool {
        self.last_alert
            .read()
            .get(&(owner_id, symbol.to_uppercase()))
            .is_some_and(|at| now - *at < self.window)
    }

    pub fn record(&self, owner_id: i64, symbol: &str, now: DateTime<Utc>) {
        self.last_alert
            .write()
            .insert((owner_id, symbol.to_uppercase()), now);
    }

    /// Stamps the pair and reports whether it was free to alert.
    ///
    /// A cooling pair is left untouched so the window is not extended.
    pub fn try_acquire(&self, owner_id: i64, symbol: &str, now: DateTime<Utc>) -> bool {
        let key = (owner_id, symbol.to_uppercase());
        let mut map = self.last_alert.write();
        if map.get(&key).is_some_and(|at| now - *at < self.window) {
            return false;
        }
        map.insert(key, now);
        true
    }

    /// Loads a stamp recorded elsewhere, keeping whichever is newer.
    pub fn seed(&self, owner_id: i64, symbol: &str, at: DateTime<Utc>) {
        let mut map = self.last_alert.write();
        let entry = map.entry((owner_id, symbol.to_uppercase())).or_insert(at);
        if at > *entry {
            *entry = at;
        }
    }

    #[must_use]
    pub fn last_alert(&self, owner_id: i64, symbol: &str) -> Option<DateTime<Utc>> {
        self.last_alert
            .read()
            .get(&(owner_id, symbol.to_uppercase()))
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 3, hour, 0, 0).unwrap()
    }

    #[test]
    fn window_suppresses_repeat_alerts_per_owner() {
        let store = CooldownStore::from_secs(4 * 3600);
        assert!(store.try_acquire(1, "nvda", at(10)));
        assert!(!store.try_acquire(1, "NVDA", at(13)));
        assert!(store.try_acquire(2, "NVDA", at(13)));
        assert!(store.try_acquire(1, "NVDA", at(14)));
    }

    #[test]
    fn rejected_acquire_keeps_original_stamp() {
        let store = CooldownStore::from_secs(4 * 3600);
        store.record(1, "AMD", at(9));
        assert!(!store.try_acquire(1, "AMD", at(12)));
        assert_eq!(store.last_alert(1, "AMD"), Some(at(9)));
    }

    #[test]
    fn seed_never_rewinds_a_stamp() {
        let store = CooldownStore::from_secs(4 * 3600);
        store.record(1, "AMD", at(11));
        store.seed(1, "amd", at(9));
        store.seed(2, "AMD", at(9));
        assert_eq!(store.last_alert(1, "AMD"), Some(at(11)));
        assert!(!store.try_acquire(2, "AMD", at(12)));
    }

    #[test]
    fn record_refreshes_window() {
        let store = CooldownStore::from_secs(3600);
        store.record(7, "SPY", at(9));
        assert!(store.is_cooling(7, "SPY", at(9)));
        assert!(!store.is_cooling(7, "SPY", at(11)));
        store.record(7, "SPY", at(11));
        assert!(store.is_cooling(7, "SPY", at(11)));
    }
}
