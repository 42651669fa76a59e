use std::collections::HashMap;

use uuid::Uuid;

/// Per-zone expiring locks, owned exclusively by the signal engine that takes
/// them. A lock is never explicitly released; it lapses at its expiry.
#[derive(Debug, Default)]
pub struct SignalLockBook {
    locks: HashMap<Uuid, i64>,
}

impl SignalLockBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_locked(&self, zone_id: Uuid, now_ms: i64) -> bool {
        self.locks
            .get(&zone_id)
            .map(|until| *until > now_ms)
            .unwrap_or(false)
    }

    pub fn lock(&mut self, zone_id: Uuid, until_ms: i64) {
        self.locks.insert(zone_id, until_ms);
    }

    pub fn purge_expired(&mut self, now_ms: i64) {
        self.locks.retain(|_, until| *until > now_ms);
    }

    pub fn active_count(&self, now_ms: i64) -> usize {
        self.locks.values().filter(|until| **until > now_ms).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_expires_without_explicit_unlock() {
        let mut book = SignalLockBook::new();
        let zone = Uuid::new_v5(&Uuid::NAMESPACE_OID, b"zone");

        book.lock(zone, 1_000);
        assert!(book.is_locked(zone, 999));
        assert!(!book.is_locked(zone, 1_000));
        assert!(!book.is_locked(zone, 2_000));

        book.purge_expired(1_500);
        assert_eq!(book.active_count(1_500), 0);
    }
}
