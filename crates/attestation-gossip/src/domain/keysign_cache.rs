//! # Keysign Party Cache
//!
//! Short-lived cache of vault key → keysign party, so verifying outbound
//! observations from vault members outside the active set does not hit the
//! ledger for every attestation.

use parking_lot::Mutex;
use shared_types::PubKey;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

struct CachedParty {
    members: Vec<PubKey>,
    fetched_at: Instant,
}

/// TTL cache of keysign parties.
pub struct KeysignPartyCache {
    ttl: Duration,
    entries: Mutex<HashMap<PubKey, CachedParty>>,
}

impl KeysignPartyCache {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Cached party for `vault`, if fetched within the TTL.
    #[must_use]
    pub fn get(&self, vault: &PubKey, now: Instant) -> Option<Vec<PubKey>> {
        let entries = self.entries.lock();
        let cached = entries.get(vault)?;
        if now.saturating_duration_since(cached.fetched_at) > self.ttl {
            return None;
        }
        Some(cached.members.clone())
    }

    pub fn insert(&self, vault: PubKey, members: Vec<PubKey>, now: Instant) {
        self.entries.lock().insert(
            vault,
            CachedParty {
                members,
                fetched_at: now,
            },
        );
    }

    /// Evict expired entries, returning how many were removed.
    pub fn prune(&self, now: Instant) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, cached| now.saturating_duration_since(cached.fetched_at) <= self.ttl);
        before - entries.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(60);

    #[test]
    fn test_hit_within_ttl() {
        let cache = KeysignPartyCache::new(TTL);
        let now = Instant::now();
        let vault = PubKey(vec![2; 33]);
        cache.insert(vault.clone(), vec![PubKey(vec![3; 33])], now);

        assert_eq!(cache.get(&vault, now + TTL).map(|m| m.len()), Some(1));
        assert!(cache.get(&vault, now + TTL + Duration::from_millis(1)).is_none());
    }

    #[test]
    fn test_prune_evicts_expired() {
        let cache = KeysignPartyCache::new(TTL);
        let now = Instant::now();
        cache.insert(PubKey(vec![1]), vec![], now);
        cache.insert(PubKey(vec![2]), vec![], now + Duration::from_secs(30));

        assert_eq!(cache.prune(now + Duration::from_secs(61)), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.prune(now + Duration::from_secs(200)), 1);
        assert!(cache.is_empty());
    }
}
