//! The in-memory tier: a concurrent map, accessed without a lock on the hot
//! path. Eviction runs when the map exceeds its configured size and drops
//! the oldest 20% by `created_at`, batched rather than one at a time.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use dashmap::DashMap;

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub status_code: u16,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
    pub created_at: u64,
}

impl CacheEntry {
    pub fn new(status_code: u16, headers: HashMap<String, String>, body: Bytes) -> Self {
        Self { status_code, headers, body, created_at: now_secs() }
    }

    pub fn is_fresh(&self, ttl_secs: u64) -> bool {
        now_secs().saturating_sub(self.created_at) <= ttl_secs
    }
}

pub fn now_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

pub struct MemoryTier {
    map: DashMap<String, CacheEntry>,
    max_entries: usize,
}

impl MemoryTier {
    pub fn new(max_entries: usize) -> Self {
        Self { map: DashMap::new(), max_entries }
    }

    pub fn get(&self, key: &str, ttl_secs: u64) -> Option<CacheEntry> {
        let entry = self.map.get(key)?;
        if entry.is_fresh(ttl_secs) {
            Some(entry.clone())
        } else {
            None
        }
    }

    pub fn insert(&self, key: String, entry: CacheEntry) {
        self.map.insert(key, entry);
        if self.map.len() > self.max_entries {
            self.evict_oldest_20_percent();
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    fn evict_oldest_20_percent(&self) {
        let to_evict = (self.map.len() as f64 * 0.2).ceil() as usize;
        if to_evict == 0 {
            return;
        }
        let mut by_age: Vec<(String, u64)> =
            self.map.iter().map(|e| (e.key().clone(), e.value().created_at)).collect();
        by_age.sort_by_key(|(_, created_at)| *created_at);
        for (key, _) in by_age.into_iter().take(to_evict) {
            self.map.remove(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(created_at: u64) -> CacheEntry {
        CacheEntry { status_code: 200, headers: HashMap::new(), body: Bytes::new(), created_at }
    }

    #[test]
    fn insert_and_get_roundtrips_when_fresh() {
        let tier = MemoryTier::new(1000);
        tier.insert("k".into(), CacheEntry::new(200, HashMap::new(), Bytes::from("hi")));
        let got = tier.get("k", 60).unwrap();
        assert_eq!(got.body, Bytes::from("hi"));
    }

    #[test]
    fn stale_entry_is_a_miss() {
        let tier = MemoryTier::new(1000);
        tier.map.insert("k".into(), entry(0));
        assert!(tier.get("k", 1).is_none());
    }

    #[test]
    fn eviction_drops_oldest_twenty_percent() {
        let tier = MemoryTier::new(10);
        for i in 0..11u64 {
            tier.map.insert(format!("k{i}"), entry(i));
        }
        tier.evict_oldest_20_percent();
        // 11 entries, ceil(11 * 0.2) = 3 oldest removed
        assert_eq!(tier.len(), 8);
        assert!(tier.map.get("k0").is_none());
        assert!(tier.map.get("k1").is_none());
        assert!(tier.map.get("k2").is_none());
        assert!(tier.map.get("k3").is_some());
    }

    #[test]
    fn insert_past_capacity_triggers_eviction() {
        let tier = MemoryTier::new(5);
        for i in 0..6u64 {
            tier.insert(format!("k{i}"), entry(i));
        }
        assert!(tier.len() < 6);
    }
}
