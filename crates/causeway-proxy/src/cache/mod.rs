//! Two-tier response cache: an in-memory map in front of an on-disk
//! directory, with pattern-gated admission, TTL expiry, size-bounded
//! eviction, and single-flight cleanup. See SPEC_FULL.md §4.E.

pub mod cleanup;
pub mod disk;
pub mod key;
pub mod memory;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use hyper::Method;
use tracing::error;

use crate::config::FileCacheConfig;
use crate::matcher::CompiledMatcher;

use self::cleanup::CleanupGuard;
use self::memory::{CacheEntry, MemoryTier};

pub struct CacheEngine {
    memory: MemoryTier,
    cache_dir: PathBuf,
    ttl_secs: u64,
    max_entries: usize,
    include: Vec<CompiledMatcher>,
    exclude: Vec<CompiledMatcher>,
    cleanup_guard: Arc<CleanupGuard>,
}

pub enum Lookup {
    Hit(CacheEntry),
    Miss,
}

impl CacheEngine {
    pub fn new(config: &FileCacheConfig) -> Result<Self, anyhow::Error> {
        let compile_all = |patterns: &Option<Vec<String>>| -> Result<Vec<CompiledMatcher>, anyhow::Error> {
            patterns
                .as_deref()
                .unwrap_or(&[])
                .iter()
                .map(|p| CompiledMatcher::compile(p).map_err(|e| anyhow::anyhow!("{e}")))
                .collect()
        };
        Ok(Self {
            memory: MemoryTier::new(config.max_entries),
            cache_dir: PathBuf::from(&config.path),
            ttl_secs: config.ttl,
            max_entries: config.max_entries,
            include: compile_all(&config.include_patterns)?,
            exclude: compile_all(&config.exclude_patterns)?,
            cleanup_guard: Arc::new(CleanupGuard::default()),
        })
    }

    /// Admission policy: GET only, path matches an include pattern (if any
    /// configured; otherwise nothing is includable) and no exclude pattern,
    /// and `200 <= status < 400`.
    pub fn is_cacheable(&self, method: &Method, path: &str, status: u16) -> bool {
        if method != Method::GET {
            return false;
        }
        if !(200..400).contains(&status) {
            return false;
        }
        if self.include.is_empty() {
            return false;
        }
        let included = self.include.iter().any(|m| m.is_match(path));
        let excluded = self.exclude.iter().any(|m| m.is_match(path));
        included && !excluded
    }

    pub async fn lookup(&self, path: &str, query: Option<&str>) -> Lookup {
        let key = key::cache_key(path, query);
        if let Some(entry) = self.memory.get(&key, self.ttl_secs) {
            return Lookup::Hit(entry);
        }
        if let Some(entry) = disk::read_entry(&self.cache_dir, &key).await {
            if entry.is_fresh(self.ttl_secs) {
                self.memory.insert(key, entry.clone());
                return Lookup::Hit(entry);
            }
        }
        Lookup::Miss
    }

    /// Admits a freshly-fetched response into both tiers. The memory insert
    /// is synchronous (so a same-process concurrent GET can observe it); the
    /// disk write is spawned so it never blocks the response already sent to
    /// the client.
    pub fn admit(
        self: &Arc<Self>,
        path: &str,
        query: Option<&str>,
        status: u16,
        headers: HashMap<String, String>,
        body: Bytes,
    ) {
        let key = key::cache_key(path, query);
        let entry = CacheEntry::new(status, headers, body);
        self.memory.insert(key.clone(), entry.clone());

        let engine = self.clone();
        tokio::spawn(async move {
            if let Err(e) = disk::write_entry(&engine.cache_dir, &key, &entry).await {
                error!("cache write failed for key {key}: {e}");
            }
            engine.maybe_schedule_cleanup().await;
        });
    }

    async fn maybe_schedule_cleanup(self: &Arc<Self>) {
        let count = match tokio::fs::read_dir(&self.cache_dir).await {
            Ok(mut entries) => {
                let mut n = 0usize;
                while let Ok(Some(_)) = entries.next_entry().await {
                    n += 1;
                }
                n
            }
            Err(_) => return,
        };
        if !cleanup::should_schedule_cleanup(count, self.max_entries) {
            return;
        }
        let Some(ticket) = self.cleanup_guard.try_acquire() else {
            return;
        };
        let engine = self.clone();
        tokio::spawn(async move {
            let _ticket = ticket;
            cleanup::run_cleanup(&engine.cache_dir, engine.ttl_secs, &engine.memory).await;
        });
    }

    /// Spawns the periodic cleanup timer described in §4.E; called once at
    /// startup.
    pub fn spawn_periodic_cleanup(self: &Arc<Self>, interval_secs: u64) {
        let engine = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(std::time::Duration::from_secs(interval_secs.max(1)));
            loop {
                ticker.tick().await;
                let Some(ticket) = engine.cleanup_guard.try_acquire() else {
                    continue;
                };
                let _ticket = ticket;
                cleanup::run_cleanup(&engine.cache_dir, engine.ttl_secs, &engine.memory).await;
            }
        });
    }

    pub fn memory_len(&self) -> usize {
        self.memory.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine_with(include: Vec<String>, dir: &std::path::Path) -> CacheEngine {
        CacheEngine::new(&FileCacheConfig {
            path: dir.to_string_lossy().to_string(),
            ttl: 60,
            max_size_mb: 100,
            max_entries: 1000,
            enabled: true,
            include_patterns: Some(include),
            exclude_patterns: None,
            cleanup_interval: "1h".into(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn only_get_and_included_pattern_is_cacheable() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_with(vec!["**/*.json".into()], dir.path());
        assert!(engine.is_cacheable(&Method::GET, "/x.json", 200));
        assert!(!engine.is_cacheable(&Method::POST, "/x.json", 200));
        assert!(!engine.is_cacheable(&Method::GET, "/x.html", 200));
        assert!(!engine.is_cacheable(&Method::GET, "/x.json", 404));
        assert!(!engine.is_cacheable(&Method::GET, "/x.json", 301));
    }

    #[tokio::test]
    async fn lookup_then_admit_roundtrips_through_memory() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(engine_with(vec!["**/*.json".into()], dir.path()));
        assert!(matches!(engine.lookup("/x.json", None).await, Lookup::Miss));
        engine.admit("/x.json", None, 200, HashMap::new(), Bytes::from("{}"));
        match engine.lookup("/x.json", None).await {
            Lookup::Hit(entry) => assert_eq!(entry.body, Bytes::from("{}")),
            Lookup::Miss => panic!("expected a hit after admission"),
        }
    }

    #[test]
    fn empty_include_patterns_means_nothing_is_cacheable() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_with(vec![], dir.path());
        assert!(!engine.is_cacheable(&Method::GET, "/x.json", 200));
    }
}
