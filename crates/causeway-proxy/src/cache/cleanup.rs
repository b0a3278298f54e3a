//! Cleanup protocol: scans `cache_dir` in batches, yielding between batches,
//! under a single-flight lock so at most one cleanup pass runs at a time.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use tracing::{debug, warn};

use super::disk::{is_stale_by_mtime, read_timestamp_prefix};
use super::memory::{now_secs, MemoryTier};

const BATCH_SIZE: usize = 50;
const TIMESTAMP_PREFIX_BYTES: usize = 100;

/// Guards cleanup so a second caller skips instead of racing the first, per
/// the single-flight requirement in §4.E.
pub struct CleanupGuard {
    running: AtomicBool,
}

impl Default for CleanupGuard {
    fn default() -> Self {
        Self { running: AtomicBool::new(false) }
    }
}

impl CleanupGuard {
    /// Attempts to start a cleanup pass; `None` if one is already running.
    pub fn try_acquire(self: &Arc<Self>) -> Option<CleanupTicket> {
        if self.running.swap(true, Ordering::SeqCst) {
            None
        } else {
            Some(CleanupTicket { guard: self.clone() })
        }
    }
}

pub struct CleanupTicket {
    guard: Arc<CleanupGuard>,
}

impl Drop for CleanupTicket {
    fn drop(&mut self) {
        self.guard.running.store(false, Ordering::SeqCst);
    }
}

/// Runs one cleanup pass over `cache_dir`. Deletes any file whose mtime
/// fast-path or (failing that) timestamp-prefix read indicates expiry,
/// skipping anything still fresh in the memory tier.
pub async fn run_cleanup(cache_dir: &Path, ttl_secs: u64, memory: &MemoryTier) {
    let mut entries = match tokio::fs::read_dir(cache_dir).await {
        Ok(r) => r,
        Err(e) => {
            debug!("cache cleanup: cannot read {}: {e}", cache_dir.display());
            return;
        }
    };

    let mut batch = Vec::with_capacity(BATCH_SIZE);
    loop {
        batch.clear();
        while batch.len() < BATCH_SIZE {
            match entries.next_entry().await {
                Ok(Some(entry)) => batch.push(entry),
                Ok(None) => break,
                Err(e) => {
                    warn!("cache cleanup: error iterating directory: {e}");
                    break;
                }
            }
        }
        if batch.is_empty() {
            break;
        }
        for dir_entry in &batch {
            process_one(dir_entry, ttl_secs, memory).await;
        }
        // Yield between batches so cleanup never starves request handling.
        tokio::task::yield_now().await;
    }
}

async fn process_one(dir_entry: &tokio::fs::DirEntry, ttl_secs: u64, memory: &MemoryTier) {
    let path = dir_entry.path();
    let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
        return;
    };
    if file_name.ends_with(".tmp") {
        return;
    }

    if let Some(entry) = memory.get(file_name, ttl_secs) {
        let _ = entry;
        return;
    }

    let Ok(metadata) = dir_entry.metadata().await else {
        let _ = tokio::fs::remove_file(&path).await;
        return;
    };
    let mtime_secs = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(SystemTime::UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0);

    if is_stale_by_mtime(mtime_secs, ttl_secs) {
        let _ = tokio::fs::remove_file(&path).await;
        return;
    }

    match read_timestamp_prefix(&path, TIMESTAMP_PREFIX_BYTES).await {
        Some(timestamp) if now_secs().saturating_sub(timestamp) <= ttl_secs => {}
        _ => {
            let _ = tokio::fs::remove_file(&path).await;
        }
    }
}

/// Whether a cleanup pass should be opportunistically scheduled: file count
/// exceeds 90% of `max_entries`.
pub fn should_schedule_cleanup(file_count: usize, max_entries: usize) -> bool {
    file_count as f64 > max_entries as f64 * 0.9
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn threshold_triggers_at_ninety_percent() {
        assert!(!should_schedule_cleanup(89, 100));
        assert!(should_schedule_cleanup(91, 100));
    }

    #[test]
    fn single_flight_blocks_concurrent_acquire() {
        let guard = Arc::new(CleanupGuard::default());
        let ticket1 = guard.try_acquire();
        assert!(ticket1.is_some());
        assert!(guard.try_acquire().is_none());
        drop(ticket1);
        assert!(guard.try_acquire().is_some());
    }

    #[tokio::test]
    async fn cleanup_removes_expired_file_and_keeps_fresh_one() {
        let dir = tempdir().unwrap();
        tokio::fs::write(dir.path().join("stale"), br#"{"timestamp":0,"status_code":200,"content":"","headers":{}}"#)
            .await
            .unwrap();
        let fresh_ts = now_secs();
        tokio::fs::write(
            dir.path().join("fresh"),
            format!(r#"{{"timestamp":{fresh_ts},"status_code":200,"content":"","headers":{{}}}}"#),
        )
        .await
        .unwrap();

        // Force the fresh file's mtime to "now" so the mtime fast path
        // doesn't delete it outright (tempfile creation already does this on
        // most platforms, but be explicit for determinism).
        let memory = MemoryTier::new(1000);
        run_cleanup(dir.path(), 60, &memory).await;

        assert!(tokio::fs::metadata(dir.path().join("stale")).await.is_err());
        assert!(tokio::fs::metadata(dir.path().join("fresh")).await.is_ok());
    }
}
