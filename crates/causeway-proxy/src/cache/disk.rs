//! The on-disk tier: one file per key under `cache_dir`, holding a
//! self-describing JSON blob. Reads are parsed lazily; malformed files are
//! treated as misses. Writes are fire-and-forget from the hot path's point
//! of view — the caller spawns them and moves on.

use std::path::{Path, PathBuf};

use base64::Engine;
use serde::{Deserialize, Serialize};

use super::memory::{now_secs, CacheEntry};

#[derive(Debug, Serialize, Deserialize)]
struct DiskBlob {
    timestamp: u64,
    status_code: u16,
    content: String,
    headers: std::collections::HashMap<String, String>,
}

pub fn entry_path(cache_dir: &Path, key: &str) -> PathBuf {
    cache_dir.join(key)
}

pub async fn write_entry(cache_dir: &Path, key: &str, entry: &CacheEntry) -> Result<(), std::io::Error> {
    tokio::fs::create_dir_all(cache_dir).await?;
    let blob = DiskBlob {
        timestamp: entry.created_at,
        status_code: entry.status_code,
        content: base64::engine::general_purpose::STANDARD.encode(&entry.body),
        headers: entry.headers.clone(),
    };
    let serialized = serde_json::to_vec(&blob)?;
    let path = entry_path(cache_dir, key);
    // Write to a sibling temp file and rename, so a concurrent reader never
    // observes a partially-written blob.
    let tmp_path = path.with_extension("tmp");
    tokio::fs::write(&tmp_path, serialized).await?;
    tokio::fs::rename(&tmp_path, &path).await?;
    Ok(())
}

/// Reads and parses a cached blob. Returns `None` (a miss) on any I/O or
/// parse failure, per §4.E's failure semantics ("any error during read is
/// logged at debug and returns MISS").
pub async fn read_entry(cache_dir: &Path, key: &str) -> Option<CacheEntry> {
    let path = entry_path(cache_dir, key);
    let bytes = tokio::fs::read(&path).await.ok()?;
    let blob: DiskBlob = serde_json::from_slice(&bytes).ok()?;
    let body = base64::engine::general_purpose::STANDARD.decode(&blob.content).ok()?;
    Some(CacheEntry {
        status_code: blob.status_code,
        headers: blob.headers,
        body: body.into(),
        created_at: blob.timestamp,
    })
}

/// Reads only the first `prefix_len` bytes of a file and attempts to pull a
/// `"timestamp":<number>` field out of it without a full JSON parse. Used by
/// cleanup's fast path when the mtime check is inconclusive.
pub async fn read_timestamp_prefix(path: &Path, prefix_len: usize) -> Option<u64> {
    use tokio::io::AsyncReadExt;
    let mut file = tokio::fs::File::open(path).await.ok()?;
    let mut buf = vec![0u8; prefix_len];
    let n = file.read(&mut buf).await.ok()?;
    buf.truncate(n);
    let text = String::from_utf8_lossy(&buf);
    parse_timestamp_field(&text)
}

fn parse_timestamp_field(text: &str) -> Option<u64> {
    let marker = "\"timestamp\":";
    let start = text.find(marker)? + marker.len();
    let rest = &text[start..];
    let end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
    rest[..end].parse::<u64>().ok()
}

pub fn is_stale_by_mtime(mtime_secs: u64, ttl_secs: u64) -> bool {
    let now = now_secs();
    (mtime_secs as f64 + ttl_secs as f64 * 1.1) < now as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[tokio::test]
    async fn write_then_read_roundtrips() {
        let dir = tempdir().unwrap();
        let entry = CacheEntry::new(200, HashMap::from([("x".into(), "y".into())]), bytes::Bytes::from("hello"));
        write_entry(dir.path(), "k1", &entry).await.unwrap();
        let read = read_entry(dir.path(), "k1").await.unwrap();
        assert_eq!(read.status_code, 200);
        assert_eq!(read.body, bytes::Bytes::from("hello"));
        assert_eq!(read.headers.get("x"), Some(&"y".to_string()));
    }

    #[tokio::test]
    async fn missing_file_is_a_miss() {
        let dir = tempdir().unwrap();
        assert!(read_entry(dir.path(), "nope").await.is_none());
    }

    #[tokio::test]
    async fn malformed_file_is_a_miss() {
        let dir = tempdir().unwrap();
        tokio::fs::write(dir.path().join("bad"), b"not json").await.unwrap();
        assert!(read_entry(dir.path(), "bad").await.is_none());
    }

    #[test]
    fn parses_timestamp_field_from_prefix() {
        let text = r#"{"timestamp":1700000000,"status_code":200"#;
        assert_eq!(parse_timestamp_field(text), Some(1700000000));
    }

    #[test]
    fn missing_timestamp_field_parses_to_none() {
        assert_eq!(parse_timestamp_field(r#"{"status_code":200"#), None);
    }

    #[test]
    fn mtime_plus_buffer_governs_staleness() {
        let now = now_secs();
        assert!(is_stale_by_mtime(now.saturating_sub(1000), 10));
        assert!(!is_stale_by_mtime(now, 3600));
    }
}
