//! Cache key construction: `md5(path + "?" + query)` hex digest. Method is
//! implicitly GET — only GET requests are ever admitted (see `cache::mod`).

use md5::{Digest, Md5};

pub fn cache_key(path: &str, query: Option<&str>) -> String {
    let mut hasher = Md5::new();
    hasher.update(path.as_bytes());
    hasher.update(b"?");
    if let Some(q) = query {
        hasher.update(q.as_bytes());
    }
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_path_and_query_yields_same_key() {
        assert_eq!(cache_key("/x.json", Some("a=1")), cache_key("/x.json", Some("a=1")));
    }

    #[test]
    fn different_query_yields_different_key() {
        assert_ne!(cache_key("/x.json", Some("a=1")), cache_key("/x.json", Some("a=2")));
    }

    #[test]
    fn absent_query_is_distinct_from_empty_query() {
        assert_ne!(cache_key("/x.json", None), cache_key("/x.json", Some("")));
    }

    #[test]
    fn key_is_32_hex_chars() {
        let key = cache_key("/a/b/c", Some("q=1"));
        assert_eq!(key.len(), 32);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
