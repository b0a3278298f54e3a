//! Ant-style glob path matcher.
//!
//! Supports `?` (one non-`/` character), `*` (zero or more characters within a
//! segment), `**` (zero or more complete segments), and `{name}` (a named
//! one-segment capture, equivalent to `*` for matching purposes). Patterns are
//! compiled once, at config load, into a `CompiledMatcher` backed by a single
//! anchored regex plus the ordered list of named captures.

use std::collections::HashMap;

use regex::Regex;

#[derive(Debug, Clone)]
pub struct CompiledMatcher {
    regex: Regex,
    names: Vec<String>,
    pattern: String,
}

impl CompiledMatcher {
    pub fn compile(pattern: &str) -> Result<Self, regex::Error> {
        let (regex_src, names) = translate(pattern);
        let regex = Regex::new(&regex_src)?;
        Ok(Self { regex, names, pattern: pattern.to_string() })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// Returns the name -> captured segment map for a match, or `None` if the
    /// pattern does not match `path`.
    pub fn extract(&self, path: &str) -> Option<HashMap<String, String>> {
        let caps = self.regex.captures(path)?;
        let mut out = HashMap::with_capacity(self.names.len());
        for name in &self.names {
            if let Some(m) = caps.name(name) {
                out.insert(name.clone(), m.as_str().to_string());
            }
        }
        Some(out)
    }
}

/// Normalizes a request path the way the routing selector does before
/// matching: append a trailing `/` if absent.
pub fn normalize(path: &str) -> String {
    if path.ends_with('/') {
        path.to_string()
    } else {
        format!("{path}/")
    }
}

fn translate(pattern: &str) -> (String, Vec<String>) {
    let mut out = String::from("^");
    let mut names = Vec::new();
    let chars: Vec<char> = pattern.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' if chars.get(i + 1) == Some(&'*') => {
                out.push_str(".*");
                i += 2;
            }
            '*' => {
                out.push_str("[^/]*");
                i += 1;
            }
            '?' => {
                out.push_str("[^/]");
                i += 1;
            }
            '{' => {
                if let Some(end) = chars[i..].iter().position(|c| *c == '}') {
                    let name: String = chars[i + 1..i + end].iter().collect();
                    let safe_name = sanitize_group_name(&name);
                    out.push_str(&format!("(?P<{safe_name}>[^/]*)"));
                    names.push(safe_name);
                    i += end + 1;
                } else {
                    out.push_str(&regex::escape("{"));
                    i += 1;
                }
            }
            c => {
                out.push_str(&regex::escape(&c.to_string()));
                i += 1;
            }
        }
    }
    out.push('$');
    (out, names)
}

/// Regex named groups must be `[A-Za-z_][A-Za-z0-9_]*`; Ant templates are
/// usually already identifiers, but we sanitize defensively rather than fail
/// config load over a stray character in a capture name.
fn sanitize_group_name(name: &str) -> String {
    let mut safe: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if safe.is_empty() || safe.chars().next().map(|c| c.is_ascii_digit()).unwrap_or(false) {
        safe.insert(0, '_');
    }
    safe
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_star_matches_root_and_nested() {
        let m = CompiledMatcher::compile("**/*").unwrap();
        assert!(m.is_match("/"));
        assert!(m.is_match("/a/"));
        assert!(m.is_match("/a/b/"));
    }

    #[test]
    fn question_mark_does_not_cross_slash() {
        let m = CompiledMatcher::compile("/a?c/").unwrap();
        assert!(m.is_match("/abc/"));
        assert!(!m.is_match("/a/c/"));
    }

    #[test]
    fn named_capture_extracts_one_segment() {
        let m = CompiledMatcher::compile("/users/{id}/").unwrap();
        assert!(m.is_match("/users/42/"));
        let caps = m.extract("/users/42/").unwrap();
        assert_eq!(caps.get("id"), Some(&"42".to_string()));
        assert!(!m.is_match("/users/42/extra/"));
    }

    #[test]
    fn literal_dot_is_escaped() {
        let m = CompiledMatcher::compile("/x.json").unwrap();
        assert!(m.is_match("/x.json"));
        assert!(!m.is_match("/xajson"));
    }

    #[test]
    fn normalize_appends_trailing_slash() {
        assert_eq!(normalize("/a"), "/a/");
        assert_eq!(normalize("/a/"), "/a/");
    }
}
