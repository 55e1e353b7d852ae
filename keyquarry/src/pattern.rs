//! Glob matching for `ListKeys(pattern)`: `*`, `?` and character classes,
//! via `globset` (no glob crate in the teacher's own stack).

use globset::{Glob, GlobMatcher};

use crate::error::Error;

pub struct KeyPattern {
    matcher: GlobMatcher,
}

impl KeyPattern {
    pub fn compile(pattern: &str) -> Result<Self, Error> {
        let glob = Glob::new(pattern)
            .map_err(|e| Error::InvalidArgument(format!("invalid pattern {pattern:?}: {e}")))?;
        Ok(KeyPattern { matcher: glob.compile_matcher() })
    }

    pub fn matches(&self, key: &str) -> bool {
        self.matcher.is_match(key)
    }
}

/// A key beginning with `prefix` is reserved, hidden from default listings
/// and exempt from pruning.
pub fn is_reserved(key: &str, prefix: &str) -> bool {
    !prefix.is_empty() && key.starts_with(prefix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn star_matches_any_suffix() {
        let p = KeyPattern::compile("user:*").unwrap();
        assert!(p.matches("user:42"));
        assert!(!p.matches("session:42"));
    }

    #[test]
    fn question_mark_matches_single_char() {
        let p = KeyPattern::compile("k?y").unwrap();
        assert!(p.matches("key"));
        assert!(!p.matches("keey"));
    }

    #[test]
    fn reserved_prefix_detection() {
        assert!(is_reserved("keyquarry/snapshot_digest", "keyquarry/"));
        assert!(!is_reserved("user:1", "keyquarry/"));
        assert!(!is_reserved("anything", ""));
    }

    #[test]
    fn rejects_invalid_pattern() {
        assert!(KeyPattern::compile("[").is_err());
    }
}
