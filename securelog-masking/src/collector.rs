//! Sensitive-value collector.
//!
//! Records the original values removed during masking, keyed by their
//! path-qualified field names, in insertion order. The envelope builder
//! serializes the snapshot into the SECURE_DATA payload.

use std::collections::HashSet;

/// Insertion-ordered `(path_key, original_value)` accumulator.
///
/// Keys are normalized (lowercased, quotes/backticks dropped, whitespace
/// stripped); duplicate keys get a numeric suffix (`key1`, `key2`, ...) so
/// no original is ever overwritten.
#[derive(Debug, Default)]
pub struct SensitiveCollector {
    pairs: Vec<(String, String)>,
    seen: HashSet<String>,
}

impl SensitiveCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: &str, value: &str) {
        let normalized = normalize_key(key);
        if normalized.is_empty() {
            return;
        }
        if self.seen.insert(normalized.clone()) {
            self.pairs.push((normalized, value.to_string()));
            return;
        }
        let mut idx = 1usize;
        loop {
            let candidate = format!("{normalized}{idx}");
            if self.seen.insert(candidate.clone()) {
                self.pairs.push((candidate, value.to_string()));
                return;
            }
            idx += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    pub fn into_pairs(self) -> Vec<(String, String)> {
        self.pairs
    }
}

fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| !c.is_whitespace() && *c != '"' && *c != '`')
        .collect::<String>()
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insertion_order_preserved() {
        let mut c = SensitiveCollector::new();
        c.put("b", "2");
        c.put("a", "1");
        c.put("c", "3");
        let keys: Vec<&str> = c.pairs().iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["b", "a", "c"]);
    }

    #[test]
    fn test_duplicate_keys_get_suffix() {
        let mut c = SensitiveCollector::new();
        c.put("mobile", "111");
        c.put("mobile", "222");
        c.put("mobile", "333");
        let keys: Vec<&str> = c.pairs().iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["mobile", "mobile1", "mobile2"]);
        assert_eq!(c.pairs()[1].1, "222");
    }

    #[test]
    fn test_key_normalization() {
        let mut c = SensitiveCollector::new();
        c.put("  User \"Name\" ", "x");
        assert_eq!(c.pairs()[0].0, "username");
    }

    #[test]
    fn test_blank_key_ignored() {
        let mut c = SensitiveCollector::new();
        c.put("   ", "x");
        c.put("\"`\"", "y");
        assert!(c.is_empty());
    }

    #[test]
    fn test_suffix_collision_with_explicit_key() {
        let mut c = SensitiveCollector::new();
        c.put("k", "a");
        c.put("k1", "b");
        c.put("k", "c");
        let keys: Vec<&str> = c.pairs().iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["k", "k1", "k2"]);
    }
}
