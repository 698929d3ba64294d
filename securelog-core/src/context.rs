//! Ambient per-record context (the "mapped diagnostic context").
//!
//! The logging adapter owns the real MDC; this type is the explicit view of
//! it handed to the record processor. The core only ever reads trace-id
//! keys from it and writes the secure-data/fingerprint fields through the
//! processor helpers; it never touches process-global state.

use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct Context {
    entries: HashMap<String, String>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn put(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First non-empty value among `keys`, in the given order.
    pub fn first_non_empty<'a, I>(&self, keys: I) -> Option<&str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        keys.into_iter()
            .filter_map(|k| self.get(k))
            .find(|v| !v.is_empty())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Context {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_non_empty_respects_order() {
        let mut ctx = Context::new();
        ctx.put("traceId", "");
        ctx.put("requestId", "req-9");
        ctx.put("correlationId", "corr-1");
        let keys = ["trace_id", "traceId", "requestId", "correlationId"];
        assert_eq!(ctx.first_non_empty(keys.iter().copied()), Some("req-9"));
    }

    #[test]
    fn test_remove_round_trip() {
        let mut ctx = Context::new();
        ctx.put("SECURE_DATA", "abc");
        assert!(ctx.contains("SECURE_DATA"));
        assert_eq!(ctx.remove("SECURE_DATA").as_deref(), Some("abc"));
        assert!(ctx.is_empty());
    }
}
