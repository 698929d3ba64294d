//! Query-string masking.
//!
//! Handles two shapes:
//! - the whole message is a query string (`a=b&c=d`)
//! - a URL query embedded in surrounding text (`GET /path?a=b&c=d HTTP/1.1`)
//!
//! Per pair, the key is checked first (sensitive key → key-family mask,
//! token-like key → high-entropy mask), then the value shape. When a
//! sensitive key's value was split by literal `&` characters, the fragments
//! without `=` are absorbed into the value and replaced by `***` markers.

use std::sync::Arc;

use securelog_core::ConfigSnapshot;

use crate::collector::SensitiveCollector;
use crate::rules::MaskingRules;

pub struct QueryStringMasker {
    config: Arc<ConfigSnapshot>,
    rules: Arc<MaskingRules>,
}

struct MaskedValue {
    masked: String,
    changed: bool,
}

impl QueryStringMasker {
    pub fn new(config: Arc<ConfigSnapshot>, rules: Arc<MaskingRules>) -> Self {
        Self { config, rules }
    }

    /// A string is treated as a query string when masking is enabled, it has
    /// `=` past position 0, and it either contains `&` or carries no JSON
    /// markers (`{`, `:`).
    pub fn looks_like_query_string(&self, s: &str) -> bool {
        if !self.config.query_string_enabled {
            return false;
        }
        match s.find('=') {
            None | Some(0) => return false,
            Some(_) => {}
        }
        if s.contains('&') {
            return true;
        }
        !s.contains('{') && !s.contains(':')
    }

    /// Mask each `k=v` pair of a query string in place. Pairs without `=`
    /// stay verbatim unless absorbed as a sensitive value continuation.
    pub fn mask_query_string(
        &self,
        query_string: &str,
        key_prefix: &str,
        collector: &mut SensitiveCollector,
    ) -> String {
        if query_string.is_empty() || !self.looks_like_query_string(query_string) {
            return query_string.to_string();
        }
        let parts: Vec<&str> = query_string.split('&').collect();
        let mut masked: Vec<String> = Vec::with_capacity(parts.len());
        let mut i = 0;
        while i < parts.len() {
            let part = parts[i];
            let eq = match part.find('=') {
                Some(e) if e > 0 => e,
                _ => {
                    masked.push(part.to_string());
                    i += 1;
                    continue;
                }
            };
            let k = &part[..eq];
            let v = &part[eq + 1..];
            let full_key = if key_prefix.is_empty() {
                k.to_string()
            } else {
                format!("{key_prefix}.{k}")
            };

            let key_lower = k.to_lowercase();
            let sensitive_context = self.config.is_sensitive_key(&key_lower)
                || self.config.is_token_like_key(&key_lower)
                || key_lower.contains("password")
                || key_lower == "pwd"
                || key_lower == "pass";

            // Absorb `&`-split fragments of a sensitive value.
            let mut j = i + 1;
            let mut continuation: Vec<&str> = Vec::new();
            if sensitive_context {
                while j < parts.len()
                    && !parts[j].is_empty()
                    && !matches!(parts[j].find('='), Some(e) if e > 0)
                {
                    continuation.push(parts[j]);
                    j += 1;
                }
            }

            let original_value = if continuation.is_empty() {
                v.to_string()
            } else {
                format!("{v}&{}", continuation.join("&"))
            };

            let mv = self.mask_value_by_key_and_shape(&full_key, &key_lower, &original_value, collector);
            masked.push(format!("{k}={}", mv.masked));

            if !continuation.is_empty() && mv.changed {
                for _ in &continuation {
                    masked.push("***".to_string());
                }
                i = j;
                continue;
            }
            i += 1;
        }
        masked.join("&")
    }

    /// Locate `?query` inside free text (bounded by whitespace or `#`),
    /// mask it, and splice the result back.
    pub fn mask_url_query_in_text(
        &self,
        message: &str,
        key_prefix: &str,
        collector: &mut SensitiveCollector,
    ) -> String {
        let q = match message.find('?') {
            Some(q) if q + 1 < message.len() => q,
            _ => return message.to_string(),
        };
        let end = find_query_end(message, q + 1);
        if end <= q + 1 {
            return message.to_string();
        }
        let query = &message[q + 1..end];
        if !self.looks_like_query_string(query) {
            return message.to_string();
        }
        let masked_query = self.mask_query_string(query, key_prefix, collector);
        if masked_query == query {
            return message.to_string();
        }
        format!("{}{}{}", &message[..q + 1], masked_query, &message[end..])
    }

    fn mask_value_by_key_and_shape(
        &self,
        full_key: &str,
        key_lower: &str,
        value: &str,
        collector: &mut SensitiveCollector,
    ) -> MaskedValue {
        if self.rules.is_empty_like(value) {
            return MaskedValue { masked: value.to_string(), changed: false };
        }

        if self.config.is_sensitive_key(key_lower) {
            let masked = self.rules.mask_by_sensitive_key(key_lower, value);
            let changed = masked != value;
            if changed {
                collector.put(full_key, value);
            }
            return MaskedValue { masked, changed };
        }

        if self.config.is_token_like_key(key_lower) && self.rules.looks_like_high_entropy_token(value) {
            collector.put(full_key, value);
            return MaskedValue { masked: self.rules.mask_token(value), changed: true };
        }

        if let Some(masked) = self.rules.mask_by_value_shape(value) {
            collector.put(full_key, value);
            return MaskedValue { masked, changed: true };
        }

        MaskedValue { masked: value.to_string(), changed: false }
    }
}

fn find_query_end(s: &str, start: usize) -> usize {
    let end = s[start..].find('#').map_or(s.len(), |i| start + i);
    for (i, c) in s[start..end].char_indices() {
        if c.is_whitespace() {
            return start + i;
        }
    }
    end
}

#[cfg(test)]
mod tests {
    use super::*;

    fn masker() -> QueryStringMasker {
        let config = ConfigSnapshot::defaults();
        let rules = Arc::new(MaskingRules::new(config.clone()));
        QueryStringMasker::new(config, rules)
    }

    #[test]
    fn test_bare_query_string() {
        let m = masker();
        let mut c = SensitiveCollector::new();
        let out = m.mask_query_string("password=123456&token=abcDEF1234567890XYZ&type=1", "", &mut c);
        assert_eq!(out, "password=***&token=abcD***0XYZ&type=1");
        let pairs = c.pairs();
        assert_eq!(pairs[0], ("password".into(), "123456".into()));
        assert_eq!(pairs[1], ("token".into(), "abcDEF1234567890XYZ".into()));
    }

    #[test]
    fn test_value_shape_detection_in_pairs() {
        let m = masker();
        let mut c = SensitiveCollector::new();
        let out = m.mask_query_string("user=13800138000&lang=zh", "", &mut c);
        assert_eq!(out, "user=138****8000&lang=zh");
        assert_eq!(c.pairs()[0], ("user".into(), "13800138000".into()));
    }

    #[test]
    fn test_url_embedded_query() {
        let m = masker();
        let mut c = SensitiveCollector::new();
        let out = m.mask_url_query_in_text(
            "GET /v1/users?idcard=11010119900101001X&lang=zh HTTP/1.1",
            "query",
            &mut c,
        );
        assert_eq!(out, "GET /v1/users?idcard=110101********001X&lang=zh HTTP/1.1");
        assert_eq!(c.pairs()[0].0, "query.idcard");
    }

    #[test]
    fn test_url_query_stops_at_fragment() {
        let m = masker();
        let mut c = SensitiveCollector::new();
        let out = m.mask_url_query_in_text("/p?password=x1&a=1#password=x2", "query", &mut c);
        assert_eq!(out, "/p?password=***&a=1#password=x2");
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn test_sensitive_continuation_absorbed() {
        let m = masker();
        let mut c = SensitiveCollector::new();
        let out = m.mask_query_string("password=ab&cd&type=1", "", &mut c);
        assert_eq!(out, "password=***&***&type=1");
        assert_eq!(c.pairs()[0], ("password".into(), "ab&cd".into()));
    }

    #[test]
    fn test_empty_like_values_ignored() {
        let m = masker();
        let mut c = SensitiveCollector::new();
        let out = m.mask_query_string("password=null&token=&a=1", "", &mut c);
        assert_eq!(out, "password=null&token=&a=1");
        assert!(c.is_empty());
    }

    #[test]
    fn test_json_like_text_is_not_a_query_string() {
        let m = masker();
        assert!(!m.looks_like_query_string(r#"{"a"="b"}"#));
        assert!(!m.looks_like_query_string("key: value = other"));
        assert!(m.looks_like_query_string("a=b"));
        assert!(m.looks_like_query_string("a=b&c:d"));
    }

    #[test]
    fn test_masked_output_is_stable() {
        let m = masker();
        let mut c1 = SensitiveCollector::new();
        let once = m.mask_query_string("password=123456&token=abcDEF1234567890XYZ&type=1", "", &mut c1);
        let mut c2 = SensitiveCollector::new();
        let twice = m.mask_query_string(&once, "", &mut c2);
        assert_eq!(once, twice);
        assert!(c2.is_empty());
    }
}
