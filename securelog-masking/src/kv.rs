//! `key=value` / `key: value` fragment masking for plain log text.
//!
//! Scans the whole message for key/value shapes (`password=xxx`,
//! `token: abc`, `mobile：13800138000`) and rewrites only the value region,
//! and only when the key hits the sensitive-key set (or one of the implicit
//! password spellings).

use std::sync::Arc;

use regex::Regex;
use securelog_core::ConfigSnapshot;

use crate::collector::SensitiveCollector;
use crate::rules::MaskingRules;

pub struct KeyValuePairsMasker {
    config: Arc<ConfigSnapshot>,
    rules: Arc<MaskingRules>,
    pattern: Regex,
}

impl KeyValuePairsMasker {
    pub fn new(config: Arc<ConfigSnapshot>, rules: Arc<MaskingRules>) -> Self {
        // key, then `:`/`=`/full-width colon, then a quoted or bareword value
        let pattern = Regex::new(
            r#"(?i)\b([A-Za-z_][A-Za-z0-9_]{0,63})\b\s*[:=：]\s*("([^"]*)"|'([^']*)'|([^,，\s}\]\)"']+))"#,
        )
        .expect("key/value pattern");
        Self { config, rules, pattern }
    }

    pub fn mask_key_value_pairs(&self, message: &str, collector: &mut SensitiveCollector) -> String {
        if message.is_empty() {
            return message.to_string();
        }
        let mut out = String::with_capacity(message.len());
        let mut last = 0usize;
        let mut changed = false;
        for caps in self.pattern.captures_iter(message) {
            let key = caps.get(1).map_or("", |m| m.as_str());
            let key_lower = key.to_lowercase();
            if !self.config.is_sensitive_key(&key_lower) && !is_implicit_sensitive_key(&key_lower) {
                continue;
            }
            let value_match = match caps.get(3).or_else(|| caps.get(4)).or_else(|| caps.get(5)) {
                Some(m) => m,
                None => continue,
            };
            let value = value_match.as_str();
            if self.rules.is_empty_like(value) {
                continue;
            }
            let masked = self.rules.mask_by_sensitive_key(&key_lower, value);
            if masked == value {
                continue;
            }
            collector.put(&key_lower, value);
            out.push_str(&message[last..value_match.start()]);
            out.push_str(&masked);
            last = value_match.end();
            changed = true;
        }
        if !changed {
            return message.to_string();
        }
        out.push_str(&message[last..]);
        out
    }
}

fn is_implicit_sensitive_key(key_lower: &str) -> bool {
    key_lower.contains("password") || key_lower == "pwd" || key_lower == "pass"
}
