//! SQL `Parameters:` line masking (MyBatis-style parameter dumps).
//!
//! Only `(String)`-typed entries are rewritten; every other type passes
//! through untouched. Values that already carry mask characters are left
//! alone so reprocessing a masked line never extracts anything.

use std::sync::Arc;

use crate::collector::SensitiveCollector;
use crate::rules::MaskingRules;

const PARAMETERS_MARKER: &str = "Parameters:";

pub struct SqlParametersMasker {
    rules: Arc<MaskingRules>,
}

impl SqlParametersMasker {
    pub fn new(rules: Arc<MaskingRules>) -> Self {
        Self { rules }
    }

    /// Rewrite the parameter list that follows a case-insensitive
    /// `Parameters:` marker. Returns the message unchanged when the marker
    /// is absent or the tail holds nothing maskable.
    pub fn mask_sql_parameters_line(&self, message: &str, collector: &mut SensitiveCollector) -> String {
        if message.is_empty() {
            return message.to_string();
        }
        let idx = match find_ignore_ascii_case(message, PARAMETERS_MARKER) {
            Some(i) => i,
            None => return message.to_string(),
        };
        let start = idx + PARAMETERS_MARKER.len();
        if start >= message.len() {
            return message.to_string();
        }

        let prefix = &message[..start];
        let parts = split_parameters_list(&message[start..]);
        if parts.is_empty() {
            return message.to_string();
        }

        let mut masked_parts: Vec<String> = Vec::with_capacity(parts.len());
        for (i, part) in parts.iter().enumerate() {
            let part = part.trim();
            let lpar = part.rfind('(');
            let rpar = if part.ends_with(')') { Some(part.len() - 1) } else { None };
            match (lpar, rpar) {
                (Some(l), Some(r)) if l > 0 && r > l => {
                    let value = part[..l].trim();
                    let type_name = part[l + 1..r].trim();
                    if type_name.eq_ignore_ascii_case("String") {
                        let path_key = format!("sqlParameters[{i}]");
                        let masked = self.mask_sql_string_value(value, &path_key, collector);
                        masked_parts.push(format!("{masked}({type_name})"));
                    } else {
                        masked_parts.push(part.to_string());
                    }
                }
                _ => masked_parts.push(part.to_string()),
            }
        }

        format!("{prefix} {}", masked_parts.join(", "))
    }

    fn mask_sql_string_value(
        &self,
        value: &str,
        path_key: &str,
        collector: &mut SensitiveCollector,
    ) -> String {
        if value.is_empty() || self.rules.is_empty_like(value) {
            return value.to_string();
        }
        // Already-redacted values (from an earlier pass through the pipeline)
        // must not be re-collected.
        if value.contains('*') {
            return value.to_string();
        }
        collector.put(path_key, value);
        self.rules
            .mask_by_value_shape(value)
            .unwrap_or_else(|| "***".to_string())
    }
}

fn find_ignore_ascii_case(haystack: &str, needle: &str) -> Option<usize> {
    let h = haystack.as_bytes();
    let n = needle.as_bytes();
    if n.is_empty() || h.len() < n.len() {
        return None;
    }
    (0..=h.len() - n.len()).find(|&i| h[i..i + n.len()].eq_ignore_ascii_case(n))
}

/// Split on top-level commas only; commas inside parentheses (e.g. inside
/// a type name) do not split.
fn split_parameters_list(s: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut buf = String::with_capacity(s.len());
    let mut paren_depth = 0u32;
    for ch in s.chars() {
        match ch {
            '(' => {
                paren_depth += 1;
                buf.push(ch);
            }
            ')' => {
                paren_depth = paren_depth.saturating_sub(1);
                buf.push(ch);
            }
            ',' if paren_depth == 0 => {
                let part = buf.trim();
                if !part.is_empty() {
                    parts.push(part.to_string());
                }
                buf.clear();
            }
            _ => buf.push(ch),
        }
    }
    let tail = buf.trim();
    if !tail.is_empty() {
        parts.push(tail.to_string());
    }
    parts
}
