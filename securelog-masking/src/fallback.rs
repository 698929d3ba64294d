//! Plain-text fallback masking.
//!
//! Last resort when no structured shape matched: scan the raw text with
//! four disjoint patterns (id card, mobile, email, address candidate) and
//! rewrite each literal hit. Address candidates still have to pass the
//! strict two-stage region/detail gate before they are touched. No bare
//! high-entropy scanning happens here.

use std::sync::Arc;

use regex::Regex;
use securelog_core::ConfigSnapshot;

use crate::collector::SensitiveCollector;
use crate::rules::MaskingRules;

pub struct PlainTextFallbackMasker {
    config: Arc<ConfigSnapshot>,
    rules: Arc<MaskingRules>,
    id_card_find: Regex,
    mobile_find: Regex,
    email_find: Regex,
    address_find: Option<Regex>,
}

struct Replacement {
    start: usize,
    end: usize,
    text: String,
}

impl PlainTextFallbackMasker {
    pub fn new(config: Arc<ConfigSnapshot>, rules: Arc<MaskingRules>) -> Self {
        let address_find = build_address_candidate(&config.address_region_keywords);
        Self {
            config,
            rules,
            id_card_find: Regex::new(
                r"[1-9]\d{5}(?:19|20)\d{2}(?:0[1-9]|1[0-2])(?:0[1-9]|[12]\d|3[01])\d{3}[0-9Xx]",
            )
            .expect("id card find pattern"),
            mobile_find: Regex::new(r"(?:\+?86[-\s]?)?(1\d{10})").expect("mobile find pattern"),
            email_find: Regex::new(r"(?i)[A-Z0-9._%+-]{1,64}@[A-Z0-9.-]{1,255}\.[A-Z]{2,}")
                .expect("email find pattern"),
            address_find,
        }
    }

    pub fn mask_plain_text(&self, message: &str, collector: &mut SensitiveCollector) -> String {
        if !self.config.fallback_enabled || message.is_empty() {
            return message.to_string();
        }
        let mut reps: Vec<Replacement> = Vec::new();
        self.collect_id_cards(message, collector, &mut reps);
        self.collect_mobiles(message, collector, &mut reps);
        self.collect_emails(message, collector, &mut reps);
        self.collect_addresses(message, collector, &mut reps);
        if reps.is_empty() {
            return message.to_string();
        }
        reps.sort_by(|a, b| b.start.cmp(&a.start));
        let mut out = message.to_string();
        for r in reps {
            out.replace_range(r.start..r.end, &r.text);
        }
        out
    }

    fn collect_id_cards(&self, msg: &str, collector: &mut SensitiveCollector, reps: &mut Vec<Replacement>) {
        for m in self.id_card_find.find_iter(msg) {
            // boundary: no alphanumeric neighbors
            if prev_char(msg, m.start()).map_or(false, |c| c.is_ascii_alphanumeric())
                || next_char(msg, m.end()).map_or(false, |c| c.is_ascii_alphanumeric())
            {
                continue;
            }
            self.accept(msg, "idcard", m.start(), m.end(), collector, reps, |r, v| r.mask_id_card(v));
        }
    }

    fn collect_mobiles(&self, msg: &str, collector: &mut SensitiveCollector, reps: &mut Vec<Replacement>) {
        for caps in self.mobile_find.captures_iter(msg) {
            let whole = caps.get(0).expect("match");
            let number = caps.get(1).expect("mobile group");
            if prev_char(msg, whole.start()).map_or(false, |c| c.is_ascii_digit())
                || next_char(msg, number.end()).map_or(false, |c| c.is_ascii_digit())
            {
                continue;
            }
            self.accept(msg, "mobile", number.start(), number.end(), collector, reps, |r, v| {
                r.mask_phone(v)
            });
        }
    }

    fn collect_emails(&self, msg: &str, collector: &mut SensitiveCollector, reps: &mut Vec<Replacement>) {
        for m in self.email_find.find_iter(msg) {
            // `*` neighbors mean the local part is a mask artifact
            if prev_char(msg, m.start()).map_or(false, is_email_boundary_char)
                || next_char(msg, m.end()).map_or(false, is_email_boundary_char)
            {
                continue;
            }
            self.accept(msg, "email", m.start(), m.end(), collector, reps, |r, v| r.mask_email(v));
        }
    }

    fn collect_addresses(&self, msg: &str, collector: &mut SensitiveCollector, reps: &mut Vec<Replacement>) {
        let re = match &self.address_find {
            Some(re) => re,
            None => return,
        };
        for m in re.find_iter(msg) {
            if !self.rules.is_strict_address(m.as_str()) {
                continue;
            }
            self.accept(msg, "address", m.start(), m.end(), collector, reps, |r, v| r.mask_address(v));
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn accept(
        &self,
        msg: &str,
        key: &str,
        start: usize,
        end: usize,
        collector: &mut SensitiveCollector,
        reps: &mut Vec<Replacement>,
        format: impl Fn(&MaskingRules, &str) -> String,
    ) {
        let value = &msg[start..end];
        if self.rules.is_empty_like(value) {
            return;
        }
        if value.chars().count() > self.config.max_value_length {
            return;
        }
        collector.put(key, value);
        reps.push(Replacement { start, end, text: format(&self.rules, value) });
    }
}

fn prev_char(s: &str, idx: usize) -> Option<char> {
    s[..idx].chars().next_back()
}

fn next_char(s: &str, idx: usize) -> Option<char> {
    s[idx..].chars().next()
}

fn is_email_boundary_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '%' | '+' | '-' | '*')
}

/// Candidate spans around a configured region keyword; the strict gate does
/// the actual accept/reject.
fn build_address_candidate(region_keywords: &[String]) -> Option<Regex> {
    let parts: Vec<String> = region_keywords
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .map(regex::escape)
        .collect();
    if parts.is_empty() {
        return None;
    }
    let alt = parts.join("|");
    Regex::new(&format!(
        r"[\x{{4e00}}-\x{{9fa5}}\d#-]{{2,120}}(?:{alt})[\x{{4e00}}-\x{{9fa5}}\d#-]{{0,120}}"
    ))
    .ok()
}
