//! Masking rules: value-shape recognizers and redaction formatters.
//!
//! Recognizers:
//! - Chinese resident id card (18 digits with date ranges and check digit)
//! - mobile / landline numbers (optional `+86` prefix)
//! - email (RFC-lite)
//! - strict address (two-stage region/detail keyword gate with exclusions)
//! - high-entropy token (only consulted under token-like keys)
//!
//! Formatters keep a recognizable prefix/suffix and star out the middle.
//! Every formatter is a fixpoint on its own output, so re-masking an
//! already-masked message never extracts new values.

use std::sync::Arc;

use regex::Regex;
use securelog_core::ConfigSnapshot;

pub struct MaskingRules {
    config: Arc<ConfigSnapshot>,
    id_card_re: Regex,
    mobile_re: Regex,
    email_re: Regex,
    address_region_re: Option<Regex>,
    address_detail_re: Option<Regex>,
    address_exclude_re: Option<Regex>,
}

impl MaskingRules {
    pub fn new(config: Arc<ConfigSnapshot>) -> Self {
        let address_region_re = build_region_pattern(&config.address_region_keywords);
        let address_detail_re = build_keyword_pattern(&config.address_detail_keywords);
        let address_exclude_re = build_keyword_pattern(&config.address_exclude_keywords);
        Self {
            config,
            id_card_re: Regex::new(
                r"^[1-9]\d{5}(?:19|20)\d{2}(?:0[1-9]|1[0-2])(?:0[1-9]|[12]\d|3[01])\d{3}[0-9Xx]$",
            )
            .expect("id card pattern"),
            mobile_re: Regex::new(r"^(?:\+?86[-\s]?)?1\d{10}$").expect("mobile pattern"),
            email_re: Regex::new(r"(?i)^[A-Z0-9._%+-]{1,64}@[A-Z0-9.-]{1,255}\.[A-Z]{2,}$")
                .expect("email pattern"),
            address_region_re,
            address_detail_re,
            address_exclude_re,
        }
    }

    pub fn config(&self) -> &ConfigSnapshot {
        &self.config
    }

    /// Values that carry no data: empty, whitespace-only, or the literal
    /// `null` in any case. These are never masked and never collected.
    pub fn is_empty_like(&self, value: &str) -> bool {
        let v = value.trim();
        v.is_empty() || v.eq_ignore_ascii_case("null")
    }

    // ── Recognizers ─────────────────────────────────────────────────────────

    pub fn is_id_card(&self, value: &str) -> bool {
        self.recognizable(value)
            .map(|v| self.id_card_re.is_match(v))
            .unwrap_or(false)
    }

    pub fn is_phone_or_tel(&self, value: &str) -> bool {
        self.recognizable(value)
            .map(|v| self.mobile_re.is_match(v))
            .unwrap_or(false)
    }

    pub fn is_email(&self, value: &str) -> bool {
        self.recognizable(value)
            .map(|v| self.email_re.is_match(v))
            .unwrap_or(false)
    }

    pub fn is_strict_address(&self, value: &str) -> bool {
        let v = match self.recognizable(value) {
            Some(v) => v,
            None => return false,
        };
        if let Some(exclude) = &self.address_exclude_re {
            if exclude.is_match(v) {
                return false;
            }
        }
        let region_ok = !self.config.address_require_region
            || self.address_region_re.as_ref().map_or(false, |re| re.is_match(v));
        let detail_ok = !self.config.address_require_detail
            || self.address_detail_re.as_ref().map_or(false, |re| re.is_match(v));
        region_ok && detail_ok
    }

    /// High-entropy token check. Only meaningful when the surrounding key is
    /// token-like; the structural rejections (URLs, UUIDs, hex digests,
    /// user-agent fragments) keep the false-positive rate down.
    pub fn looks_like_high_entropy_token(&self, value: &str) -> bool {
        if !self.config.high_entropy_enabled {
            return false;
        }
        let t = value.trim();
        let len = t.chars().count();
        if len < self.config.high_entropy_min_length || len > self.config.max_value_length {
            return false;
        }
        if t.eq_ignore_ascii_case("null") {
            return false;
        }
        if t.contains("://") {
            return false;
        }
        if t.starts_with("data:image") || t.contains("base64") {
            return false;
        }
        if looks_like_uuid(t) || looks_like_hex(t) || looks_like_user_agent_segment(t) {
            return false;
        }
        if self.config.high_entropy_require_upper_lower_digit && !has_upper_lower_digit(t) {
            return false;
        }
        shannon_entropy(t) >= self.config.high_entropy_threshold
    }

    fn recognizable<'v>(&self, value: &'v str) -> Option<&'v str> {
        let v = value.trim();
        if v.is_empty() || v.chars().count() > self.config.max_value_length {
            return None;
        }
        if v.eq_ignore_ascii_case("null") {
            return None;
        }
        Some(v)
    }

    // ── Formatters ──────────────────────────────────────────────────────────

    pub fn mask_id_card(&self, id_card: &str) -> String {
        let v: Vec<char> = id_card.trim().chars().collect();
        if v.len() < 10 {
            return "***".into();
        }
        let prefix: String = v[..6].iter().collect();
        let suffix: String = v[v.len() - 4..].iter().collect();
        format!("{prefix}********{suffix}")
    }

    pub fn mask_phone(&self, phone: &str) -> String {
        let p = phone.trim();
        let chars: Vec<char> = p.chars().collect();
        if chars.len() < 7 {
            return "***".into();
        }
        let digits: String = p.chars().filter(char::is_ascii_digit).collect();
        if digits.len() < 7 {
            return "***".into();
        }
        if digits.len() >= 11 && digits.starts_with('1') {
            return format!("{}****{}", &digits[..3], &digits[digits.len() - 4..]);
        }
        if digits.len() >= 10 && digits.starts_with('0') {
            return format!("{}****{}", &digits[..3], &digits[digits.len() - 4..]);
        }
        let prefix: String = chars[..2].iter().collect();
        let suffix: String = chars[chars.len() - 2..].iter().collect();
        format!("{prefix}***{suffix}")
    }

    pub fn mask_email(&self, email: &str) -> String {
        let e = email.trim();
        let at = match e.find('@') {
            Some(i) if i > 0 && i + 1 < e.len() => i,
            _ => return "***".into(),
        };
        let local: Vec<char> = e[..at].chars().collect();
        let domain = &e[at..];
        let first = local[0];
        if local.len() <= 2 {
            return format!("{first}***{domain}");
        }
        format!("{first}***{}{domain}", local[local.len() - 1])
    }

    pub fn mask_address(&self, address: &str) -> String {
        let a: Vec<char> = address.trim().chars().collect();
        if a.len() <= 4 {
            return "***".into();
        }
        let prefix: String = a[..2].iter().collect();
        let suffix: String = a[a.len() - 2..].iter().collect();
        format!("{prefix}***{suffix}")
    }

    pub fn mask_password(&self, _password: &str) -> String {
        "***".into()
    }

    pub fn mask_token(&self, token: &str) -> String {
        let t: Vec<char> = token.trim().chars().collect();
        if t.is_empty() || t.len() <= self.config.token_keep_prefix + self.config.token_keep_suffix {
            return "***".into();
        }
        let prefix: String = t[..self.config.token_keep_prefix].iter().collect();
        let suffix: String = t[t.len() - self.config.token_keep_suffix..].iter().collect();
        format!("{prefix}***{suffix}")
    }

    // ── Key-family routing ──────────────────────────────────────────────────

    /// Redact a value whose (lowercased) key hit the sensitive-key set.
    /// Phone and address families only rewrite when the value actually has
    /// that shape; the other families always rewrite.
    pub fn mask_by_sensitive_key(&self, key_lower: &str, value: &str) -> String {
        if key_lower.contains("password") || key_lower == "pwd" || key_lower == "pass" {
            return self.mask_password(value);
        }
        if key_lower.contains("token")
            || key_lower.contains("secret")
            || key_lower.contains("apikey")
            || key_lower.contains("clientsecret")
            || key_lower == "key"
        {
            return self.mask_token(value);
        }
        if key_lower.contains("idcard") || key_lower.contains("cardnumber") {
            return self.mask_id_card(value);
        }
        if key_lower.contains("mobile") || key_lower.contains("phone") || key_lower.contains("tel") {
            if self.is_phone_or_tel(value) {
                return self.mask_phone(value);
            }
            return value.to_string();
        }
        if key_lower.contains("email") {
            return self.mask_email(value);
        }
        if key_lower.contains("address") {
            if self.is_strict_address(value) {
                return self.mask_address(value);
            }
            return value.to_string();
        }
        "***".into()
    }

    /// First matching value-shape mask: id card, then phone, then email,
    /// then strict address.
    pub fn mask_by_value_shape(&self, value: &str) -> Option<String> {
        if self.is_id_card(value) {
            return Some(self.mask_id_card(value));
        }
        if self.is_phone_or_tel(value) {
            return Some(self.mask_phone(value));
        }
        if self.is_email(value) {
            return Some(self.mask_email(value));
        }
        if self.is_strict_address(value) {
            return Some(self.mask_address(value));
        }
        None
    }
}

fn has_upper_lower_digit(s: &str) -> bool {
    let mut upper = false;
    let mut lower = false;
    let mut digit = false;
    for c in s.chars() {
        if c.is_ascii_uppercase() {
            upper = true;
        } else if c.is_ascii_lowercase() {
            lower = true;
        } else if c.is_ascii_digit() {
            digit = true;
        }
    }
    upper && lower && digit
}

fn looks_like_hex(s: &str) -> bool {
    let len = s.chars().count();
    if !(len == 32 || len == 40 || len == 64) {
        return false;
    }
    s.chars().all(|c| c.is_ascii_digit() || matches!(c, 'a'..='f' | 'A'..='F'))
}

fn looks_like_uuid(s: &str) -> bool {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() != 36 {
        return false;
    }
    for (i, c) in chars.iter().enumerate() {
        if i == 8 || i == 13 || i == 18 || i == 23 {
            if *c != '-' {
                return false;
            }
        } else if !c.is_ascii_hexdigit() {
            return false;
        }
    }
    true
}

/// `Name/1.2.3` fragments common in user-agent strings.
fn looks_like_user_agent_segment(s: &str) -> bool {
    let slash = match s.find('/') {
        Some(i) if i > 0 && i + 1 < s.len() => i,
        _ => return false,
    };
    let (left, right) = (&s[..slash], &s[slash + 1..]);
    if !left.chars().all(char::is_alphabetic) {
        return false;
    }
    let mut has_digit = false;
    for c in right.chars() {
        if c.is_ascii_digit() {
            has_digit = true;
        } else if c != '.' && c != '_' {
            return false;
        }
    }
    has_digit
}

/// Shannon entropy in bits over the character distribution. ASCII chars are
/// counted individually; everything else shares one bucket.
fn shannon_entropy(s: &str) -> f64 {
    let mut counts = [0u32; 128];
    let mut other = 0u32;
    let mut len = 0u32;
    for c in s.chars() {
        len += 1;
        let cp = c as u32;
        if cp < 128 {
            counts[cp as usize] += 1;
        } else {
            other += 1;
        }
    }
    if len == 0 {
        return 0.0;
    }
    let len = f64::from(len);
    let mut ent = 0.0f64;
    for &count in counts.iter().chain(std::iter::once(&other)) {
        if count == 0 {
            continue;
        }
        let p = f64::from(count) / len;
        ent -= p * p.log2();
    }
    ent
}

fn build_region_pattern(keywords: &[String]) -> Option<Regex> {
    let alt = keyword_alternation(keywords)?;
    Regex::new(&format!(r"[\x{{4e00}}-\x{{9fa5}}]{{2,}}(?:{alt})")).ok()
}

fn build_keyword_pattern(keywords: &[String]) -> Option<Regex> {
    let alt = keyword_alternation(keywords)?;
    Regex::new(&format!("(?:{alt})")).ok()
}

fn keyword_alternation(keywords: &[String]) -> Option<String> {
    let parts: Vec<String> = keywords
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .map(regex::escape)
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("|"))
    }
}
