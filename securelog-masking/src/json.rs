//! JSON masking via a hand-written token walk.
//!
//! The walker keeps the message bytes untouched except for the quoted
//! string tokens it decides to rewrite, so field order, whitespace and
//! number formatting all survive masking. Parsing and replacement work on
//! byte offsets; replacement values are re-escaped as JSON string literals
//! and applied in descending offset order.
//!
//! Per string leaf the classifier runs: sensitive key → token-like key with
//! high entropy → value shape (id card / phone / email / strict address) →
//! query-string masking → embedded-JSON recursion (depth-limited).

use std::sync::Arc;

use securelog_core::ConfigSnapshot;

use crate::collector::SensitiveCollector;
use crate::query::QueryStringMasker;
use crate::rules::MaskingRules;

const MAX_EMBEDDED_JSON_DEPTH: usize = 2;

pub struct JsonMasker {
    config: Arc<ConfigSnapshot>,
    rules: Arc<MaskingRules>,
    query: Arc<QueryStringMasker>,
}

#[derive(Debug)]
enum JsonError {
    Eof,
    Unexpected(u8),
    UnterminatedString,
    BadEscape,
    TrailingContent,
}

struct Frame {
    name: Option<String>,
    is_array: bool,
    index: i64,
}

impl Frame {
    fn object(name: Option<&str>) -> Self {
        Self { name: name.map(str::to_string), is_array: false, index: -1 }
    }

    fn array(name: Option<&str>) -> Self {
        Self { name: name.map(str::to_string), is_array: true, index: -1 }
    }
}

struct Replacement {
    start: usize,
    end: usize,
    text: String,
}

impl JsonMasker {
    pub fn new(
        config: Arc<ConfigSnapshot>,
        rules: Arc<MaskingRules>,
        query: Arc<QueryStringMasker>,
    ) -> Self {
        Self { config, rules, query }
    }

    /// Walk the message as JSON and mask matching string leaves. Returns
    /// `None` when the message does not parse as a single JSON document, in
    /// which case nothing was collected.
    pub fn try_mask_json(&self, message: &str, collector: &mut SensitiveCollector) -> Option<String> {
        let mut scratch = SensitiveCollector::new();
        match self.mask_internal(message, &mut scratch, "", 0) {
            Ok(masked) => {
                for (k, v) in scratch.pairs() {
                    collector.put(k, v);
                }
                Some(masked)
            }
            Err(_) => None,
        }
    }

    fn mask_internal(
        &self,
        json: &str,
        collector: &mut SensitiveCollector,
        prefix: &str,
        depth: usize,
    ) -> Result<String, JsonError> {
        let mut sc = Scanner::new(json);
        let mut frames: Vec<Frame> = Vec::new();
        let mut reps: Vec<Replacement> = Vec::new();
        self.walk_value(&mut sc, &mut frames, None, prefix, depth, collector, &mut reps)?;
        sc.skip_ws();
        if !sc.at_end() {
            return Err(JsonError::TrailingContent);
        }
        if reps.is_empty() {
            return Ok(json.to_string());
        }
        reps.sort_by(|a, b| b.start.cmp(&a.start));
        let mut out = json.to_string();
        for r in reps {
            out.replace_range(r.start..r.end, &r.text);
        }
        Ok(out)
    }

    #[allow(clippy::too_many_arguments)]
    fn walk_value(
        &self,
        sc: &mut Scanner<'_>,
        frames: &mut Vec<Frame>,
        field: Option<&str>,
        prefix: &str,
        depth: usize,
        collector: &mut SensitiveCollector,
        reps: &mut Vec<Replacement>,
    ) -> Result<(), JsonError> {
        sc.skip_ws();
        match sc.peek().ok_or(JsonError::Eof)? {
            b'{' => {
                sc.advance();
                frames.push(Frame::object(field));
                sc.skip_ws();
                if sc.peek() == Some(b'}') {
                    sc.advance();
                    frames.pop();
                    return Ok(());
                }
                loop {
                    sc.skip_ws();
                    let key = sc.parse_string()?;
                    sc.skip_ws();
                    sc.expect(b':')?;
                    self.walk_value(sc, frames, Some(&key.decoded), prefix, depth, collector, reps)?;
                    sc.skip_ws();
                    match sc.bump() {
                        Some(b',') => continue,
                        Some(b'}') => break,
                        Some(b) => return Err(JsonError::Unexpected(b)),
                        None => return Err(JsonError::Eof),
                    }
                }
                frames.pop();
                Ok(())
            }
            b'[' => {
                sc.advance();
                frames.push(Frame::array(field));
                sc.skip_ws();
                if sc.peek() == Some(b']') {
                    sc.advance();
                    frames.pop();
                    return Ok(());
                }
                loop {
                    if let Some(top) = frames.last_mut() {
                        top.index += 1;
                    }
                    self.walk_value(sc, frames, None, prefix, depth, collector, reps)?;
                    sc.skip_ws();
                    match sc.bump() {
                        Some(b',') => continue,
                        Some(b']') => break,
                        Some(b) => return Err(JsonError::Unexpected(b)),
                        None => return Err(JsonError::Eof),
                    }
                }
                frames.pop();
                Ok(())
            }
            b'"' => {
                let tok = sc.parse_string()?;
                let in_array = frames.last().map_or(false, |f| f.is_array);
                if field.is_some() || in_array {
                    let full_path = build_path(prefix, frames, field);
                    let masked = self.mask_string_value(
                        &full_path,
                        field.unwrap_or(""),
                        &tok.decoded,
                        collector,
                        depth,
                    );
                    if masked != tok.decoded {
                        reps.push(Replacement {
                            start: tok.start,
                            end: tok.end,
                            text: quote_escaped(&masked),
                        });
                    }
                }
                Ok(())
            }
            b't' => sc.parse_literal("true"),
            b'f' => sc.parse_literal("false"),
            b'n' => sc.parse_literal("null"),
            _ => sc.parse_number(),
        }
    }

    fn mask_string_value(
        &self,
        full_path: &str,
        field_name: &str,
        value: &str,
        collector: &mut SensitiveCollector,
        depth: usize,
    ) -> String {
        if self.rules.is_empty_like(value) {
            return value.to_string();
        }
        let key_lower = field_name.to_lowercase();

        if self.config.is_sensitive_key(&key_lower) {
            let masked = self.rules.mask_by_sensitive_key(&key_lower, value);
            if masked != value {
                collector.put(full_path, value);
            }
            return masked;
        }

        if self.config.is_token_like_key(&key_lower) && self.rules.looks_like_high_entropy_token(value) {
            collector.put(full_path, value);
            return self.rules.mask_token(value);
        }

        if let Some(masked) = self.rules.mask_by_value_shape(value) {
            collector.put(full_path, value);
            return masked;
        }

        let mut out = self.query.mask_query_string(value, full_path, collector);

        if depth < MAX_EMBEDDED_JSON_DEPTH {
            let trimmed = out.trim();
            if (trimmed.starts_with('{') && trimmed.ends_with('}'))
                || (trimmed.starts_with('[') && trimmed.ends_with(']'))
            {
                if let Ok(inner) = self.mask_internal(&out, collector, full_path, depth + 1) {
                    out = inner;
                }
            }
        }

        out
    }
}

/// Path like `a.b[2].c`, optionally under a non-empty prefix.
fn build_path(prefix: &str, frames: &[Frame], field: Option<&str>) -> String {
    let mut sb = String::with_capacity(64);
    if !prefix.is_empty() {
        sb.push_str(prefix);
    }
    for f in frames {
        if let Some(name) = &f.name {
            if !name.is_empty() {
                if !sb.is_empty() {
                    sb.push('.');
                }
                sb.push_str(name);
            }
        }
        if f.is_array {
            sb.push('[');
            sb.push_str(&f.index.max(0).to_string());
            sb.push(']');
        }
    }
    if let Some(field) = field {
        if !field.is_empty() {
            if !sb.is_empty() {
                sb.push('.');
            }
            sb.push_str(field);
        }
    }
    sb
}

fn quote_escaped(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 16);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\u{0008}' => out.push_str("\\b"),
            '\u{000C}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

struct StrToken {
    start: usize,
    end: usize,
    decoded: String,
}

struct Scanner<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn expect(&mut self, expected: u8) -> Result<(), JsonError> {
        match self.bump() {
            Some(b) if b == expected => Ok(()),
            Some(b) => Err(JsonError::Unexpected(b)),
            None => Err(JsonError::Eof),
        }
    }

    fn skip_ws(&mut self) {
        while let Some(b) = self.peek() {
            if matches!(b, b' ' | b'\t' | b'\n' | b'\r') {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    /// Parse a quoted string token. Returns the byte span including both
    /// quotes plus the decoded value. Scanning byte-wise is safe because
    /// `"` and `\` never appear in UTF-8 continuation bytes.
    fn parse_string(&mut self) -> Result<StrToken, JsonError> {
        let start = self.pos;
        self.expect(b'"')?;
        let mut decoded = String::new();
        let mut seg_start = self.pos;
        loop {
            match self.peek() {
                None => return Err(JsonError::UnterminatedString),
                Some(b'"') => {
                    decoded.push_str(&self.src[seg_start..self.pos]);
                    self.pos += 1;
                    return Ok(StrToken { start, end: self.pos, decoded });
                }
                Some(b'\\') => {
                    decoded.push_str(&self.src[seg_start..self.pos]);
                    self.pos += 1;
                    let esc = self.bump().ok_or(JsonError::UnterminatedString)?;
                    match esc {
                        b'"' => decoded.push('"'),
                        b'\\' => decoded.push('\\'),
                        b'/' => decoded.push('/'),
                        b'b' => decoded.push('\u{0008}'),
                        b'f' => decoded.push('\u{000C}'),
                        b'n' => decoded.push('\n'),
                        b'r' => decoded.push('\r'),
                        b't' => decoded.push('\t'),
                        b'u' => decoded.push(self.parse_unicode_escape()?),
                        _ => return Err(JsonError::BadEscape),
                    }
                    seg_start = self.pos;
                }
                Some(b) if b < 0x20 => return Err(JsonError::Unexpected(b)),
                Some(_) => self.pos += 1,
            }
        }
    }

    fn parse_unicode_escape(&mut self) -> Result<char, JsonError> {
        let first = self.parse_hex4()?;
        if (0xD800..=0xDBFF).contains(&first) {
            // high surrogate; a low surrogate must follow
            if self.bump() != Some(b'\\') || self.bump() != Some(b'u') {
                return Err(JsonError::BadEscape);
            }
            let second = self.parse_hex4()?;
            if !(0xDC00..=0xDFFF).contains(&second) {
                return Err(JsonError::BadEscape);
            }
            let cp = 0x10000 + ((first - 0xD800) << 10) + (second - 0xDC00);
            return char::from_u32(cp).ok_or(JsonError::BadEscape);
        }
        if (0xDC00..=0xDFFF).contains(&first) {
            return Err(JsonError::BadEscape);
        }
        char::from_u32(first).ok_or(JsonError::BadEscape)
    }

    fn parse_hex4(&mut self) -> Result<u32, JsonError> {
        let mut value = 0u32;
        for _ in 0..4 {
            let b = self.bump().ok_or(JsonError::Eof)?;
            let digit = (b as char).to_digit(16).ok_or(JsonError::BadEscape)?;
            value = value * 16 + digit;
        }
        Ok(value)
    }

    fn parse_literal(&mut self, lit: &str) -> Result<(), JsonError> {
        if self.src[self.pos..].starts_with(lit) {
            self.pos += lit.len();
            Ok(())
        } else {
            Err(JsonError::Unexpected(self.peek().unwrap_or(0)))
        }
    }

    fn parse_number(&mut self) -> Result<(), JsonError> {
        if self.peek() == Some(b'-') {
            self.pos += 1;
        }
        let mut seen_digit = false;
        while let Some(b) = self.peek() {
            match b {
                b'0'..=b'9' => {
                    seen_digit = true;
                    self.pos += 1;
                }
                b'.' | b'e' | b'E' | b'+' | b'-' => self.pos += 1,
                _ => break,
            }
        }
        if !seen_digit {
            return Err(JsonError::Unexpected(self.peek().unwrap_or(0)));
        }
        Ok(())
    }
}
