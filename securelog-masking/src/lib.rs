//! # SecureLog Masking — structure-preserving log redaction
//!
//! Masks sensitive values in a single log message while keeping the
//! message's original shape (JSON stays JSON, a query string stays a query
//! string), and extracts the original values for encrypted audit storage.
//!
//! Shape dispatch order (first hit wins):
//! 1. JSON (token walk, nested objects/arrays, embedded JSON and query strings)
//! 2. SQL `Parameters:` lines (MyBatis-style)
//! 3. URL-embedded query strings (`?a=b&c=d`)
//! 4. bare query strings
//! 5. `key=value` / `key: value` fragments
//! 6. plain-text fallback (id-card / mobile / email / strict address)

pub mod collector;
pub mod engine;
pub mod fallback;
pub mod json;
pub mod kv;
pub mod query;
pub mod rules;
pub mod sql;

pub use collector::SensitiveCollector;
pub use engine::{MaskResult, MaskingEngine};
pub use rules::MaskingRules;
