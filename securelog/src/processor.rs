//! The record processor: one call per log record.
//!
//! Orchestrates masking and envelope building and reads the trace id from
//! the caller-supplied ambient context. Reentrant; safe to share across
//! threads behind an `Arc`. Never raises on the hot path: a crypto fault
//! means the record goes out masked but without SECURE_DATA.

use std::sync::Arc;

use tracing::{info, warn};

use securelog_core::{ConfigSnapshot, Context};
use securelog_crypto::public_key_fingerprint;
use securelog_masking::MaskingEngine;

use crate::envelope::SecureDataBuilder;

/// What the adapter attaches to the outgoing log record.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ProcessOutput {
    pub masked: String,
    pub secure_data: Option<String>,
    pub fingerprint: Option<String>,
}

pub struct RecordProcessor {
    config: Arc<ConfigSnapshot>,
    engine: MaskingEngine,
    builder: Option<SecureDataBuilder>,
    fingerprint: Option<String>,
}

impl RecordProcessor {
    /// Build the processor. A missing or invalid public key disables
    /// envelope building but leaves masking fully functional.
    pub fn new(config: Arc<ConfigSnapshot>) -> Self {
        let builder = match SecureDataBuilder::from_config(&config) {
            Ok(b) => Some(b),
            Err(e) => {
                warn!(error = %e, "SECURE_DATA disabled, masking continues without envelopes");
                None
            }
        };
        let fingerprint = public_key_fingerprint(&config.public_key_base64);
        let engine = MaskingEngine::new(config.clone());
        info!(envelopes = builder.is_some(), "Record processor initialized");
        Self { config, engine, builder, fingerprint }
    }

    /// Mask one message. When sensitive originals were collected and the
    /// envelope builder is available, the encrypted SECURE_DATA and the
    /// public-key fingerprint ride along.
    pub fn process(&self, message: &str, ctx: &Context) -> ProcessOutput {
        if message.is_empty() {
            return ProcessOutput { masked: message.to_string(), secure_data: None, fingerprint: None };
        }

        let result = self.engine.mask(message);
        if result.collected.is_empty() {
            return ProcessOutput { masked: result.masked, secure_data: None, fingerprint: None };
        }

        let originals_json = originals_to_json(&result.collected);
        let trace_id = self.trace_id_from(ctx);
        let secure_data = self
            .builder
            .as_ref()
            .and_then(|b| b.try_build(&originals_json, trace_id));
        let fingerprint = secure_data.as_ref().and_then(|_| self.fingerprint.clone());

        ProcessOutput { masked: result.masked, secure_data, fingerprint }
    }

    /// Write SECURE_DATA and the fingerprint into the ambient context under
    /// the configured field names; removes both when there is no envelope.
    pub fn apply_to_context(&self, ctx: &mut Context, output: &ProcessOutput) {
        match &output.secure_data {
            Some(secure_data) => {
                ctx.put(self.config.secure_data_key.clone(), secure_data.clone());
                match &output.fingerprint {
                    Some(fp) => ctx.put(self.config.fingerprint_key.clone(), fp.clone()),
                    None => {
                        ctx.remove(&self.config.fingerprint_key);
                    }
                }
            }
            None => self.clear_context(ctx),
        }
    }

    /// Remove the secure-data and fingerprint fields after emission.
    pub fn clear_context(&self, ctx: &mut Context) {
        ctx.remove(&self.config.secure_data_key);
        ctx.remove(&self.config.fingerprint_key);
    }

    pub fn fingerprint(&self) -> Option<&str> {
        self.fingerprint.as_deref()
    }

    pub fn builder(&self) -> Option<&SecureDataBuilder> {
        self.builder.as_ref()
    }

    fn trace_id_from<'c>(&self, ctx: &'c Context) -> Option<&'c str> {
        ctx.first_non_empty(self.config.trace_id_keys.iter().map(String::as_str))
    }
}

/// Compact JSON object over the collected pairs, preserving collection
/// order. Keys and values get the standard JSON escapes.
fn originals_to_json(pairs: &[(String, String)]) -> String {
    let mut out = String::with_capacity(pairs.len() * 32);
    out.push('{');
    for (i, (k, v)) in pairs.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push('"');
        push_escaped(&mut out, k);
        out.push_str("\":\"");
        push_escaped(&mut out, v);
        out.push('"');
    }
    out.push('}');
    out
}

fn push_escaped(out: &mut String, s: &str) {
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
}
