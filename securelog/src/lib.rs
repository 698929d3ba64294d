//! # SecureLog — structure-preserving masking with encrypted originals
//!
//! Per log record the pipeline produces:
//! - a masked rendering that keeps the message's original shape,
//! - a `SECURE_DATA` token: the removed originals as compact JSON,
//!   SM4-encrypted under a cached per-trace (or per-time-window) key whose
//!   SM2-wrapped form rides along in the envelope,
//! - a short public-key fingerprint so auditors can locate the right
//!   private key.
//!
//! ```no_run
//! use securelog::{Context, RecordProcessor};
//! use securelog_core::{ConfigSnapshot, PropertyBag};
//!
//! let config = ConfigSnapshot::from_properties(&PropertyBag::load());
//! let processor = RecordProcessor::new(config);
//!
//! let mut ctx = Context::new();
//! ctx.put("trace_id", "req-421");
//! let out = processor.process(r#"{"mobile":"13800138000"}"#, &ctx);
//! assert_eq!(out.masked, r#"{"mobile":"138****8000"}"#);
//! assert!(out.secure_data.is_some());
//! ```

pub mod decrypter;
pub mod envelope;
pub mod processor;

pub use decrypter::SecureDataDecrypter;
pub use envelope::{parse_envelope, ParsedEnvelope, SecureDataBuilder, SECURE_DATA_VERSION};
pub use processor::{ProcessOutput, RecordProcessor};

pub use securelog_core::{ConfigSnapshot, Context, PropertyBag, SecureLogError, SecureLogResult};
