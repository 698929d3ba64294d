//! # SecureLog Core — configuration, errors and ambient context
//!
//! Shared foundation for the SecureLog masking/encryption pipeline:
//! - flat property bag (`securelog-ecc.properties` format) with programmatic overrides
//! - immutable typed configuration snapshot consumed by every other crate
//! - `Context`: the per-record ambient key/value store the caller passes in
//! - the workspace-wide error enum

pub mod config;
pub mod context;
pub mod error;
pub mod properties;

pub use config::ConfigSnapshot;
pub use context::Context;
pub use error::{SecureLogError, SecureLogResult};
pub use properties::PropertyBag;

/// Milliseconds in one minute, used for the system key rotation grid.
pub const MILLIS_PER_MINUTE: i64 = 60_000;
