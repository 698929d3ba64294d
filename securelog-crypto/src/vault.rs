//! Dual-track key vault.
//!
//! Session track: keys cached per externally supplied trace id, so every
//! record of one trace reuses the same SM4 key and pays the SM2 wrap once.
//! System track: records without a trace id share a key per wall-clock
//! window (`system_{⌊now_ms / (interval · 60000)⌋}`), rotated on the grid.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;

use securelog_core::{ConfigSnapshot, SecureLogError, SecureLogResult, MILLIS_PER_MINUTE};

use crate::keycache::{KeyCache, KeyInfo};
use crate::sm2::{self, Sm2Encryptor};
use crate::sm4;

pub struct KeyVault {
    encryptor: Sm2Encryptor,
    session: KeyCache,
    system: KeyCache,
    interval_minutes: i64,
    sm2_wraps: AtomicU64,
}

impl KeyVault {
    /// Build the vault from configuration. Fails with a `Config` error when
    /// the public key is missing or undecodable (raised once at setup; the
    /// hot path never sees it).
    pub fn from_config(config: &ConfigSnapshot) -> SecureLogResult<Self> {
        if config.public_key_base64.trim().is_empty() {
            return Err(SecureLogError::MissingProperty(securelog_core::config::ECC_PUBLIC_KEY));
        }
        let public_key = sm2::decode_public_key(&config.public_key_base64)?;
        Ok(Self {
            encryptor: Sm2Encryptor::new(public_key, &config.sm2_transformation),
            session: KeyCache::new(
                "session",
                config.session_cache_size,
                config.session_cache_buffer_ratio,
            ),
            system: KeyCache::new("system", config.system_cache_size, config.system_cache_buffer_ratio),
            interval_minutes: config.system_id_interval_minutes,
            sm2_wraps: AtomicU64::new(0),
        })
    }

    /// Key for a traced record. The SM2 wrap runs inside the cache's
    /// single-flight section, so N concurrent callers with one trace id
    /// cost one wrap.
    pub fn session_key(&self, trace_id: &str) -> SecureLogResult<Arc<KeyInfo>> {
        if trace_id.is_empty() {
            return Err(SecureLogError::Invariant("trace id must not be empty".into()));
        }
        self.session.get_or_create(trace_id, || self.make_key_info())
    }

    /// Key for an untraced record, shared across the current time window.
    pub fn system_key(&self) -> SecureLogResult<Arc<KeyInfo>> {
        let window = system_window_id(Utc::now().timestamp_millis(), self.interval_minutes);
        self.system.get_or_create(&window, || self.make_key_info())
    }

    fn make_key_info(&self) -> SecureLogResult<KeyInfo> {
        let sm4_key = sm4::generate_key();
        let sm2_wrapped_key = self.encryptor.encrypt(&sm4_key)?;
        self.sm2_wraps.fetch_add(1, Ordering::Relaxed);
        Ok(KeyInfo { sm4_key, sm2_wrapped_key, created_at_ms: Utc::now().timestamp_millis() })
    }

    pub fn session_cache(&self) -> &KeyCache {
        &self.session
    }

    pub fn system_cache(&self) -> &KeyCache {
        &self.system
    }

    pub fn sm2_wrap_count(&self) -> u64 {
        self.sm2_wraps.load(Ordering::Relaxed)
    }

    pub fn clear_all(&self) {
        self.session.clear_to_target();
        self.system.clear_to_target();
    }
}

/// Window identifier for the system track.
pub fn system_window_id(now_ms: i64, interval_minutes: i64) -> String {
    let interval_ms = interval_minutes.max(1) * MILLIS_PER_MINUTE;
    format!("system_{}", now_ms / interval_ms)
}
