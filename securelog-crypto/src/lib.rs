//! # SecureLog Crypto — SM2/SM4 primitives and key caching
//!
//! Thin façade over the RustCrypto SM2/SM4 stack plus the dual-track key
//! cache that amortizes SM2 wrapping:
//! - `sm2`: hybrid key wrap/unwrap, key decoding, key-pair generation
//! - `sm4`: symmetric encryption with mode dispatch (ECB/CBC/CTR/CFB/OFB/GCM)
//! - `fingerprint`: short public-key fingerprint for key lookup
//! - `keycache`: size-bounded FIFO cache with single-flight creation
//! - `vault`: the session/system dual-track wrapper around two caches

pub mod fingerprint;
pub mod keycache;
pub mod sm2;
pub mod sm4;
pub mod vault;

#[cfg(test)]
mod tests;

pub use fingerprint::public_key_fingerprint;
pub use keycache::{KeyCache, KeyInfo};
pub use sm2::{Sm2Decryptor, Sm2Encryptor, Sm2KeyPair};
pub use sm4::Sm4Mode;
pub use vault::KeyVault;

/// SM4 key size in bytes.
pub const SM4_KEY_LEN: usize = 16;
