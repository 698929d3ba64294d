//! The SECURE_DATA envelope.
//!
//! Binary layout (big-endian), Base64-encoded for emission:
//!
//! ```text
//! offset 0     : version (u8 = 2)
//! offset 1     : sm2_key_len (u32 BE) = L
//! offset 5     : iv_len (u8) = V
//! offset 6     : sm2-wrapped SM4 key (L bytes)
//! offset 6+L   : iv (V bytes, absent for ECB)
//! offset 6+L+V : SM4 ciphertext (GCM tag included)
//! ```
//!
//! Readers reject any other version and any length that runs past the end
//! of the buffer.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use tracing::warn;

use securelog_core::{ConfigSnapshot, SecureLogError, SecureLogResult};
use securelog_crypto::sm4::{self, Sm4Mode};
use securelog_crypto::KeyVault;

pub const SECURE_DATA_VERSION: u8 = 2;
const HEADER_LEN: usize = 1 + 4 + 1;

#[derive(Debug)]
pub struct ParsedEnvelope {
    pub sm2_wrapped_key: Vec<u8>,
    pub iv: Vec<u8>,
    pub ciphertext: Vec<u8>,
}

/// Builds SECURE_DATA tokens on the hot path. Crypto failures degrade to
/// "no envelope" so the caller can always emit the masked message.
pub struct SecureDataBuilder {
    vault: KeyVault,
    mode: Sm4Mode,
}

impl SecureDataBuilder {
    pub fn from_config(config: &ConfigSnapshot) -> SecureLogResult<Self> {
        Ok(Self {
            vault: KeyVault::from_config(config)?,
            mode: Sm4Mode::from_transformation(&config.sm4_transformation),
        })
    }

    /// Encrypt `originals_json` and pack the envelope. `trace_id` picks the
    /// session track; `None` (or empty) uses the rotating system track.
    pub fn build(&self, originals_json: &str, trace_id: Option<&str>) -> SecureLogResult<String> {
        let key_info = match trace_id {
            Some(id) if !id.is_empty() => self.vault.session_key(id)?,
            _ => self.vault.system_key()?,
        };
        let iv = self.mode.generate_iv();
        let ciphertext = sm4::encrypt(self.mode, &key_info.sm4_key, &iv, originals_json.as_bytes())?;
        let packed = pack_envelope(&key_info.sm2_wrapped_key, &iv, &ciphertext);
        Ok(BASE64.encode(packed))
    }

    /// Degrading wrapper around [`build`](Self::build): logs and returns
    /// `None` on any failure. The hot path never raises.
    pub fn try_build(&self, originals_json: &str, trace_id: Option<&str>) -> Option<String> {
        match self.build(originals_json, trace_id) {
            Ok(secure_data) => Some(secure_data),
            Err(e) => {
                warn!(error = %e, "SECURE_DATA build failed, emitting masked message without envelope");
                None
            }
        }
    }

    pub fn vault(&self) -> &KeyVault {
        &self.vault
    }

    pub fn mode(&self) -> Sm4Mode {
        self.mode
    }
}

pub fn pack_envelope(sm2_wrapped_key: &[u8], iv: &[u8], ciphertext: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + sm2_wrapped_key.len() + iv.len() + ciphertext.len());
    out.push(SECURE_DATA_VERSION);
    out.extend_from_slice(&(sm2_wrapped_key.len() as u32).to_be_bytes());
    out.push(iv.len() as u8);
    out.extend_from_slice(sm2_wrapped_key);
    out.extend_from_slice(iv);
    out.extend_from_slice(ciphertext);
    out
}

/// Decode and split a Base64 SECURE_DATA. Strictly validates version and
/// declared lengths against the buffer.
pub fn parse_envelope(secure_data_base64: &str) -> SecureLogResult<ParsedEnvelope> {
    let trimmed = secure_data_base64.trim();
    if trimmed.is_empty() {
        return Err(SecureLogError::Input("SECURE_DATA must not be empty".into()));
    }
    let bytes = BASE64
        .decode(trimmed)
        .map_err(|e| SecureLogError::Envelope(format!("not valid Base64: {e}")))?;
    if bytes.len() < HEADER_LEN {
        return Err(SecureLogError::Envelope(format!(
            "too short for header: {} bytes",
            bytes.len()
        )));
    }
    let version = bytes[0];
    if version != SECURE_DATA_VERSION {
        return Err(SecureLogError::EnvelopeVersion(version));
    }
    let key_len = u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]) as usize;
    let iv_len = bytes[5] as usize;
    let body = &bytes[HEADER_LEN..];
    if body.len() < key_len + iv_len {
        return Err(SecureLogError::Envelope(format!(
            "declared lengths (key {key_len}, iv {iv_len}) exceed payload of {} bytes",
            body.len()
        )));
    }
    Ok(ParsedEnvelope {
        sm2_wrapped_key: body[..key_len].to_vec(),
        iv: body[key_len..key_len + iv_len].to_vec(),
        ciphertext: body[key_len + iv_len..].to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_parse_round_trip() {
        let packed = pack_envelope(&[1, 2, 3], &[9; 12], b"cipher");
        let encoded = BASE64.encode(&packed);
        let parsed = parse_envelope(&encoded).unwrap();
        assert_eq!(parsed.sm2_wrapped_key, vec![1, 2, 3]);
        assert_eq!(parsed.iv, vec![9; 12]);
        assert_eq!(parsed.ciphertext, b"cipher".to_vec());
    }

    #[test]
    fn test_empty_iv_for_ecb_layout() {
        let packed = pack_envelope(&[1, 2], &[], b"x");
        let parsed = parse_envelope(&BASE64.encode(&packed)).unwrap();
        assert!(parsed.iv.is_empty());
        assert_eq!(parsed.ciphertext, b"x".to_vec());
    }

    #[test]
    fn test_rejects_wrong_version() {
        let mut packed = pack_envelope(&[1], &[], b"x");
        packed[0] = 1;
        let err = parse_envelope(&BASE64.encode(&packed)).unwrap_err();
        assert!(matches!(err, SecureLogError::EnvelopeVersion(1)));
    }

    #[test]
    fn test_rejects_truncated_and_inconsistent_buffers() {
        assert!(parse_envelope("").is_err());
        assert!(parse_envelope("AAA").is_err());
        // header claims a 1000-byte key in a tiny envelope
        let mut bogus = vec![SECURE_DATA_VERSION];
        bogus.extend_from_slice(&1000u32.to_be_bytes());
        bogus.push(0);
        bogus.extend_from_slice(&[0u8; 8]);
        assert!(matches!(
            parse_envelope(&BASE64.encode(&bogus)),
            Err(SecureLogError::Envelope(_))
        ));
    }
}
