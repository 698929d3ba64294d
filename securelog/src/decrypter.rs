//! Offline SECURE_DATA decrypter for auditors and troubleshooting.
//!
//! Not part of the hot path: failures surface as explicit errors instead
//! of degrading. Decryption follows the envelope structure — SM2-unwrap
//! the SM4 key, then SM4-decrypt the originals JSON with the recorded IV.

use securelog_core::{ConfigSnapshot, SecureLogError, SecureLogResult};
use securelog_crypto::sm4::{self, Sm4Mode};
use securelog_crypto::{Sm2Decryptor, SM4_KEY_LEN};

use crate::envelope::parse_envelope;

pub struct SecureDataDecrypter {
    mode: Sm4Mode,
    sm2_transformation: String,
}

impl SecureDataDecrypter {
    pub fn from_config(config: &ConfigSnapshot) -> Self {
        Self {
            mode: Sm4Mode::from_transformation(&config.sm4_transformation),
            sm2_transformation: config.sm2_transformation.clone(),
        }
    }

    /// Recover the originals JSON from a Base64 SECURE_DATA, given a Base64
    /// PKCS#8 private key.
    pub fn decrypt(&self, secure_data_base64: &str, private_key_base64: &str) -> SecureLogResult<String> {
        let decryptor = Sm2Decryptor::from_base64(private_key_base64, &self.sm2_transformation)?;
        self.decrypt_with(secure_data_base64, &decryptor)
    }

    /// Variant for callers that hold a decoded key (the CLI reuses one key
    /// across many envelopes).
    pub fn decrypt_with(
        &self,
        secure_data_base64: &str,
        decryptor: &Sm2Decryptor,
    ) -> SecureLogResult<String> {
        let envelope = parse_envelope(secure_data_base64)?;

        if envelope.iv.len() != self.mode.iv_len() {
            return Err(SecureLogError::Input(format!(
                "envelope IV length {} does not fit configured mode {:?}",
                envelope.iv.len(),
                self.mode
            )));
        }

        let key_bytes = decryptor.decrypt(&envelope.sm2_wrapped_key)?;
        let sm4_key: [u8; SM4_KEY_LEN] = key_bytes
            .as_slice()
            .try_into()
            .map_err(|_| SecureLogError::Crypto(format!("unwrapped key is {} bytes", key_bytes.len())))?;

        let plaintext = sm4::decrypt(self.mode, &sm4_key, &envelope.iv, &envelope.ciphertext)?;
        String::from_utf8(plaintext)
            .map_err(|e| SecureLogError::Input(format!("decrypted payload is not UTF-8: {e}")))
    }
}
