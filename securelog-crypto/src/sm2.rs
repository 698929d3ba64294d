//! SM2 public-key operations: key decoding, key-pair generation, and the
//! wrap/unwrap of SM4 key material that forms the envelope's key layer.
//!
//! Keys travel as Base64 text: X.509/SPKI DER for public keys, PKCS#8 DER
//! for private keys. The ciphertext mode follows the configured
//! transformation name (`SM2` selects the current-standard C1C3C2 layout;
//! a name containing `C1C2C3` selects the legacy layout).

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use ::sm2::elliptic_curve::common::getrandom::SysRng;
use ::sm2::elliptic_curve::Generate;
use ::sm2::pke::{DecryptingKey, EncryptingKey, Mode};
use ::sm2::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use ::sm2::{PublicKey, SecretKey};

use securelog_core::{SecureLogError, SecureLogResult};

fn mode_from_transformation(transformation: &str) -> Mode {
    if transformation.to_uppercase().contains("C1C2C3") {
        Mode::C1C2C3
    } else {
        Mode::C1C3C2
    }
}

/// Wraps byte strings (SM4 keys) under a configured SM2 public key.
pub struct Sm2Encryptor {
    key: EncryptingKey,
}

impl Sm2Encryptor {
    pub fn new(public_key: PublicKey, transformation: &str) -> Self {
        Self {
            key: EncryptingKey::new_with_mode(public_key, mode_from_transformation(transformation)),
        }
    }

    /// Decode a Base64 X.509 public key and build an encryptor from it.
    pub fn from_base64(base64_x509: &str, transformation: &str) -> SecureLogResult<Self> {
        Ok(Self::new(decode_public_key(base64_x509)?, transformation))
    }

    pub fn encrypt(&self, data: &[u8]) -> SecureLogResult<Vec<u8>> {
        self.key
            .encrypt(&mut SysRng, data)
            .map_err(|e| SecureLogError::Crypto(format!("SM2 encrypt failed: {e}")))
    }
}

/// Unwraps SM2 ciphertexts with a private key (offline decrypter only).
pub struct Sm2Decryptor {
    key: DecryptingKey,
}

impl Sm2Decryptor {
    pub fn new(secret_key: SecretKey, transformation: &str) -> Self {
        Self {
            key: DecryptingKey::new_with_mode(
                secret_key.to_nonzero_scalar(),
                mode_from_transformation(transformation),
            ),
        }
    }

    /// Decode a Base64 PKCS#8 private key and build a decryptor from it.
    pub fn from_base64(base64_pkcs8: &str, transformation: &str) -> SecureLogResult<Self> {
        Ok(Self::new(decode_private_key(base64_pkcs8)?, transformation))
    }

    pub fn decrypt(&self, ciphertext: &[u8]) -> SecureLogResult<Vec<u8>> {
        self.key
            .decrypt(ciphertext)
            .map_err(|e| SecureLogError::Crypto(format!("SM2 decrypt failed: {e}")))
    }
}

/// A freshly generated SM2 key pair, Base64-encoded for storage.
pub struct Sm2KeyPair {
    pub public_key_base64: String,
    pub private_key_base64: String,
}

/// Generate an SM2 key pair on the sm2p256v1 curve (the only curve the
/// primitive supports; the configured curve name is validated upstream).
pub fn generate_key_pair() -> SecureLogResult<Sm2KeyPair> {
    let secret = SecretKey::generate();
    let public = secret.public_key();
    let private_der = secret
        .to_pkcs8_der()
        .map_err(|e| SecureLogError::Crypto(format!("PKCS#8 encode failed: {e}")))?;
    let public_der = public
        .to_public_key_der()
        .map_err(|e| SecureLogError::Crypto(format!("SPKI encode failed: {e}")))?;
    Ok(Sm2KeyPair {
        public_key_base64: BASE64.encode(public_der.as_bytes()),
        private_key_base64: BASE64.encode(private_der.as_bytes()),
    })
}

pub fn decode_public_key(base64_x509: &str) -> SecureLogResult<PublicKey> {
    let der = BASE64
        .decode(base64_x509.trim())
        .map_err(|e| SecureLogError::Config(format!("Public key is not valid Base64: {e}")))?;
    PublicKey::from_public_key_der(&der)
        .map_err(|e| SecureLogError::Config(format!("Public key decode failed: {e}")))
}

pub fn decode_private_key(base64_pkcs8: &str) -> SecureLogResult<SecretKey> {
    let trimmed = base64_pkcs8.trim();
    if trimmed.is_empty() {
        return Err(SecureLogError::Input("Private key must not be empty".into()));
    }
    let der = BASE64
        .decode(trimmed)
        .map_err(|e| SecureLogError::Input(format!("Private key is not valid Base64: {e}")))?;
    SecretKey::from_pkcs8_der(&der)
        .map_err(|e| SecureLogError::Input(format!("Private key decode failed: {e}")))
}
