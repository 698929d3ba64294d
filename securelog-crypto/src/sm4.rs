//! SM4 symmetric encryption with mode dispatch.
//!
//! The configured transformation string (`SM4/GCM/NoPadding`,
//! `SM4/CBC/PKCS5Padding`, ...) selects the block mode, which in turn fixes
//! the IV policy: 12 random bytes for GCM, 16 for CBC/CTR/CFB/OFB, none for
//! ECB. GCM appends its 16-byte authentication tag to the ciphertext and
//! verifies it during decryption.

use aes_gcm::aead::Aead;
use aes_gcm::AesGcm;
use cipher::block_padding::Pkcs7;
use cipher::consts::U12;
use cipher::generic_array::GenericArray;
use cipher::{AsyncStreamCipher, BlockDecryptMut, BlockEncryptMut, KeyInit, KeyIvInit, StreamCipher};
use rand::RngCore;
use ::sm4::Sm4;

use securelog_core::{SecureLogError, SecureLogResult};

use crate::SM4_KEY_LEN;

type Sm4EcbEnc = ecb::Encryptor<Sm4>;
type Sm4EcbDec = ecb::Decryptor<Sm4>;
type Sm4CbcEnc = cbc::Encryptor<Sm4>;
type Sm4CbcDec = cbc::Decryptor<Sm4>;
type Sm4Ctr = ctr::Ctr128BE<Sm4>;
type Sm4CfbEnc = cfb_mode::Encryptor<Sm4>;
type Sm4CfbDec = cfb_mode::Decryptor<Sm4>;
type Sm4Ofb = ofb::Ofb<Sm4>;
type Sm4Gcm = AesGcm<Sm4, U12>;

pub const GCM_IV_LEN: usize = 12;
pub const BLOCK_MODE_IV_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sm4Mode {
    Ecb,
    Cbc,
    Ctr,
    Cfb,
    Ofb,
    Gcm,
}

impl Sm4Mode {
    /// Parse a JCE-style transformation name. Unknown or bare names fall
    /// back to ECB, matching the no-IV code path.
    pub fn from_transformation(transformation: &str) -> Self {
        let upper = transformation.to_uppercase();
        if upper.contains("/GCM/") {
            Self::Gcm
        } else if upper.contains("/CBC/") {
            Self::Cbc
        } else if upper.contains("/CTR/") {
            Self::Ctr
        } else if upper.contains("/CFB/") {
            Self::Cfb
        } else if upper.contains("/OFB/") {
            Self::Ofb
        } else {
            Self::Ecb
        }
    }

    pub fn iv_len(self) -> usize {
        match self {
            Self::Gcm => GCM_IV_LEN,
            Self::Ecb => 0,
            _ => BLOCK_MODE_IV_LEN,
        }
    }

    pub fn generate_iv(self) -> Vec<u8> {
        let mut iv = vec![0u8; self.iv_len()];
        rand::rngs::OsRng.fill_bytes(&mut iv);
        iv
    }
}

/// Generate a fresh random 128-bit SM4 key.
pub fn generate_key() -> [u8; SM4_KEY_LEN] {
    let mut key = [0u8; SM4_KEY_LEN];
    rand::rngs::OsRng.fill_bytes(&mut key);
    key
}

pub fn encrypt(mode: Sm4Mode, key: &[u8; SM4_KEY_LEN], iv: &[u8], data: &[u8]) -> SecureLogResult<Vec<u8>> {
    check_iv(mode, iv)?;
    let key = GenericArray::from_slice(key);
    match mode {
        Sm4Mode::Ecb => Ok(Sm4EcbEnc::new(key).encrypt_padded_vec_mut::<Pkcs7>(data)),
        Sm4Mode::Cbc => {
            Ok(Sm4CbcEnc::new(key, GenericArray::from_slice(iv)).encrypt_padded_vec_mut::<Pkcs7>(data))
        }
        Sm4Mode::Ctr => {
            let mut buf = data.to_vec();
            Sm4Ctr::new(key, GenericArray::from_slice(iv)).apply_keystream(&mut buf);
            Ok(buf)
        }
        Sm4Mode::Cfb => {
            let mut buf = data.to_vec();
            Sm4CfbEnc::new(key, GenericArray::from_slice(iv)).encrypt(&mut buf);
            Ok(buf)
        }
        Sm4Mode::Ofb => {
            let mut buf = data.to_vec();
            Sm4Ofb::new(key, GenericArray::from_slice(iv)).apply_keystream(&mut buf);
            Ok(buf)
        }
        Sm4Mode::Gcm => Sm4Gcm::new(key)
            .encrypt(GenericArray::from_slice(iv), data)
            .map_err(|e| SecureLogError::Crypto(format!("SM4-GCM encrypt failed: {e}"))),
    }
}

pub fn decrypt(mode: Sm4Mode, key: &[u8; SM4_KEY_LEN], iv: &[u8], data: &[u8]) -> SecureLogResult<Vec<u8>> {
    check_iv(mode, iv)?;
    let key = GenericArray::from_slice(key);
    match mode {
        Sm4Mode::Ecb => Sm4EcbDec::new(key)
            .decrypt_padded_vec_mut::<Pkcs7>(data)
            .map_err(|e| SecureLogError::Crypto(format!("SM4-ECB unpad failed: {e}"))),
        Sm4Mode::Cbc => Sm4CbcDec::new(key, GenericArray::from_slice(iv))
            .decrypt_padded_vec_mut::<Pkcs7>(data)
            .map_err(|e| SecureLogError::Crypto(format!("SM4-CBC unpad failed: {e}"))),
        Sm4Mode::Ctr => {
            let mut buf = data.to_vec();
            Sm4Ctr::new(key, GenericArray::from_slice(iv)).apply_keystream(&mut buf);
            Ok(buf)
        }
        Sm4Mode::Cfb => {
            let mut buf = data.to_vec();
            Sm4CfbDec::new(key, GenericArray::from_slice(iv)).decrypt(&mut buf);
            Ok(buf)
        }
        Sm4Mode::Ofb => {
            let mut buf = data.to_vec();
            Sm4Ofb::new(key, GenericArray::from_slice(iv)).apply_keystream(&mut buf);
            Ok(buf)
        }
        Sm4Mode::Gcm => Sm4Gcm::new(key)
            .decrypt(GenericArray::from_slice(iv), data)
            .map_err(|e| SecureLogError::Crypto(format!("SM4-GCM decrypt failed: {e}"))),
    }
}

fn check_iv(mode: Sm4Mode, iv: &[u8]) -> SecureLogResult<()> {
    if iv.len() != mode.iv_len() {
        return Err(SecureLogError::Crypto(format!(
            "IV length {} does not match mode {:?} (expected {})",
            iv.len(),
            mode,
            mode.iv_len()
        )));
    }
    Ok(())
}
