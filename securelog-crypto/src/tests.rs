use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::keycache::{KeyCache, KeyInfo};
use crate::sm2::{self, Sm2Decryptor, Sm2Encryptor};
use crate::sm4::{self, Sm4Mode};
use crate::vault::{system_window_id, KeyVault};
use securelog_core::{ConfigSnapshot, PropertyBag, SecureLogError};

fn dummy_key_info() -> KeyInfo {
    KeyInfo { sm4_key: [7u8; 16], sm2_wrapped_key: vec![1, 2, 3], created_at_ms: 0 }
}

#[test]
fn test_sm4_mode_parse_and_iv_policy() {
    assert_eq!(Sm4Mode::from_transformation("SM4/GCM/NoPadding"), Sm4Mode::Gcm);
    assert_eq!(Sm4Mode::from_transformation("sm4/cbc/pkcs5padding"), Sm4Mode::Cbc);
    assert_eq!(Sm4Mode::from_transformation("SM4/CTR/NoPadding"), Sm4Mode::Ctr);
    assert_eq!(Sm4Mode::from_transformation("SM4/CFB/NoPadding"), Sm4Mode::Cfb);
    assert_eq!(Sm4Mode::from_transformation("SM4/OFB/NoPadding"), Sm4Mode::Ofb);
    assert_eq!(Sm4Mode::from_transformation("SM4/ECB/PKCS5Padding"), Sm4Mode::Ecb);
    assert_eq!(Sm4Mode::from_transformation("SM4"), Sm4Mode::Ecb);

    assert_eq!(Sm4Mode::Gcm.iv_len(), 12);
    assert_eq!(Sm4Mode::Cbc.iv_len(), 16);
    assert_eq!(Sm4Mode::Ecb.iv_len(), 0);
}

#[test]
fn test_sm4_gcm_round_trip_and_tag() {
    let key = sm4::generate_key();
    let iv = Sm4Mode::Gcm.generate_iv();
    let plaintext = br#"{"password":"p@ssw0rd"}"#;
    let ciphertext = sm4::encrypt(Sm4Mode::Gcm, &key, &iv, plaintext).unwrap();
    // GCM appends a 16-byte tag
    assert_eq!(ciphertext.len(), plaintext.len() + 16);
    let decrypted = sm4::decrypt(Sm4Mode::Gcm, &key, &iv, &ciphertext).unwrap();
    assert_eq!(decrypted, plaintext);

    // a flipped ciphertext bit must fail authentication
    let mut tampered = ciphertext;
    tampered[0] ^= 1;
    assert!(sm4::decrypt(Sm4Mode::Gcm, &key, &iv, &tampered).is_err());
}

#[test]
fn test_sm4_cbc_pads_and_restores() {
    let key = sm4::generate_key();
    let iv = Sm4Mode::Cbc.generate_iv();
    let plaintext = b"short";
    let ciphertext = sm4::encrypt(Sm4Mode::Cbc, &key, &iv, plaintext).unwrap();
    assert_eq!(ciphertext.len() % 16, 0);
    assert_eq!(sm4::decrypt(Sm4Mode::Cbc, &key, &iv, &ciphertext).unwrap(), plaintext);
}

#[test]
fn test_sm4_ecb_takes_no_iv() {
    let key = sm4::generate_key();
    let plaintext = b"0123456789abcdef0123";
    let ciphertext = sm4::encrypt(Sm4Mode::Ecb, &key, &[], plaintext).unwrap();
    assert_eq!(sm4::decrypt(Sm4Mode::Ecb, &key, &[], &ciphertext).unwrap(), plaintext);
    // wrong IV length is rejected up front
    assert!(sm4::encrypt(Sm4Mode::Ecb, &key, &[0u8; 16], plaintext).is_err());
    assert!(sm4::encrypt(Sm4Mode::Gcm, &key, &[0u8; 16], plaintext).is_err());
}

#[test]
fn test_sm2_wrap_unwrap() {
    let pair = sm2::generate_key_pair().unwrap();
    let enc = Sm2Encryptor::from_base64(&pair.public_key_base64, "SM2").unwrap();
    let dec = Sm2Decryptor::from_base64(&pair.private_key_base64, "SM2").unwrap();
    let sm4_key = sm4::generate_key();
    let wrapped = enc.encrypt(&sm4_key).unwrap();
    assert_ne!(wrapped.as_slice(), sm4_key.as_slice());
    assert_eq!(dec.decrypt(&wrapped).unwrap(), sm4_key.to_vec());
}

#[test]
fn test_sm2_decode_rejects_garbage() {
    assert!(matches!(
        sm2::decode_public_key("!!not-base64!!"),
        Err(SecureLogError::Config(_))
    ));
    assert!(matches!(sm2::decode_private_key("  "), Err(SecureLogError::Input(_))));
}

#[test]
fn test_cache_single_flight_under_contention() {
    let cache = KeyCache::new("test", 100, 0.1);
    let factory_runs = Arc::new(AtomicU64::new(0));

    std::thread::scope(|scope| {
        for _ in 0..16 {
            let cache = &cache;
            let factory_runs = factory_runs.clone();
            scope.spawn(move || {
                for _ in 0..50 {
                    let info = cache
                        .get_or_create("trace-1", || {
                            factory_runs.fetch_add(1, Ordering::Relaxed);
                            Ok(dummy_key_info())
                        })
                        .unwrap();
                    assert_eq!(info.sm4_key, [7u8; 16]);
                }
            });
        }
    });

    assert_eq!(factory_runs.load(Ordering::Relaxed), 1);
    assert_eq!(cache.created_count(), 1);
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_cache_factory_error_is_not_cached() {
    let cache = KeyCache::new("test", 10, 0.0);
    let err = cache.get_or_create("k", || Err(SecureLogError::Crypto("boom".into())));
    assert!(err.is_err());
    assert!(cache.is_empty());
    // a later attempt may succeed
    assert!(cache.get_or_create("k", || Ok(dummy_key_info())).is_ok());
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_cache_eviction_converges_to_buffered_target() {
    let cache = KeyCache::new("test", 10, 0.2);
    for i in 0..50 {
        cache.get_or_create(&format!("k{i}"), || Ok(dummy_key_info())).unwrap();
        assert!(cache.len() <= 10, "size {} exceeded capacity", cache.len());
    }
    // ⌊10 · (1 − 0.2)⌋ = 8
    assert!(cache.len() <= 8);
    cache.clear_to_target();
    assert!(cache.len() <= 8);
}

#[test]
fn test_cache_evicts_oldest_first() {
    let cache = KeyCache::new("test", 4, 0.5);
    for i in 0..4 {
        cache.get_or_create(&format!("k{i}"), || Ok(dummy_key_info())).unwrap();
    }
    // capacity hit: drains to ⌊4 · 0.5⌋ = 2, dropping k0/k1
    assert_eq!(cache.len(), 2);
    let hits = Arc::new(AtomicU64::new(0));
    let hits2 = hits.clone();
    cache
        .get_or_create("k3", move || {
            hits2.fetch_add(1, Ordering::Relaxed);
            Ok(dummy_key_info())
        })
        .unwrap();
    assert_eq!(hits.load(Ordering::Relaxed), 0, "newest entries must survive eviction");
}

#[test]
fn test_cache_capacity_admin() {
    let cache = KeyCache::new("test", 10, 0.1);
    assert!(matches!(cache.set_capacity(0), Err(SecureLogError::Invariant(_))));
    cache.set_capacity(500).unwrap();
    assert_eq!(cache.capacity(), 500);
}

#[test]
fn test_system_window_id_grid() {
    let interval = 15;
    assert_eq!(system_window_id(0, interval), "system_0");
    assert_eq!(system_window_id(15 * 60_000 - 1, interval), "system_0");
    assert_eq!(system_window_id(15 * 60_000, interval), "system_1");
    assert_eq!(system_window_id(29 * 60_000, interval), "system_1");
    assert_eq!(system_window_id(30 * 60_000, interval), "system_2");
}

#[test]
fn test_vault_requires_public_key() {
    let cfg = ConfigSnapshot::defaults();
    assert!(matches!(
        KeyVault::from_config(&cfg),
        Err(SecureLogError::MissingProperty(_))
    ));
}

#[test]
fn test_vault_session_track_amortizes_wraps() {
    let pair = sm2::generate_key_pair().unwrap();
    let mut props = PropertyBag::new();
    props.set("ecc.public.key", pair.public_key_base64);
    let cfg = ConfigSnapshot::from_properties(&props);
    let vault = KeyVault::from_config(&cfg).unwrap();

    let a1 = vault.session_key("trace-a").unwrap();
    let a2 = vault.session_key("trace-a").unwrap();
    let b = vault.session_key("trace-b").unwrap();
    assert_eq!(a1.sm4_key, a2.sm4_key);
    assert_eq!(a1.sm2_wrapped_key, a2.sm2_wrapped_key);
    assert_ne!(a1.sm4_key, b.sm4_key);
    assert_eq!(vault.sm2_wrap_count(), 2);

    let s1 = vault.system_key().unwrap();
    let s2 = vault.system_key().unwrap();
    assert_eq!(s1.sm4_key, s2.sm4_key);
    assert_eq!(vault.sm2_wrap_count(), 3);

    assert!(vault.session_key("").is_err());
}
