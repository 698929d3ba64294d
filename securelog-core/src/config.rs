//! Immutable configuration snapshot.
//!
//! All tunables are parsed once from the property bag into typed fields so
//! the per-record hot path never touches string configuration again.
//! Key sets are normalized to lowercase and carry underscore-stripped
//! aliases (`access_token` also matches `accesstoken`).

use std::collections::HashSet;
use std::sync::Arc;

use crate::properties::PropertyBag;

// ── Property keys ───────────────────────────────────────────────────────────

pub const ECC_PUBLIC_KEY: &str = "ecc.public.key";
pub const CRYPTO_PROVIDER: &str = "ecc.crypto.provider";
pub const SM2_CURVE_NAME: &str = "ecc.sm2.curve.name";
pub const SM2_CIPHER_TRANSFORMATION: &str = "ecc.sm2.cipher.transformation";
pub const SM4_CIPHER_TRANSFORMATION: &str = "ecc.sm4.cipher.transformation";
pub const SESSION_KEY_CACHE_SIZE: &str = "ecc.session.key.cache.size";
pub const SESSION_KEY_CACHE_BUFFER_PERCENTAGE: &str = "ecc.session.key.cache.buffer.percentage";
pub const SYSTEM_KEY_CACHE_SIZE: &str = "ecc.system.key.cache.size";
pub const SYSTEM_KEY_CACHE_BUFFER_PERCENTAGE: &str = "ecc.system.key.cache.buffer.percentage";
pub const SYSTEM_ID_CHANGE_INTERVAL_MINUTES: &str = "ecc.system.id.change.interval.minutes";
pub const MDC_SECURE_DATA_KEY: &str = "mdc.secure.data.key";
pub const MDC_PUB_KEY_FINGERPRINT_KEY: &str = "mdc.pub.key.fingerprint.key";
pub const MDC_TRACE_ID_KEYS: &str = "mdc.trace.id.keys";
pub const MASKING_SENSITIVE_KEYS: &str = "ecc.masking.sensitive.keys";
pub const MASKING_TOKENLIKE_KEYS: &str = "ecc.masking.tokenlike.keys";
pub const MASKING_QUERYSTRING_ENABLED: &str = "ecc.masking.querystring.enabled";
pub const MASKING_FALLBACK_ENABLED: &str = "ecc.masking.fallback.enabled";
pub const MASKING_ADDRESS_REQUIRE_REGION: &str = "ecc.masking.address.require.region";
pub const MASKING_ADDRESS_REQUIRE_DETAIL: &str = "ecc.masking.address.require.detail";
pub const MASKING_ADDRESS_REGION_KEYWORDS: &str = "ecc.masking.address.region.keywords";
pub const MASKING_ADDRESS_DETAIL_KEYWORDS: &str = "ecc.masking.address.detail.keywords";
pub const MASKING_ADDRESS_EXCLUDE_KEYWORDS: &str = "ecc.masking.address.exclude.keywords";
pub const MASKING_HIGH_ENTROPY_ENABLED: &str = "ecc.masking.high.entropy.enabled";
pub const MASKING_HIGH_ENTROPY_REQUIRE_UPPER_LOWER_DIGIT: &str =
    "ecc.masking.high.entropy.require.upper.lower.digit";
pub const MASKING_TOKEN_KEEP_PREFIX: &str = "ecc.masking.token.keep.prefix";
pub const MASKING_TOKEN_KEEP_SUFFIX: &str = "ecc.masking.token.keep.suffix";
pub const MASKING_MAX_VALUE_LENGTH: &str = "ecc.masking.max.value.length";
pub const MASKING_HIGH_ENTROPY_MIN_LENGTH: &str = "ecc.masking.high.entropy.min.length";
pub const MASKING_HIGH_ENTROPY_THRESHOLD: &str = "ecc.masking.high.entropy.threshold";

// ── Defaults ────────────────────────────────────────────────────────────────

pub const DEFAULT_CRYPTO_PROVIDER: &str = "org.bouncycastle.jce.provider.BouncyCastleProvider";
pub const DEFAULT_SM2_CURVE_NAME: &str = "sm2p256v1";
pub const DEFAULT_SM2_CIPHER_TRANSFORMATION: &str = "SM2";
pub const DEFAULT_SM4_CIPHER_TRANSFORMATION: &str = "SM4/GCM/NoPadding";
pub const DEFAULT_SESSION_KEY_CACHE_SIZE: usize = 30_000;
pub const DEFAULT_SESSION_KEY_CACHE_BUFFER_PERCENTAGE: f64 = 0.05;
pub const DEFAULT_SYSTEM_KEY_CACHE_SIZE: usize = 1_000;
pub const DEFAULT_SYSTEM_KEY_CACHE_BUFFER_PERCENTAGE: f64 = 0.10;
pub const DEFAULT_SYSTEM_ID_CHANGE_INTERVAL_MINUTES: i64 = 15;
pub const DEFAULT_MDC_SECURE_DATA_KEY: &str = "SECURE_DATA";
pub const DEFAULT_MDC_PUB_KEY_FINGERPRINT_KEY: &str = "PUB_KEY_FINGERPRINT";
pub const DEFAULT_MDC_TRACE_ID_KEYS: &str =
    "trace_id,traceId,requestId,correlationId,X-Trace-Code,X-Trace-Id";
pub const DEFAULT_MASKING_SENSITIVE_KEYS: &str = "password,pwd,pass,token,access_token,clientSecret,secret,apiKey,idcard,cardNumber,jbrCardNumber,mobile,phone,tel,email,address";
pub const DEFAULT_MASKING_TOKENLIKE_KEYS: &str =
    "token,access_token,clientSecret,secret,apiKey,key,auth,credential";
pub const DEFAULT_MASKING_ADDRESS_REGION_KEYWORDS: &str = "省,市,区,县";
pub const DEFAULT_MASKING_ADDRESS_DETAIL_KEYWORDS: &str = "街,路,道,巷,镇,乡,号,院,楼,室";
pub const DEFAULT_MASKING_TOKEN_KEEP_PREFIX: usize = 4;
pub const DEFAULT_MASKING_TOKEN_KEEP_SUFFIX: usize = 4;
pub const DEFAULT_MASKING_MAX_VALUE_LENGTH: usize = 50;
pub const DEFAULT_MASKING_HIGH_ENTROPY_MIN_LENGTH: usize = 20;
pub const DEFAULT_MASKING_HIGH_ENTROPY_THRESHOLD: f64 = 3.5;

/// Immutable, fully parsed view of every tunable. Built once, shared via
/// `Arc`, read-only afterwards.
#[derive(Debug, Clone)]
pub struct ConfigSnapshot {
    pub public_key_base64: String,
    pub crypto_provider: String,
    pub sm2_curve_name: String,
    pub sm2_transformation: String,
    pub sm4_transformation: String,

    pub session_cache_size: usize,
    pub session_cache_buffer_ratio: f64,
    pub system_cache_size: usize,
    pub system_cache_buffer_ratio: f64,
    pub system_id_interval_minutes: i64,

    pub secure_data_key: String,
    pub fingerprint_key: String,
    pub trace_id_keys: Vec<String>,

    sensitive_keys: HashSet<String>,
    token_like_keys: HashSet<String>,
    pub query_string_enabled: bool,
    pub fallback_enabled: bool,
    pub address_require_region: bool,
    pub address_require_detail: bool,
    pub address_region_keywords: Vec<String>,
    pub address_detail_keywords: Vec<String>,
    pub address_exclude_keywords: Vec<String>,
    pub high_entropy_enabled: bool,
    pub high_entropy_require_upper_lower_digit: bool,
    pub token_keep_prefix: usize,
    pub token_keep_suffix: usize,
    pub max_value_length: usize,
    pub high_entropy_min_length: usize,
    pub high_entropy_threshold: f64,
}

impl ConfigSnapshot {
    pub fn from_properties(props: &PropertyBag) -> Arc<Self> {
        Arc::new(Self {
            public_key_base64: props.get_or(ECC_PUBLIC_KEY, "").to_string(),
            crypto_provider: props.get_or(CRYPTO_PROVIDER, DEFAULT_CRYPTO_PROVIDER).to_string(),
            sm2_curve_name: props.get_or(SM2_CURVE_NAME, DEFAULT_SM2_CURVE_NAME).to_string(),
            sm2_transformation: props
                .get_or(SM2_CIPHER_TRANSFORMATION, DEFAULT_SM2_CIPHER_TRANSFORMATION)
                .to_string(),
            sm4_transformation: props
                .get_or(SM4_CIPHER_TRANSFORMATION, DEFAULT_SM4_CIPHER_TRANSFORMATION)
                .to_string(),
            session_cache_size: props.get_usize(SESSION_KEY_CACHE_SIZE, DEFAULT_SESSION_KEY_CACHE_SIZE),
            session_cache_buffer_ratio: clamp_ratio(props.get_f64(
                SESSION_KEY_CACHE_BUFFER_PERCENTAGE,
                DEFAULT_SESSION_KEY_CACHE_BUFFER_PERCENTAGE,
            )),
            system_cache_size: props.get_usize(SYSTEM_KEY_CACHE_SIZE, DEFAULT_SYSTEM_KEY_CACHE_SIZE),
            system_cache_buffer_ratio: clamp_ratio(props.get_f64(
                SYSTEM_KEY_CACHE_BUFFER_PERCENTAGE,
                DEFAULT_SYSTEM_KEY_CACHE_BUFFER_PERCENTAGE,
            )),
            system_id_interval_minutes: props
                .get_int(SYSTEM_ID_CHANGE_INTERVAL_MINUTES, DEFAULT_SYSTEM_ID_CHANGE_INTERVAL_MINUTES)
                .max(1),
            secure_data_key: props.get_or(MDC_SECURE_DATA_KEY, DEFAULT_MDC_SECURE_DATA_KEY).to_string(),
            fingerprint_key: props
                .get_or(MDC_PUB_KEY_FINGERPRINT_KEY, DEFAULT_MDC_PUB_KEY_FINGERPRINT_KEY)
                .to_string(),
            trace_id_keys: split_list(props.get_or(MDC_TRACE_ID_KEYS, DEFAULT_MDC_TRACE_ID_KEYS)),
            sensitive_keys: parse_key_set(props.get_or(MASKING_SENSITIVE_KEYS, DEFAULT_MASKING_SENSITIVE_KEYS)),
            token_like_keys: parse_key_set(props.get_or(MASKING_TOKENLIKE_KEYS, DEFAULT_MASKING_TOKENLIKE_KEYS)),
            query_string_enabled: props.get_bool(MASKING_QUERYSTRING_ENABLED, true),
            fallback_enabled: props.get_bool(MASKING_FALLBACK_ENABLED, true),
            address_require_region: props.get_bool(MASKING_ADDRESS_REQUIRE_REGION, true),
            address_require_detail: props.get_bool(MASKING_ADDRESS_REQUIRE_DETAIL, true),
            address_region_keywords: split_list(
                props.get_or(MASKING_ADDRESS_REGION_KEYWORDS, DEFAULT_MASKING_ADDRESS_REGION_KEYWORDS),
            ),
            address_detail_keywords: split_list(
                props.get_or(MASKING_ADDRESS_DETAIL_KEYWORDS, DEFAULT_MASKING_ADDRESS_DETAIL_KEYWORDS),
            ),
            address_exclude_keywords: split_list(props.get_or(MASKING_ADDRESS_EXCLUDE_KEYWORDS, "")),
            high_entropy_enabled: props.get_bool(MASKING_HIGH_ENTROPY_ENABLED, true),
            high_entropy_require_upper_lower_digit: props
                .get_bool(MASKING_HIGH_ENTROPY_REQUIRE_UPPER_LOWER_DIGIT, true),
            token_keep_prefix: props.get_usize(MASKING_TOKEN_KEEP_PREFIX, DEFAULT_MASKING_TOKEN_KEEP_PREFIX),
            token_keep_suffix: props.get_usize(MASKING_TOKEN_KEEP_SUFFIX, DEFAULT_MASKING_TOKEN_KEEP_SUFFIX),
            max_value_length: props.get_usize(MASKING_MAX_VALUE_LENGTH, DEFAULT_MASKING_MAX_VALUE_LENGTH),
            high_entropy_min_length: props
                .get_usize(MASKING_HIGH_ENTROPY_MIN_LENGTH, DEFAULT_MASKING_HIGH_ENTROPY_MIN_LENGTH),
            high_entropy_threshold: props
                .get_f64(MASKING_HIGH_ENTROPY_THRESHOLD, DEFAULT_MASKING_HIGH_ENTROPY_THRESHOLD),
        })
    }

    /// Snapshot with all defaults and no public key (masking works, no envelopes).
    pub fn defaults() -> Arc<Self> {
        Self::from_properties(&PropertyBag::new())
    }

    /// Strong-sensitive key check; matches the normalized key or its
    /// underscore-stripped alias.
    pub fn is_sensitive_key(&self, key: &str) -> bool {
        contains_with_alias(&self.sensitive_keys, key)
    }

    /// Token-like key check; these gate the high-entropy token recognizer.
    pub fn is_token_like_key(&self, key: &str) -> bool {
        contains_with_alias(&self.token_like_keys, key)
    }
}

fn contains_with_alias(set: &HashSet<String>, key: &str) -> bool {
    let k = key.trim().to_lowercase();
    set.contains(&k) || set.contains(&k.replace('_', ""))
}

fn clamp_ratio(v: f64) -> f64 {
    v.clamp(0.0, 1.0)
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split([',', ';'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_key_set(raw: &str) -> HashSet<String> {
    let mut set = HashSet::new();
    for part in raw.split([',', ';']) {
        let p = part.trim();
        if p.is_empty() {
            continue;
        }
        let lower = p.to_lowercase();
        set.insert(lower.replace('_', ""));
        set.insert(lower);
    }
    set
}
