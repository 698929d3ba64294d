//! End-to-end tests for the SecureLog pipeline:
//! - masking scenarios across every shape masker
//! - SECURE_DATA round trips back to the collected originals
//! - envelope well-formedness on the wire
//! - idempotence of re-processing masked output
//! - key amortization under concurrent callers

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use securelog::{parse_envelope, RecordProcessor, SecureDataDecrypter, SECURE_DATA_VERSION};
use securelog_core::{ConfigSnapshot, Context, PropertyBag};
use securelog_crypto::sm2::{generate_key_pair, Sm2KeyPair};

struct TestRig {
    processor: RecordProcessor,
    decrypter: SecureDataDecrypter,
    keys: Sm2KeyPair,
}

fn rig() -> TestRig {
    rig_with(|_| {})
}

fn rig_with(tweak: impl FnOnce(&mut PropertyBag)) -> TestRig {
    let keys = generate_key_pair().expect("key pair");
    let mut props = PropertyBag::new();
    props.set("ecc.public.key", keys.public_key_base64.clone());
    tweak(&mut props);
    let config = ConfigSnapshot::from_properties(&props);
    TestRig {
        processor: RecordProcessor::new(config.clone()),
        decrypter: SecureDataDecrypter::from_config(&config),
        keys,
    }
}

fn traced_ctx(trace_id: &str) -> Context {
    let mut ctx = Context::new();
    ctx.put("trace_id", trace_id);
    ctx
}

// ── Scenario 1: JSON record ──────────────────────────────────────────────

#[test]
fn test_json_record_round_trip() {
    let rig = rig();
    let out = rig.processor.process(
        r#"{"user":"alice","password":"p@ssw0rd","mobile":"13800138000"}"#,
        &traced_ctx("trace-1"),
    );
    assert_eq!(out.masked, r#"{"user":"alice","password":"***","mobile":"138****8000"}"#);

    let plaintext = rig
        .decrypter
        .decrypt(out.secure_data.as_ref().unwrap(), &rig.keys.private_key_base64)
        .unwrap();
    assert_eq!(plaintext, r#"{"password":"p@ssw0rd","mobile":"13800138000"}"#);
}

// ── Scenario 2: bare query string ────────────────────────────────────────

#[test]
fn test_query_string_record() {
    let rig = rig();
    let out = rig
        .processor
        .process("password=123456&token=abcDEF1234567890XYZ&type=1", &traced_ctx("t"));
    assert_eq!(out.masked, "password=***&token=abcD***0XYZ&type=1");

    let plaintext = rig
        .decrypter
        .decrypt(out.secure_data.as_ref().unwrap(), &rig.keys.private_key_base64)
        .unwrap();
    assert_eq!(plaintext, r#"{"password":"123456","token":"abcDEF1234567890XYZ"}"#);
}

// ── Scenario 3: URL query ────────────────────────────────────────────────

#[test]
fn test_url_record() {
    let rig = rig();
    let out = rig.processor.process(
        "GET /v1/users?idcard=11010119900101001X&lang=zh HTTP/1.1",
        &traced_ctx("t"),
    );
    assert_eq!(out.masked, "GET /v1/users?idcard=110101********001X&lang=zh HTTP/1.1");

    let plaintext = rig
        .decrypter
        .decrypt(out.secure_data.as_ref().unwrap(), &rig.keys.private_key_base64)
        .unwrap();
    assert_eq!(plaintext, r#"{"query.idcard":"11010119900101001X"}"#);
}

// ── Scenario 4: SQL parameters ───────────────────────────────────────────

#[test]
fn test_sql_parameters_record() {
    let rig = rig();
    let out = rig.processor.process(
        "Preparing: SELECT * FROM t WHERE a=? Parameters: 13800138000(String), 42(Integer), test@x.com(String)",
        &traced_ctx("t"),
    );
    assert!(out
        .masked
        .ends_with("Parameters: 138****8000(String), 42(Integer), t***t@x.com(String)"));

    let plaintext = rig
        .decrypter
        .decrypt(out.secure_data.as_ref().unwrap(), &rig.keys.private_key_base64)
        .unwrap();
    assert_eq!(
        plaintext,
        r#"{"sqlparameters[0]":"13800138000","sqlparameters[2]":"test@x.com"}"#
    );
}

// ── Scenario 5: strict address in plain text ─────────────────────────────

#[test]
fn test_address_record_and_region_gate() {
    let rig = rig();
    let out = rig
        .processor
        .process("用户地址：北京市海淀区中关村大街1号院", &traced_ctx("t"));
    assert_eq!(out.masked, "用户地址：北京***号院");
    assert!(out.secure_data.is_some());

    // without a region keyword the strict gate leaves the text alone
    let out2 = rig.processor.process("收货：中关村大街1号院", &traced_ctx("t"));
    assert_eq!(out2.masked, "收货：中关村大街1号院");
    assert!(out2.secure_data.is_none());
}

// ── Scenario 6: nothing sensitive ────────────────────────────────────────

#[test]
fn test_clean_record_has_no_envelope() {
    let rig = rig();
    let out = rig.processor.process("User-Agent: Mozilla/5.0", &traced_ctx("t"));
    assert_eq!(out.masked, "User-Agent: Mozilla/5.0");
    assert!(out.secure_data.is_none());
    assert!(out.fingerprint.is_none());
}

// ── Structure preservation ───────────────────────────────────────────────

#[test]
fn test_masked_json_keeps_node_structure() {
    let rig = rig();
    let input = r#"{"a":{"password":"x1!aa"},"list":[1,"13800138000",null],"ok":true}"#;
    let out = rig.processor.process(input, &traced_ctx("t"));

    let before: serde_json::Value = serde_json::from_str(input).unwrap();
    let after: serde_json::Value = serde_json::from_str(&out.masked).unwrap();

    fn shape(v: &serde_json::Value) -> serde_json::Value {
        match v {
            serde_json::Value::Object(map) => {
                serde_json::Value::Object(map.iter().map(|(k, v)| (k.clone(), shape(v))).collect())
            }
            serde_json::Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(shape).collect())
            }
            serde_json::Value::String(_) => serde_json::Value::String("s".into()),
            other => other.clone(),
        }
    }
    assert_eq!(shape(&before), shape(&after));
}

// ── Envelope well-formedness ─────────────────────────────────────────────

#[test]
fn test_envelope_layout_on_the_wire() {
    let rig = rig();
    let out = rig
        .processor
        .process(r#"{"password":"p@ssw0rd"}"#, &traced_ctx("t"));
    let secure_data = out.secure_data.unwrap();

    let raw = BASE64.decode(&secure_data).unwrap();
    assert_eq!(raw[0], SECURE_DATA_VERSION);

    let parsed = parse_envelope(&secure_data).unwrap();
    // default transformation is GCM: 12-byte IV, 16-byte tag appended
    assert_eq!(parsed.iv.len(), 12);
    assert!(parsed.ciphertext.len() > 16);
    assert!(!parsed.sm2_wrapped_key.is_empty());
    assert_eq!(
        raw.len(),
        6 + parsed.sm2_wrapped_key.len() + parsed.iv.len() + parsed.ciphertext.len()
    );

    // fingerprint rides along and matches the configured key
    assert_eq!(
        out.fingerprint.as_deref(),
        securelog_crypto::public_key_fingerprint(&rig.keys.public_key_base64).as_deref()
    );
}

#[test]
fn test_cbc_transformation_selects_16_byte_iv() {
    let rig = rig_with(|props| {
        props.set("ecc.sm4.cipher.transformation", "SM4/CBC/PKCS5Padding");
    });
    let out = rig.processor.process(r#"{"password":"p@ssw0rd"}"#, &traced_ctx("t"));
    let parsed = parse_envelope(out.secure_data.as_ref().unwrap()).unwrap();
    assert_eq!(parsed.iv.len(), 16);

    let plaintext = rig
        .decrypter
        .decrypt(out.secure_data.as_ref().unwrap(), &rig.keys.private_key_base64)
        .unwrap();
    assert_eq!(plaintext, r#"{"password":"p@ssw0rd"}"#);
}

// ── Idempotence ──────────────────────────────────────────────────────────

#[test]
fn test_reprocessing_masked_output_yields_no_envelope() {
    let rig = rig();
    let ctx = traced_ctx("t");
    for input in [
        r#"{"user":"alice","password":"p@ssw0rd","mobile":"13800138000"}"#,
        "password=123456&token=abcDEF1234567890XYZ&type=1",
        "GET /v1/users?idcard=11010119900101001X&lang=zh HTTP/1.1",
        "Preparing: q Parameters: 13800138000(String), test@x.com(String)",
        "用户地址：北京市海淀区中关村大街1号院",
    ] {
        let first = rig.processor.process(input, &ctx);
        assert!(first.secure_data.is_some(), "expected envelope for {input}");
        let second = rig.processor.process(&first.masked, &ctx);
        assert!(
            second.secure_data.is_none(),
            "re-masking must not extract values: {input} -> {}",
            first.masked
        );
    }
}

// ── Key amortization ─────────────────────────────────────────────────────

#[test]
fn test_single_flight_per_trace_id() {
    let rig = rig();
    let processor = Arc::new(rig.processor);

    std::thread::scope(|scope| {
        for _ in 0..8 {
            let processor = processor.clone();
            scope.spawn(move || {
                let ctx = traced_ctx("shared-trace");
                for _ in 0..20 {
                    let out = processor.process(r#"{"password":"p@ssw0rd"}"#, &ctx);
                    assert!(out.secure_data.is_some());
                }
            });
        }
    });

    let vault = processor.builder().unwrap().vault();
    assert_eq!(vault.sm2_wrap_count(), 1, "one trace id must cost one SM2 wrap");
    assert_eq!(vault.session_cache().len(), 1);
}

#[test]
fn test_trace_id_key_order_and_system_fallback() {
    let rig = rig();
    let mut ctx = Context::new();
    ctx.put("correlationId", "corr-7");
    ctx.put("requestId", "req-3");
    let out = rig.processor.process(r#"{"password":"x1!aa"}"#, &ctx);
    assert!(out.secure_data.is_some());
    let vault = rig.processor.builder().unwrap().vault();
    // requestId precedes correlationId in the configured order
    assert_eq!(vault.session_cache().len(), 1);
    assert_eq!(vault.system_cache().len(), 0);

    // no trace id at all: the system track takes over
    let out2 = rig.processor.process(r#"{"password":"y2!bb"}"#, &Context::new());
    assert!(out2.secure_data.is_some());
    assert_eq!(vault.system_cache().len(), 1);
}

// ── Context helpers ──────────────────────────────────────────────────────

#[test]
fn test_context_attach_and_clear() {
    let rig = rig();
    let mut ctx = traced_ctx("t");
    let out = rig.processor.process(r#"{"password":"p@ssw0rd"}"#, &ctx);
    rig.processor.apply_to_context(&mut ctx, &out);
    assert!(ctx.get("SECURE_DATA").is_some());
    assert!(ctx.get("PUB_KEY_FINGERPRINT").is_some());

    rig.processor.clear_context(&mut ctx);
    assert!(ctx.get("SECURE_DATA").is_none());
    assert!(ctx.get("PUB_KEY_FINGERPRINT").is_none());

    // a clean record clears any stale fields
    let clean = rig.processor.process("nothing sensitive", &ctx);
    ctx.put("SECURE_DATA", "stale");
    rig.processor.apply_to_context(&mut ctx, &clean);
    assert!(ctx.get("SECURE_DATA").is_none());
}

// ── Decrypter error surface ──────────────────────────────────────────────

#[test]
fn test_decrypter_rejects_bad_inputs() {
    let rig = rig();
    assert!(rig.decrypter.decrypt("", &rig.keys.private_key_base64).is_err());
    assert!(rig.decrypter.decrypt("AAAA", &rig.keys.private_key_base64).is_err());

    let out = rig.processor.process(r#"{"password":"p@ssw0rd"}"#, &traced_ctx("t"));
    let secure_data = out.secure_data.unwrap();
    // wrong private key fails the SM2 unwrap (or the GCM tag), never panics
    let other = generate_key_pair().unwrap();
    assert!(rig.decrypter.decrypt(&secure_data, &other.private_key_base64).is_err());
    assert!(rig.decrypter.decrypt(&secure_data, "garbage-key").is_err());
}

// ── Empty-like values ────────────────────────────────────────────────────

#[test]
fn test_empty_like_values_never_collected() {
    let rig = rig();
    let out = rig.processor.process(
        r#"{"password":"","token":"null","mobile":"   ","email":null}"#,
        &traced_ctx("t"),
    );
    assert_eq!(out.masked, r#"{"password":"","token":"null","mobile":"   ","email":null}"#);
    assert!(out.secure_data.is_none());
}
