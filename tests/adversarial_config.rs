//! Adversarial Property-Based Tests for Configuration Parsing
//!
//! # Attack Plan
//!
//! 1. **Numeric Attacks**: Negative numbers, overflow, floats where integers
//!    are expected, scientific notation, unicode digits.
//!
//! 2. **Millisecond Overflow**: Latencies that overflow when scaled to
//!    nanoseconds.
//!
//! 3. **Latency Factors**: NaN, infinity, negative and inverted windows.
//!
//! 4. **Endpoint Strings**: Hostnames, missing ports, IPv6 without brackets.
//!
//! 5. **Output Path**: Null bytes, traversal, very long paths.
//!
//! 6. **Empty vs Missing Fields**: Empty strings fall back to defaults.
//!
//! # Invariants
//!
//! - from_getter never panics on any input
//! - validate() never panics (may return Err)
//! - A config that validates has a latency window containing the target
//! - A config that validates has a non-empty internal frame
//! - Parse errors name the offending variable

use proptest::prelude::*;
use std::collections::HashMap;

use netaudio::config::Config;
use netaudio::packet::MILLISECOND;

// ============================================================================
// ADVERSARIAL GENERATORS
// ============================================================================

fn malformed_number() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("-1".to_string()),
        Just("0".to_string()),
        Just("4294967296".to_string()),
        Just("9223372036854775807".to_string()),
        Just("-9223372036854775808".to_string()),
        Just("200.5".to_string()),
        Just("2e2".to_string()),
        Just("".to_string()),
        Just("   ".to_string()),
        Just("abc".to_string()),
        Just("NaN".to_string()),
        Just("٢٠٠".to_string()),    // Arabic-Indic digits
        Just("２００".to_string()), // Fullwidth digits
        Just("200\x00".to_string()),
        Just(" 200 ".to_string()),
        Just("+200".to_string()),
    ]
}

fn malformed_factor() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("NaN".to_string()),
        Just("inf".to_string()),
        Just("-inf".to_string()),
        Just("1e308".to_string()),
        Just("-1e308".to_string()),
        Just("0".to_string()),
        Just("-0".to_string()),
        Just("0.5".to_string()),
        Just("two".to_string()),
        any::<f64>().prop_map(|f| f.to_string()),
    ]
}

fn malformed_addr() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("0.0.0.0:10001".to_string()),
        Just("[::1]:10001".to_string()),
        Just("::1:10001".to_string()),
        Just("localhost:10001".to_string()),
        Just("127.0.0.1".to_string()),
        Just("127.0.0.1:65536".to_string()),
        Just("127.0.0.1:-1".to_string()),
        Just("256.0.0.1:1".to_string()),
        Just(":10001".to_string()),
        Just("".to_string()),
    ]
}

fn dangerous_path() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("out.raw".to_string()),
        Just("../../../etc/passwd".to_string()),
        Just("out.raw\x00.txt".to_string()),
        Just("./".to_string() + &"a/".repeat(1000) + "out.raw"),
        Just("/nonexistent/dir/out.raw".to_string()),
        Just("   ".to_string()),
        Just("./出力.raw".to_string()),
    ]
}

const KEYS: &[&str] = &[
    "NETAUDIO_SOURCE_ADDR",
    "NETAUDIO_REPAIR_ADDR",
    "NETAUDIO_FEC",
    "NETAUDIO_LATENCY_MS",
    "NETAUDIO_MIN_LATENCY_FACTOR",
    "NETAUDIO_MAX_LATENCY_FACTOR",
    "NETAUDIO_PACKET_LENGTH_MS",
    "NETAUDIO_PAYLOAD_TYPE",
    "NETAUDIO_NO_PLAYBACK_TIMEOUT_MS",
    "NETAUDIO_BROKEN_PLAYBACK_TIMEOUT_MS",
    "NETAUDIO_OUTPUT_RATE",
    "NETAUDIO_FRAME_LENGTH_MS",
    "NETAUDIO_RESAMPLING",
    "NETAUDIO_RESAMPLER",
    "NETAUDIO_TIMING",
    "NETAUDIO_POISON",
    "NETAUDIO_PROFILING",
    "NETAUDIO_BEEP",
    "NETAUDIO_MAX_SESSIONS",
    "NETAUDIO_OUTPUT",
];

fn load(env: &HashMap<&str, String>) -> anyhow::Result<Config> {
    Config::from_getter(|key| env.get(key).cloned())
}

/// Parse and, if that succeeds, validate; checks the post-validation invariants
fn check(env: &HashMap<&str, String>) -> Result<(), TestCaseError> {
    let Ok(config) = load(env) else {
        return Ok(());
    };
    if config.validate().is_ok() {
        let (min, max) = config.session.latency_window();
        let target = config.session.target_latency;
        prop_assert!(min <= target && target <= max, "window [{}, {}] target {}", min, max, target);
        prop_assert!(config.common.frame_size() > 0);
        prop_assert!(config.session.delay_packets() > 0);
    }
    Ok(())
}

// ============================================================================
// INVARIANT: from_getter AND validate NEVER PANIC
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    #[test]
    fn prop_numeric_fields_never_panic(key_index in 0usize..KEYS.len(), value in malformed_number()) {
        let mut env = HashMap::new();
        env.insert(KEYS[key_index], value);
        check(&env)?;
    }

    #[test]
    fn prop_latency_factors_never_panic(min in malformed_factor(), max in malformed_factor()) {
        let mut env = HashMap::new();
        env.insert("NETAUDIO_MIN_LATENCY_FACTOR", min);
        env.insert("NETAUDIO_MAX_LATENCY_FACTOR", max);
        check(&env)?;
    }

    #[test]
    fn prop_addresses_never_panic(source in malformed_addr(), repair in malformed_addr(), fec in prop_oneof![Just("none"), Just("rs"), Just("xor")]) {
        let mut env = HashMap::new();
        env.insert("NETAUDIO_SOURCE_ADDR", source);
        env.insert("NETAUDIO_REPAIR_ADDR", repair);
        env.insert("NETAUDIO_FEC", fec.to_string());
        check(&env)?;
    }

    #[test]
    fn prop_output_path_never_panics(path in dangerous_path()) {
        let mut env = HashMap::new();
        env.insert("NETAUDIO_OUTPUT", path);
        check(&env)?;
    }

    #[test]
    fn prop_arbitrary_values_never_panic(values in proptest::collection::vec(".{0,12}", KEYS.len())) {
        let env: HashMap<&str, String> = KEYS.iter().copied().zip(values).collect();
        check(&env)?;
    }

    #[test]
    fn prop_valid_latency_roundtrips(ms in 1i64..10_000) {
        let mut env = HashMap::new();
        env.insert("NETAUDIO_LATENCY_MS", ms.to_string());
        let config = load(&env).unwrap();
        prop_assert_eq!(config.session.target_latency, ms * MILLISECOND);
        prop_assert!(config.validate().is_ok());
    }
}

// ============================================================================
// SPECIFIC EDGE CASES
// ============================================================================

#[test]
fn test_latency_overflow_is_an_error() {
    let mut env = HashMap::new();
    env.insert("NETAUDIO_LATENCY_MS", "9223372036854775807".to_string());
    let err = load(&env).unwrap_err().to_string();
    assert!(err.contains("NETAUDIO_LATENCY_MS"), "{}", err);
}

#[test]
fn test_empty_values_use_defaults() {
    let env: HashMap<&str, String> = KEYS.iter().map(|&k| (k, String::new())).collect();
    let config = load(&env).expect("empty values should fall back to defaults");
    assert_eq!(config.session.target_latency, 200 * MILLISECOND);
    assert!(config.output_path.is_none());
    assert!(config.repair_addr.is_none());
}

#[test]
fn test_negative_latency_fails_validation() {
    let mut env = HashMap::new();
    env.insert("NETAUDIO_LATENCY_MS", "-5".to_string());
    let config = load(&env).expect("negative numbers parse");
    assert!(config.validate().is_err());
}

#[test]
fn test_nan_factor_fails_validation() {
    let mut env = HashMap::new();
    env.insert("NETAUDIO_MAX_LATENCY_FACTOR", "NaN".to_string());
    let config = load(&env).expect("NaN parses as f64");
    assert!(config.validate().is_err());
}

#[test]
fn test_zero_frame_length_fails_validation() {
    let mut env = HashMap::new();
    env.insert("NETAUDIO_FRAME_LENGTH_MS", "0".to_string());
    let config = load(&env).unwrap();
    let err = config.validate().unwrap_err().to_string();
    assert!(err.contains("Output"), "{}", err);
}

#[test]
fn test_missing_output_directory() {
    let mut env = HashMap::new();
    env.insert("NETAUDIO_OUTPUT", "/nonexistent-netaudio-dir/out.raw".to_string());
    let config = load(&env).unwrap();
    assert!(config.validate().is_err());
}
