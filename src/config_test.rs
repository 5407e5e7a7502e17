use super::*;

// =============================================================================
// env_parse — unique keys per test to avoid races between parallel tests.
// =============================================================================

#[test]
fn env_parse_missing_returns_default() {
    let val: usize = env_parse("__TEST_WB_EP_MISSING_5531__", 42);
    assert_eq!(val, 42);
}

#[test]
fn env_parse_present_valid() {
    unsafe { std::env::set_var("__TEST_WB_EP_VALID__", " 99 ") };
    let val: u64 = env_parse("__TEST_WB_EP_VALID__", 0);
    assert_eq!(val, 99);
    unsafe { std::env::remove_var("__TEST_WB_EP_VALID__") };
}

#[test]
fn env_parse_invalid_returns_default() {
    unsafe { std::env::set_var("__TEST_WB_EP_INVALID__", "lots") };
    let val: usize = env_parse("__TEST_WB_EP_INVALID__", 7);
    assert_eq!(val, 7);
    unsafe { std::env::remove_var("__TEST_WB_EP_INVALID__") };
}

// =============================================================================
// env_bool
// =============================================================================

#[test]
fn env_bool_true_variants() {
    for (i, val) in ["1", "true", "YES", " on "].iter().enumerate() {
        let key = format!("__TEST_WB_EB_TRUE_{i}__");
        unsafe { std::env::set_var(&key, val) };
        assert_eq!(env_bool(&key), Some(true), "expected true for {val:?}");
        unsafe { std::env::remove_var(&key) };
    }
}

#[test]
fn env_bool_false_variants() {
    for (i, val) in ["0", "false", "No", "off"].iter().enumerate() {
        let key = format!("__TEST_WB_EB_FALSE_{i}__");
        unsafe { std::env::set_var(&key, val) };
        assert_eq!(env_bool(&key), Some(false), "expected false for {val:?}");
        unsafe { std::env::remove_var(&key) };
    }
}

#[test]
fn env_bool_garbage_and_unset_are_none() {
    let key = "__TEST_WB_EB_GARBAGE__";
    unsafe { std::env::set_var(key, "sometimes") };
    assert_eq!(env_bool(key), None);
    unsafe { std::env::remove_var(key) };
    assert_eq!(env_bool("__TEST_WB_EB_NEVER_SET_918__"), None);
}

#[test]
fn config_error_messages_name_the_key() {
    assert_eq!(ConfigError::Missing("DATABASE_URL").to_string(), "DATABASE_URL is required");
    let err = ConfigError::Invalid { key: "PORT", value: "http".into() };
    assert_eq!(err.to_string(), "PORT has an invalid value: \"http\"");
}
