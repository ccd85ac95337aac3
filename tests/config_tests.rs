use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use channel_digest::core::config::{AppConfig, CursorStoreLocation};
use channel_digest::errors::DigestError;

fn base_env() -> HashMap<&'static str, String> {
    HashMap::from([
        ("DIGEST_CHANNELS", "news, markets".to_string()),
        ("DIGEST_OUTPUT_CHANNEL", "#digest".to_string()),
        ("SLACK_BOT_TOKEN", "xoxb-test".to_string()),
        ("OPENAI_API_KEY", "sk-test".to_string()),
    ])
}

fn load(env: &HashMap<&'static str, String>) -> Result<AppConfig, DigestError> {
    let vars: config::Map<String, String> = env
        .iter()
        .map(|(k, v)| ((*k).to_string(), v.clone()))
        .collect();
    AppConfig::from_vars(vars)
}

#[test]
fn test_defaults_apply() {
    let config = load(&base_env()).unwrap();

    assert_eq!(config.channels, vec!["news", "markets"]);
    assert_eq!(config.output_channel, "#digest");
    assert_eq!(config.fetch_limit, 10);
    assert_eq!(config.max_chunk_length, 4000);
    assert_eq!(config.chunk_delay, Duration::from_millis(1000));
    assert_eq!(config.call_timeout, Duration::from_secs(120));
    assert_eq!(
        config.cursor_store,
        CursorStoreLocation::Sqlite(PathBuf::from("digest.db"))
    );
    assert_eq!(config.openai_model, "gpt-4o-mini");
    assert!((config.openai_temperature - 0.5).abs() < f32::EPSILON);
    assert!(config.system_prompt.is_none());
    assert!(config.openai_org_id.is_none());
}

#[test]
fn test_overrides_are_read() {
    let mut env = base_env();
    env.insert("DIGEST_FETCH_LIMIT", "25".to_string());
    env.insert("DIGEST_MAX_CHUNK_LENGTH", "2000".to_string());
    env.insert("DIGEST_CHUNK_DELAY_MS", "0".to_string());
    env.insert("DIGEST_CURSOR_STORE", "ssm:/digest/cursors".to_string());
    env.insert("DIGEST_SYSTEM_PROMPT", "Be brief.".to_string());
    env.insert("OPENAI_MODEL", "gpt-4.1".to_string());
    env.insert("OPENAI_TEMPERATURE", "0".to_string());

    let config = load(&env).unwrap();

    assert_eq!(config.fetch_limit, 25);
    assert_eq!(config.max_chunk_length, 2000);
    assert!(config.chunk_delay.is_zero());
    assert_eq!(
        config.cursor_store,
        CursorStoreLocation::Ssm {
            prefix: "/digest/cursors".to_string()
        }
    );
    assert_eq!(config.system_prompt.as_deref(), Some("Be brief."));
    assert_eq!(config.openai_model, "gpt-4.1");
}

#[test]
fn test_missing_required_variable_is_named() {
    for key in [
        "DIGEST_CHANNELS",
        "DIGEST_OUTPUT_CHANNEL",
        "SLACK_BOT_TOKEN",
        "OPENAI_API_KEY",
    ] {
        let mut env = base_env();
        env.remove(key);
        match load(&env) {
            Err(DigestError::ConfigError(msg)) => {
                assert!(msg.to_lowercase().contains(&key.to_lowercase()), "{msg}");
            }
            other => panic!("expected ConfigError for {key}, got {other:?}"),
        }
    }
}

#[test]
fn test_invalid_values_are_rejected() {
    for (key, value) in [
        ("DIGEST_FETCH_LIMIT", "0"),
        ("DIGEST_FETCH_LIMIT", "ten"),
        ("DIGEST_MAX_CHUNK_LENGTH", "0"),
        ("DIGEST_CALL_TIMEOUT_SECS", "0"),
        ("OPENAI_TEMPERATURE", "3.5"),
        ("DIGEST_CURSOR_STORE", "redis://localhost"),
        ("DIGEST_CHANNELS", " , "),
    ] {
        let mut env = base_env();
        env.insert(key, value.to_string());
        assert!(
            matches!(load(&env), Err(DigestError::ConfigError(_))),
            "{key}={value} should be rejected"
        );
    }
}

#[test]
fn test_single_channel_and_blank_values() {
    let mut env = base_env();
    env.insert("DIGEST_CHANNELS", "C0123".to_string());
    env.insert("OPENAI_ORG_ID", String::new());
    env.insert("DIGEST_SYSTEM_PROMPT", "Use bullets, keep it short.".to_string());

    let config = load(&env).unwrap();

    assert_eq!(config.channels, vec!["C0123"]);
    assert!(config.openai_org_id.is_none());
    // Only the channel list is split on commas
    assert_eq!(
        config.system_prompt.as_deref(),
        Some("Use bullets, keep it short.")
    );
}

#[test]
fn test_channel_list_is_trimmed_and_deduplicated() {
    let mut env = base_env();
    env.insert("DIGEST_CHANNELS", " news, #markets ,,news".to_string());

    let config = load(&env).unwrap();

    assert_eq!(config.channels, vec!["news", "#markets"]);
}
