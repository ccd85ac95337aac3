use std::path::PathBuf;
use std::time::Duration;

use config::{Environment, Map};
use serde::Deserialize;

use crate::errors::DigestError;

pub const DEFAULT_FETCH_LIMIT: u32 = 10;
pub const DEFAULT_MAX_CHUNK_LENGTH: usize = 4000;
pub const DEFAULT_CHUNK_DELAY_MS: u64 = 1000;
pub const DEFAULT_CALL_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TEMPERATURE: f32 = 0.5;
pub const DEFAULT_CURSOR_STORE: &str = "sqlite://digest.db";

/// Where channel cursors are persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CursorStoreLocation {
    Sqlite(PathBuf),
    Ssm { prefix: String },
    Memory,
}

impl CursorStoreLocation {
    /// Parses `sqlite://<path>`, `sqlite:///<path>`, `ssm:<prefix>` or `memory`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for an unknown scheme or an empty path/prefix.
    pub fn parse(raw: &str) -> Result<Self, DigestError> {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("memory") {
            return Ok(Self::Memory);
        }
        if let Some(rest) = raw.strip_prefix("sqlite://") {
            // sqlite:///abs/path keeps its leading slash, sqlite://rel.db stays relative
            if rest.is_empty() {
                return Err(DigestError::ConfigError(
                    "DIGEST_CURSOR_STORE: sqlite path is empty".to_string(),
                ));
            }
            return Ok(Self::Sqlite(PathBuf::from(rest)));
        }
        if let Some(prefix) = raw.strip_prefix("ssm:") {
            if prefix.is_empty() {
                return Err(DigestError::ConfigError(
                    "DIGEST_CURSOR_STORE: ssm prefix is empty".to_string(),
                ));
            }
            return Ok(Self::Ssm {
                prefix: prefix.to_string(),
            });
        }
        Err(DigestError::ConfigError(format!(
            "DIGEST_CURSOR_STORE: unsupported location '{raw}'"
        )))
    }
}

/// Environment variables as `config` sees them: names lowercased, no
/// nesting, `DIGEST_CHANNELS` split on commas.
#[derive(Debug, Deserialize)]
struct EnvSettings {
    digest_channels: Vec<String>,
    digest_output_channel: String,
    #[serde(default = "default_fetch_limit")]
    digest_fetch_limit: u32,
    #[serde(default = "default_max_chunk_length")]
    digest_max_chunk_length: usize,
    #[serde(default = "default_chunk_delay_ms")]
    digest_chunk_delay_ms: u64,
    #[serde(default = "default_call_timeout_secs")]
    digest_call_timeout_secs: u64,
    #[serde(default = "default_cursor_store")]
    digest_cursor_store: String,
    #[serde(default)]
    digest_system_prompt: Option<String>,
    slack_bot_token: String,
    openai_api_key: String,
    #[serde(default)]
    openai_org_id: Option<String>,
    #[serde(default = "default_openai_model")]
    openai_model: String,
    #[serde(default = "default_temperature")]
    openai_temperature: f32,
}

fn default_fetch_limit() -> u32 {
    DEFAULT_FETCH_LIMIT
}

fn default_max_chunk_length() -> usize {
    DEFAULT_MAX_CHUNK_LENGTH
}

fn default_chunk_delay_ms() -> u64 {
    DEFAULT_CHUNK_DELAY_MS
}

fn default_call_timeout_secs() -> u64 {
    DEFAULT_CALL_TIMEOUT_SECS
}

fn default_cursor_store() -> String {
    DEFAULT_CURSOR_STORE.to_string()
}

fn default_openai_model() -> String {
    DEFAULT_OPENAI_MODEL.to_string()
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub channels: Vec<String>,
    pub output_channel: String,
    pub fetch_limit: u32,
    pub max_chunk_length: usize,
    pub chunk_delay: Duration,
    pub call_timeout: Duration,
    pub cursor_store: CursorStoreLocation,
    pub system_prompt: Option<String>,
    pub slack_bot_token: String,
    pub openai_api_key: String,
    pub openai_org_id: Option<String>,
    pub openai_model: String,
    pub openai_temperature: f32,
}

impl AppConfig {
    /// # Errors
    ///
    /// Returns `ConfigError` naming the first missing or malformed variable.
    pub fn from_env() -> Result<Self, DigestError> {
        Self::from_environment(environment())
    }

    /// Builds the configuration from an explicit variable map instead of the
    /// process environment. Keys are the usual variable names.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` naming the first missing or malformed variable.
    pub fn from_vars(vars: Map<String, String>) -> Result<Self, DigestError> {
        Self::from_environment(environment().source(Some(vars)))
    }

    fn from_environment(env: Environment) -> Result<Self, DigestError> {
        let settings = config::Config::builder()
            .add_source(env)
            .build()
            .and_then(|c| c.try_deserialize::<EnvSettings>())
            .map_err(|e| DigestError::ConfigError(e.to_string()))?;

        Self::validate(settings)
    }

    fn validate(s: EnvSettings) -> Result<Self, DigestError> {
        let channels = normalize_channels(s.digest_channels);
        if channels.is_empty() {
            return Err(DigestError::ConfigError(
                "DIGEST_CHANNELS: no channel identifiers given".to_string(),
            ));
        }

        let output_channel = s.digest_output_channel.trim().to_string();
        if output_channel.is_empty() {
            return Err(DigestError::ConfigError(
                "DIGEST_OUTPUT_CHANNEL: not set".to_string(),
            ));
        }
        if s.slack_bot_token.trim().is_empty() {
            return Err(DigestError::ConfigError("SLACK_BOT_TOKEN: not set".to_string()));
        }
        if s.openai_api_key.trim().is_empty() {
            return Err(DigestError::ConfigError("OPENAI_API_KEY: not set".to_string()));
        }

        if s.digest_fetch_limit == 0 {
            return Err(DigestError::ConfigError(
                "DIGEST_FETCH_LIMIT: must be greater than zero".to_string(),
            ));
        }
        if s.digest_max_chunk_length == 0 {
            return Err(DigestError::ConfigError(
                "DIGEST_MAX_CHUNK_LENGTH: must be greater than zero".to_string(),
            ));
        }
        if s.digest_call_timeout_secs == 0 {
            return Err(DigestError::ConfigError(
                "DIGEST_CALL_TIMEOUT_SECS: must be greater than zero".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&s.openai_temperature) {
            return Err(DigestError::ConfigError(format!(
                "OPENAI_TEMPERATURE: {} is outside 0.0..=2.0",
                s.openai_temperature
            )));
        }

        Ok(Self {
            channels,
            output_channel,
            fetch_limit: s.digest_fetch_limit,
            max_chunk_length: s.digest_max_chunk_length,
            chunk_delay: Duration::from_millis(s.digest_chunk_delay_ms),
            call_timeout: Duration::from_secs(s.digest_call_timeout_secs),
            cursor_store: CursorStoreLocation::parse(&s.digest_cursor_store)?,
            system_prompt: s.digest_system_prompt.filter(|p| !p.trim().is_empty()),
            slack_bot_token: s.slack_bot_token,
            openai_api_key: s.openai_api_key,
            openai_org_id: s.openai_org_id.filter(|o| !o.trim().is_empty()),
            openai_model: s.openai_model,
            openai_temperature: s.openai_temperature,
        })
    }
}

fn environment() -> Environment {
    Environment::default()
        .try_parsing(true)
        .ignore_empty(true)
        .list_separator(",")
        .with_list_parse_key("digest_channels")
}

/// Trims channel identifiers and drops blanks and repeats, keeping the
/// first-seen order.
fn normalize_channels(raw: Vec<String>) -> Vec<String> {
    let mut channels: Vec<String> = Vec::new();
    for id in raw {
        let id = id.trim();
        if !id.is_empty() && !channels.iter().any(|c| c == id) {
            channels.push(id.to_string());
        }
    }
    channels
}
