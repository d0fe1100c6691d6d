//! Startup configuration: provider selection, credentials, and time policy.
//!
//! # Responsibility
//! - Parse the JSON config file and apply environment overrides.
//! - Validate values before any provider is opened.
//!
//! # Invariants
//! - A validated config always names exactly one provider.
//! - Durations are strictly positive.

use crate::model::day::{host_offset, offset_from_minutes};
use crate::provider::local::DEFAULT_SLOT_KEY;
use crate::store::LoadWindow;
use chrono::FixedOffset;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_TABLE: &str = "couple_records";
pub const DEFAULT_LOAD_WINDOW_DAYS: u32 = 7;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5_000;
const MAX_OFFSET_MINUTES: i32 = 14 * 60;

pub const ENV_REMOTE_URL: &str = "PAIRLOG_REMOTE_URL";
pub const ENV_REMOTE_KEY: &str = "PAIRLOG_REMOTE_KEY";
pub const ENV_LOCAL_PATH: &str = "PAIRLOG_LOCAL_PATH";
pub const ENV_UTC_OFFSET_MINUTES: &str = "PAIRLOG_UTC_OFFSET_MINUTES";

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config json: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

/// Credentials and location of the remote table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteSettings {
    pub base_url: String,
    pub api_key: String,
    #[serde(default = "default_table")]
    pub table: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProviderConfig {
    Local {
        path: PathBuf,
        #[serde(default = "default_slot_key")]
        slot_key: String,
    },
    Remote(RemoteSettings),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PairlogConfig {
    pub provider: ProviderConfig,
    #[serde(default = "default_load_window_days")]
    pub load_window_days: u32,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Shared zone for day boundaries; host offset when unset.
    #[serde(default)]
    pub utc_offset_minutes: Option<i32>,
}

impl PairlogConfig {
    pub fn local(path: impl Into<PathBuf>) -> Self {
        Self::with_provider(ProviderConfig::Local {
            path: path.into(),
            slot_key: default_slot_key(),
        })
    }

    pub fn remote(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self::with_provider(ProviderConfig::Remote(RemoteSettings {
            base_url: base_url.into(),
            api_key: api_key.into(),
            table: default_table(),
        }))
    }

    fn with_provider(provider: ProviderConfig) -> Self {
        Self {
            provider,
            load_window_days: DEFAULT_LOAD_WINDOW_DAYS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            utc_offset_minutes: None,
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    /// Applies `PAIRLOG_*` environment variables on top of file values.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary lookup, then re-validates.
    ///
    /// A remote URL override switches a local config to the remote provider;
    /// a local path override only applies to local configs. On error `self`
    /// is left untouched.
    pub fn apply_overrides_from(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let next = self.overridden(lookup)?;
        next.validate()?;
        *self = next;
        Ok(())
    }

    fn overridden(&self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut next = self.clone();
        if let Some(url) = lookup(ENV_REMOTE_URL) {
            match &mut next.provider {
                ProviderConfig::Remote(settings) => settings.base_url = url,
                ProviderConfig::Local { .. } => {
                    next.provider = ProviderConfig::Remote(RemoteSettings {
                        base_url: url,
                        api_key: String::new(),
                        table: default_table(),
                    });
                }
            }
        }
        if let Some(key) = lookup(ENV_REMOTE_KEY) {
            if let ProviderConfig::Remote(settings) = &mut next.provider {
                settings.api_key = key;
            }
        }
        if let Some(local_path) = lookup(ENV_LOCAL_PATH) {
            if let ProviderConfig::Local { path, .. } = &mut next.provider {
                *path = PathBuf::from(local_path);
            }
        }
        if let Some(raw) = lookup(ENV_UTC_OFFSET_MINUTES) {
            let minutes = raw.trim().parse::<i32>().map_err(|_| {
                ConfigError::Invalid(format!("{ENV_UTC_OFFSET_MINUTES} must be an integer, got `{raw}`"))
            })?;
            next.utc_offset_minutes = Some(minutes);
        }
        Ok(next)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.load_window_days == 0 {
            return Err(ConfigError::Invalid(
                "load_window_days must be at least 1".to_string(),
            ));
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_ms must be positive".to_string(),
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "poll_interval_ms must be positive".to_string(),
            ));
        }
        if let Some(minutes) = self.utc_offset_minutes {
            if !(-MAX_OFFSET_MINUTES..=MAX_OFFSET_MINUTES).contains(&minutes) {
                return Err(ConfigError::Invalid(format!(
                    "utc_offset_minutes out of range: {minutes}"
                )));
            }
        }

        match &self.provider {
            ProviderConfig::Local { path, slot_key } => {
                if path.as_os_str().is_empty() {
                    return Err(ConfigError::Invalid("local path cannot be empty".to_string()));
                }
                if slot_key.trim().is_empty() {
                    return Err(ConfigError::Invalid("slot_key cannot be empty".to_string()));
                }
            }
            ProviderConfig::Remote(settings) => {
                let url = settings.base_url.trim();
                if !(url.starts_with("https://") || url.starts_with("http://")) {
                    return Err(ConfigError::Invalid(format!(
                        "remote base_url must be http(s), got `{url}`"
                    )));
                }
                if settings.api_key.trim().is_empty() {
                    return Err(ConfigError::Invalid("remote api_key cannot be empty".to_string()));
                }
                if settings.table.trim().is_empty() {
                    return Err(ConfigError::Invalid("remote table cannot be empty".to_string()));
                }
            }
        }
        Ok(())
    }

    pub fn load_window(&self) -> LoadWindow {
        LoadWindow::days(self.load_window_days)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Offset every "today" computation uses.
    pub fn shared_offset(&self) -> FixedOffset {
        self.utc_offset_minutes
            .and_then(offset_from_minutes)
            .unwrap_or_else(host_offset)
    }
}

fn default_table() -> String {
    DEFAULT_TABLE.to_string()
}

fn default_slot_key() -> String {
    DEFAULT_SLOT_KEY.to_string()
}

fn default_load_window_days() -> u32 {
    DEFAULT_LOAD_WINDOW_DAYS
}

fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

#[cfg(test)]
mod tests {
    use super::{
        ConfigError, PairlogConfig, ProviderConfig, ENV_LOCAL_PATH, ENV_REMOTE_KEY, ENV_REMOTE_URL,
        ENV_UTC_OFFSET_MINUTES,
    };
    use std::collections::HashMap;

    #[test]
    fn remote_config_parses_with_defaults() {
        let config = PairlogConfig::from_json_str(
            r#"{
                "provider": {
                    "kind": "remote",
                    "base_url": "https://demo.supabase.co",
                    "api_key": "sb_publishable_demo"
                },
                "utc_offset_minutes": 480
            }"#,
        )
        .expect("remote config should parse");

        match &config.provider {
            ProviderConfig::Remote(settings) => assert_eq!(settings.table, "couple_records"),
            other => panic!("unexpected provider: {other:?}"),
        }
        assert_eq!(config.load_window_days, 7);
        assert_eq!(config.shared_offset().local_minus_utc(), 8 * 3600);
    }

    #[test]
    fn unknown_fields_and_bad_values_are_rejected() {
        let unknown = PairlogConfig::from_json_str(
            r#"{"provider": {"kind": "local", "path": "/tmp/j.db"}, "colour": "pink"}"#,
        );
        assert!(matches!(unknown, Err(ConfigError::Parse(_))));

        let zero_window = PairlogConfig::from_json_str(
            r#"{"provider": {"kind": "local", "path": "/tmp/j.db"}, "load_window_days": 0}"#,
        );
        assert!(matches!(zero_window, Err(ConfigError::Invalid(_))));

        let bad_url = PairlogConfig::from_json_str(
            r#"{"provider": {"kind": "remote", "base_url": "ftp://x", "api_key": "k"}}"#,
        );
        assert!(matches!(bad_url, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn overrides_switch_local_config_to_remote() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (ENV_REMOTE_URL, "https://override.example"),
            (ENV_REMOTE_KEY, "override-key"),
        ]);
        let mut config = PairlogConfig::local("/tmp/journal.db");
        config
            .apply_overrides_from(|key| vars.get(key).map(|value| value.to_string()))
            .expect("overrides should validate");

        match config.provider {
            ProviderConfig::Remote(settings) => {
                assert_eq!(settings.base_url, "https://override.example");
                assert_eq!(settings.api_key, "override-key");
            }
            other => panic!("unexpected provider: {other:?}"),
        }
    }

    #[test]
    fn remote_url_override_without_key_fails_validation() {
        let mut config = PairlogConfig::local("/tmp/journal.db");
        let err = config
            .apply_overrides_from(|key| {
                (key == ENV_REMOTE_URL).then(|| "https://override.example".to_string())
            })
            .expect_err("missing key should be rejected");
        assert!(err.to_string().contains("api_key"));
        assert_eq!(config, PairlogConfig::local("/tmp/journal.db"));
    }

    #[test]
    fn bad_offset_override_keeps_previous_values() {
        let mut config = PairlogConfig::local("/tmp/journal.db");
        config.utc_offset_minutes = Some(60);
        let before = config.clone();

        let err = config
            .apply_overrides_from(|key| match key {
                ENV_LOCAL_PATH => Some("/tmp/other.db".to_string()),
                ENV_UTC_OFFSET_MINUTES => Some("east".to_string()),
                _ => None,
            })
            .expect_err("non-numeric offset should be rejected");
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert_eq!(config, before);
    }
}
