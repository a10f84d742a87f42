//! Application settings
//!
//! Settings are read once from a TOML file, validated, and then passed by
//! value into the components that need them. Nothing reads configuration
//! from global state after startup.
//!
//! ```toml
//! [events_api]
//! url = "https://eventsapi.example.com/events/streamer/token/"
//! requests_per_minute = 1000
//!
//! [general]
//! tip_multiple = 27
//!
//! [openai]
//! api_key = "sk-..."
//!
//! [spotify]
//! client_id = "..."
//! client_secret = "..."
//! refresh_token = "..."
//! ```
//!
//! Secrets may instead come from `TIPDJ_OPENAI_API_KEY`,
//! `TIPDJ_SPOTIFY_CLIENT_SECRET` and `TIPDJ_SPOTIFY_REFRESH_TOKEN`, which take
//! precedence over the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use event_pipeline::{OverflowPolicy, DEFAULT_CAPACITY};
use events_api::Cursor;
use serde::Deserialize;

use crate::error::ConfigError;

pub const ENV_OPENAI_API_KEY: &str = "TIPDJ_OPENAI_API_KEY";
pub const ENV_SPOTIFY_CLIENT_SECRET: &str = "TIPDJ_SPOTIFY_CLIENT_SECRET";
pub const ENV_SPOTIFY_REFRESH_TOKEN: &str = "TIPDJ_SPOTIFY_REFRESH_TOKEN";

/// Complete application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub events_api: EventsApiSettings,
    #[serde(default)]
    pub general: GeneralSettings,
    #[serde(default)]
    pub queue: QueueSettings,
    #[serde(default)]
    pub openai: OpenAiSettings,
    #[serde(default)]
    pub spotify: SpotifySettings,
    #[serde(default)]
    pub deferred: DeferredSettings,
    #[serde(default)]
    pub archive: ArchiveSettings,
    #[serde(default)]
    pub cursor: CursorSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventsApiSettings {
    /// First page of the events feed, including the access token
    pub url: String,

    /// Request budget used to derive the polling interval
    ///
    /// Default: 1000
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,

    /// Default: 30
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneralSettings {
    /// Tokens per requested song
    ///
    /// Default: 27
    #[serde(default = "default_tip_multiple")]
    pub tip_multiple: u32,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            tip_multiple: default_tip_multiple(),
        }
    }
}

/// What to do when the event queue is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowSetting {
    #[default]
    Block,
    DropOldest,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueSettings {
    /// Default: 1000
    #[serde(default = "default_queue_capacity")]
    pub capacity: usize,

    /// Default: block
    #[serde(default)]
    pub overflow: OverflowSetting,

    /// How long a blocked push waits for room
    ///
    /// Default: 5000
    #[serde(default = "default_push_timeout_ms")]
    pub push_timeout_ms: u64,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            capacity: default_queue_capacity(),
            overflow: OverflowSetting::default(),
            push_timeout_ms: default_push_timeout_ms(),
        }
    }
}

impl QueueSettings {
    pub fn policy(&self) -> OverflowPolicy {
        match self.overflow {
            OverflowSetting::Block => OverflowPolicy::Block {
                timeout: Duration::from_millis(self.push_timeout_ms),
            },
            OverflowSetting::DropOldest => OverflowPolicy::DropOldest,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiSettings {
    #[serde(default)]
    pub api_key: String,

    /// Default: gpt-4o
    #[serde(default = "default_openai_model")]
    pub model: String,

    #[serde(default = "default_openai_url")]
    pub base_url: String,

    /// Default: 30
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_openai_model(),
            base_url: default_openai_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotifySettings {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    /// Long-lived token from the authorization-code flow
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default = "default_spotify_api_url")]
    pub api_url: String,
    #[serde(default = "default_spotify_accounts_url")]
    pub accounts_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for SpotifySettings {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            refresh_token: String::new(),
            api_url: default_spotify_api_url(),
            accounts_url: default_spotify_accounts_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeferredSettings {
    /// Keep requests that found no active device for a later retry
    ///
    /// Default: true
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// SQLite file holding deferred requests
    ///
    /// Default: tipdj-deferred.db
    #[serde(default = "default_deferred_path")]
    pub database_path: PathBuf,
}

impl Default for DeferredSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            database_path: default_deferred_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveSettings {
    /// Default: false
    #[serde(default)]
    pub enabled: bool,

    /// Default: events.jsonl
    #[serde(default = "default_archive_path")]
    pub path: PathBuf,
}

impl Default for ArchiveSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            path: default_archive_path(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CursorSettings {
    /// File remembering the next page between runs; not persisted when unset
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    /// Default: info
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file in addition to stderr
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// Rotate the log file at this size
    ///
    /// Default: 10
    #[serde(default = "default_log_max_size_mb")]
    pub max_size_mb: u64,

    /// Rotated files to keep
    ///
    /// Default: 5
    #[serde(default = "default_log_backup_count")]
    pub backup_count: u32,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
            max_size_mb: default_log_max_size_mb(),
            backup_count: default_log_backup_count(),
        }
    }
}

fn default_requests_per_minute() -> u32 {
    1000
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_tip_multiple() -> u32 {
    27
}

fn default_queue_capacity() -> usize {
    DEFAULT_CAPACITY
}

fn default_push_timeout_ms() -> u64 {
    5000
}

fn default_openai_model() -> String {
    song_dispatch::DEFAULT_MODEL.to_string()
}

fn default_openai_url() -> String {
    song_dispatch::DEFAULT_OPENAI_URL.to_string()
}

fn default_spotify_api_url() -> String {
    song_dispatch::DEFAULT_API_URL.to_string()
}

fn default_spotify_accounts_url() -> String {
    song_dispatch::DEFAULT_ACCOUNTS_URL.to_string()
}

fn default_true() -> bool {
    true
}

fn default_deferred_path() -> PathBuf {
    PathBuf::from("tipdj-deferred.db")
}

fn default_archive_path() -> PathBuf {
    PathBuf::from("events.jsonl")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_max_size_mb() -> u64 {
    10
}

fn default_log_backup_count() -> u32 {
    5
}

impl Settings {
    /// Read, apply environment overrides and validate
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let mut settings = Self::from_toml_str(&contents)?;
        settings.apply_env_overrides();
        settings.validate()?;
        Ok(settings)
    }

    /// Parse without overrides or validation
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Replace secrets with values from `lookup`; empty values are ignored
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let targets = [
            (ENV_OPENAI_API_KEY, &mut self.openai.api_key),
            (ENV_SPOTIFY_CLIENT_SECRET, &mut self.spotify.client_secret),
            (ENV_SPOTIFY_REFRESH_TOKEN, &mut self.spotify.refresh_token),
        ];

        for (key, target) in targets {
            if let Some(value) = lookup(key).filter(|v| !v.trim().is_empty()) {
                *target = value;
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        Cursor::parse(&self.events_api.url).map_err(|e| ConfigError::Invalid {
            key: "events_api.url",
            reason: e.to_string(),
        })?;

        if self.events_api.requests_per_minute == 0 {
            return Err(ConfigError::Invalid {
                key: "events_api.requests_per_minute",
                reason: "must be at least 1".to_string(),
            });
        }

        if self.general.tip_multiple == 0 {
            return Err(ConfigError::Invalid {
                key: "general.tip_multiple",
                reason: "must be at least 1".to_string(),
            });
        }

        if self.queue.capacity == 0 {
            return Err(ConfigError::Invalid {
                key: "queue.capacity",
                reason: "must be at least 1".to_string(),
            });
        }

        let required = [
            ("openai.api_key", &self.openai.api_key),
            ("spotify.client_id", &self.spotify.client_id),
            ("spotify.client_secret", &self.spotify.client_secret),
            ("spotify.refresh_token", &self.spotify.refresh_token),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::Missing(key));
            }
        }

        match self.logging.level.to_lowercase().as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => {}
            other => {
                return Err(ConfigError::Invalid {
                    key: "logging.level",
                    reason: format!(
                        "'{}' is not one of error, warn, info, debug, trace",
                        other
                    ),
                })
            }
        }

        Ok(())
    }

    pub fn start_cursor(&self) -> Result<Cursor, ConfigError> {
        Cursor::parse(&self.events_api.url).map_err(|e| ConfigError::Invalid {
            key: "events_api.url",
            reason: e.to_string(),
        })
    }

    pub fn polling_interval(&self) -> Duration {
        event_pipeline::polling_interval(self.events_api.requests_per_minute)
    }

    pub fn events_timeout(&self) -> Duration {
        Duration::from_secs(self.events_api.request_timeout_secs)
    }
}
