//! Error types for the tipdj application crate

use std::path::PathBuf;

use thiserror::Error;

/// Problems with the settings file; all of them stop startup
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Missing required setting {0}")]
    Missing(&'static str),

    #[error("Invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Failure to handle a single event
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Event handler panicked: {0}")]
    Panicked(String),
}

/// Failure to write an event to the archive
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Archive I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Failure to set up logging
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Failed to initialize tracing subscriber: {0}")]
    TracingInit(String),

    #[error("Failed to open log file {path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Startup failures; nothing is running yet when one of these is returned
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Events API client error: {0}")]
    EventsApi(#[from] events_api::EventsApiError),

    #[error("Extractor setup failed: {0}")]
    Extractor(#[from] song_dispatch::ExtractError),

    #[error("Playback provider setup failed: {0}")]
    Playback(#[from] song_dispatch::PlaybackError),

    #[error("Deferred queue unavailable: {0}")]
    Deferred(#[from] song_dispatch::DeferredError),

    #[error("Archive unavailable: {0}")]
    Archive(#[from] ArchiveError),

    #[error("Cursor store unreadable: {0}")]
    Cursor(#[from] event_pipeline::CursorStoreError),

    #[error("Failed to start {name} thread: {source}")]
    Thread {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("A pipeline thread panicked")]
    Panicked,
}

pub type Result<T> = std::result::Result<T, AppError>;
