//! Error types for title extraction, playback and deferred storage

use thiserror::Error;

/// Errors from a [`TitleExtractor`](crate::TitleExtractor) call
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Network/HTTP error: {0}")]
    Network(String),

    #[error("Extraction service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Unexpected extraction reply: {0}")]
    Malformed(String),
}

/// Errors from a [`PlaybackProvider`](crate::PlaybackProvider) call
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("Network/HTTP error: {0}")]
    Network(String),

    /// Access token could not be obtained or was refused
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Playback provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Unexpected provider reply: {0}")]
    Malformed(String),
}

/// Errors from a [`DeferredQueue`](crate::DeferredQueue) backend
#[derive(Debug, Error)]
pub enum DeferredError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Failed to prepare deferred store at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type DeferredResult<T> = std::result::Result<T, DeferredError>;
