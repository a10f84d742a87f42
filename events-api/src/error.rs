//! Error types for the events API client

use thiserror::Error;

/// Errors that can occur while fetching a page of events
#[derive(Debug, Error)]
pub enum EventsApiError {
    /// Transport-level failure (DNS, connect, timeout, body read)
    #[error("Network/HTTP error: {0}")]
    Network(String),

    /// The API answered with something other than 200 OK
    #[error("Events API returned HTTP {0}")]
    Status(u16),

    /// The body was not a well-formed events page
    #[error("Malformed events page: {0}")]
    Malformed(String),

    /// A cursor URL that cannot be requested at all
    #[error("Invalid cursor URL '{url}': {reason}")]
    InvalidCursor { url: String, reason: String },
}

impl EventsApiError {
    /// Whether retrying the same cursor later can succeed
    ///
    /// Everything except an unparseable cursor is transient from the poller's
    /// point of view.
    pub fn is_transient(&self) -> bool {
        !matches!(self, EventsApiError::InvalidCursor { .. })
    }
}

/// Convenience Result type alias for events API operations
pub type Result<T> = std::result::Result<T, EventsApiError>;
