use crate::error::PlaybackError;
use crate::model::{PlaybackTarget, Track};

/// Result of asking the provider to queue a track
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnqueueResult {
    Queued,
    /// No device has an active session; retryable later
    NoActiveDevice,
    /// The request never reached the provider; retryable later
    Unreachable(String),
    /// The provider refused the request; not retried
    Rejected(String),
}

/// Music service able to search tracks and queue them on a device
pub trait PlaybackProvider: Send + Sync {
    /// Best match for `query`, if any
    fn search(&self, query: &str) -> Result<Option<Track>, PlaybackError>;

    /// The device currently playing, if any
    fn active_device(&self) -> Result<Option<PlaybackTarget>, PlaybackError>;

    /// Append `track` to the play queue of `target`
    fn enqueue(&self, track: &Track, target: &PlaybackTarget) -> EnqueueResult;
}
