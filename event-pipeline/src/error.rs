use std::path::PathBuf;
use std::time::Duration;

use events_api::Event;
use thiserror::Error;

/// Errors returned by [`EventQueue::push`](crate::EventQueue::push)
#[derive(Debug, Error)]
pub enum QueueError {
    /// The queue stayed at capacity for the whole back-pressure timeout.
    /// The rejected event is handed back so the caller can retry it.
    #[error("Event queue still full after waiting {waited:?}")]
    Full { waited: Duration, event: Box<Event> },
}

impl QueueError {
    /// Recover the event that could not be enqueued
    pub fn into_event(self) -> Event {
        match self {
            QueueError::Full { event, .. } => *event,
        }
    }
}

/// Errors from reading or writing the persisted cursor
#[derive(Debug, Error)]
pub enum CursorStoreError {
    #[error("Failed to read cursor file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write cursor file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
