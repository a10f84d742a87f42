use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A song asked for in a tip message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongRequest {
    /// Performing artist; empty when only free text is known
    pub artist: String,
    /// Song title, or the raw tip message for a literal request
    pub source_text: String,
    /// `false` when the request was synthesized from the raw message
    pub extractor_confident: bool,
}

impl SongRequest {
    pub fn new(artist: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            artist: artist.into(),
            source_text: title.into(),
            extractor_confident: true,
        }
    }

    /// Use the whole message as the search query
    pub fn literal(message: impl Into<String>) -> Self {
        Self {
            artist: String::new(),
            source_text: message.into(),
            extractor_confident: false,
        }
    }

    /// Query string handed to the playback provider's search
    pub fn search_query(&self) -> String {
        if self.artist.trim().is_empty() {
            self.source_text.trim().to_string()
        } else {
            format!("{} - {}", self.artist.trim(), self.source_text.trim())
        }
    }
}

impl fmt::Display for SongRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.artist.is_empty() {
            write!(f, "\"{}\"", self.source_text)
        } else {
            write!(f, "{} -- {}", self.artist, self.source_text)
        }
    }
}

/// Storage-assigned identifier of a deferred request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeferredId(pub u64);

impl fmt::Display for DeferredId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A request waiting for a playback device to become active
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredEntry {
    pub id: DeferredId,
    pub request: SongRequest,
    pub enqueued_at: DateTime<Utc>,
}

/// Track resolved by a provider search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    /// Provider URI used to enqueue the track
    pub uri: String,
    pub name: String,
    pub artists: Vec<String>,
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {} ({})", self.artists.join(", "), self.name, self.uri)
    }
}

/// Device currently able to play
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackTarget {
    pub device_id: String,
    pub name: String,
}
