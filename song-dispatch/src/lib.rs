//! Song request resolution and delivery
//!
//! Takes a tip message from text to a track in the streamer's play queue:
//!
//! 1. A [`TitleExtractor`] turns the message into [`SongRequest`]s.
//! 2. The [`PlaybackDispatcher`] searches each request with a
//!    [`PlaybackProvider`] and queues the match on the active device.
//! 3. Requests that find no active device are stored in a [`DeferredQueue`]
//!    and retried when the next song tip arrives.
//!
//! Provider rejections (expired credentials, rate limits, missing Premium) are
//! logged and dropped rather than deferred, so a request the provider refuses
//! is never retried forever.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use song_dispatch::{
//!     OpenAiTitleExtractor, PlaybackDispatcher, SpotifyCredentials, SpotifyProvider,
//!     SqliteDeferredQueue, TitleExtractor,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let timeout = Duration::from_secs(30);
//! let extractor = OpenAiTitleExtractor::new("sk-...", timeout)?;
//! let provider = SpotifyProvider::new(
//!     SpotifyCredentials {
//!         client_id: "id".into(),
//!         client_secret: "secret".into(),
//!         refresh_token: "refresh".into(),
//!     },
//!     timeout,
//! )?;
//! let dispatcher = PlaybackDispatcher::new(Arc::new(provider))
//!     .with_deferred_queue(Arc::new(SqliteDeferredQueue::open("deferred.db")?));
//!
//! for request in extractor.find_titles("play Bohemian Rhapsody by Queen", 1)? {
//!     println!("{:?}", dispatcher.dispatch(&request));
//! }
//! # Ok(())
//! # }
//! ```

mod deferred;
mod dispatcher;
mod error;
mod extractor;
mod model;
mod playback;
mod spotify;

pub use deferred::{DeferredQueue, MemoryDeferredQueue, SqliteDeferredQueue};
pub use dispatcher::{DispatchOutcome, PlaybackDispatcher};
pub use error::{DeferredError, DeferredResult, ExtractError, PlaybackError};
pub use extractor::{
    extraction_prompt, parse_titles, OpenAiTitleExtractor, TitleExtractor, DEFAULT_MODEL,
    DEFAULT_OPENAI_URL,
};
pub use model::{DeferredEntry, DeferredId, PlaybackTarget, SongRequest, Track};
pub use playback::{EnqueueResult, PlaybackProvider};
pub use spotify::{SpotifyCredentials, SpotifyProvider, DEFAULT_ACCOUNTS_URL, DEFAULT_API_URL};
