//! tipdj: song requests from stream tips
//!
//! Watches a broadcaster's events feed for tips, reads song requests out of
//! the tip messages and queues the songs on the streamer's Spotify player.
//!
//! ```text
//! events API -> Poller -> EventQueue -> Processor -> TitleExtractor
//!                                           |
//!                                           +-> PlaybackDispatcher <-> DeferredQueue
//!                                           +-> EventArchive
//! ```
//!
//! The poller and processor run on separate threads and share nothing but
//! the [`EventQueue`](event_pipeline::EventQueue) and a
//! [`StopSignal`](event_pipeline::StopSignal).
//!
//! # Example
//!
//! ```rust,no_run
//! use event_pipeline::StopSignal;
//! use tipdj::{App, Settings};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = Settings::load("tipdj.toml")?;
//! let app = App::from_settings(settings)?;
//!
//! let stop = StopSignal::new();
//! let summary = app.run(stop)?;
//! println!("next page: {}", summary.cursor);
//! # Ok(())
//! # }
//! ```

pub mod app;
pub mod archive;
pub mod config;
pub mod error;
pub mod logging;
pub mod processor;

pub use app::{App, RunSummary};
pub use archive::{EventArchive, JsonlArchive};
pub use config::Settings;
pub use error::{AppError, ArchiveError, ConfigError, LoggingError, ProcessError, Result};
pub use logging::init_logging;
pub use processor::{song_count, EventOutcome, Processor, ProcessorSettings};

// Re-export the pipeline crates so the binary and integration tests need
// only this crate
pub use event_pipeline;
pub use events_api;
pub use song_dispatch;
