//! Client for the broadcaster events API
//!
//! The events API is a long-polling feed: every response carries a page of
//! events plus a `nextUrl` that addresses the following page. This crate
//! decodes those pages into typed [`Event`]s and exposes the fetch step behind
//! the [`EventSource`] trait so the poller can be driven by fakes in tests.
//!
//! # Quick Start
//!
//! ```no_run
//! use events_api::{Cursor, EventSource, HttpEventSource};
//! use std::time::Duration;
//!
//! let source = HttpEventSource::new(Duration::from_secs(30))?;
//! let cursor = Cursor::parse("https://events.example.com/events/me/token/")?;
//!
//! let page = source.fetch(&cursor)?;
//! for event in &page.events {
//!     if let Some(tip) = event.tip() {
//!         println!("{:?} tokens: {:?}", tip.tokens, tip.message);
//!     }
//! }
//! # Ok::<(), events_api::EventsApiError>(())
//! ```

mod error;
mod event;
mod source;

pub use error::{EventsApiError, Result};
pub use event::{Event, EventMethod, Tip};
pub use source::{decode_page, Cursor, EventPage, EventSource, HttpEventSource};
