//! Event ingestion pipeline
//!
//! Producer/consumer plumbing between the events API and the tip processor:
//!
//! ```text
//! EventSource --fetch--> Poller --push--> EventQueue --pop--> consumer
//!                          |
//!                          +--> CursorStore (next page URL)
//! ```
//!
//! The [`Poller`] runs on its own thread and owns the cursor. The
//! [`EventQueue`] is the only state shared with the consumer. Both loops watch
//! the same [`StopSignal`].
//!
//! # Example
//!
//! ```rust,ignore
//! use event_pipeline::{polling_interval, EventQueue, Poller, StopSignal};
//!
//! let queue = Arc::new(EventQueue::default());
//! let stop = StopSignal::new();
//! let poller = Poller::new(source, queue.clone(), start_cursor, polling_interval(60));
//! let handle = poller.spawn(stop.clone())?;
//!
//! while let Some(event) = queue.pop(Duration::from_secs(1)) {
//!     println!("{}", event.method);
//! }
//! ```

mod cursor_store;
mod error;
mod poller;
mod queue;
mod stop;

pub use cursor_store::CursorStore;
pub use error::{CursorStoreError, QueueError};
pub use poller::{polling_interval, PollOutcome, Poller, PollerStats};
pub use queue::{EventQueue, OverflowPolicy, PushOutcome, DEFAULT_CAPACITY, DEFAULT_PUSH_TIMEOUT};
pub use stop::StopSignal;
