//! Cursor-driven long polling of the events API
//!
//! The poller cycles `Fetching -> Sleeping -> Fetching ...` until stopped.
//! A successful fetch pushes the whole page into the [`EventQueue`] and then
//! advances the cursor; a failed fetch leaves the cursor untouched so the same
//! page is requested again on the next cycle (at-least-once delivery).
//!
//! A page in hand is always queued in full, so a stop only takes effect
//! between pages. With a blocking queue this relies on the consumer popping
//! until the poller has returned.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use events_api::{Cursor, Event, EventSource, EventsApiError};

use crate::cursor_store::CursorStore;
use crate::queue::{EventQueue, PushOutcome};
use crate::stop::StopSignal;

/// Period between fetches for a per-minute request budget
///
/// The budget is multiplied by ten before being turned into a period, so
/// 60 requests/minute polls every 10 seconds rather than every second. Existing
/// deployments are tuned against this cadence, so it is kept as-is.
pub fn polling_interval(requests_per_minute: u32) -> Duration {
    let rate = f64::from(requests_per_minute.max(1));
    Duration::from_secs_f64(60.0 / (rate / 10.0))
}

/// What a single fetch cycle achieved
#[derive(Debug)]
pub enum PollOutcome {
    /// The page was fetched, fully queued, and the cursor advanced
    Fetched { events: usize },
    /// The fetch failed; the cursor is unchanged
    Failed(EventsApiError),
}

/// Counters for the lifetime of a poller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollerStats {
    pub fetches: u64,
    pub failures: u64,
    pub events_queued: u64,
    pub events_displaced: u64,
}

/// Producer half of the pipeline
pub struct Poller {
    source: Arc<dyn EventSource>,
    queue: Arc<EventQueue>,
    cursor: Cursor,
    interval: Duration,
    cursor_store: Option<CursorStore>,
    stats: PollerStats,
}

impl Poller {
    pub fn new(
        source: Arc<dyn EventSource>,
        queue: Arc<EventQueue>,
        start: Cursor,
        interval: Duration,
    ) -> Self {
        Self {
            source,
            queue,
            cursor: start,
            interval,
            cursor_store: None,
            stats: PollerStats::default(),
        }
    }

    /// Persist the cursor to `store` after every advance
    pub fn with_cursor_store(mut self, store: CursorStore) -> Self {
        self.cursor_store = Some(store);
        self
    }

    /// The page the next fetch will request
    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn stats(&self) -> PollerStats {
        self.stats
    }

    /// Run one fetch cycle without sleeping
    ///
    /// Blocks until every event of the fetched page has been queued.
    pub fn poll_once(&mut self) -> PollOutcome {
        self.stats.fetches += 1;

        let page = match self.source.fetch(&self.cursor) {
            Ok(page) => page,
            Err(e) => {
                self.stats.failures += 1;
                if e.is_transient() {
                    tracing::warn!("Events fetch failed for {}: {}", self.cursor, e);
                } else {
                    tracing::error!("Events fetch for {} cannot succeed as is: {}", self.cursor, e);
                }
                return PollOutcome::Failed(e);
            }
        };

        let total = page.events.len();
        for event in page.events {
            self.push_with_retry(event);
        }

        self.advance(page.next);
        PollOutcome::Fetched { events: total }
    }

    /// Push one event, retrying while the queue is full
    fn push_with_retry(&mut self, mut event: Event) {
        loop {
            match self.queue.push(event) {
                Ok(PushOutcome::Enqueued) => {
                    self.stats.events_queued += 1;
                    return;
                }
                Ok(PushOutcome::DisplacedOldest(old)) => {
                    self.stats.events_queued += 1;
                    self.stats.events_displaced += 1;
                    tracing::warn!(
                        "Event queue full, dropped oldest {} event {:?}",
                        old.method,
                        old.id
                    );
                    return;
                }
                Err(e) => {
                    tracing::warn!("{}, retrying", e);
                    event = e.into_event();
                }
            }
        }
    }

    fn advance(&mut self, next: Cursor) {
        if next != self.cursor {
            tracing::debug!("Advancing cursor to {}", next);
        }
        self.cursor = next;

        if let Some(store) = &self.cursor_store {
            if let Err(e) = store.save(&self.cursor) {
                tracing::warn!("Failed to persist cursor: {}", e);
            }
        }
    }

    /// Poll until `stop` is signalled
    pub fn run(&mut self, stop: &StopSignal) {
        tracing::info!(
            "Poller started at {} (interval: {:?})",
            self.cursor,
            self.interval
        );

        loop {
            if stop.is_stopped() {
                break;
            }

            if let PollOutcome::Fetched { events } = self.poll_once() {
                if events > 0 {
                    tracing::debug!("Queued {} events ({} waiting)", events, self.queue.len());
                }
            }

            if stop.wait_timeout(self.interval) {
                break;
            }
        }

        tracing::info!(
            "Poller stopped at {} after {} fetches ({} failed)",
            self.cursor,
            self.stats.fetches,
            self.stats.failures
        );
    }

    /// Run the poll loop on a dedicated thread
    ///
    /// The poller is handed back through the join handle so the caller can
    /// inspect the final cursor and counters.
    pub fn spawn(mut self, stop: StopSignal) -> io::Result<JoinHandle<Poller>> {
        thread::Builder::new()
            .name("tipdj-poller".to_string())
            .spawn(move || {
                self.run(&stop);
                self
            })
    }
}
