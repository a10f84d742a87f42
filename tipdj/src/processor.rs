//! Consumer side of the pipeline
//!
//! The processor pops events one at a time and applies the tip rules:
//!
//! 1. Only `tip` events whose token amount is a positive multiple of the
//!    configured tip multiple request songs; `tokens / tip_multiple` songs.
//! 2. The tip message goes to the [`TitleExtractor`]. A failed extraction
//!    counts as zero new requests.
//! 3. Every deferred request is then claimed and dispatched first (oldest
//!    first), followed by the new requests.
//!
//! Failures are contained to the event that caused them: extractor errors
//! and panics from collaborators are logged together with the event payload
//! and the loop moves on to the next event. Claimed deferred requests that a
//! panic kept from being dispatched go back into the deferred queue.

use std::any::Any;
use std::io;
use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use event_pipeline::{EventQueue, StopSignal};
use events_api::{Event, EventMethod};
use song_dispatch::{DeferredQueue, DispatchOutcome, PlaybackDispatcher, SongRequest, TitleExtractor};

use crate::archive::EventArchive;
use crate::error::ProcessError;

/// How long a pop waits before re-checking the stop signal
pub const POP_TIMEOUT: Duration = Duration::from_secs(1);

/// Business rules for tip handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessorSettings {
    /// Tokens per requested song
    pub tip_multiple: u32,
}

/// Number of songs a tip of `tokens` pays for
///
/// `None` unless `tokens` is a non-zero exact multiple of `tip_multiple`.
pub fn song_count(tokens: u64, tip_multiple: u32) -> Option<u32> {
    let multiple = u64::from(tip_multiple);
    if tokens == 0 || multiple == 0 || tokens % multiple != 0 {
        return None;
    }
    Some(u32::try_from(tokens / multiple).unwrap_or(u32::MAX))
}

/// What handling one event amounted to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// A tip that does not pay for a song
    NotASongRequest,
    /// A song tip; counts cover both deferred and new requests
    Songs {
        requested: u32,
        extracted: usize,
        /// The extractor call failed; only deferred requests were dispatched
        extract_failed: bool,
        drained: usize,
        dispatched: usize,
        deferred: usize,
    },
    /// Known non-tip event; nothing to do
    Acknowledged,
    /// Event kind this processor does not handle
    Ignored,
}

pub struct Processor {
    settings: ProcessorSettings,
    extractor: Arc<dyn TitleExtractor>,
    dispatcher: PlaybackDispatcher,
    deferred: Option<Arc<dyn DeferredQueue>>,
    archive: Option<Box<dyn EventArchive>>,
    handled: u64,
}

impl Processor {
    pub fn new(
        settings: ProcessorSettings,
        extractor: Arc<dyn TitleExtractor>,
        dispatcher: PlaybackDispatcher,
        deferred: Option<Arc<dyn DeferredQueue>>,
        archive: Option<Box<dyn EventArchive>>,
    ) -> Self {
        Self {
            settings,
            extractor,
            dispatcher,
            deferred,
            archive,
            handled: 0,
        }
    }

    /// Events handled so far, including failed ones
    pub fn handled(&self) -> u64 {
        self.handled
    }

    /// Apply the event rules to one event
    pub fn process_event(&self, event: &Event) -> Result<EventOutcome, ProcessError> {
        tracing::debug!("Processing {} event {:?}", event.method, event.id);

        match &event.method {
            EventMethod::Tip => self.process_tip(event),
            EventMethod::MediaPurchase | EventMethod::Follow | EventMethod::ChatMessage => {
                Ok(EventOutcome::Acknowledged)
            }
            EventMethod::Other(method) => {
                tracing::debug!("Ignoring {} event", method);
                Ok(EventOutcome::Ignored)
            }
        }
    }

    fn process_tip(&self, event: &Event) -> Result<EventOutcome, ProcessError> {
        let tip = event.tip().unwrap_or_default();

        let Some(requested) = tip
            .tokens
            .and_then(|tokens| song_count(tokens, self.settings.tip_multiple))
        else {
            tracing::debug!("Tip of {:?} tokens is not a song request", tip.tokens);
            return Ok(EventOutcome::NotASongRequest);
        };

        let message = tip.message.unwrap_or_default();
        tracing::info!(
            "{} requested {} song(s) from {:?}",
            event.username().unwrap_or("anonymous"),
            requested,
            message
        );

        let (new_requests, extract_failed) = match self.extractor.find_titles(&message, requested) {
            Ok(found) => (found, false),
            Err(e) => {
                tracing::error!("Title extraction failed: {}; payload: {}", e, payload(event));
                (Vec::new(), true)
            }
        };
        let drained = self.drain_deferred();

        let (mut dispatched, mut deferred, mut attempted) = (0, 0, 0);
        let result = catch_unwind(AssertUnwindSafe(|| {
            for request in drained.iter().chain(new_requests.iter()) {
                attempted += 1;
                match self.dispatcher.dispatch(request) {
                    DispatchOutcome::Queued => dispatched += 1,
                    DispatchOutcome::Deferred(_) => deferred += 1,
                    _ => {}
                }
            }
        }));

        if let Err(panic) = result {
            self.restore_deferred(drained.get(attempted..).unwrap_or_default());
            resume_unwind(panic);
        }

        Ok(EventOutcome::Songs {
            requested,
            extracted: new_requests.len(),
            extract_failed,
            drained: drained.len(),
            dispatched,
            deferred,
        })
    }

    /// Claim every deferred request; a storage error leaves them in place
    fn drain_deferred(&self) -> Vec<SongRequest> {
        let Some(deferred) = &self.deferred else {
            return Vec::new();
        };

        match deferred.drain_all() {
            Ok(entries) => {
                if !entries.is_empty() {
                    tracing::info!("Retrying {} deferred request(s)", entries.len());
                }
                entries.into_iter().map(|entry| entry.request).collect()
            }
            Err(e) => {
                tracing::warn!("Failed to drain deferred requests: {}", e);
                Vec::new()
            }
        }
    }

    /// Put claimed requests that were never attempted back in the queue
    fn restore_deferred(&self, requests: &[SongRequest]) {
        let Some(deferred) = &self.deferred else {
            return;
        };
        if requests.is_empty() {
            return;
        }

        tracing::warn!("Returning {} undispatched request(s) to the deferred queue", requests.len());
        for request in requests {
            if let Err(e) = deferred.enqueue(request.clone()) {
                tracing::error!("Lost deferred request {}: {}", request, e);
            }
        }
    }

    /// Process one event without letting any failure escape
    ///
    /// Errors and panics are logged with the event payload. The event is
    /// archived afterwards whether or not processing succeeded.
    pub fn handle(&mut self, event: &Event) -> Option<EventOutcome> {
        self.handled += 1;

        let result = catch_unwind(AssertUnwindSafe(|| self.process_event(event)))
            .unwrap_or_else(|panic| Err(ProcessError::Panicked(panic_message(panic))));

        let outcome = match result {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                tracing::error!("Failed to process event: {}; payload: {}", e, payload(event));
                None
            }
        };

        if let Some(archive) = self.archive.as_mut() {
            if let Err(e) = archive.record(event) {
                tracing::warn!("Failed to archive event {:?}: {}", event.id, e);
            }
        }

        outcome
    }

    /// Consume `queue` until `stop` is signalled
    pub fn run(&mut self, queue: &EventQueue, stop: &StopSignal) {
        tracing::info!("Processor started");

        while !stop.is_stopped() {
            if let Some(event) = queue.pop(POP_TIMEOUT) {
                self.handle(&event);
            }
        }

        tracing::info!(
            "Processor stopped after {} events ({} still queued)",
            self.handled,
            queue.len()
        );
    }

    /// Run the consume loop on a dedicated thread
    pub fn spawn(mut self, queue: Arc<EventQueue>, stop: StopSignal) -> io::Result<JoinHandle<Processor>> {
        thread::Builder::new()
            .name("tipdj-processor".to_string())
            .spawn(move || {
                self.run(&queue, &stop);
                self
            })
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn payload(event: &Event) -> String {
    serde_json::to_string(event).unwrap_or_else(|_| format!("{:?}", event))
}
