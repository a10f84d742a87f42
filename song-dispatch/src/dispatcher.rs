use std::sync::Arc;

use crate::deferred::DeferredQueue;
use crate::model::{DeferredId, PlaybackTarget, SongRequest, Track};
use crate::playback::{EnqueueResult, PlaybackProvider};

/// What became of one song request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Track is in the play queue
    Queued,
    /// No active device; stored for a later drain
    Deferred(DeferredId),
    /// Search found no track; nothing to retry
    NotFound,
    /// Provider refused or errored; not retried
    Rejected(String),
    /// No active device, and the request could not be stored
    Failed(String),
}

impl DispatchOutcome {
    pub fn dispatched(&self) -> bool {
        matches!(self, DispatchOutcome::Queued)
    }
}

/// Resolves song requests to tracks and queues them for playback
pub struct PlaybackDispatcher {
    provider: Arc<dyn PlaybackProvider>,
    deferred: Option<Arc<dyn DeferredQueue>>,
}

impl PlaybackDispatcher {
    pub fn new(provider: Arc<dyn PlaybackProvider>) -> Self {
        Self {
            provider,
            deferred: None,
        }
    }

    /// Store no-active-device requests in `deferred`
    pub fn with_deferred_queue(mut self, deferred: Arc<dyn DeferredQueue>) -> Self {
        self.deferred = Some(deferred);
        self
    }

    pub fn dispatch(&self, request: &SongRequest) -> DispatchOutcome {
        let query = request.search_query();

        let track = match self.provider.search(&query) {
            Ok(Some(track)) => track,
            Ok(None) => {
                tracing::warn!("No track found for {:?}", query);
                return DispatchOutcome::NotFound;
            }
            Err(e) => {
                tracing::error!("Search for {:?} failed: {}", query, e);
                return DispatchOutcome::Rejected(e.to_string());
            }
        };

        let result = match self.provider.active_device() {
            Ok(Some(target)) => self.enqueue_on(&track, &target),
            Ok(None) => EnqueueResult::NoActiveDevice,
            Err(e) => EnqueueResult::Rejected(format!("device lookup failed: {}", e)),
        };

        match result {
            EnqueueResult::Queued => {
                tracing::info!("Queued {} for {}", track, request);
                DispatchOutcome::Queued
            }
            EnqueueResult::NoActiveDevice => self.defer(request, "no active playback device"),
            EnqueueResult::Unreachable(reason) => self.defer(request, &reason),
            EnqueueResult::Rejected(reason) => {
                tracing::error!("Provider rejected {}: {}", request, reason);
                DispatchOutcome::Rejected(reason)
            }
        }
    }

    fn enqueue_on(&self, track: &Track, target: &PlaybackTarget) -> EnqueueResult {
        tracing::debug!("Enqueueing {} on {}", track.uri, target.name);
        self.provider.enqueue(track, target)
    }

    fn defer(&self, request: &SongRequest, reason: &str) -> DispatchOutcome {
        let Some(deferred) = &self.deferred else {
            tracing::warn!("{}, dropping {}", reason, request);
            return DispatchOutcome::Failed(format!("{} and no deferred queue", reason));
        };

        match deferred.enqueue(request.clone()) {
            Ok(id) => {
                tracing::warn!("{}, deferred {} as {}", reason, request, id);
                DispatchOutcome::Deferred(id)
            }
            Err(e) => {
                tracing::error!("Failed to defer {}: {}", request, e);
                DispatchOutcome::Failed(e.to_string())
            }
        }
    }
}
