//! Wiring of all components into a running application
//!
//! [`App::from_settings`] builds everything up front so that configuration
//! and credential problems surface before any thread starts. [`App::run`]
//! then drives the poller and processor threads until the stop signal fires.

use std::sync::Arc;
use std::time::Duration;

use event_pipeline::{CursorStore, EventQueue, Poller, PollerStats, StopSignal};
use events_api::{Cursor, EventSource, HttpEventSource};
use song_dispatch::{
    DeferredQueue, OpenAiTitleExtractor, PlaybackDispatcher, PlaybackProvider, SpotifyCredentials,
    SpotifyProvider, SqliteDeferredQueue, TitleExtractor,
};

use crate::archive::{EventArchive, JsonlArchive};
use crate::config::Settings;
use crate::error::{AppError, Result};
use crate::processor::{Processor, ProcessorSettings};

/// State reported once both loops have stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Page the next run would fetch
    pub cursor: Cursor,
    pub poller: PollerStats,
    pub events_handled: u64,
    pub events_left_queued: usize,
}

pub struct App {
    poller: Poller,
    processor: Processor,
    queue: Arc<EventQueue>,
}

impl App {
    /// Assemble an app from already-built parts
    pub fn new(poller: Poller, processor: Processor, queue: Arc<EventQueue>) -> Self {
        Self {
            poller,
            processor,
            queue,
        }
    }

    /// Build every component described by `settings`
    pub fn from_settings(settings: Settings) -> Result<Self> {
        settings.validate()?;

        let queue = Arc::new(EventQueue::new(settings.queue.capacity, settings.queue.policy()));

        let source: Arc<dyn EventSource> = Arc::new(HttpEventSource::new(settings.events_timeout())?);
        let mut start = settings.start_cursor()?;
        let cursor_store = settings.cursor.path.as_ref().map(CursorStore::new);
        if let Some(store) = &cursor_store {
            if let Some(saved) = store.load()? {
                tracing::info!("Resuming from saved cursor in {}", store.path().display());
                start = saved;
            }
        }

        let mut poller = Poller::new(source, Arc::clone(&queue), start, settings.polling_interval());
        if let Some(store) = cursor_store {
            poller = poller.with_cursor_store(store);
        }

        let extractor = OpenAiTitleExtractor::new(
            settings.openai.api_key.clone(),
            Duration::from_secs(settings.openai.request_timeout_secs),
        )?
        .with_model(settings.openai.model.clone())
        .with_base_url(settings.openai.base_url.clone());
        tracing::debug!("Extracting titles with {}", extractor.model());
        let extractor: Arc<dyn TitleExtractor> = Arc::new(extractor);

        let provider: Arc<dyn PlaybackProvider> = Arc::new(
            SpotifyProvider::new(
                SpotifyCredentials {
                    client_id: settings.spotify.client_id.clone(),
                    client_secret: settings.spotify.client_secret.clone(),
                    refresh_token: settings.spotify.refresh_token.clone(),
                },
                Duration::from_secs(settings.spotify.request_timeout_secs),
            )?
            .with_base_urls(
                settings.spotify.api_url.clone(),
                settings.spotify.accounts_url.clone(),
            ),
        );

        let deferred: Option<Arc<dyn DeferredQueue>> = if settings.deferred.enabled {
            let store = SqliteDeferredQueue::open(&settings.deferred.database_path)?;
            tracing::info!(
                "Deferred queue at {} holds {} request(s)",
                store.path().display(),
                store.len()?
            );
            Some(Arc::new(store))
        } else {
            None
        };

        let mut dispatcher = PlaybackDispatcher::new(provider);
        if let Some(deferred) = &deferred {
            dispatcher = dispatcher.with_deferred_queue(Arc::clone(deferred));
        }

        let archive: Option<Box<dyn EventArchive>> = if settings.archive.enabled {
            let archive = JsonlArchive::open(&settings.archive.path)?;
            tracing::info!("Archiving events to {}", archive.path().display());
            Some(Box::new(archive))
        } else {
            None
        };

        let processor = Processor::new(
            ProcessorSettings {
                tip_multiple: settings.general.tip_multiple,
            },
            extractor,
            dispatcher,
            deferred,
            archive,
        );

        Ok(Self::new(poller, processor, queue))
    }

    /// Run both loops until `stop` fires, then join them
    ///
    /// `stop` only reaches the poller. The processor keeps popping until the
    /// poller has returned, so a page the poller already holds can still be
    /// queued into a full blocking queue.
    pub fn run(self, stop: StopSignal) -> Result<RunSummary> {
        let App {
            poller,
            processor,
            queue,
        } = self;

        tracing::info!(
            "Starting tipdj (poll interval: {:?}, queue capacity: {}, overflow: {:?})",
            poller.interval(),
            queue.capacity(),
            queue.policy()
        );

        let processor_stop = StopSignal::new();
        let processor_handle = processor
            .spawn(Arc::clone(&queue), processor_stop.clone())
            .map_err(|source| AppError::Thread {
                name: "processor",
                source,
            })?;

        let poller_handle = match poller.spawn(stop) {
            Ok(handle) => handle,
            Err(source) => {
                processor_stop.stop();
                if processor_handle.join().is_err() {
                    tracing::error!("Processor thread panicked");
                }
                return Err(AppError::Thread {
                    name: "poller",
                    source,
                });
            }
        };

        let poller = poller_handle.join();
        processor_stop.stop();
        let processor = processor_handle.join();

        let (Ok(poller), Ok(processor)) = (poller, processor) else {
            tracing::error!("A pipeline thread panicked");
            return Err(AppError::Panicked);
        };
        let (cursor, poller_stats, events_handled) =
            (poller.cursor().clone(), poller.stats(), processor.handled());

        let summary = RunSummary {
            cursor,
            poller: poller_stats,
            events_handled,
            events_left_queued: queue.len(),
        };
        tracing::info!(
            "Stopped at {} after handling {} events",
            summary.cursor,
            summary.events_handled
        );
        Ok(summary)
    }
}
