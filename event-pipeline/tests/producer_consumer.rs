//! Poller and consumer running on their own threads
//!
//! A paged in-memory source replaces the events API. The tests check that
//! events arrive in feed order across pages and that both loops wind down
//! promptly once stopped.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use event_pipeline::{EventQueue, OverflowPolicy, Poller, StopSignal};
use events_api::{Cursor, Event, EventPage, EventSource, EventsApiError, Result};
use serde_json::json;

/// Serves `pages` pages of `per_page` events, failing every third request
struct PagedSource {
    pages: usize,
    per_page: usize,
    requests: AtomicUsize,
}

impl PagedSource {
    fn page_number(cursor: &Cursor) -> usize {
        cursor
            .as_str()
            .rsplit('/')
            .next()
            .and_then(|n| n.parse().ok())
            .unwrap_or(0)
    }
}

impl EventSource for PagedSource {
    fn fetch(&self, cursor: &Cursor) -> Result<EventPage> {
        if self.requests.fetch_add(1, Ordering::SeqCst) % 3 == 2 {
            return Err(EventsApiError::Network("connection reset".to_string()));
        }

        let page = Self::page_number(cursor);
        if page >= self.pages {
            return Ok(EventPage {
                events: Vec::new(),
                next: cursor.clone(),
            });
        }

        let events = (0..self.per_page)
            .map(|i| {
                Event::new("tip", json!({"tip": {"tokens": 27}}))
                    .with_id(format!("{}", page * self.per_page + i))
            })
            .collect();

        Ok(EventPage {
            events,
            next: Cursor::new(format!("https://events.example/{}", page + 1)),
        })
    }
}

#[test]
fn test_events_arrive_in_feed_order_across_pages() {
    let source = Arc::new(PagedSource {
        pages: 10,
        per_page: 7,
        requests: AtomicUsize::new(0),
    });
    let queue = Arc::new(EventQueue::new(
        4,
        OverflowPolicy::Block {
            timeout: Duration::from_millis(50),
        },
    ));
    let stop = StopSignal::new();

    let poller = Poller::new(
        source,
        Arc::clone(&queue),
        Cursor::new("https://events.example/0"),
        Duration::from_millis(1),
    );
    let handle = poller.spawn(stop.clone()).unwrap();

    let mut received = Vec::new();
    let deadline = Instant::now() + Duration::from_secs(10);
    while received.len() < 70 && Instant::now() < deadline {
        if let Some(event) = queue.pop(Duration::from_millis(100)) {
            received.push(event.id.unwrap().parse::<usize>().unwrap());
        }
    }

    stop.stop();
    let poller = handle.join().unwrap();

    assert_eq!(received, (0..70).collect::<Vec<_>>());
    assert_eq!(poller.cursor().as_str(), "https://events.example/10");
    assert!(poller.stats().failures > 0);
}

#[test]
fn test_stop_ends_poller_within_one_interval() {
    let source = Arc::new(PagedSource {
        pages: 0,
        per_page: 0,
        requests: AtomicUsize::new(0),
    });
    let queue = Arc::new(EventQueue::default());
    let stop = StopSignal::new();

    let poller = Poller::new(
        source,
        queue,
        Cursor::new("https://events.example/0"),
        Duration::from_secs(30),
    );
    let handle = poller.spawn(stop.clone()).unwrap();

    thread::sleep(Duration::from_millis(50));
    let stopped_at = Instant::now();
    stop.stop();
    handle.join().unwrap();

    assert!(stopped_at.elapsed() < Duration::from_secs(5));
}
