//! Bounded FIFO buffer between the poller and the processor
//!
//! The queue decouples fetch cadence from processing cadence. It is strictly
//! FIFO: events are appended at the tail and only ever removed from the head.
//! When the buffer is at capacity, the configured [`OverflowPolicy`] decides
//! what `push` does.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use events_api::Event;
use parking_lot::{Condvar, Mutex};

use crate::error::QueueError;

/// Default number of events the queue can hold
pub const DEFAULT_CAPACITY: usize = 1000;

/// Default back-pressure wait for [`OverflowPolicy::Block`]
pub const DEFAULT_PUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// What `push` does when the queue is full
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Wait up to `timeout` for room, then hand the event back as
    /// [`QueueError::Full`]. Nothing already queued is lost.
    Block { timeout: Duration },
    /// Evict the oldest queued event to make room. Never blocks.
    DropOldest,
}

impl Default for OverflowPolicy {
    fn default() -> Self {
        OverflowPolicy::Block {
            timeout: DEFAULT_PUSH_TIMEOUT,
        }
    }
}

/// Result of a successful [`EventQueue::push`]
#[derive(Debug, Clone, PartialEq)]
pub enum PushOutcome {
    /// The event was appended without displacing anything
    Enqueued,
    /// The event was appended after evicting this older one
    DisplacedOldest(Event),
}

/// Thread-safe bounded event queue
///
/// Built for one producer and one consumer, but every operation holds the
/// internal lock for its whole critical section so extra producers or
/// consumers cannot corrupt it.
#[derive(Debug)]
pub struct EventQueue {
    events: Mutex<VecDeque<Event>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
    policy: OverflowPolicy,
}

impl EventQueue {
    /// Create a queue holding at most `capacity` events (minimum 1)
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: Mutex::new(VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY))),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
            policy,
        }
    }

    /// Append an event at the tail
    pub fn push(&self, event: Event) -> Result<PushOutcome, QueueError> {
        let mut events = self.events.lock();

        let outcome = match self.policy {
            OverflowPolicy::DropOldest if events.len() >= self.capacity => events
                .pop_front()
                .map(PushOutcome::DisplacedOldest)
                .unwrap_or(PushOutcome::Enqueued),
            OverflowPolicy::DropOldest => PushOutcome::Enqueued,
            OverflowPolicy::Block { timeout } => {
                let deadline = Instant::now() + timeout;
                while events.len() >= self.capacity {
                    let timed_out = self.not_full.wait_until(&mut events, deadline).timed_out();
                    if timed_out && events.len() >= self.capacity {
                        return Err(QueueError::Full {
                            waited: timeout,
                            event: Box::new(event),
                        });
                    }
                }
                PushOutcome::Enqueued
            }
        };

        events.push_back(event);
        drop(events);
        self.not_empty.notify_one();

        Ok(outcome)
    }

    /// Remove the event at the head, waiting up to `timeout` for one to arrive
    ///
    /// `None` means the queue stayed empty for the whole timeout; it is not an
    /// error.
    pub fn pop(&self, timeout: Duration) -> Option<Event> {
        let deadline = Instant::now() + timeout;
        let mut events = self.events.lock();

        loop {
            if let Some(event) = events.pop_front() {
                drop(events);
                self.not_full.notify_one();
                return Some(event);
            }

            if self.not_empty.wait_until(&mut events, deadline).timed_out() {
                let event = events.pop_front();
                if event.is_some() {
                    drop(events);
                    self.not_full.notify_one();
                }
                return event;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, OverflowPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;
    use std::sync::Arc;
    use std::thread;

    fn event(id: &str) -> Event {
        Event::new("tip", json!({"tip": {"tokens": 27}})).with_id(id)
    }

    fn ids(queue: &EventQueue, count: usize) -> Vec<String> {
        (0..count)
            .filter_map(|_| queue.pop(Duration::from_millis(10)))
            .filter_map(|e| e.id)
            .collect()
    }

    #[test]
    fn test_fifo_order() {
        let queue = EventQueue::default();
        for id in ["A", "B", "C"] {
            assert_eq!(queue.push(event(id)).unwrap(), PushOutcome::Enqueued);
        }

        assert_eq!(ids(&queue, 3), vec!["A", "B", "C"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_pop_on_empty_times_out() {
        let queue = EventQueue::default();
        let start = Instant::now();
        assert!(queue.pop(Duration::from_millis(30)).is_none());
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let queue = EventQueue::new(0, OverflowPolicy::DropOldest);
        assert_eq!(queue.capacity(), 1);
    }

    #[test]
    fn test_drop_oldest_evicts_head() {
        let queue = EventQueue::new(2, OverflowPolicy::DropOldest);
        queue.push(event("A")).unwrap();
        queue.push(event("B")).unwrap();

        match queue.push(event("C")).unwrap() {
            PushOutcome::DisplacedOldest(old) => assert_eq!(old.id.as_deref(), Some("A")),
            other => panic!("Expected DisplacedOldest, got {:?}", other),
        }

        assert_eq!(queue.len(), 2);
        assert_eq!(ids(&queue, 2), vec!["B", "C"]);
    }

    #[test]
    fn test_block_policy_times_out_and_returns_event() {
        let queue = EventQueue::new(
            1,
            OverflowPolicy::Block {
                timeout: Duration::from_millis(30),
            },
        );
        queue.push(event("A")).unwrap();

        let err = queue.push(event("B")).unwrap_err();
        assert_eq!(err.into_event().id.as_deref(), Some("B"));

        // The queued event was not disturbed
        assert_eq!(ids(&queue, 1), vec!["A"]);
    }

    #[test]
    fn test_block_policy_resumes_when_consumer_pops() {
        let queue = Arc::new(EventQueue::new(
            1,
            OverflowPolicy::Block {
                timeout: Duration::from_secs(5),
            },
        ));
        queue.push(event("A")).unwrap();

        let consumer = Arc::clone(&queue);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            consumer.pop(Duration::from_millis(100))
        });

        assert_eq!(queue.push(event("B")).unwrap(), PushOutcome::Enqueued);
        assert_eq!(handle.join().unwrap().and_then(|e| e.id).as_deref(), Some("A"));
        assert_eq!(ids(&queue, 1), vec!["B"]);
    }

    #[test]
    fn test_producer_consumer_threads_preserve_order() {
        let queue = Arc::new(EventQueue::new(
            8,
            OverflowPolicy::Block {
                timeout: Duration::from_secs(5),
            },
        ));

        let producer_queue = Arc::clone(&queue);
        let producer = thread::spawn(move || {
            for i in 0..200 {
                producer_queue.push(event(&i.to_string())).unwrap();
            }
        });

        let mut received = Vec::new();
        while received.len() < 200 {
            if let Some(e) = queue.pop(Duration::from_secs(1)) {
                received.push(e.id.unwrap());
            }
        }
        producer.join().unwrap();

        let expected: Vec<String> = (0..200).map(|i| i.to_string()).collect();
        assert_eq!(received, expected);
        assert!(queue.is_empty());
    }

    proptest! {
        #[test]
        fn prop_fifo_for_any_sequence(count in 0usize..64) {
            let queue = EventQueue::new(64, OverflowPolicy::DropOldest);
            let pushed: Vec<String> = (0..count).map(|i| format!("evt-{}", i)).collect();
            for id in &pushed {
                queue.push(event(id)).unwrap();
            }
            prop_assert_eq!(ids(&queue, count), pushed);
        }

        #[test]
        fn prop_drop_oldest_keeps_newest(capacity in 1usize..16, count in 0usize..48) {
            let queue = EventQueue::new(capacity, OverflowPolicy::DropOldest);
            for i in 0..count {
                queue.push(event(&i.to_string())).unwrap();
            }
            let kept = count.min(capacity);
            let expected: Vec<String> = (count - kept..count).map(|i| i.to_string()).collect();
            prop_assert_eq!(ids(&queue, kept), expected);
        }
    }
}
