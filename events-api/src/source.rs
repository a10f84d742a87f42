//! Paged event fetching with a continuation cursor
//!
//! Each successful fetch returns a page of events and the URL of the next
//! page. The caller owns the cursor and decides when to advance it.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{EventsApiError, Result};
use crate::event::{Event, EventMethod};

/// Opaque continuation token: the URL of the next page to fetch
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cursor(String);

impl Cursor {
    /// Wrap a URL without validating it
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    /// Validate a URL and wrap it as a cursor
    ///
    /// Used for the configured starting URL, where a typo should stop the
    /// process before any polling starts.
    pub fn parse(url: &str) -> Result<Self> {
        let parsed = url::Url::parse(url).map_err(|e| EventsApiError::InvalidCursor {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        match parsed.scheme() {
            "http" | "https" => Ok(Self(url.to_string())),
            scheme => Err(EventsApiError::InvalidCursor {
                url: url.to_string(),
                reason: format!("unsupported scheme '{}'", scheme),
            }),
        }
    }

    /// The underlying URL
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One page of events plus the cursor for the following page
#[derive(Debug, Clone, PartialEq)]
pub struct EventPage {
    pub events: Vec<Event>,
    pub next: Cursor,
}

/// Source of event pages
///
/// Implemented by [`HttpEventSource`] for the real API and by in-memory fakes
/// in tests.
pub trait EventSource: Send + Sync {
    /// Fetch the page addressed by `cursor`
    fn fetch(&self, cursor: &Cursor) -> Result<EventPage>;
}

#[derive(Debug, Deserialize)]
struct WirePage {
    events: Vec<Value>,
    #[serde(rename = "nextUrl")]
    next_url: String,
}

/// Decode a raw page body, stamping every event with the current time
///
/// Only the page envelope can fail the decode. An element without a string
/// `method` is logged and skipped so the rest of the page still goes through.
pub fn decode_page(body: &str) -> Result<EventPage> {
    let page: WirePage =
        serde_json::from_str(body).map_err(|e| EventsApiError::Malformed(e.to_string()))?;

    let received_at = Utc::now();
    let events = page
        .events
        .into_iter()
        .filter_map(|raw| decode_event(raw, received_at))
        .collect();

    Ok(EventPage {
        events,
        next: Cursor::new(page.next_url),
    })
}

fn decode_event(mut raw: Value, received_at: DateTime<Utc>) -> Option<Event> {
    let method = match raw.get("method").and_then(Value::as_str) {
        Some(method) => method.to_string(),
        None => {
            tracing::warn!("Skipping event without a method: {}", raw);
            return None;
        }
    };

    let id = match raw.get("id") {
        Some(Value::String(id)) => Some(id.clone()),
        Some(Value::Number(id)) => Some(id.to_string()),
        _ => None,
    };

    let object = raw
        .get_mut("object")
        .map(Value::take)
        .unwrap_or(Value::Null);

    Some(Event {
        id,
        method: EventMethod::from(method),
        object,
        received_at,
    })
}

/// Blocking HTTP implementation of [`EventSource`]
#[derive(Debug, Clone)]
pub struct HttpEventSource {
    client: reqwest::blocking::Client,
}

impl HttpEventSource {
    /// Create a source whose requests give up after `timeout`
    ///
    /// The events API holds long-poll requests open for a while before
    /// answering with an empty page, so the timeout should exceed that.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EventsApiError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

impl EventSource for HttpEventSource {
    fn fetch(&self, cursor: &Cursor) -> Result<EventPage> {
        tracing::debug!("Fetching events page {}", cursor);

        let response = self
            .client
            .get(cursor.as_str())
            .send()
            .map_err(|e| EventsApiError::Network(e.to_string()))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(EventsApiError::Status(status.as_u16()));
        }

        let body = response
            .text()
            .map_err(|e| EventsApiError::Network(e.to_string()))?;

        let page = decode_page(&body)?;
        tracing::debug!("Fetched {} events, next page {}", page.events.len(), page.next);
        Ok(page)
    }
}
