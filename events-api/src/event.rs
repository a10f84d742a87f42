//! Event model for the broadcaster events API
//!
//! Events arrive as loosely-typed JSON: a `method` string plus an arbitrary
//! `object` payload. The method is decoded eagerly into [`EventMethod`]; the
//! payload is kept as raw JSON and only decoded when a typed view such as
//! [`Event::tip`] is requested.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// The kind of notification carried by an [`Event`]
///
/// Unknown method names are preserved in [`EventMethod::Other`] rather than
/// rejected, so new platform notifications never break decoding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventMethod {
    /// A viewer sent tokens, optionally with a message
    Tip,
    /// A viewer bought media
    MediaPurchase,
    /// A viewer followed the broadcaster
    Follow,
    /// A chat line was posted
    ChatMessage,
    /// Any method this crate does not model
    Other(String),
}

impl EventMethod {
    /// Wire name of the method
    pub fn as_str(&self) -> &str {
        match self {
            EventMethod::Tip => "tip",
            EventMethod::MediaPurchase => "mediaPurchase",
            EventMethod::Follow => "follow",
            EventMethod::ChatMessage => "chatMessage",
            EventMethod::Other(name) => name,
        }
    }
}

impl From<&str> for EventMethod {
    fn from(value: &str) -> Self {
        match value {
            "tip" => EventMethod::Tip,
            "mediaPurchase" => EventMethod::MediaPurchase,
            "follow" => EventMethod::Follow,
            "chatMessage" => EventMethod::ChatMessage,
            other => EventMethod::Other(other.to_string()),
        }
    }
}

impl From<String> for EventMethod {
    fn from(value: String) -> Self {
        EventMethod::from(value.as_str())
    }
}

impl From<EventMethod> for String {
    fn from(value: EventMethod) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for EventMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single notification fetched from the events API
///
/// Immutable once constructed; the pipeline only ever moves or clones it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Platform-assigned event id, when the API provides one
    #[serde(default)]
    pub id: Option<String>,
    /// Notification kind
    pub method: EventMethod,
    /// Raw payload, decoded lazily
    #[serde(default)]
    pub object: Value,
    /// When this process decoded the event
    pub received_at: DateTime<Utc>,
}

/// Typed view of the `tip` section of a tip event's payload
///
/// Every field is optional on the wire. Absent or mistyped values decode to
/// `None` instead of failing, which callers treat as "no song requested".
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Tip {
    /// Token amount; fractional amounts are truncated
    pub tokens: Option<u64>,
    /// Free-text message attached to the tip
    pub message: Option<String>,
    /// Whether the tipper asked to stay anonymous
    pub is_anonymous: bool,
}

impl Event {
    /// Create an event stamped with the current time
    pub fn new(method: impl Into<EventMethod>, object: Value) -> Self {
        Self {
            id: None,
            method: method.into(),
            object,
            received_at: Utc::now(),
        }
    }

    /// Attach the platform event id
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Decode the tip section of the payload
    ///
    /// Returns `None` for non-tip events. For tip events a [`Tip`] is always
    /// returned, even if the payload lacks a `tip` object entirely.
    pub fn tip(&self) -> Option<Tip> {
        if self.method != EventMethod::Tip {
            return None;
        }

        let tip = self.object.get("tip");
        let tokens = tip.and_then(|t| t.get("tokens")).and_then(decode_tokens);
        let message = tip
            .and_then(|t| t.get("message"))
            .and_then(Value::as_str)
            .map(str::to_string);
        let is_anonymous = tip
            .and_then(|t| t.get("isAnon"))
            .and_then(Value::as_bool)
            .unwrap_or(false);

        Some(Tip {
            tokens,
            message,
            is_anonymous,
        })
    }

    /// Username of the viewer who triggered the event, if present
    pub fn username(&self) -> Option<&str> {
        self.object
            .get("user")
            .and_then(|u| u.get("username"))
            .and_then(Value::as_str)
    }
}

fn decode_tokens(value: &Value) -> Option<u64> {
    if let Some(tokens) = value.as_u64() {
        return Some(tokens);
    }
    match value.as_f64() {
        Some(tokens) if tokens.is_finite() && tokens >= 0.0 => Some(tokens.trunc() as u64),
        _ => None,
    }
}
