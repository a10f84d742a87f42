//! Spotify Web API playback provider
//!
//! Authenticates with a long-lived refresh token. Access tokens are cached
//! until shortly before they expire; a 401 from any endpoint drops the cached
//! token so the next call fetches a new one.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Deserialize;

use crate::error::PlaybackError;
use crate::model::{PlaybackTarget, Track};
use crate::playback::{EnqueueResult, PlaybackProvider};

pub const DEFAULT_API_URL: &str = "https://api.spotify.com";
pub const DEFAULT_ACCOUNTS_URL: &str = "https://accounts.spotify.com";

/// Refresh this long before the reported expiry
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Application credentials for the refresh-token grant
#[derive(Debug, Clone)]
pub struct SpotifyCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    tracks: TrackPage,
}

#[derive(Debug, Deserialize)]
struct TrackPage {
    #[serde(default)]
    items: Vec<TrackItem>,
}

#[derive(Debug, Deserialize)]
struct TrackItem {
    uri: String,
    name: String,
    #[serde(default)]
    artists: Vec<ArtistItem>,
}

#[derive(Debug, Deserialize)]
struct ArtistItem {
    name: String,
}

#[derive(Debug, Deserialize)]
struct DevicesResponse {
    #[serde(default)]
    devices: Vec<DeviceItem>,
}

#[derive(Debug, Deserialize)]
struct DeviceItem {
    id: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    is_active: bool,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    reason: Option<String>,
}

/// [`PlaybackProvider`] for a Spotify Premium account
pub struct SpotifyProvider {
    client: reqwest::blocking::Client,
    credentials: SpotifyCredentials,
    api_url: String,
    accounts_url: String,
    token: Mutex<Option<CachedToken>>,
}

impl SpotifyProvider {
    pub fn new(credentials: SpotifyCredentials, timeout: Duration) -> Result<Self, PlaybackError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PlaybackError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            credentials,
            api_url: DEFAULT_API_URL.to_string(),
            accounts_url: DEFAULT_ACCOUNTS_URL.to_string(),
            token: Mutex::new(None),
        })
    }

    /// Override the Web API and accounts roots
    pub fn with_base_urls(mut self, api_url: impl Into<String>, accounts_url: impl Into<String>) -> Self {
        self.api_url = api_url.into().trim_end_matches('/').to_string();
        self.accounts_url = accounts_url.into().trim_end_matches('/').to_string();
        self
    }

    fn access_token(&self) -> Result<String, PlaybackError> {
        let mut cached = self.token.lock();
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.expires_at {
                return Ok(token.value.clone());
            }
        }

        tracing::debug!("Refreshing Spotify access token");
        let response = self
            .client
            .post(format!("{}/api/token", self.accounts_url))
            .basic_auth(&self.credentials.client_id, Some(&self.credentials.client_secret))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", self.credentials.refresh_token.as_str()),
            ])
            .send()
            .map_err(|e| PlaybackError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(PlaybackError::Auth(format!("token refresh returned HTTP {}: {}", status.as_u16(), body)));
        }

        let token: TokenResponse = response
            .json()
            .map_err(|e| PlaybackError::Auth(format!("unreadable token response: {}", e)))?;

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(EXPIRY_MARGIN);
        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });

        Ok(token.access_token)
    }

    fn invalidate_token(&self) {
        *self.token.lock() = None;
    }

    /// Turn a non-success response into an error, dropping the token on 401
    fn status_error(&self, response: reqwest::blocking::Response) -> PlaybackError {
        let status = response.status().as_u16();
        if status == 401 {
            self.invalidate_token();
        }
        PlaybackError::Status {
            status,
            body: response.text().unwrap_or_default(),
        }
    }
}

fn error_reason(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.error.reason.or(Some(envelope.error.message)))
}

impl PlaybackProvider for SpotifyProvider {
    fn search(&self, query: &str) -> Result<Option<Track>, PlaybackError> {
        let token = self.access_token()?;

        let response = self
            .client
            .get(format!("{}/v1/search", self.api_url))
            .bearer_auth(token)
            .query(&[("q", query), ("type", "track"), ("limit", "1")])
            .send()
            .map_err(|e| PlaybackError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(self.status_error(response));
        }

        let results: SearchResponse = response
            .json()
            .map_err(|e| PlaybackError::Malformed(e.to_string()))?;

        Ok(results.tracks.items.into_iter().next().map(|item| Track {
            uri: item.uri,
            name: item.name,
            artists: item.artists.into_iter().map(|a| a.name).collect(),
        }))
    }

    fn active_device(&self) -> Result<Option<PlaybackTarget>, PlaybackError> {
        let token = self.access_token()?;

        let response = self
            .client
            .get(format!("{}/v1/me/player/devices", self.api_url))
            .bearer_auth(token)
            .send()
            .map_err(|e| PlaybackError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(self.status_error(response));
        }

        let devices: DevicesResponse = response
            .json()
            .map_err(|e| PlaybackError::Malformed(e.to_string()))?;

        Ok(devices
            .devices
            .into_iter()
            .find(|d| d.is_active)
            .and_then(|d| {
                d.id.map(|device_id| PlaybackTarget {
                    device_id,
                    name: d.name,
                })
            }))
    }

    fn enqueue(&self, track: &Track, target: &PlaybackTarget) -> EnqueueResult {
        let token = match self.access_token() {
            Ok(token) => token,
            Err(e) => return EnqueueResult::Rejected(e.to_string()),
        };

        let response = match self
            .client
            .post(format!("{}/v1/me/player/queue", self.api_url))
            .bearer_auth(token)
            .query(&[("uri", track.uri.as_str()), ("device_id", target.device_id.as_str())])
            .header(reqwest::header::CONTENT_LENGTH, "0")
            .send()
        {
            Ok(response) => response,
            Err(e) => return EnqueueResult::Unreachable(format!("Network/HTTP error: {}", e)),
        };

        let status = response.status().as_u16();
        if response.status().is_success() {
            return EnqueueResult::Queued;
        }

        if status == 401 {
            self.invalidate_token();
        }

        let body = response.text().unwrap_or_default();
        match error_reason(&body) {
            Some(reason) if status == 404 && reason == "NO_ACTIVE_DEVICE" => {
                EnqueueResult::NoActiveDevice
            }
            Some(reason) if !reason.is_empty() => {
                EnqueueResult::Rejected(format!("HTTP {}: {}", status, reason))
            }
            _ => EnqueueResult::Rejected(format!("HTTP {}", status)),
        }
    }
}
