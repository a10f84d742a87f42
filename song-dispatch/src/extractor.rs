//! Natural-language song title extraction
//!
//! Tip messages are free text ("play Bohemian Rhapsody by Queen and then
//! something by Daft Punk"). A [`TitleExtractor`] turns such a message into at
//! most `count` [`SongRequest`]s. The production implementation asks a
//! chat-completions model to answer as `Artist--Title|Artist--Title`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ExtractError;
use crate::model::SongRequest;

/// Default OpenAI API root
pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com";

/// Default chat model
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Turns a free-text message into song requests
pub trait TitleExtractor: Send + Sync {
    /// Find up to `count` songs in `message`
    ///
    /// May return fewer than `count` entries. Returns an empty list for an
    /// empty message.
    fn find_titles(&self, message: &str, count: u32) -> Result<Vec<SongRequest>, ExtractError>;
}

/// Build the instruction sent to the model
pub fn extraction_prompt(message: &str, count: u32) -> String {
    let noun = if count == 1 { "song title" } else { "song titles" };
    format!(
        "Extract exactly {count} {noun} from the following message. \
         Provide the response as a | separated list without any other unrelated text. \
         The format should resemble \"Artist--Song Title|Artist--Song Title|...\":\n\n{message}"
    )
}

/// Parse a `Artist--Title|Artist--Title` reply
///
/// Pieces without a `--` separator or with an empty title are skipped. When
/// nothing usable is found and a single song was asked for, the whole message
/// becomes a literal request.
pub fn parse_titles(reply: &str, message: &str, count: u32) -> Vec<SongRequest> {
    let mut titles = Vec::new();

    for piece in reply.split('|') {
        if titles.len() >= count as usize {
            break;
        }

        let piece = piece.trim().trim_matches('"');
        if piece.is_empty() {
            continue;
        }

        match piece.split_once("--") {
            Some((artist, title)) if !title.trim().is_empty() => {
                titles.push(SongRequest::new(artist.trim(), title.trim()));
            }
            _ => tracing::warn!("Skipping unparseable title {:?}", piece),
        }
    }

    if titles.is_empty() && count == 1 && !message.trim().is_empty() {
        tracing::debug!("No structured title found, using message as literal query");
        titles.push(SongRequest::literal(message.trim()));
    }

    titles
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// [`TitleExtractor`] backed by the OpenAI chat-completions API
pub struct OpenAiTitleExtractor {
    client: reqwest::blocking::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiTitleExtractor {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self, ExtractError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExtractError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_OPENAI_URL.to_string(),
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Point at another API root (proxies, tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn complete(&self, prompt: String) -> Result<String, ExtractError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .map_err(|e| ExtractError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ExtractError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let reply: ChatResponse = response
            .json()
            .map_err(|e| ExtractError::Malformed(e.to_string()))?;

        reply
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ExtractError::Malformed("reply has no message content".to_string()))
    }
}

impl TitleExtractor for OpenAiTitleExtractor {
    fn find_titles(&self, message: &str, count: u32) -> Result<Vec<SongRequest>, ExtractError> {
        if message.trim().is_empty() || count == 0 {
            return Ok(Vec::new());
        }

        let reply = self.complete(extraction_prompt(message, count))?;
        tracing::debug!("Extraction reply: {:?}", reply);

        let titles = parse_titles(&reply, message, count);
        tracing::debug!("Extracted {} of {} requested titles", titles.len(), count);
        Ok(titles)
    }
}
