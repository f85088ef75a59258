// Streaming chat generation module
// Client for an OpenAI-compatible chat completions endpoint with SSE streaming


use std::pin::Pin;
use std::time::Duration;

use futures::{Stream, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::config::Config;
use crate::{DocQaError, Result};

/// Lazily produced answer tokens. Consuming the stream drives generation;
/// dropping it aborts the upstream request and releases the connection.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    #[inline]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    #[inline]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    #[inline]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct StreamResponse {
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ChatClient {
    client: reqwest::Client,
    base_url: Url,
    model: String,
    api_key: Option<String>,
    temperature: f32,
}

impl ChatClient {
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        let base_url = config
            .chat
            .endpoint_url()
            .map_err(|e| DocQaError::Config(e.to_string()))?;

        // The timeout bounds the whole request including streamed body reads
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.chat.request_timeout_secs))
            .build()
            .map_err(|e| DocQaError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            model: config.chat.model.clone(),
            api_key: config.chat.resolve_api_key(),
            temperature: config.chat.temperature,
        })
    }

    /// Start a streaming chat completion and return the token stream
    #[inline]
    pub async fn stream_chat(&self, messages: Vec<ChatMessage>) -> Result<TokenStream> {
        let url = self
            .base_url
            .join("/v1/chat/completions")
            .map_err(|e| DocQaError::Config(format!("Failed to build chat URL: {}", e)))?;

        debug!(
            "Starting streaming chat completion with {} messages",
            messages.len()
        );

        let request = ChatRequest {
            model: &self.model,
            messages: &messages,
            temperature: self.temperature,
            stream: true,
        };

        let mut builder = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", key));
        }

        let response = builder
            .send()
            .await
            .map_err(|e| DocQaError::Generation(format!("Chat request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DocQaError::Generation(format!(
                "Chat endpoint returned HTTP {}: {}",
                status, body
            )));
        }

        // Accumulate partial SSE frames in a line buffer; each complete
        // `data:` line yields at most one token
        let stream = response
            .bytes_stream()
            .map_err(|e| DocQaError::Generation(format!("Failed to read response stream: {}", e)))
            .scan(String::new(), |buffer, chunk| {
                let tokens: Vec<Result<String>> = match chunk {
                    Ok(bytes) => {
                        buffer.push_str(&String::from_utf8_lossy(&bytes));
                        let mut out = Vec::new();
                        while let Some(line_end) = buffer.find('\n') {
                            let line: String = buffer.drain(..=line_end).collect();
                            if let Some(token) = parse_sse_line(line.trim()) {
                                out.push(Ok(token));
                            }
                        }
                        out
                    }
                    Err(e) => vec![Err(e)],
                };
                futures::future::ready(Some(futures::stream::iter(tokens)))
            })
            .flatten();

        Ok(Box::pin(stream))
    }
}

/// Parse a single SSE line into a content token, if it carries one
fn parse_sse_line(line: &str) -> Option<String> {
    if line.is_empty() || line == "data: [DONE]" {
        return None;
    }

    let data = line.strip_prefix("data: ")?;

    match serde_json::from_str::<StreamResponse>(data) {
        Ok(response) => response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta.content)
            .filter(|content| !content.is_empty()),
        Err(e) => {
            warn!("Failed to parse streaming response line: {} ({})", data, e);
            None
        }
    }
}
