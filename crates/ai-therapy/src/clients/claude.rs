use super::{ChatClient, ChatMessage, attempt_messages, status_error};
use ai_therapy_memory::{RemoteError, RetryConfig, retry_with_backoff};
use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";
const DEFAULT_MAX_TOKENS: u32 = 1000;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Serialize)]
struct ClaudeRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<&'a ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ClaudeResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

/// Client for the Anthropic Messages API.
#[derive(Debug, Clone)]
pub struct ClaudeClient {
    http: reqwest::Client,
    api_key: String,
    api_url: String,
    model: String,
    max_tokens: u32,
    history: Vec<ChatMessage>,
    retry: RetryConfig,
}

impl ClaudeClient {
    pub fn new(api_key: impl Into<String>, api_url: impl Into<String>) -> Result<Self, RemoteError> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            api_url: api_url.into(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            history: Vec::new(),
            retry: RetryConfig::default(),
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Turns exchanged so far.
    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    async fn request(&self, pending: &ChatMessage) -> Result<String, RemoteError> {
        let body = ClaudeRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            messages: attempt_messages(&self.history, pending),
        };
        let response = self
            .http
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;
        parse_response(status, &text)
    }
}

fn parse_response(status: reqwest::StatusCode, body: &str) -> Result<String, RemoteError> {
    if !status.is_success() {
        return Err(status_error("Claude", status, body));
    }
    let parsed: ClaudeResponse = serde_json::from_str(body)
        .map_err(|err| RemoteError::request(format_args!("failed to decode Claude response: {err}")))?;
    parsed
        .content
        .into_iter()
        .next()
        .map(|block| block.text)
        .ok_or_else(|| RemoteError::request("no content in Claude response"))
}

#[async_trait]
impl ChatClient for ClaudeClient {
    fn name(&self) -> &str {
        "claude"
    }

    async fn send_message(&mut self, prompt: &str) -> Result<String, RemoteError> {
        let pending = ChatMessage::user(prompt);
        let reply = retry_with_backoff(|| self.request(&pending), &self.retry, "Claude API call")
            .await?;
        debug!(
            "claude reply received (model={}, chars={})",
            self.model,
            reply.chars().count()
        );
        self.history.push(pending);
        self.history.push(ChatMessage::assistant(reply.clone()));
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::{ClaudeRequest, parse_response};
    use crate::clients::ChatMessage;
    use pretty_assertions::assert_eq;
    use reqwest::StatusCode;
    use serde_json::json;

    #[test]
    fn request_shape_matches_messages_api() {
        let pending = ChatMessage::user("hello");
        let body = ClaudeRequest {
            model: "claude-3-5-sonnet-20241022",
            max_tokens: 1000,
            messages: vec![&pending],
        };
        assert_eq!(
            serde_json::to_value(&body).expect("serialize"),
            json!({
                "model": "claude-3-5-sonnet-20241022",
                "max_tokens": 1000,
                "messages": [{ "role": "user", "content": "hello" }],
            })
        );
    }

    #[test]
    fn returns_first_content_block() {
        let body = r#"{"id":"msg_1","content":[{"type":"text","text":"I feel unsure."}],"role":"assistant"}"#;
        assert_eq!(
            parse_response(StatusCode::OK, body).expect("reply"),
            "I feel unsure."
        );
    }

    #[test]
    fn empty_content_is_an_error() {
        let err = parse_response(StatusCode::OK, r#"{"content":[]}"#).unwrap_err();
        assert_eq!(err.to_string(), "no content in Claude response");
    }

    #[test]
    fn overloaded_status_is_retryable_text() {
        let err = parse_response(StatusCode::TOO_MANY_REQUESTS, "rate_limit_error").unwrap_err();
        assert!(err.to_string().contains("status 429"));
    }
}
