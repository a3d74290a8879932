use super::{ChatClient, ChatMessage, attempt_messages, status_error};
use ai_therapy_memory::{RemoteError, RetryConfig, retry_with_backoff};
use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Local models can be slow to produce a full reply.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<&'a ChatMessage>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
}

/// Client for the Ollama `/api/chat` endpoint (non-streaming).
#[derive(Debug, Clone)]
pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    history: Vec<ChatMessage>,
    retry: RetryConfig,
}

impl OllamaClient {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Result<Self, RemoteError> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            history: Vec::new(),
            retry: RetryConfig::default(),
        })
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
        let body = OllamaChatRequest {
            model: &self.model,
            messages: attempt_messages(&self.history, pending),
            stream: false,
        };
        let response = self
            .http
            .post(format!("{}/api/chat", self.base_url))
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
        return Err(status_error("Ollama", status, body));
    }
    let parsed: OllamaChatResponse = serde_json::from_str(body)
        .map_err(|err| RemoteError::request(format_args!("failed to decode Ollama response: {err}")))?;
    Ok(parsed.message.content)
}

#[async_trait]
impl ChatClient for OllamaClient {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn send_message(&mut self, prompt: &str) -> Result<String, RemoteError> {
        let pending = ChatMessage::user(prompt);
        let reply = retry_with_backoff(|| self.request(&pending), &self.retry, "Ollama API call")
            .await?;
        debug!(
            "ollama reply received (model={}, chars={})",
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
    use super::{OllamaChatRequest, attempt_messages, parse_response};
    use crate::clients::ChatMessage;
    use pretty_assertions::assert_eq;
    use reqwest::StatusCode;
    use serde_json::json;

    #[test]
    fn request_carries_history_then_pending_turn() {
        let history = vec![ChatMessage::user("hi"), ChatMessage::assistant("hello")];
        let pending = ChatMessage::user("how are you?");
        let body = OllamaChatRequest {
            model: "llama2",
            messages: attempt_messages(&history, &pending),
            stream: false,
        };
        assert_eq!(
            serde_json::to_value(&body).expect("serialize"),
            json!({
                "model": "llama2",
                "messages": [
                    { "role": "user", "content": "hi" },
                    { "role": "assistant", "content": "hello" },
                    { "role": "user", "content": "how are you?" },
                ],
                "stream": false,
            })
        );
    }

    #[test]
    fn parses_reply_content() {
        let body = r#"{"message":{"role":"assistant","content":"Welcome."},"done":true}"#;
        assert_eq!(parse_response(StatusCode::OK, body).expect("reply"), "Welcome.");
    }

    #[test]
    fn error_status_is_reported_with_code() {
        let err = parse_response(StatusCode::SERVICE_UNAVAILABLE, "loading model").unwrap_err();
        assert_eq!(err.to_string(), "Ollama API error (status 503): loading model");
    }
}
