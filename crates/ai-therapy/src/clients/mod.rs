//! Chat clients for the two dialogue participants.

mod claude;
mod ollama;

pub use claude::ClaudeClient;
pub use ollama::OllamaClient;

use ai_therapy_memory::RemoteError;
use async_trait::async_trait;
use log::info;
use serde::{Deserialize, Serialize};

/// Prompt used to verify a client can reach its backend.
pub const CONNECTION_TEST_PROMPT: &str =
    "Hello, this is a connection test. Please respond with 'Connection successful'.";

#[async_trait]
/// A stateful chat participant: each call sees the full prior exchange.
pub trait ChatClient: Send {
    /// Label used in logs.
    fn name(&self) -> &str;

    /// Send one user turn and return the assistant reply.
    ///
    /// History is extended with the turn pair only when the call succeeds.
    async fn send_message(&mut self, prompt: &str) -> Result<String, RemoteError>;
}

/// Send the connection test prompt through `client`.
pub async fn test_connection(client: &mut dyn ChatClient) -> Result<(), RemoteError> {
    info!("testing {} connection", client.name());
    client.send_message(CONNECTION_TEST_PROMPT).await?;
    info!("{} connection successful", client.name());
    Ok(())
}

/// Speaker of a chat history entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One history entry, shared by both wire formats.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// History plus the pending user turn, borrowed for serialization.
fn attempt_messages<'a>(history: &'a [ChatMessage], pending: &'a ChatMessage) -> Vec<&'a ChatMessage> {
    history.iter().chain(std::iter::once(pending)).collect()
}

/// Map a non-success HTTP status to a classifiable error.
fn status_error(service: &str, status: reqwest::StatusCode, body: &str) -> RemoteError {
    RemoteError::Request(format!(
        "{service} API error (status {}): {body}",
        status.as_u16()
    ))
}
