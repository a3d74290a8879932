use ai_therapy::clients::ChatClient;
use ai_therapy_memory::RemoteError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Replays scripted replies in order and records every prompt it receives.
#[derive(Debug, Clone)]
pub struct ScriptedChatClient {
    name: String,
    replies: VecDeque<Result<String, String>>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl ScriptedChatClient {
    pub fn new<I, S>(name: impl Into<String>, replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            replies: replies.into_iter().map(|reply| Ok(reply.into())).collect(),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue a reply.
    pub fn then_reply(mut self, reply: impl Into<String>) -> Self {
        self.replies.push_back(Ok(reply.into()));
        self
    }

    /// Queue a failed turn.
    pub fn then_fail(mut self, message: impl Into<String>) -> Self {
        self.replies.push_back(Err(message.into()));
        self
    }

    /// Shared sink of received prompts; stays valid after the client is boxed.
    pub fn prompt_log(&self) -> Arc<Mutex<Vec<String>>> {
        self.prompts.clone()
    }
}

#[async_trait]
impl ChatClient for ScriptedChatClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send_message(&mut self, prompt: &str) -> Result<String, RemoteError> {
        self.prompts.lock().push(prompt.to_string());
        match self.replies.pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(message)) => Err(RemoteError::NonRetryable {
                operation: self.name.clone(),
                message,
            }),
            None => Err(RemoteError::NonRetryable {
                operation: self.name.clone(),
                message: "script exhausted".to_string(),
            }),
        }
    }
}
