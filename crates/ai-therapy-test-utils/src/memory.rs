use ai_therapy_memory::{EmbeddingProvider, MemoryRecord, RemoteError, Sender};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Embeds known texts to fixed vectors and records every input it sees.
#[derive(Debug, Clone)]
pub struct ScriptedEmbedder {
    vectors: HashMap<String, Vec<f64>>,
    fallback: Vec<f64>,
    seen: Arc<Mutex<Vec<String>>>,
}

impl ScriptedEmbedder {
    /// Unknown texts embed to `fallback`.
    pub fn new(fallback: Vec<f64>) -> Self {
        Self {
            vectors: HashMap::new(),
            fallback,
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_vector(mut self, text: impl Into<String>, vector: Vec<f64>) -> Self {
        self.vectors.insert(text.into(), vector);
        self
    }

    /// Inputs received so far, in call order.
    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().clone()
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().len()
    }
}

#[async_trait]
impl EmbeddingProvider for ScriptedEmbedder {
    async fn embed(&self, input: Vec<String>) -> Result<Vec<Vec<f64>>, RemoteError> {
        let vectors = input
            .iter()
            .map(|text| {
                self.vectors
                    .get(text)
                    .cloned()
                    .unwrap_or_else(|| self.fallback.clone())
            })
            .collect();
        self.seen.lock().extend(input);
        Ok(vectors)
    }
}

/// Fails every request with the same message and counts attempts.
#[derive(Debug, Clone)]
pub struct FailingEmbedder {
    message: String,
    attempts: Arc<Mutex<usize>>,
}

impl FailingEmbedder {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            attempts: Arc::new(Mutex::new(0)),
        }
    }

    /// Credit exhaustion as reported by the embeddings API.
    pub fn quota() -> Self {
        Self::new("embedding API error (status 429): insufficient_quota")
    }

    pub fn attempts(&self) -> usize {
        *self.attempts.lock()
    }
}

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    async fn embed(&self, _input: Vec<String>) -> Result<Vec<Vec<f64>>, RemoteError> {
        *self.attempts.lock() += 1;
        Err(RemoteError::request(&self.message))
    }
}

/// Build a record with a fixed timestamp, bypassing the bank.
pub fn record_at(
    sender: Sender,
    content: &str,
    timestamp: DateTime<Utc>,
    embedding: Option<Vec<f64>>,
) -> MemoryRecord {
    MemoryRecord {
        id: Uuid::new_v4(),
        timestamp,
        sender,
        content: content.to_string(),
        summary: content.to_string(),
        key_topics: Vec::new(),
        embedding,
        session_id: Uuid::nil(),
        metadata: json!({}),
    }
}
