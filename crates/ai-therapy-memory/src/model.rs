//! Memory record model used by stores and the memory bank.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Party that produced a conversation turn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    /// The therapist model served by Ollama.
    Ollama,
    /// The client model served by the Anthropic API.
    Claude,
}

impl Sender {
    /// Stable identifier used on disk and in prompts.
    pub fn as_str(self) -> &'static str {
        match self {
            Sender::Ollama => "ollama",
            Sender::Claude => "claude",
        }
    }

    /// The other participant.
    pub fn other(self) -> Self {
        match self {
            Sender::Ollama => Sender::Claude,
            Sender::Claude => Sender::Ollama,
        }
    }
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted memory record, one per conversation turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryRecord {
    /// Record identifier.
    pub id: Uuid,
    /// Creation timestamp.
    pub timestamp: DateTime<Utc>,
    /// Party that spoke the turn.
    pub sender: Sender,
    /// Full original text.
    pub content: String,
    /// Truncated preview of `content`.
    pub summary: String,
    /// Topic labels matched by keyword.
    #[serde(default)]
    pub key_topics: Vec<String>,
    /// Embedding vector, absent when embedding failed or was disabled.
    #[serde(default)]
    pub embedding: Option<Vec<f64>>,
    /// Session that created the record.
    pub session_id: Uuid,
    /// Auxiliary metadata (`content_length`, `word_count`).
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl MemoryRecord {
    /// True when the record carries a non-empty embedding.
    pub fn has_embedding(&self) -> bool {
        self.embedding
            .as_ref()
            .is_some_and(|embedding| !embedding.is_empty())
    }
}

/// A record paired with its ranking score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemorySearchResult {
    pub memory: MemoryRecord,
    pub similarity: f64,
}

/// Aggregate statistics over a store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct MemoryStats {
    pub total_memories: usize,
    pub oldest_memory: Option<DateTime<Utc>>,
    pub newest_memory: Option<DateTime<Utc>>,
    pub storage_size_bytes: u64,
    pub retention_period: Duration,
}
