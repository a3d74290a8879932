//! Memory bank: enriches conversation turns, persists them, and recalls
//! relevant history for prompt injection.

use crate::embedding::{Embedder, cosine_similarity};
use crate::error::{MemoryError, RemoteError};
use crate::model::{MemoryRecord, MemorySearchResult, MemoryStats, Sender};
use crate::store::MemoryStore;
use crate::topics::{content_metadata, extract_key_topics, summarize};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::fmt::Write as _;
use std::sync::Arc;
use uuid::Uuid;

/// Records must score strictly above this to be recalled by similarity.
pub const SIMILARITY_THRESHOLD: f64 = 0.7;
/// Score step between consecutive entries of the recency fallback.
const RECENCY_SCORE_STEP: f64 = 0.1;

/// Whether the bank may call the embedding service.
///
/// `Enabled -> Disabled` is the only transition and is triggered by quota
/// exhaustion; it lasts for the lifetime of the bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingState {
    Enabled,
    Disabled,
}

/// How a recall request was ranked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecallMode {
    /// Cosine similarity against the query embedding.
    Similarity,
    /// Newest first with a synthetic decaying score.
    Recency,
}

/// Composes a store and an embedder into the conversation memory.
pub struct MemoryBank {
    store: Arc<dyn MemoryStore>,
    embedder: Embedder,
    session_id: Uuid,
    embedding_state: Mutex<EmbeddingState>,
}

impl MemoryBank {
    /// Initialize the store and start a background expiry sweep.
    ///
    /// The sweep runs on a detached task; its errors are logged only.
    pub async fn open(store: Arc<dyn MemoryStore>, embedder: Embedder) -> Result<Self, MemoryError> {
        Self::open_with_state(store, embedder, EmbeddingState::Enabled).await
    }

    /// Open with an explicit starting embedding state.
    pub async fn open_with_state(
        store: Arc<dyn MemoryStore>,
        embedder: Embedder,
        state: EmbeddingState,
    ) -> Result<Self, MemoryError> {
        store.initialize().await?;
        let session_id = Uuid::new_v4();
        info!(
            "memory bank opened (session_id={}, embeddings={:?})",
            session_id, state
        );

        let sweep_store = store.clone();
        tokio::spawn(async move {
            match sweep_store.cleanup_expired().await {
                Ok(0) => debug!("startup memory sweep found nothing to expire"),
                Ok(expired) => info!("cleaned up {expired} expired memories"),
                Err(err) => warn!("failed to clean up expired memories: {err}"),
            }
        });

        Ok(Self {
            store,
            embedder,
            session_id,
            embedding_state: Mutex::new(state),
        })
    }

    /// Session identifier stamped on every record this bank creates.
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Current embedding state.
    pub fn embedding_state(&self) -> EmbeddingState {
        *self.embedding_state.lock()
    }

    /// True while embeddings are requested for new turns and queries.
    pub fn embeddings_enabled(&self) -> bool {
        self.embedding_state() == EmbeddingState::Enabled
    }

    /// Enrich and persist one conversation turn.
    ///
    /// Embedding failures never fail the turn: the record is stored without a
    /// vector, and quota exhaustion additionally disables embeddings.
    pub async fn store_exchange(
        &self,
        sender: Sender,
        content: &str,
    ) -> Result<MemoryRecord, MemoryError> {
        let embedding = if self.embeddings_enabled() {
            let text = format!("{sender}: {content}");
            match self.embedder.embed_text(&text).await {
                Ok(embedding) => Some(embedding),
                Err(err) => {
                    self.note_embedding_failure(&err, "turn");
                    None
                }
            }
        } else {
            None
        };

        let record = MemoryRecord {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            sender,
            content: content.to_string(),
            summary: summarize(content),
            key_topics: extract_key_topics(content),
            embedding,
            session_id: self.session_id,
            metadata: content_metadata(content),
        };
        self.store.store_memory(record).await
    }

    /// Recall up to `limit` memories relevant to `query`.
    pub async fn get_relevant_memories(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<MemorySearchResult>, MemoryError> {
        Ok(self.recall(query, limit).await?.1)
    }

    /// Recall with the ranking mode that was actually used.
    pub async fn recall(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<(RecallMode, Vec<MemorySearchResult>), MemoryError> {
        let memories = self.store.load_all().await?;

        if !self.embeddings_enabled() {
            debug!("embeddings disabled, returning up to {limit} recent memories");
            return Ok((RecallMode::Recency, rank_by_recency(memories, limit)));
        }

        let query_embedding = match self.embedder.embed_text(query).await {
            Ok(embedding) => embedding,
            Err(err) => {
                self.note_embedding_failure(&err, "query");
                return Ok((RecallMode::Recency, rank_by_recency(memories, limit)));
            }
        };

        let results = rank_by_similarity(memories, &query_embedding, limit);
        debug!(
            "similarity recall (returned={}, limit={})",
            results.len(),
            limit
        );
        Ok((RecallMode::Similarity, results))
    }

    /// Every stored turn spoken by `sender`, newest first.
    pub async fn memories_from(&self, sender: Sender) -> Result<Vec<MemoryRecord>, MemoryError> {
        let mut memories: Vec<MemoryRecord> = self
            .store
            .load_all()
            .await?
            .into_iter()
            .filter(|record| record.sender == sender)
            .collect();
        memories.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(memories)
    }

    /// Render results as a prompt block.
    pub fn format_for_prompt(&self, results: &[MemorySearchResult]) -> String {
        format_memories_for_prompt(results, Utc::now())
    }

    /// Store statistics.
    pub async fn stats(&self) -> Result<MemoryStats, MemoryError> {
        self.store.stats().await
    }

    /// Run an expiry sweep now.
    pub async fn cleanup_expired(&self) -> Result<usize, MemoryError> {
        self.store.cleanup_expired().await
    }

    fn note_embedding_failure(&self, err: &RemoteError, purpose: &str) {
        if err.is_quota_exhausted() {
            warn!("embedding credits exhausted, disabling embeddings ({purpose}): {err}");
            self.disable_embeddings();
        } else {
            warn!("failed to embed {purpose}, continuing without embedding: {err}");
        }
    }

    fn disable_embeddings(&self) {
        let mut state = self.embedding_state.lock();
        if *state == EmbeddingState::Enabled {
            *state = EmbeddingState::Disabled;
            info!("embeddings disabled for session {}", self.session_id);
        }
    }
}

/// Newest embedded records first, scored `1.0 - 0.1 * rank`.
fn rank_by_recency(memories: Vec<MemoryRecord>, limit: usize) -> Vec<MemorySearchResult> {
    let mut memories: Vec<MemoryRecord> = memories
        .into_iter()
        .filter(MemoryRecord::has_embedding)
        .collect();
    memories.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    memories
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(rank, memory)| MemorySearchResult {
            memory,
            similarity: 1.0 - rank as f64 * RECENCY_SCORE_STEP,
        })
        .collect()
}

/// Records above the threshold, most similar first.
fn rank_by_similarity(
    memories: Vec<MemoryRecord>,
    query: &[f64],
    limit: usize,
) -> Vec<MemorySearchResult> {
    let mut results: Vec<MemorySearchResult> = memories
        .into_iter()
        .filter_map(|memory| {
            let similarity = cosine_similarity(query, memory.embedding.as_deref()?);
            (similarity > SIMILARITY_THRESHOLD).then_some(MemorySearchResult { memory, similarity })
        })
        .collect();
    results.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    results.truncate(limit);
    results
}

/// Render results relative to `now`.
pub fn format_memories_for_prompt(results: &[MemorySearchResult], now: DateTime<Utc>) -> String {
    if results.is_empty() {
        return String::new();
    }
    let mut out = String::from("Relevant memories from past conversations:\n\n");
    for (idx, result) in results.iter().enumerate() {
        let memory = &result.memory;
        let age = format_age(now.signed_duration_since(memory.timestamp));
        let _ = writeln!(
            out,
            "{}. **{}** ({} ago, similarity: {:.2}):",
            idx + 1,
            memory.sender,
            age,
            result.similarity
        );
        let _ = writeln!(out, "   {}", memory.summary);
        if !memory.key_topics.is_empty() {
            let _ = writeln!(out, "   Topics: {}", memory.key_topics.join(", "));
        }
        out.push('\n');
    }
    out
}

/// Age rounded to the nearest hour, rendered like `5h0m0s` (or `0s`).
fn format_age(age: chrono::Duration) -> String {
    const HOUR_MS: i64 = 60 * 60 * 1000;
    let millis = age.num_milliseconds();
    let hours = if millis >= 0 {
        (millis + HOUR_MS / 2) / HOUR_MS
    } else {
        -((-millis + HOUR_MS / 2) / HOUR_MS)
    };
    if hours == 0 {
        "0s".to_string()
    } else {
        format!("{hours}h0m0s")
    }
}
