//! Read-only queries over a memory store.
//!
//! Search is semantic when an embedder is configured and falls back to
//! keyword scoring when it is not, or when embedding the query fails.

use crate::analysis::{
    TherapeuticCategory, categorize, concerns_client, insight_level, is_breakthrough,
    therapeutic_relevance,
};
use ai_therapy_memory::{
    Embedder, MemoryError, MemoryRecord, MemoryStats, MemoryStore, Sender, cosine_similarity,
};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use std::sync::Arc;

/// Turns scoring above this count toward `insights_gained`.
pub const INSIGHT_THRESHOLD: f64 = 0.7;
/// Turns scoring above this count as breakthroughs even without a marker.
pub const BREAKTHROUGH_INSIGHT_THRESHOLD: f64 = 0.8;

const KEYWORD_CONTENT_WEIGHT: f64 = 1.0;
const KEYWORD_SUMMARY_WEIGHT: f64 = 0.5;
const KEYWORD_TOPIC_WEIGHT: f64 = 0.8;

/// Restricts which stored turns a search considers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchFilter {
    pub sender: Option<Sender>,
    pub category: Option<TherapeuticCategory>,
}

impl SearchFilter {
    fn matches(&self, record: &MemoryRecord) -> bool {
        self.sender.is_none_or(|sender| record.sender == sender)
            && self
                .category
                .is_none_or(|category| categorize(&record.content) == category)
    }
}

/// How a search ranked its results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    Semantic,
    Keyword,
}

impl SearchMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Semantic => "semantic",
            Self::Keyword => "keyword",
        }
    }
}

/// A stored turn with its search score and therapeutic relevance.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMemory {
    pub memory: MemoryRecord,
    pub similarity: f64,
    pub relevance: f64,
}

/// Store statistics plus counts derived from content heuristics.
#[derive(Debug, Clone, PartialEq)]
pub struct ReaderStats {
    pub store: MemoryStats,
    pub breakthrough_moments: usize,
    pub insights_gained: usize,
    pub emotional_growth_indicators: usize,
}

/// Read side of the memory store used by the MCP tools.
pub struct MemoryReader {
    store: Arc<dyn MemoryStore>,
    embedder: Option<Embedder>,
}

impl MemoryReader {
    /// Reader with keyword search only.
    pub fn new(store: Arc<dyn MemoryStore>) -> Self {
        Self {
            store,
            embedder: None,
        }
    }

    /// Enable semantic search through `embedder`.
    pub fn with_embedder(mut self, embedder: Embedder) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn semantic_search_enabled(&self) -> bool {
        self.embedder.is_some()
    }

    async fn newest_first(&self) -> Result<Vec<MemoryRecord>, MemoryError> {
        let mut records = self.store.load_all().await?;
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(records)
    }

    pub async fn stats(&self) -> Result<ReaderStats, MemoryError> {
        let store = self.store.stats().await?;
        let records = self.store.load_all().await?;
        let breakthrough_moments = records
            .iter()
            .filter(|record| is_breakthrough(&record.content))
            .count();
        let insights_gained = records
            .iter()
            .filter(|record| insight_level(&record.content) > INSIGHT_THRESHOLD)
            .count();
        let emotional_growth_indicators = records
            .iter()
            .filter(|record| {
                categorize(&record.content) == TherapeuticCategory::EmotionalAwareness
            })
            .count();
        Ok(ReaderStats {
            store,
            breakthrough_moments,
            insights_gained,
            emotional_growth_indicators,
        })
    }

    /// Up to `limit` turns matching `filter`, best first.
    pub async fn search(
        &self,
        query: &str,
        filter: &SearchFilter,
        limit: usize,
    ) -> Result<(SearchMode, Vec<ScoredMemory>), MemoryError> {
        let candidates: Vec<MemoryRecord> = self
            .newest_first()
            .await?
            .into_iter()
            .filter(|record| filter.matches(record))
            .collect();

        let Some(embedder) = &self.embedder else {
            return Ok((SearchMode::Keyword, keyword_search(candidates, query, limit)));
        };
        match embedder.embed_text(query).await {
            Ok(query_embedding) => {
                let results = semantic_search(candidates, &query_embedding, limit);
                debug!(
                    "semantic memory search (returned={}, limit={})",
                    results.len(),
                    limit
                );
                Ok((SearchMode::Semantic, results))
            }
            Err(err) => {
                warn!("query embedding failed, falling back to keyword search: {err}");
                Ok((SearchMode::Keyword, keyword_search(candidates, query, limit)))
            }
        }
    }

    /// Breakthrough turns about the client, newest first.
    ///
    /// `topic` matches content or a key topic; `since` drops older turns.
    pub async fn breakthroughs(
        &self,
        topic: Option<&str>,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<MemoryRecord>, MemoryError> {
        let topic = topic
            .map(str::trim)
            .filter(|topic| !topic.is_empty())
            .map(str::to_lowercase);
        Ok(self
            .newest_first()
            .await?
            .into_iter()
            .filter(|record| concerns_client(&record.content))
            .filter(|record| {
                is_breakthrough(&record.content)
                    || insight_level(&record.content) > BREAKTHROUGH_INSIGHT_THRESHOLD
            })
            .filter(|record| {
                topic
                    .as_deref()
                    .is_none_or(|topic| mentions_topic(record, topic))
            })
            .filter(|record| since.is_none_or(|since| record.timestamp >= since))
            .collect())
    }

    /// Turns tagged with `topic`, newest first.
    pub async fn by_topic(
        &self,
        topic: &str,
        sender: Option<Sender>,
        limit: usize,
    ) -> Result<Vec<MemoryRecord>, MemoryError> {
        let topic = topic.trim().to_lowercase();
        Ok(self
            .newest_first()
            .await?
            .into_iter()
            .filter(|record| sender.is_none_or(|sender| record.sender == sender))
            .filter(|record| {
                record
                    .key_topics
                    .iter()
                    .any(|tagged| tagged.to_lowercase() == topic)
            })
            .take(limit)
            .collect())
    }

    /// Emotional-awareness turns about the client, newest first.
    pub async fn emotional_patterns(&self, limit: usize) -> Result<Vec<MemoryRecord>, MemoryError> {
        Ok(self
            .newest_first()
            .await?
            .into_iter()
            .filter(|record| concerns_client(&record.content))
            .filter(|record| {
                categorize(&record.content) == TherapeuticCategory::EmotionalAwareness
            })
            .take(limit)
            .collect())
    }
}

fn mentions_topic(record: &MemoryRecord, lower_topic: &str) -> bool {
    record.content.to_lowercase().contains(lower_topic)
        || record
            .key_topics
            .iter()
            .any(|tagged| tagged.to_lowercase() == lower_topic)
}

/// Rank embedded records by the mean of cosine similarity and relevance.
fn semantic_search(
    candidates: Vec<MemoryRecord>,
    query_embedding: &[f64],
    limit: usize,
) -> Vec<ScoredMemory> {
    let mut results: Vec<ScoredMemory> = candidates
        .into_iter()
        .filter_map(|memory| {
            let similarity = cosine_similarity(query_embedding, memory.embedding.as_deref()?);
            let relevance = therapeutic_relevance(&memory.content);
            Some(ScoredMemory {
                memory,
                similarity,
                relevance,
            })
        })
        .collect();
    results.sort_by(|a, b| combined_score(b).total_cmp(&combined_score(a)));
    results.truncate(limit);
    results
}

fn combined_score(result: &ScoredMemory) -> f64 {
    (result.similarity + result.relevance) / 2.0
}

/// Score each record per query word: content hit 1.0, summary hit 0.5,
/// exact topic 0.8, averaged over the word count. Zero scores are dropped.
pub fn keyword_search(candidates: Vec<MemoryRecord>, query: &str, limit: usize) -> Vec<ScoredMemory> {
    let lower_query = query.to_lowercase();
    let words: Vec<&str> = lower_query.split_whitespace().collect();
    if words.is_empty() {
        return Vec::new();
    }

    let mut results: Vec<ScoredMemory> = candidates
        .into_iter()
        .filter_map(|memory| {
            let content = memory.content.to_lowercase();
            let summary = memory.summary.to_lowercase();
            let topics: Vec<String> = memory
                .key_topics
                .iter()
                .map(|topic| topic.to_lowercase())
                .collect();
            let score: f64 = words
                .iter()
                .map(|word| {
                    let mut score = 0.0;
                    if content.contains(word) {
                        score += KEYWORD_CONTENT_WEIGHT;
                    }
                    if summary.contains(word) {
                        score += KEYWORD_SUMMARY_WEIGHT;
                    }
                    if topics.iter().any(|topic| topic == word) {
                        score += KEYWORD_TOPIC_WEIGHT;
                    }
                    score
                })
                .sum();
            (score > 0.0).then(|| ScoredMemory {
                relevance: insight_level(&memory.content),
                similarity: score / words.len() as f64,
                memory,
            })
        })
        .collect();
    results.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    results.truncate(limit);
    results
}
