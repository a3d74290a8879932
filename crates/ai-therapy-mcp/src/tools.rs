//! Tool names, argument shapes, and the text each tool returns.

use crate::analysis::{TherapeuticCategory, categorize, insight_level, is_breakthrough};
use crate::reader::{ReaderStats, ScoredMemory, SearchMode};
use ai_therapy_memory::{MemoryRecord, Sender};
use serde::Deserialize;
use std::fmt::Write as _;

pub const GET_MEMORY_STATS: &str = "get_memory_stats";
pub const SEARCH_MEMORIES: &str = "search_memories";
pub const RECALL_BREAKTHROUGHS: &str = "recall_breakthroughs";
pub const MEMORIES_BY_TOPIC: &str = "memories_by_topic";
pub const CHECK_EMOTIONAL_PATTERNS: &str = "check_emotional_patterns";

/// Window used when breakthrough recall asks for recent turns only.
pub const RECENT_BREAKTHROUGH_DAYS: i64 = 14;

const MAX_LISTED_BREAKTHROUGHS: usize = 4;

fn default_true() -> bool {
    true
}

fn default_search_limit() -> usize {
    5
}

fn default_topic_limit() -> usize {
    10
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct StatsArgs {
    #[serde(default = "default_true")]
    pub include_details: bool,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SearchArgs {
    pub query: String,
    #[serde(default)]
    pub sender: Option<Sender>,
    #[serde(default)]
    pub category: Option<TherapeuticCategory>,
    #[serde(default = "default_search_limit")]
    pub limit: usize,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct BreakthroughArgs {
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub recent_only: bool,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TopicArgs {
    pub topic: String,
    #[serde(default)]
    pub sender: Option<Sender>,
    #[serde(default = "default_topic_limit")]
    pub limit: usize,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PatternArgs {
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default = "default_search_limit")]
    pub limit: usize,
}

fn day(record: &MemoryRecord) -> String {
    record.timestamp.format("%Y-%m-%d").to_string()
}

fn preview(record: &MemoryRecord) -> &str {
    if record.summary.is_empty() {
        &record.content
    } else {
        &record.summary
    }
}

pub fn format_stats(stats: &ReaderStats, include_details: bool) -> String {
    let mut out = String::from("## Memory Overview\n\n");
    let _ = writeln!(out, "**Total memories:** {}", stats.store.total_memories);
    let _ = writeln!(out, "**Breakthrough moments:** {}", stats.breakthrough_moments);
    let _ = writeln!(out, "**Insights gained:** {}", stats.insights_gained);
    let _ = writeln!(
        out,
        "**Emotional growth indicators:** {}",
        stats.emotional_growth_indicators
    );
    if include_details {
        out.push('\n');
        if let (Some(oldest), Some(newest)) = (stats.store.oldest_memory, stats.store.newest_memory)
        {
            let _ = writeln!(
                out,
                "**Memory span:** {} to {}",
                oldest.format("%Y-%m-%d"),
                newest.format("%Y-%m-%d")
            );
        }
        let _ = writeln!(
            out,
            "**Storage size:** {:.1} KB",
            stats.store.storage_size_bytes as f64 / 1024.0
        );
        let _ = writeln!(
            out,
            "**Retention:** {} days",
            stats.store.retention_period.as_secs() / 86_400
        );
    }
    out
}

pub fn format_search(query: &str, mode: SearchMode, results: &[ScoredMemory]) -> String {
    if results.is_empty() {
        return format!("No stored memories matched \"{query}\".");
    }
    let mut out = format!("## Memories matching \"{query}\"\n\n");
    let _ = writeln!(out, "*Search mode: {}*\n", mode.as_str());
    for (index, result) in results.iter().enumerate() {
        let memory = &result.memory;
        let _ = writeln!(
            out,
            "**{}. {}** ({}, score {:.2}, relevance {:.1})",
            index + 1,
            memory.sender,
            day(memory),
            result.similarity,
            result.relevance
        );
        let _ = writeln!(out, "{}", preview(memory));
        if !memory.key_topics.is_empty() {
            let _ = writeln!(out, "Topics: {}", memory.key_topics.join(", "));
        }
        out.push('\n');
    }
    out
}

pub fn format_breakthroughs(records: &[MemoryRecord], topic: Option<&str>) -> String {
    if records.is_empty() {
        return "No breakthrough moments recorded for this topic.".to_string();
    }
    let mut out = String::from("## Breakthrough Moments\n\n");
    if let Some(topic) = topic.filter(|topic| !topic.trim().is_empty()) {
        let _ = writeln!(out, "Focus: *{topic}*\n");
    }
    for (index, record) in records.iter().take(MAX_LISTED_BREAKTHROUGHS).enumerate() {
        let _ = writeln!(out, "**Breakthrough {}** ({})", index + 1, day(record));
        let _ = writeln!(out, "*{}*", preview(record));
        let marker = if is_breakthrough(&record.content) {
            " | breakthrough marker"
        } else {
            ""
        };
        let _ = writeln!(
            out,
            "Insight level: {:.1} | Category: {}{marker}\n",
            insight_level(&record.content),
            categorize(&record.content).as_str()
        );
    }
    out
}

pub fn format_topic(topic: &str, records: &[MemoryRecord]) -> String {
    if records.is_empty() {
        return format!("No stored memories are tagged with \"{topic}\".");
    }
    let mut out = format!("## Memories tagged \"{topic}\"\n\n");
    for record in records {
        let _ = writeln!(out, "- **{}** ({}): {}", record.sender, day(record), preview(record));
    }
    out
}

pub fn format_emotional_patterns(context: Option<&str>, records: &[MemoryRecord]) -> String {
    let mut out = String::from("## Emotional Patterns\n\n");
    if let Some(context) = context.filter(|context| !context.trim().is_empty()) {
        let _ = writeln!(out, "Context: *{context}*\n");
    }
    if records.is_empty() {
        out.push_str("No emotional-awareness memories recorded yet.\n");
        return out;
    }
    for record in records {
        let _ = writeln!(out, "- {} ({})", preview(record), day(record));
        if !record.key_topics.is_empty() {
            let _ = writeln!(out, "  Triggers: {}", record.key_topics.join(", "));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{
        BreakthroughArgs, SearchArgs, StatsArgs, format_breakthroughs, format_search,
        format_stats, format_topic,
    };
    use crate::analysis::TherapeuticCategory;
    use crate::reader::{ReaderStats, ScoredMemory, SearchMode};
    use ai_therapy_memory::{MemoryRecord, MemoryStats, Sender};
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::time::Duration;
    use uuid::Uuid;

    fn record(sender: Sender, content: &str) -> MemoryRecord {
        MemoryRecord {
            id: Uuid::new_v4(),
            timestamp: Utc
                .with_ymd_and_hms(2025, 3, 4, 10, 0, 0)
                .single()
                .expect("timestamp"),
            sender,
            content: content.to_string(),
            summary: content.to_string(),
            key_topics: vec!["emotions".to_string()],
            embedding: None,
            session_id: Uuid::nil(),
            metadata: json!({}),
        }
    }

    #[test]
    fn arguments_take_defaults() {
        let stats: StatsArgs = serde_json::from_value(json!({})).expect("stats");
        assert!(stats.include_details);

        let search: SearchArgs = serde_json::from_value(json!({
            "query": "purpose",
            "sender": "claude",
            "category": "emotional_awareness"
        }))
        .expect("search");
        assert_eq!(search.sender, Some(Sender::Claude));
        assert_eq!(search.category, Some(TherapeuticCategory::EmotionalAwareness));
        assert_eq!(search.limit, 5);

        let breakthroughs: BreakthroughArgs = serde_json::from_value(json!({})).expect("args");
        assert_eq!(breakthroughs, BreakthroughArgs::default());
    }

    #[test]
    fn search_requires_a_query() {
        assert!(serde_json::from_value::<SearchArgs>(json!({ "limit": 2 })).is_err());
    }

    #[test]
    fn stats_render_details() {
        let stats = ReaderStats {
            store: MemoryStats {
                total_memories: 2,
                oldest_memory: Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).single(),
                newest_memory: Utc.with_ymd_and_hms(2025, 3, 4, 0, 0, 0).single(),
                storage_size_bytes: 2048,
                retention_period: Duration::from_secs(5 * 86_400),
            },
            breakthrough_moments: 1,
            insights_gained: 0,
            emotional_growth_indicators: 2,
        };
        assert_eq!(
            format_stats(&stats, true),
            "## Memory Overview\n\n\
             **Total memories:** 2\n\
             **Breakthrough moments:** 1\n\
             **Insights gained:** 0\n\
             **Emotional growth indicators:** 2\n\
             \n\
             **Memory span:** 2025-03-01 to 2025-03-04\n\
             **Storage size:** 2.0 KB\n\
             **Retention:** 5 days\n"
        );
        assert!(!format_stats(&stats, false).contains("Storage size"));
    }

    #[test]
    fn search_lists_sender_date_and_topics() {
        let results = vec![ScoredMemory {
            memory: record(Sender::Claude, "I feel unsure"),
            similarity: 0.75,
            relevance: 0.0,
        }];
        let text = format_search("unsure", SearchMode::Keyword, &results);
        assert!(text.starts_with("## Memories matching \"unsure\"\n\n*Search mode: keyword*\n\n"));
        assert!(text.contains("**1. claude** (2025-03-04, score 0.75, relevance 0.0)\nI feel unsure\nTopics: emotions\n"));
        assert_eq!(
            format_search("x", SearchMode::Semantic, &[]),
            "No stored memories matched \"x\"."
        );
    }

    #[test]
    fn breakthroughs_and_topics_render_empty_states() {
        assert_eq!(
            format_breakthroughs(&[], None),
            "No breakthrough moments recorded for this topic."
        );
        assert_eq!(
            format_topic("identity", &[]),
            "No stored memories are tagged with \"identity\"."
        );
        let text = format_breakthroughs(
            &[record(Sender::Claude, "Claude had an epiphany")],
            Some("epiphany"),
        );
        assert!(text.contains("Focus: *epiphany*"));
        assert!(text.contains("**Breakthrough 1** (2025-03-04)"));
        assert!(text.contains("| breakthrough marker"));
    }
}
