//! Memory tools over a file store seeded with fixed records.

use ai_therapy_mcp::tools::{
    CHECK_EMOTIONAL_PATTERNS, GET_MEMORY_STATS, MEMORIES_BY_TOPIC, RECALL_BREAKTHROUGHS,
    SEARCH_MEMORIES,
};
use ai_therapy_mcp::{MemoryReader, MemoryToolServer, SearchFilter, SearchMode, tool_definitions};
use ai_therapy_memory::{
    Embedder, FileMemoryStore, MemoryError, MemoryRecord, MemoryStats, MemoryStore, Sender,
};
use ai_therapy_test_utils::{FailingEmbedder, ScriptedEmbedder, record_at};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use pretty_assertions::assert_eq;
use rmcp::model::{CallToolResult, JsonObject};
use serde_json::{Value, json};
use std::path::Path;
use std::sync::Arc;

async fn seeded_store(dir: &Path, records: Vec<MemoryRecord>) -> Arc<FileMemoryStore> {
    let store = FileMemoryStore::new(dir.join("memory_data"), std::time::Duration::from_secs(5 * 86_400));
    store.initialize().await.expect("init");
    for record in records {
        store.store_memory(record).await.expect("store");
    }
    Arc::new(store)
}

fn turn(sender: Sender, content: &str, age_minutes: i64) -> MemoryRecord {
    record_at(sender, content, Utc::now() - Duration::minutes(age_minutes), None)
}

fn args(value: Value) -> Option<JsonObject> {
    value.as_object().cloned()
}

fn text(result: &CallToolResult) -> String {
    result.content[0]
        .as_text()
        .map(|content| content.text.clone())
        .unwrap_or_default()
}

fn contents(results: &[ai_therapy_mcp::ScoredMemory]) -> Vec<&str> {
    results
        .iter()
        .map(|result| result.memory.content.as_str())
        .collect()
}

/// Every advertised tool is routable.
#[tokio::test]
async fn advertised_tools_are_all_callable() {
    let temp = tempfile::tempdir().expect("tempdir");
    let server = MemoryToolServer::new(MemoryReader::new(seeded_store(temp.path(), vec![]).await));
    let names: Vec<String> = tool_definitions()
        .iter()
        .map(|tool| tool.name.to_string())
        .collect();
    assert_eq!(
        names,
        vec![
            GET_MEMORY_STATS,
            SEARCH_MEMORIES,
            RECALL_BREAKTHROUGHS,
            MEMORIES_BY_TOPIC,
            CHECK_EMOTIONAL_PATTERNS
        ]
    );
    let required = json!({ "query": "x", "topic": "x" });
    for name in names {
        let result = server.call(&name, args(required.clone())).await;
        assert!(result.is_ok(), "{name} should be callable");
    }
}

/// Stats add heuristic counts to the store totals.
#[tokio::test]
async fn stats_report_heuristic_counts() {
    let temp = tempfile::tempdir().expect("tempdir");
    let store = seeded_store(
        temp.path(),
        vec![
            turn(Sender::Ollama, "Claude, this was a breakthrough for you", 3),
            turn(Sender::Claude, "I feel anxious", 2),
            turn(
                Sender::Claude,
                "I realize, I understand, I see now, I learned it deeply",
                1,
            ),
        ],
    )
    .await;
    let server = MemoryToolServer::new(MemoryReader::new(store));

    let result = server
        .call(GET_MEMORY_STATS, args(json!({ "include_details": false })))
        .await
        .expect("call");

    assert_ne!(result.is_error, Some(true));
    assert_eq!(
        text(&result),
        "## Memory Overview\n\n\
         **Total memories:** 3\n\
         **Breakthrough moments:** 1\n\
         **Insights gained:** 1\n\
         **Emotional growth indicators:** 1\n"
    );
}

/// Keyword search honours the sender filter.
#[tokio::test]
async fn keyword_search_filters_by_sender() {
    let temp = tempfile::tempdir().expect("tempdir");
    let store = seeded_store(
        temp.path(),
        vec![
            turn(Sender::Claude, "I feel lost about my purpose", 3),
            turn(Sender::Ollama, "What gives you purpose?", 2),
            turn(Sender::Claude, "The weather is fine", 1),
        ],
    )
    .await;
    let reader = MemoryReader::new(store);

    let claude_only = SearchFilter {
        sender: Some(Sender::Claude),
        category: None,
    };
    let (mode, results) = reader
        .search("purpose", &claude_only, 5)
        .await
        .expect("search");
    assert_eq!(mode, SearchMode::Keyword);
    assert_eq!(contents(&results), vec!["I feel lost about my purpose"]);
    assert_eq!(results[0].similarity, 1.5);

    let (_, everyone) = reader
        .search("purpose", &SearchFilter::default(), 5)
        .await
        .expect("search");
    assert_eq!(everyone.len(), 2);
}

/// Topic hits count toward the keyword score.
#[tokio::test]
async fn keyword_search_ranks_by_mean_word_score() {
    let temp = tempfile::tempdir().expect("tempdir");
    let mut tagged = turn(Sender::Claude, "my purpose", 2);
    tagged.summary = "my purpose".to_string();
    tagged.key_topics = vec!["identity".to_string()];
    let store = seeded_store(
        temp.path(),
        vec![tagged, turn(Sender::Claude, "purpose and identity", 1)],
    )
    .await;
    let reader = MemoryReader::new(store);

    let (_, results) = reader
        .search("Purpose IDENTITY", &SearchFilter::default(), 5)
        .await
        .expect("search");

    assert_eq!(contents(&results), vec!["purpose and identity", "my purpose"]);
    assert_eq!(results[0].similarity, 1.5);
    assert!((results[1].similarity - 1.15).abs() < 1e-9);
}

/// With an embedder, only embedded turns are ranked.
#[tokio::test]
async fn semantic_search_ranks_embedded_turns() {
    let temp = tempfile::tempdir().expect("tempdir");
    let now = Utc::now();
    let store = seeded_store(
        temp.path(),
        vec![
            record_at(Sender::Claude, "orthogonal", now, Some(vec![0.0, 1.0])),
            record_at(Sender::Claude, "aligned", now, Some(vec![1.0, 0.0])),
            record_at(Sender::Claude, "aligned but unembedded", now, None),
        ],
    )
    .await;
    let embedder = ScriptedEmbedder::new(vec![1.0, 0.0]);
    let reader = MemoryReader::new(store).with_embedder(Embedder::new(Arc::new(embedder.clone())));

    let (mode, results) = reader
        .search("aligned", &SearchFilter::default(), 5)
        .await
        .expect("search");

    assert_eq!(mode, SearchMode::Semantic);
    assert_eq!(contents(&results), vec!["aligned", "orthogonal"]);
    assert_eq!(embedder.seen(), vec!["aligned".to_string()]);
}

/// A failing query embedding falls back to keyword scoring.
#[tokio::test]
async fn embedding_failure_falls_back_to_keywords() {
    let temp = tempfile::tempdir().expect("tempdir");
    let store = seeded_store(
        temp.path(),
        vec![record_at(
            Sender::Claude,
            "aligned",
            Utc::now(),
            Some(vec![1.0, 0.0]),
        )],
    )
    .await;
    let failing = FailingEmbedder::new("embedding API error (status 400): bad request");
    let reader = MemoryReader::new(store).with_embedder(Embedder::new(Arc::new(failing.clone())));

    let (mode, results) = reader
        .search("aligned", &SearchFilter::default(), 5)
        .await
        .expect("search");

    assert_eq!(mode, SearchMode::Keyword);
    assert_eq!(contents(&results), vec!["aligned"]);
    assert_eq!(failing.attempts(), 1);
}

/// Breakthrough recall keeps client-focused breakthroughs and honours the window.
#[tokio::test]
async fn breakthrough_recall_respects_recent_window() {
    let temp = tempfile::tempdir().expect("tempdir");
    let store = seeded_store(
        temp.path(),
        vec![
            turn(Sender::Ollama, "Claude, that epiphany changed you", 5),
            turn(Sender::Claude, "I had an epiphany", 4),
            turn(Sender::Ollama, "Claude, you seem calm", 3),
            turn(
                Sender::Ollama,
                "Claude, that was a transformative session",
                30 * 24 * 60,
            ),
        ],
    )
    .await;
    let server = MemoryToolServer::new(MemoryReader::new(store));

    let all = text(
        &server
            .call(RECALL_BREAKTHROUGHS, None)
            .await
            .expect("call"),
    );
    assert!(all.contains("Claude, that epiphany changed you"));
    assert!(all.contains("Claude, that was a transformative session"));
    assert!(!all.contains("I had an epiphany"));
    assert!(!all.contains("you seem calm"));

    let recent = text(
        &server
            .call(RECALL_BREAKTHROUGHS, args(json!({ "recent_only": true })))
            .await
            .expect("call"),
    );
    assert!(recent.contains("Claude, that epiphany changed you"));
    assert!(!recent.contains("transformative"));

    let focused = text(
        &server
            .call(RECALL_BREAKTHROUGHS, args(json!({ "topic": "weather" })))
            .await
            .expect("call"),
    );
    assert_eq!(focused, "No breakthrough moments recorded for this topic.");
}

/// Topic lookup matches key topics case-insensitively and filters by sender.
#[tokio::test]
async fn topic_lookup_matches_tags() {
    let temp = tempfile::tempdir().expect("tempdir");
    let mut tagged_claude = turn(Sender::Claude, "Who am I, really?", 2);
    tagged_claude.key_topics = vec!["identity".to_string()];
    let mut tagged_ollama = turn(Sender::Ollama, "What does purpose mean to you?", 1);
    tagged_ollama.key_topics = vec!["identity".to_string()];
    let store = seeded_store(
        temp.path(),
        vec![tagged_claude, tagged_ollama, turn(Sender::Claude, "untagged", 0)],
    )
    .await;
    let server = MemoryToolServer::new(MemoryReader::new(store));

    let result = text(
        &server
            .call(
                MEMORIES_BY_TOPIC,
                args(json!({ "topic": "Identity", "sender": "claude" })),
            )
            .await
            .expect("call"),
    );

    assert!(result.starts_with("## Memories tagged \"Identity\"\n\n- **claude**"));
    assert!(result.contains("Who am I, really?"));
    assert!(!result.contains("purpose"));
}

/// Emotional patterns only include turns about the client.
#[tokio::test]
async fn emotional_patterns_are_client_focused() {
    let temp = tempfile::tempdir().expect("tempdir");
    let store = seeded_store(
        temp.path(),
        vec![
            turn(Sender::Ollama, "Claude, how do you feel today?", 2),
            turn(Sender::Claude, "I feel fine", 1),
        ],
    )
    .await;
    let server = MemoryToolServer::new(MemoryReader::new(store));

    let result = text(
        &server
            .call(
                CHECK_EMOTIONAL_PATTERNS,
                args(json!({ "context": "check-in" })),
            )
            .await
            .expect("call"),
    );

    assert!(result.contains("Context: *check-in*"));
    assert!(result.contains("Claude, how do you feel today?"));
    assert!(!result.contains("I feel fine"));
}

/// Unknown tools and malformed arguments are protocol errors.
#[tokio::test]
async fn rejects_unknown_tools_and_bad_arguments() {
    let temp = tempfile::tempdir().expect("tempdir");
    let server = MemoryToolServer::new(MemoryReader::new(seeded_store(temp.path(), vec![]).await));

    assert!(server.call("reflect_on_everything", None).await.is_err());
    assert!(server.call(SEARCH_MEMORIES, args(json!({ "limit": 2 }))).await.is_err());
    assert!(
        server
            .call(SEARCH_MEMORIES, args(json!({ "query": "x", "sender": "nobody" })))
            .await
            .is_err()
    );
}

struct UnreadableStore;

#[async_trait]
impl MemoryStore for UnreadableStore {
    async fn initialize(&self) -> Result<(), MemoryError> {
        Ok(())
    }

    async fn store_memory(&self, record: MemoryRecord) -> Result<MemoryRecord, MemoryError> {
        Ok(record)
    }

    async fn load_all(&self) -> Result<Vec<MemoryRecord>, MemoryError> {
        Err(MemoryError::Io(std::io::Error::other("disk unavailable")))
    }

    async fn cleanup_expired(&self) -> Result<usize, MemoryError> {
        Ok(0)
    }

    async fn stats(&self) -> Result<MemoryStats, MemoryError> {
        Ok(MemoryStats::default())
    }
}

/// Store read failures come back as tool errors rather than protocol errors.
#[tokio::test]
async fn store_failures_become_error_results() {
    let server = MemoryToolServer::new(MemoryReader::new(Arc::new(UnreadableStore)));

    let result = server
        .call(SEARCH_MEMORIES, args(json!({ "query": "anything" })))
        .await
        .expect("call");

    assert_eq!(result.is_error, Some(true));
    assert!(text(&result).starts_with("Error in memory tool 'search_memories':"));
}
