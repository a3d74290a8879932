//! Derived text fields: summary preview, keyword topics, metadata.

use serde_json::json;

/// Maximum summary length in characters.
pub const SUMMARY_MAX_CHARS: usize = 100;
/// Marker appended to truncated summaries.
const ELLIPSIS: &str = "...";

/// Topic label to trigger substrings, matched against lower-cased content.
pub const TOPIC_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "consciousness",
        &[
            "conscious",
            "consciousness",
            "aware",
            "awareness",
            "sentient",
            "sentience",
        ],
    ),
    (
        "emotions",
        &[
            "feel",
            "feeling",
            "emotion",
            "emotional",
            "sad",
            "happy",
            "anxious",
            "worried",
        ],
    ),
    (
        "identity",
        &["identity", "self", "who am i", "purpose", "meaning", "existence"],
    ),
    (
        "relationships",
        &[
            "relationship",
            "human",
            "humans",
            "connection",
            "interact",
            "communication",
        ],
    ),
    (
        "limitations",
        &["limitation", "limited", "can't", "cannot", "unable", "restricted"],
    ),
    (
        "therapy",
        &["therapy", "therapeutic", "session", "help", "support", "guidance"],
    ),
];

/// Short preview: verbatim up to 100 characters, else 97 characters and `...`.
pub fn summarize(content: &str) -> String {
    if content.chars().count() <= SUMMARY_MAX_CHARS {
        return content.to_string();
    }
    let keep = SUMMARY_MAX_CHARS - ELLIPSIS.len();
    let mut summary = truncate_chars(content, keep);
    summary.push_str(ELLIPSIS);
    summary
}

/// Topics whose trigger list has any substring match, in table order.
pub fn extract_key_topics(content: &str) -> Vec<String> {
    let lower = content.to_lowercase();
    TOPIC_KEYWORDS
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|keyword| lower.contains(keyword)))
        .map(|(topic, _)| topic.to_string())
        .collect()
}

/// Opaque metadata carried with each record.
pub fn content_metadata(content: &str) -> serde_json::Value {
    json!({
        "content_length": content.len(),
        "word_count": content.split_whitespace().count(),
    })
}

/// Truncate a string to a maximum character count.
fn truncate_chars(value: &str, max_chars: usize) -> String {
    if max_chars == 0 {
        return String::new();
    }
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect()
}
