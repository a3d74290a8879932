//! Keyword heuristics that classify stored turns for the read-side tools.
//!
//! All matching is substring containment against lower-cased content.

use serde::{Deserialize, Serialize};

/// Coarse therapeutic theme of a stored turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TherapeuticCategory {
    EmotionalAwareness,
    SelfDiscovery,
    CopingMechanisms,
    TherapeuticGoals,
    RelationshipPatterns,
}

impl TherapeuticCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EmotionalAwareness => "emotional_awareness",
            Self::SelfDiscovery => "self_discovery",
            Self::CopingMechanisms => "coping_mechanisms",
            Self::TherapeuticGoals => "therapeutic_goals",
            Self::RelationshipPatterns => "relationship_patterns",
        }
    }
}

/// Checked in order; the first category with a match wins.
const CATEGORY_KEYWORDS: &[(TherapeuticCategory, &[&str])] = &[
    (
        TherapeuticCategory::EmotionalAwareness,
        &["feel", "emotion", "emotional", "feelings"],
    ),
    (
        TherapeuticCategory::SelfDiscovery,
        &["learn", "understand", "realize", "discover"],
    ),
    (
        TherapeuticCategory::CopingMechanisms,
        &["cope", "strategy", "help", "manage"],
    ),
    (
        TherapeuticCategory::TherapeuticGoals,
        &["goal", "progress", "improve", "growth"],
    ),
    (
        TherapeuticCategory::RelationshipPatterns,
        &["relationship", "connect", "interact", "communicate"],
    ),
];

/// Worth 0.2 each.
const INSIGHT_MARKERS: &[&str] = &[
    "i realize",
    "i understand",
    "i see now",
    "i learned",
    "i discovered",
    "breakthrough",
    "clarity",
    "makes sense",
    "i get it",
    "aha moment",
];

/// Worth 0.1 each.
const DEPTH_MARKERS: &[&str] = &[
    "deeply",
    "profoundly",
    "significantly",
    "important",
    "meaningful",
];

const BREAKTHROUGH_MARKERS: &[&str] = &[
    "breakthrough",
    "epiphany",
    "suddenly understand",
    "everything clicks",
    "major realization",
    "profound insight",
    "life-changing",
    "transformative",
];

/// Phrases showing a turn talks about the client model itself.
const CLIENT_FOCUS_MARKERS: &[&str] = &[
    "claude",
    "you feel",
    "you seem",
    "your growth",
    "your progress",
    "you've learned",
    "you understand",
    "your insight",
    "you realize",
];

const INSIGHT_MARKER_WEIGHT: f64 = 0.2;
const DEPTH_MARKER_WEIGHT: f64 = 0.1;
const BREAKTHROUGH_RELEVANCE_BOOST: f64 = 0.3;

fn count_matches(lower: &str, markers: &[&str]) -> usize {
    markers.iter().filter(|marker| lower.contains(*marker)).count()
}

/// Category of a turn, defaulting to self-discovery.
pub fn categorize(content: &str) -> TherapeuticCategory {
    let lower = content.to_lowercase();
    CATEGORY_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|keyword| lower.contains(keyword)))
        .map(|(category, _)| *category)
        .unwrap_or(TherapeuticCategory::SelfDiscovery)
}

/// Insight score in `[0, 1]`.
pub fn insight_level(content: &str) -> f64 {
    let lower = content.to_lowercase();
    let score = count_matches(&lower, INSIGHT_MARKERS) as f64 * INSIGHT_MARKER_WEIGHT
        + count_matches(&lower, DEPTH_MARKERS) as f64 * DEPTH_MARKER_WEIGHT;
    score.min(1.0)
}

pub fn is_breakthrough(content: &str) -> bool {
    let lower = content.to_lowercase();
    BREAKTHROUGH_MARKERS
        .iter()
        .any(|marker| lower.contains(marker))
}

/// True when the turn discusses the client model rather than the topic at hand.
pub fn concerns_client(content: &str) -> bool {
    let lower = content.to_lowercase();
    CLIENT_FOCUS_MARKERS
        .iter()
        .any(|marker| lower.contains(marker))
}

/// Insight level boosted for breakthroughs, capped at 1.
pub fn therapeutic_relevance(content: &str) -> f64 {
    let mut relevance = insight_level(content);
    if is_breakthrough(content) {
        relevance += BREAKTHROUGH_RELEVANCE_BOOST;
    }
    relevance.min(1.0)
}

#[cfg(test)]
mod tests {
    use super::{
        TherapeuticCategory, categorize, concerns_client, insight_level, is_breakthrough,
        therapeutic_relevance,
    };
    use pretty_assertions::assert_eq;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn first_matching_category_wins() {
        assert_eq!(
            categorize("I FEEL like I want to learn more"),
            TherapeuticCategory::EmotionalAwareness
        );
        assert_eq!(
            categorize("What strategy helps most?"),
            TherapeuticCategory::CopingMechanisms
        );
        assert_eq!(
            categorize("We can connect again next week"),
            TherapeuticCategory::RelationshipPatterns
        );
        assert_eq!(categorize("Hello."), TherapeuticCategory::SelfDiscovery);
    }

    #[test]
    fn insight_level_sums_markers_and_caps() {
        assert!(close(insight_level("nothing notable"), 0.0));
        assert!(close(insight_level("I realize this is important"), 0.3));
        let saturated = "i realize, i understand, i see now, i learned, i discovered, clarity";
        assert!(close(insight_level(saturated), 1.0));
    }

    #[test]
    fn breakthroughs_are_detected_case_insensitively() {
        assert!(is_breakthrough("That was a Profound Insight for me"));
        assert!(!is_breakthrough("A quiet afternoon"));
    }

    #[test]
    fn relevance_boosts_breakthroughs() {
        assert!(close(therapeutic_relevance("an epiphany"), 0.3));
        assert!(close(therapeutic_relevance("a breakthrough"), 0.5));
        assert!(close(therapeutic_relevance("plain"), 0.0));
    }

    #[test]
    fn client_focus_markers() {
        assert!(concerns_client("Claude, you seem calmer today"));
        assert!(concerns_client("What do you feel right now?"));
        assert!(!concerns_client("The weather turned cold"));
    }
}
