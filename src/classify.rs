//! Query intent classification.
//!
//! The shaping step needs to know what kind of display a question asks for.
//! [`KeywordClassifier`] is a keyword match over the lower-cased question;
//! other strategies can be plugged in through [`QueryClassifier`].

use serde::Serialize;

/// Display intent of a natural-language question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryIntent {
    Spatial,
    UserProfile,
    Analytics,
    Table,
}

pub trait QueryClassifier: Send + Sync {
    fn classify(&self, question: &str) -> QueryIntent;
}

pub const SPATIAL_KEYWORDS: &[&str] = &["show", "visualize", "map", "where", "location", "area"];
pub const USER_KEYWORDS: &[&str] = &["user", "editor", "mapper", "who", "history"];
pub const ANALYTICS_KEYWORDS: &[&str] = &["chart", "graph", "trend", "pattern", "statistics", "count"];

/// Keyword matcher. Precedence: spatial, user profile, analytics, table.
///
/// Keywords match whole words of the question, where words are split on
/// anything that is not alphanumeric (so `mapper_suspicious` is two words).
/// A trailing plural `s`/`es` is accepted: "trends" matches "trend", but
/// "mapper" does not match "map".
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordClassifier;

fn matches_keyword(word: &str, keyword: &str) -> bool {
    match word.strip_prefix(keyword) {
        Some(rest) => rest.is_empty() || rest == "s" || rest == "es",
        None => false,
    }
}

impl QueryClassifier for KeywordClassifier {
    fn classify(&self, question: &str) -> QueryIntent {
        let lower = question.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        let hit = |keywords: &[&str]| {
            keywords
                .iter()
                .any(|k| words.iter().any(|w| matches_keyword(w, k)))
        };

        if hit(SPATIAL_KEYWORDS) {
            QueryIntent::Spatial
        } else if hit(USER_KEYWORDS) {
            QueryIntent::UserProfile
        } else if hit(ANALYTICS_KEYWORDS) {
            QueryIntent::Analytics
        } else {
            QueryIntent::Table
        }
    }
}
