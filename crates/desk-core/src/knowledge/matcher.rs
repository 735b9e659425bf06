//! Pluggable answer matching policies

use std::collections::HashSet;

use crate::knowledge::KnowledgeEntry;

/// Scores how well a knowledge entry answers a question
///
/// Implementations return a confidence in `0.0..=1.0`.
pub trait AnswerMatcher: Send + Sync {
    /// Matcher name, for logging
    fn name(&self) -> &str;

    /// Whether the matcher needs query keywords to produce a score
    ///
    /// A question without keywords is never matched by such a matcher.
    fn requires_keywords(&self) -> bool {
        false
    }

    /// Confidence that `entry` answers `question`
    fn confidence(&self, question: &str, query_keywords: &[String], entry: &KnowledgeEntry) -> f64;
}

/// Matches only when the question text is identical (ignoring case and
/// surrounding whitespace)
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactMatcher;

impl AnswerMatcher for ExactMatcher {
    fn name(&self) -> &str {
        "exact"
    }

    fn confidence(&self, question: &str, _query_keywords: &[String], entry: &KnowledgeEntry) -> f64 {
        let question = question.trim();
        if !question.is_empty() && question.to_lowercase() == entry.question_text.trim().to_lowercase() {
            1.0
        } else {
            0.0
        }
    }
}

/// Scores by the share of query keywords found in the entry's keywords
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordOverlapMatcher;

impl KeywordOverlapMatcher {
    /// overlap(query, entry) / |query|, or 0.0 for an empty query
    pub fn overlap(query_keywords: &[String], entry_keywords: &[String]) -> f64 {
        let query: HashSet<&str> = query_keywords.iter().map(String::as_str).collect();
        if query.is_empty() {
            return 0.0;
        }
        let entry: HashSet<&str> = entry_keywords.iter().map(String::as_str).collect();
        let shared = query.intersection(&entry).count();
        shared as f64 / query.len() as f64
    }
}

impl AnswerMatcher for KeywordOverlapMatcher {
    fn name(&self) -> &str {
        "keywords"
    }

    fn requires_keywords(&self) -> bool {
        true
    }

    fn confidence(&self, _question: &str, query_keywords: &[String], entry: &KnowledgeEntry) -> f64 {
        Self::overlap(query_keywords, &entry.keywords)
    }
}
