//! Knowledge base lookup

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::knowledge::{AnswerMatcher, KeywordOverlapMatcher, KnowledgeEntry, extract_keywords};
use crate::Result;

/// Default minimum confidence for a direct answer
pub const DEFAULT_THRESHOLD: f64 = 0.6;

/// A recorded answer that cleared the confidence threshold
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    /// ID of the matched entry
    pub entry_id: String,
    /// Answer text to relay
    pub text: String,
    /// Confidence in `0.0..=1.0`
    pub confidence: f64,
}

/// Read-only lookup surface over a set of knowledge entries
#[derive(Clone)]
pub struct KnowledgeBase {
    entries: Vec<KnowledgeEntry>,
    matcher: Arc<dyn AnswerMatcher>,
    threshold: f64,
}

impl KnowledgeBase {
    /// Create a knowledge base with the keyword-overlap matcher and the
    /// default threshold
    pub fn new(entries: Vec<KnowledgeEntry>) -> Self {
        Self {
            entries,
            matcher: Arc::new(KeywordOverlapMatcher),
            threshold: DEFAULT_THRESHOLD,
        }
    }

    /// Use a different matching policy
    pub fn with_matcher(mut self, matcher: Arc<dyn AnswerMatcher>) -> Self {
        self.matcher = matcher;
        self
    }

    /// Set the confidence threshold
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn entries(&self) -> &[KnowledgeEntry] {
        &self.entries
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find the best recorded answer for a caller question
    ///
    /// Returns `None` when no entry exceeds the threshold, which means the
    /// question has to be escalated.
    pub fn find_answer(&self, question: &str) -> Option<Answer> {
        let keywords = extract_keywords(question);
        self.best_match(question, &keywords, None)
    }

    /// Same as [`find_answer`](Self::find_answer), restricted to one category
    pub fn find_answer_in_category(&self, question: &str, category: &str) -> Option<Answer> {
        let keywords = extract_keywords(question);
        self.best_match(question, &keywords, Some(category))
    }

    /// Look up with pre-extracted query keywords
    pub fn find_answer_by_keywords(&self, keywords: &[String]) -> Option<Answer> {
        self.best_match("", keywords, None)
    }

    fn best_match(&self, question: &str, keywords: &[String], category: Option<&str>) -> Option<Answer> {
        if keywords.is_empty() && self.matcher.requires_keywords() {
            debug!("No keywords in question, skipping {} lookup", self.matcher.name());
            return None;
        }

        let mut best: Option<(&KnowledgeEntry, f64)> = None;
        for entry in &self.entries {
            if category.is_some_and(|c| !entry.in_category(c)) {
                continue;
            }
            let confidence = self.matcher.confidence(question, keywords, entry);
            // Strictly greater keeps the first-seen entry on ties
            if best.is_none_or(|(_, top)| confidence > top) {
                best = Some((entry, confidence));
            }
        }

        let (entry, confidence) = best?;
        if confidence <= self.threshold || confidence <= 0.0 {
            debug!(
                "Best {} match {:.2} does not exceed threshold {:.2}",
                self.matcher.name(),
                confidence,
                self.threshold
            );
            return None;
        }

        debug!(entry_id = %entry.id, confidence, "Knowledge base match");
        Some(Answer {
            entry_id: entry.id.clone(),
            text: entry.answer_text.clone(),
            confidence,
        })
    }

    /// Render the entries as pretty JSON for the language model's context
    pub fn to_prompt_json(&self) -> Result<String> {
        if self.entries.is_empty() {
            return Ok("[]".to_string());
        }
        Ok(serde_json::to_string_pretty(&self.entries)?)
    }
}

impl std::fmt::Debug for KnowledgeBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeBase")
            .field("entries", &self.entries.len())
            .field("matcher", &self.matcher.name())
            .field("threshold", &self.threshold)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::ExactMatcher;

    fn color_entry() -> KnowledgeEntry {
        KnowledgeEntry::new("Do you do color treatments?", "Yes, we do color.")
            .with_category("services")
            .with_keywords(["color", "treatment", "services"])
    }

    fn words(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_full_overlap_matches() {
        let kb = KnowledgeBase::new(vec![color_entry()]).with_threshold(0.6);
        let answer = kb.find_answer_by_keywords(&words(&["color", "treatment"])).unwrap();
        assert_eq!(answer.confidence, 1.0);
        assert_eq!(answer.text, "Yes, we do color.");
    }

    #[test]
    fn test_half_overlap_escalates() {
        let kb = KnowledgeBase::new(vec![color_entry()]).with_threshold(0.6);
        assert!(kb.find_answer_by_keywords(&words(&["color", "price"])).is_none());
    }

    #[test]
    fn test_confidence_must_exceed_threshold() {
        let kb = KnowledgeBase::new(vec![color_entry()]).with_threshold(0.5);
        assert!(kb.find_answer_by_keywords(&words(&["color", "price"])).is_none());

        let kb = kb.with_threshold(0.49);
        let answer = kb.find_answer_by_keywords(&words(&["color", "price"])).unwrap();
        assert_eq!(answer.confidence, 0.5);
    }

    #[test]
    fn test_no_keywords_no_match() {
        let kb = KnowledgeBase::new(vec![color_entry()]);
        assert!(kb.find_answer("Is it?").is_none());
        assert!(kb.find_answer("").is_none());
        assert!(kb.find_answer_by_keywords(&[]).is_none());
    }

    #[test]
    fn test_ties_pick_first_seen() {
        let first = KnowledgeEntry::new("Color one", "first").with_keywords(["color"]);
        let second = KnowledgeEntry::new("Color two", "second").with_keywords(["color"]);
        let kb = KnowledgeBase::new(vec![first, second]);

        let answer = kb.find_answer_by_keywords(&words(&["color"])).unwrap();
        assert_eq!(answer.text, "first");
    }

    #[test]
    fn test_higher_score_wins_over_earlier_entry() {
        let weak = KnowledgeEntry::new("Color", "weak").with_keywords(["color"]);
        let strong =
            KnowledgeEntry::new("Color price", "strong").with_keywords(["color", "price"]);
        let kb = KnowledgeBase::new(vec![weak, strong]).with_threshold(0.5);

        let answer = kb.find_answer_by_keywords(&words(&["color", "price"])).unwrap();
        assert_eq!(answer.text, "strong");
    }

    #[test]
    fn test_question_text_lookup() {
        let entry = KnowledgeEntry::new(
            "Do you do color treatments?",
            "Yes, we specialize in black and brown color treatments.",
        );
        let kb = KnowledgeBase::new(vec![entry]);
        let answer = kb.find_answer("Color treatments, do you do them?").unwrap();
        assert!(answer.text.starts_with("Yes"));
        assert!(kb.find_answer("Do you sell shampoo?").is_none());
    }

    #[test]
    fn test_category_filter() {
        let kb = KnowledgeBase::new(vec![color_entry()]);
        assert!(kb.find_answer_in_category("color treatment", "services").is_some());
        assert!(kb.find_answer_in_category("color treatment", "pricing").is_none());
    }

    #[test]
    fn test_exact_matcher_policy() {
        let kb = KnowledgeBase::new(vec![color_entry()]).with_matcher(Arc::new(ExactMatcher));
        assert!(kb.find_answer("do you do color treatments?").is_some());
        assert!(kb.find_answer("color treatment").is_none());
    }

    #[test]
    fn test_prompt_json() {
        let empty = KnowledgeBase::new(Vec::new());
        assert_eq!(empty.to_prompt_json().unwrap(), "[]");

        let kb = KnowledgeBase::new(vec![color_entry()]);
        let json: serde_json::Value = serde_json::from_str(&kb.to_prompt_json().unwrap()).unwrap();
        assert_eq!(json[0]["category"], "services");
    }
}
