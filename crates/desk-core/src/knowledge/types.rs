//! Knowledge entry type

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::knowledge::extract_keywords;

/// A static question/answer pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    /// Unique identifier
    pub id: String,
    /// Canonical question text
    pub question_text: String,
    /// Answer spoken to the caller
    pub answer_text: String,
    /// Optional category (e.g. "pricing", "services")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Keywords used for overlap matching
    #[serde(rename = "question_keywords", default)]
    pub keywords: Vec<String>,
    /// When the entry was added
    pub created_at: DateTime<Utc>,
}

impl KnowledgeEntry {
    /// Create an entry, generating keywords from the question text
    pub fn new(question_text: impl Into<String>, answer_text: impl Into<String>) -> Self {
        let question_text = question_text.into();
        let keywords = extract_keywords(&question_text);
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            question_text,
            answer_text: answer_text.into(),
            category: None,
            keywords,
            created_at: Utc::now(),
        }
    }

    /// Set the category
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Replace the generated keywords
    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    /// Whether the entry belongs to the given category (case-insensitive)
    pub fn in_category(&self, category: &str) -> bool {
        self.category
            .as_deref()
            .is_some_and(|c| c.eq_ignore_ascii_case(category.trim()))
    }
}
