//! Knowledge base of canned question/answer pairs
//!
//! Entries are populated offline (seed files, supervisor resolutions) and
//! are read-only to the call flow. `KnowledgeBase` decides whether a
//! question is covered; `KnowledgeRepository` persists entries in SQLite.

mod base;
mod keywords;
mod matcher;
mod store;
mod types;

pub use base::{Answer, KnowledgeBase};
pub use keywords::extract_keywords;
pub use matcher::{AnswerMatcher, ExactMatcher, KeywordOverlapMatcher};
pub use store::{KnowledgeRepository, SeedEntry, SeedFile};
pub use types::KnowledgeEntry;
