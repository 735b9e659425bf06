//! desk-core: Front desk receptionist core library
//!
//! Knowledge base lookup, help request persistence with change
//! subscriptions, the LLM function-tool system and configuration.

pub mod config;
pub mod error;
pub mod help_request;
pub mod knowledge;
pub mod tool;

pub use config::{
    BusinessConfig, Config, DatabaseConfig, EscalationConfig, KnowledgeConfig, MatcherKind,
    VoiceConfig,
};
pub use error::{Error, Result};
pub use help_request::{
    ChangeEvent, HelpRequest, HelpRequestStore, HelpStatus, SqliteHelpRequestStore, Subscription,
    SubscriptionId,
};
pub use knowledge::{
    Answer, AnswerMatcher, ExactMatcher, KeywordOverlapMatcher, KnowledgeBase, KnowledgeEntry,
    KnowledgeRepository, extract_keywords,
};
pub use tool::{Tool, ToolDefinition, ToolManager, ToolResult};
