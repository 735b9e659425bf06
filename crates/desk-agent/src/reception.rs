//! Receptionist call flow

use std::sync::Arc;

use desk_core::{Answer, KnowledgeBase, Result, ToolManager, ToolResult};
use serde_json::json;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::tool::{TOOL_NAME, TOOLING_APOLOGY};
use crate::voice::{CallerVoice, speak};

const ANYTHING_ELSE: &str = "Is there anything else I can help you with today?";

/// How one caller question was handled
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// Answered directly from the knowledge base
    Answered(Answer),
    /// Handed to the escalation tool
    Escalated(ToolResult),
}

/// Front desk receptionist for one business
pub struct Receptionist {
    knowledge: RwLock<KnowledgeBase>,
    tools: Arc<ToolManager>,
    voice: Arc<dyn CallerVoice>,
    business_name: String,
}

impl Receptionist {
    pub fn new(
        business_name: impl Into<String>,
        knowledge: KnowledgeBase,
        tools: Arc<ToolManager>,
        voice: Arc<dyn CallerVoice>,
    ) -> Self {
        Self {
            knowledge: RwLock::new(knowledge),
            tools,
            voice,
            business_name: business_name.into(),
        }
    }

    pub fn business_name(&self) -> &str {
        &self.business_name
    }

    /// Opening line for a new call
    pub fn greeting(&self) -> String {
        format!(
            "Hello, you've reached {}. How can I help you today?",
            self.business_name
        )
    }

    pub fn closing(&self) -> String {
        format!("Thank you for calling {}. Have a great day!", self.business_name)
    }

    /// Speak the greeting to the caller
    pub async fn greet(&self) {
        speak(self.voice.as_ref(), &self.greeting()).await;
    }

    /// Answer from the knowledge base, or escalate to the supervisor
    ///
    /// Escalation holds this call until the supervisor answers or the
    /// escalation deadline passes.
    pub async fn handle_question(&self, question: &str) -> Result<TurnOutcome> {
        let answer = self.knowledge.read().await.find_answer(question);

        match answer {
            Some(answer) => {
                info!(entry_id = %answer.entry_id, confidence = answer.confidence, "Answering from knowledge base");
                speak(self.voice.as_ref(), &answer.text).await;
                speak(self.voice.as_ref(), ANYTHING_ELSE).await;
                Ok(TurnOutcome::Answered(answer))
            }
            None => {
                debug!("No knowledge base answer, invoking {}", TOOL_NAME);
                match self
                    .tools
                    .execute(TOOL_NAME, json!({ "question": question }))
                    .await
                {
                    Ok(result) => Ok(TurnOutcome::Escalated(result)),
                    Err(e) => {
                        // The tool speaks its own outcomes; an Err means it never ran
                        warn!("Escalation tool failed: {}", e);
                        speak(self.voice.as_ref(), TOOLING_APOLOGY).await;
                        Err(e)
                    }
                }
            }
        }
    }

    /// Swap in a freshly loaded knowledge base
    ///
    /// Calls already past their lookup keep the answer they got.
    pub async fn replace_knowledge(&self, knowledge: KnowledgeBase) {
        let mut guard = self.knowledge.write().await;
        info!("Knowledge base reloaded: {} -> {} entries", guard.len(), knowledge.len());
        *guard = knowledge;
    }

    /// Number of entries currently used for lookups
    pub async fn knowledge_len(&self) -> usize {
        self.knowledge.read().await.len()
    }
}
