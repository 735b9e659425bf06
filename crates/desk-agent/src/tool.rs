//! Escalation tool exposed to the conversational agent

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use desk_core::tool::SchemaBuilder;
use desk_core::{Config, Error, Result, Tool, ToolResult};
use serde_json::Value;
use tracing::{debug, info};

use crate::coordinator::{EscalationCoordinator, EscalationResult};
use crate::voice::{CallerVoice, speak};

/// Name the agent invokes the escalation under
pub const TOOL_NAME: &str = "create_help_request";

const SUPERVISOR_SAID: &str = "I have an answer from my supervisor. They said:";
const TIMEOUT_APOLOGY: &str =
    "I'm sorry, my supervisor is taking longer than expected to respond. Please try again later.";
pub(crate) const TOOLING_APOLOGY: &str =
    "I'm having trouble with my internal tools right now. Please try again later.";

/// Creates a help request for the supervisor and relays the outcome
pub struct CreateHelpRequestTool {
    coordinator: Arc<EscalationCoordinator>,
    voice: Arc<dyn CallerVoice>,
    customer_id: String,
    timeout: Duration,
    acknowledgement: Option<String>,
}

impl CreateHelpRequestTool {
    pub fn new(coordinator: Arc<EscalationCoordinator>, voice: Arc<dyn CallerVoice>, config: &Config) -> Self {
        Self {
            coordinator,
            voice,
            customer_id: config.business.customer_id.clone(),
            timeout: config.escalation.timeout(),
            acknowledgement: config.escalation.acknowledgement.clone(),
        }
    }

    /// Override the escalation deadline
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the phrase spoken before waiting; `None` disables it
    pub fn with_acknowledgement(mut self, acknowledgement: Option<String>) -> Self {
        self.acknowledgement = acknowledgement;
        self
    }
}

#[async_trait]
impl Tool for CreateHelpRequestTool {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        "Ask a human supervisor when the answer is not in the knowledge base. \
         Waits for the supervisor's reply and tells the caller."
    }

    fn input_schema(&self) -> Value {
        SchemaBuilder::object_schema(vec![(
            "question",
            "string",
            "The caller's question, as asked",
            true,
        )])
    }

    async fn execute(&self, input: Value) -> Result<ToolResult> {
        let question = input["question"]
            .as_str()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .ok_or_else(|| Error::ToolExecution("Missing 'question' parameter".to_string()))?;

        info!(question = %question, "Escalating question to supervisor");

        if let Some(ack) = &self.acknowledgement {
            speak(self.voice.as_ref(), ack).await;
        }

        let result = self
            .coordinator
            .escalate(question, &self.customer_id, self.timeout)
            .await;
        debug!(?result, "Escalation finished");

        match result {
            EscalationResult::Resolved(answer) => {
                speak(self.voice.as_ref(), &format!("{} {}", SUPERVISOR_SAID, answer)).await;
                Ok(ToolResult::success(
                    "Successfully relayed the supervisor's verbatim answer.",
                ))
            }
            EscalationResult::TimedOut => {
                speak(self.voice.as_ref(), TIMEOUT_APOLOGY).await;
                Ok(ToolResult::success("Timed out waiting for an answer."))
            }
            EscalationResult::PersistenceError => {
                speak(self.voice.as_ref(), TOOLING_APOLOGY).await;
                Ok(ToolResult::error("Failed to create the help request."))
            }
        }
    }
}
