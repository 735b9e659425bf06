//! Help request entity and status

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::{Error, Result};

/// Help request status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HelpStatus {
    /// Waiting for a supervisor
    Pending,
    /// Answered by a supervisor
    Resolved,
}

impl HelpStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Resolved => "resolved",
        }
    }
}

impl fmt::Display for HelpStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HelpStatus {
    type Err = Error;

    /// Parses case-insensitively; supervisor tooling writes "Resolved"
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "resolved" => Ok(Self::Resolved),
            other => Err(Error::MalformedRecord(format!("unknown status '{}'", other))),
        }
    }
}

/// One escalated question awaiting human resolution
///
/// Fields are read-only outside this module so the status invariants
/// hold for every value in circulation:
/// - status moves only `Pending -> Resolved`
/// - `supervisor_response` is non-empty exactly when resolved
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HelpRequest {
    id: String,
    customer_id: String,
    question_text: String,
    status: HelpStatus,
    received_at: DateTime<Utc>,
    supervisor_response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    resolved_at: Option<DateTime<Utc>>,
}

/// Stored document as it arrives, before validation
#[derive(Debug, Default, Deserialize)]
struct RawDocument {
    id: Option<String>,
    customer_id: Option<String>,
    question_text: Option<String>,
    status: Option<String>,
    received_at: Option<DateTime<Utc>>,
    supervisor_response: Option<String>,
    resolved_at: Option<DateTime<Utc>>,
}

impl HelpRequest {
    /// Create a new pending request received now
    pub fn pending(
        id: impl Into<String>,
        customer_id: impl Into<String>,
        question_text: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            customer_id: customer_id.into(),
            question_text: question_text.into(),
            status: HelpStatus::Pending,
            received_at: Utc::now(),
            supervisor_response: None,
            resolved_at: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn customer_id(&self) -> &str {
        &self.customer_id
    }

    pub fn question_text(&self) -> &str {
        &self.question_text
    }

    pub fn status(&self) -> HelpStatus {
        self.status
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    pub fn supervisor_response(&self) -> Option<&str> {
        self.supervisor_response.as_deref()
    }

    pub fn resolved_at(&self) -> Option<DateTime<Utc>> {
        self.resolved_at
    }

    pub fn is_resolved(&self) -> bool {
        self.status == HelpStatus::Resolved
    }

    /// The supervisor's answer, once the request is resolved
    pub fn resolution(&self) -> Option<&str> {
        match self.status {
            HelpStatus::Resolved => self.supervisor_response.as_deref(),
            HelpStatus::Pending => None,
        }
    }

    /// Record the supervisor's answer
    ///
    /// # Errors
    /// `InvalidTransition` if the request is already resolved or the
    /// response is blank
    pub fn resolve(&mut self, response: &str, at: DateTime<Utc>) -> Result<()> {
        if self.is_resolved() {
            return Err(Error::InvalidTransition(format!(
                "help request {} is already resolved",
                self.id
            )));
        }
        if response.trim().is_empty() {
            return Err(Error::InvalidTransition(format!(
                "help request {} cannot be resolved with an empty response",
                self.id
            )));
        }
        self.status = HelpStatus::Resolved;
        self.supervisor_response = Some(response.to_string());
        self.resolved_at = Some(at);
        Ok(())
    }

    /// Logical persisted shape
    pub fn to_document(&self) -> Result<JsonValue> {
        Ok(serde_json::to_value(self)?)
    }

    /// Decode and validate a stored document
    ///
    /// # Errors
    /// `MalformedRecord` for missing fields, an unknown status, or a
    /// status that disagrees with the response field
    pub fn from_document(doc: &JsonValue) -> Result<Self> {
        let raw: RawDocument = serde_json::from_value(doc.clone())
            .map_err(|e| Error::MalformedRecord(e.to_string()))?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawDocument) -> Result<Self> {
        let id = required(raw.id, "id")?;
        let customer_id = required(raw.customer_id, "customer_id")?;
        let question_text = required(raw.question_text, "question_text")?;
        let status: HelpStatus = required(raw.status, "status")?.parse()?;
        let received_at = required(raw.received_at, "received_at")?;
        let supervisor_response = raw.supervisor_response.filter(|r| !r.trim().is_empty());

        match (status, &supervisor_response) {
            (HelpStatus::Resolved, None) => {
                return Err(Error::MalformedRecord(format!(
                    "help request {} is resolved without a response",
                    id
                )));
            }
            (HelpStatus::Pending, Some(_)) => {
                return Err(Error::MalformedRecord(format!(
                    "help request {} is pending but carries a response",
                    id
                )));
            }
            _ => {}
        }

        Ok(Self {
            id,
            customer_id,
            question_text,
            status,
            received_at,
            supervisor_response,
            resolved_at: raw.resolved_at,
        })
    }

    /// Build from stored columns
    pub(crate) fn from_columns(
        id: String,
        customer_id: String,
        question_text: String,
        status: String,
        received_at: DateTime<Utc>,
        supervisor_response: Option<String>,
        resolved_at: Option<DateTime<Utc>>,
    ) -> Result<Self> {
        Self::from_raw(RawDocument {
            id: Some(id),
            customer_id: Some(customer_id),
            question_text: Some(question_text),
            status: Some(status),
            received_at: Some(received_at),
            supervisor_response,
            resolved_at,
        })
    }
}

fn required<T>(value: Option<T>, field: &str) -> Result<T> {
    value.ok_or_else(|| Error::MalformedRecord(format!("missing field '{}'", field)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_pending_request() {
        let request = HelpRequest::pending("req-1", "test-user-123", "Do you offer student discounts?");
        assert_eq!(request.status(), HelpStatus::Pending);
        assert!(request.supervisor_response().is_none());
        assert!(request.resolution().is_none());
        assert!(request.resolved_at().is_none());
    }

    #[test]
    fn test_resolve_once() {
        let mut request = HelpRequest::pending("req-1", "cust", "Q?");
        request.resolve("Yes, we do.", Utc::now()).unwrap();
        assert_eq!(request.resolution(), Some("Yes, we do."));
        assert!(request.resolved_at().is_some());

        let again = request.resolve("No.", Utc::now());
        assert!(matches!(again, Err(Error::InvalidTransition(_))));
        assert_eq!(request.resolution(), Some("Yes, we do."));
    }

    #[test]
    fn test_resolve_rejects_blank_response() {
        let mut request = HelpRequest::pending("req-1", "cust", "Q?");
        assert!(request.resolve("   ", Utc::now()).is_err());
        assert_eq!(request.status(), HelpStatus::Pending);
    }

    #[test]
    fn test_document_shape() {
        let request = HelpRequest::pending("req-1", "cust", "Q?");
        let doc = request.to_document().unwrap();
        assert_eq!(doc["status"], "pending");
        assert!(doc["supervisor_response"].is_null());
        assert!(doc.get("resolved_at").is_none());

        let decoded = HelpRequest::from_document(&doc).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn test_status_is_case_insensitive() {
        let doc = json!({
            "id": "req-1",
            "customer_id": "cust",
            "question_text": "Q?",
            "status": "Resolved",
            "received_at": "2025-01-01T00:00:00Z",
            "supervisor_response": "Yes.",
        });
        let request = HelpRequest::from_document(&doc).unwrap();
        assert_eq!(request.resolution(), Some("Yes."));
    }

    #[test]
    fn test_malformed_documents() {
        let missing = json!({"id": "req-1", "status": "pending"});
        assert!(matches!(
            HelpRequest::from_document(&missing),
            Err(Error::MalformedRecord(_))
        ));

        let resolved_without_answer = json!({
            "id": "req-1",
            "customer_id": "cust",
            "question_text": "Q?",
            "status": "resolved",
            "received_at": "2025-01-01T00:00:00Z",
            "supervisor_response": "",
        });
        assert!(HelpRequest::from_document(&resolved_without_answer).is_err());

        let unknown_status = json!({
            "id": "req-1",
            "customer_id": "cust",
            "question_text": "Q?",
            "status": "archived",
            "received_at": "2025-01-01T00:00:00Z",
        });
        assert!(HelpRequest::from_document(&unknown_status).is_err());

        assert!(HelpRequest::from_document(&json!("not an object")).is_err());
    }
}
