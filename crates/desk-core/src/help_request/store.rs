//! Help request store contract

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tokio::sync::mpsc;

use crate::help_request::HelpRequest;
use crate::Result;

/// Identifier of one open change subscription
pub type SubscriptionId = u64;

/// One notification delivered on a change subscription
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    /// Current stored document; `None` when it no longer exists
    Snapshot(Option<JsonValue>),
    /// The notification channel reported a failure
    Failed(String),
}

/// An open change subscription on a single help request
///
/// Events arrive in the order the record changed, starting with the
/// snapshot taken at subscribe time. Dropping the subscription does not
/// release it in the store; call [`HelpRequestStore::unsubscribe`].
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    request_id: String,
    events: mpsc::UnboundedReceiver<ChangeEvent>,
}

impl Subscription {
    pub fn new(
        id: SubscriptionId,
        request_id: impl Into<String>,
        events: mpsc::UnboundedReceiver<ChangeEvent>,
    ) -> Self {
        Self {
            id,
            request_id: request_id.into(),
            events,
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Wait for the next event; `None` once the store stops delivering
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        self.events.recv().await
    }

    /// Take an already delivered event without waiting
    pub fn try_next(&mut self) -> Option<ChangeEvent> {
        self.events.try_recv().ok()
    }
}

/// Document store holding help requests
///
/// The escalation flow only creates and observes; resolution belongs to
/// supervisor tooling.
#[async_trait]
pub trait HelpRequestStore: Send + Sync {
    /// Persist a new pending request under a freshly generated id
    async fn create(&self, customer_id: &str, question_text: &str) -> Result<HelpRequest>;

    /// Load a request by id
    async fn get(&self, id: &str) -> Result<Option<HelpRequest>>;

    /// Open a change subscription scoped to one request
    async fn subscribe(&self, request_id: &str) -> Result<Subscription>;

    /// Release a subscription; unknown or already released ids are a no-op
    async fn unsubscribe(&self, subscription_id: SubscriptionId) -> Result<()>;
}
