//! Escalation coordinator
//!
//! Records a help request, subscribes to changes on exactly that record
//! and holds the caller's turn until the supervisor's answer arrives or
//! the deadline passes. The subscription is released on every exit path,
//! including cancellation of the waiting future.
//!
//! ```text
//! created -> awaiting_resolution -> resolved
//!                                -> timed_out
//!                                -> errored
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use desk_core::{ChangeEvent, HelpRequest, HelpRequestStore, Subscription, SubscriptionId};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until, timeout_at};
use tracing::{debug, error, info, warn};

/// What the caller is told after an escalation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EscalationResult {
    /// The supervisor answered
    Resolved(String),
    /// No answer before the deadline
    TimedOut,
    /// The help request could not be recorded; the caller should retry later
    PersistenceError,
}

/// Escalation lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscalationState {
    Created,
    AwaitingResolution,
    Resolved,
    TimedOut,
    Errored,
}

impl EscalationState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Resolved | Self::TimedOut | Self::Errored)
    }

    /// Whether `next` is a legal successor of this state
    pub fn can_advance_to(&self, next: EscalationState) -> bool {
        use EscalationState::*;
        matches!(
            (self, next),
            (Created, AwaitingResolution)
                | (Created, Errored)
                | (AwaitingResolution, Resolved)
                | (AwaitingResolution, TimedOut)
                | (AwaitingResolution, Errored)
        )
    }
}

impl fmt::Display for EscalationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::AwaitingResolution => "awaiting_resolution",
            Self::Resolved => "resolved",
            Self::TimedOut => "timed_out",
            Self::Errored => "errored",
        };
        f.write_str(name)
    }
}

/// Result of one escalation with its bookkeeping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscalationOutcome {
    /// ID of the recorded help request, if it was created
    pub request_id: Option<String>,
    /// Terminal state reached
    pub state: EscalationState,
    pub result: EscalationResult,
}

/// Per-escalation state tracking; only forward transitions are applied
struct Lifecycle {
    state: EscalationState,
    request_id: Option<String>,
}

impl Lifecycle {
    fn new() -> Self {
        Self {
            state: EscalationState::Created,
            request_id: None,
        }
    }

    fn advance(&mut self, next: EscalationState) {
        if self.state.can_advance_to(next) {
            info!(
                request_id = self.request_id.as_deref().unwrap_or("-"),
                "Escalation {} -> {}", self.state, next
            );
            self.state = next;
        } else {
            debug!("Ignoring escalation transition {} -> {}", self.state, next);
        }
    }

    fn finish(mut self, next: EscalationState, result: EscalationResult) -> EscalationOutcome {
        self.advance(next);
        EscalationOutcome {
            request_id: self.request_id,
            state: self.state,
            result,
        }
    }
}

/// Single-shot completion signal, owned by one escalation's listener
///
/// The first answer wins; later offers are no-ops.
struct ResolutionSignal {
    tx: Option<oneshot::Sender<String>>,
}

impl ResolutionSignal {
    fn new() -> (Self, oneshot::Receiver<String>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// Fire with `answer`; returns false if already fired
    fn fire(&mut self, answer: &str) -> bool {
        match self.tx.take() {
            Some(tx) => {
                // A closed receiver means the wait already ended
                let _ = tx.send(answer.to_string());
                true
            }
            None => false,
        }
    }
}

/// Owns the listener task and the store-side subscription
///
/// `release` is idempotent. If the guard is dropped unreleased (the
/// escalation future was cancelled), release continues on a spawned task.
struct ListenerGuard {
    store: Arc<dyn HelpRequestStore>,
    subscription_id: SubscriptionId,
    listener: Option<JoinHandle<()>>,
    released: bool,
}

impl ListenerGuard {
    fn new(store: Arc<dyn HelpRequestStore>, subscription_id: SubscriptionId, listener: JoinHandle<()>) -> Self {
        Self {
            store,
            subscription_id,
            listener: Some(listener),
            released: false,
        }
    }

    async fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
        unsubscribe(self.store.as_ref(), self.subscription_id).await;
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }

        let store = Arc::clone(&self.store);
        let subscription_id = self.subscription_id;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    unsubscribe(store.as_ref(), subscription_id).await;
                });
            }
            Err(_) => error!(
                subscription = subscription_id,
                "No runtime available to release help request subscription"
            ),
        }
    }
}

/// Caps waits that would overflow `Instant` (about 30 years)
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// `now + deadline`, saturating at [`FAR_FUTURE`]
fn deadline_after(deadline: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(deadline).unwrap_or(now + FAR_FUTURE)
}

async fn unsubscribe(store: &dyn HelpRequestStore, subscription_id: SubscriptionId) {
    match store.unsubscribe(subscription_id).await {
        Ok(()) => debug!(subscription = subscription_id, "Stopped listening to help request"),
        Err(e) => warn!(subscription = subscription_id, "Failed to unsubscribe: {}", e),
    }
}

/// Escalates questions to a human supervisor
pub struct EscalationCoordinator {
    store: Arc<dyn HelpRequestStore>,
}

impl EscalationCoordinator {
    pub fn new(store: Arc<dyn HelpRequestStore>) -> Self {
        Self { store }
    }

    /// Escalate a question and wait up to `deadline` for the answer
    ///
    /// The deadline counts from the moment the subscription is open.
    pub async fn escalate(&self, question: &str, customer_id: &str, deadline: Duration) -> EscalationResult {
        self.escalate_detailed(question, customer_id, deadline).await.result
    }

    /// Same as [`escalate`](Self::escalate), also reporting the request id
    /// and terminal state
    pub async fn escalate_detailed(
        &self,
        question: &str,
        customer_id: &str,
        deadline: Duration,
    ) -> EscalationOutcome {
        let mut lifecycle = Lifecycle::new();

        let request = match self.store.create(customer_id, question).await {
            Ok(request) => request,
            Err(e) => {
                error!("Failed to record help request: {}", e);
                return lifecycle.finish(EscalationState::Errored, EscalationResult::PersistenceError);
            }
        };
        lifecycle.request_id = Some(request.id().to_string());
        info!(request_id = %request.id(), "Help request created, waiting for supervisor");

        let subscription = match self.store.subscribe(request.id()).await {
            Ok(subscription) => subscription,
            Err(e) => {
                // Nothing can resolve us without notifications; run out the clock
                warn!(request_id = %request.id(), "Could not subscribe to help request: {}", e);
                lifecycle.advance(EscalationState::AwaitingResolution);
                sleep_until(deadline_after(deadline)).await;
                return lifecycle.finish(EscalationState::Errored, EscalationResult::TimedOut);
            }
        };

        let deadline_at = deadline_after(deadline);
        let subscription_id = subscription.id();
        let (signal, answer_rx) = ResolutionSignal::new();
        let listener = tokio::spawn(listen(subscription, request.id().to_string(), signal));
        let mut guard = ListenerGuard::new(Arc::clone(&self.store), subscription_id, listener);
        lifecycle.advance(EscalationState::AwaitingResolution);

        let (state, result) = match timeout_at(deadline_at, answer_rx).await {
            Ok(Ok(answer)) => {
                info!(request_id = %request.id(), "Supervisor responded");
                (EscalationState::Resolved, EscalationResult::Resolved(answer))
            }
            Ok(Err(_)) => {
                warn!(
                    request_id = %request.id(),
                    "Notification channel closed before resolution; waiting out the deadline"
                );
                sleep_until(deadline_at).await;
                (EscalationState::Errored, EscalationResult::TimedOut)
            }
            Err(_) => {
                info!(request_id = %request.id(), "Timed out waiting for a supervisor answer");
                (EscalationState::TimedOut, EscalationResult::TimedOut)
            }
        };

        guard.release().await;
        lifecycle.finish(state, result)
    }
}

/// Delivery-side handler: decode, check, fire. Never blocks on the caller.
async fn listen(mut subscription: Subscription, request_id: String, mut signal: ResolutionSignal) {
    while let Some(event) = subscription.next().await {
        match event {
            ChangeEvent::Snapshot(Some(document)) => match HelpRequest::from_document(&document) {
                Ok(request) if request.id() != request_id => {
                    warn!(request_id = %request_id, other = %request.id(), "Ignoring snapshot of another request");
                }
                Ok(request) => match request.resolution() {
                    Some(answer) => {
                        if signal.fire(answer) {
                            debug!(request_id = %request_id, "Resolution signal set");
                        } else {
                            debug!(request_id = %request_id, "Resolution already delivered, ignoring");
                        }
                    }
                    None => debug!(request_id = %request_id, "Help request still {}", request.status()),
                },
                Err(e) => warn!(request_id = %request_id, "Ignoring malformed snapshot: {}", e),
            },
            ChangeEvent::Snapshot(None) => {
                warn!(request_id = %request_id, "Help request no longer exists");
            }
            ChangeEvent::Failed(reason) => {
                warn!(request_id = %request_id, "Subscription error: {}", reason);
            }
        }
    }
    debug!(request_id = %request_id, "Help request notifications ended");
}
