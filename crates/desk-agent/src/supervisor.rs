//! Supervisor side: answering escalated questions

use std::sync::Arc;

use desk_core::{
    Error, HelpRequest, HelpStatus, KnowledgeEntry, KnowledgeRepository, Result,
    SqliteHelpRequestStore,
};
use serde::Serialize;
use tracing::{info, warn};

/// A resolved help request and what came of it
#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    pub request: HelpRequest,
    /// Entry learned into the knowledge base, if the question was new
    pub learned: Option<KnowledgeEntry>,
    /// Text-back message for the customer
    pub follow_up: String,
}

/// Supervisor console operations over the help request and knowledge stores
pub struct SupervisorDesk {
    requests: Arc<SqliteHelpRequestStore>,
    knowledge: Arc<KnowledgeRepository>,
}

impl SupervisorDesk {
    pub fn new(requests: Arc<SqliteHelpRequestStore>, knowledge: Arc<KnowledgeRepository>) -> Self {
        Self { requests, knowledge }
    }

    /// Unresolved requests, oldest first
    pub fn pending(&self) -> Result<Vec<HelpRequest>> {
        self.requests.list_by_status(HelpStatus::Pending)
    }

    /// Answer a pending request and learn the answer
    ///
    /// Resolution wakes any caller still waiting on the request. Learning
    /// happens afterwards; a failure there is logged and the resolution
    /// stands.
    pub fn resolve(&self, id: &str, answer: &str, category: &str) -> Result<Resolution> {
        let answer = answer.trim();
        let category = category.trim();
        if answer.is_empty() {
            return Err(Error::InvalidTransition("answer must not be empty".to_string()));
        }
        if category.is_empty() {
            return Err(Error::InvalidTransition("category must not be empty".to_string()));
        }

        let request = self.requests.resolve(id, answer)?;

        let learned = match self
            .knowledge
            .add_if_absent(request.question_text(), answer, Some(category))
        {
            Ok(Some(entry)) => {
                info!(entry_id = %entry.id, category = %category, "Learned new knowledge entry");
                Some(entry)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(request_id = %id, "Failed to learn resolved answer: {}", e);
                None
            }
        };

        let follow_up = format!(
            "Regarding your question '{}', the answer is: {}",
            request.question_text(),
            answer
        );
        info!(customer_id = %request.customer_id(), "Text-back to customer: {}", follow_up);

        Ok(Resolution {
            request,
            learned,
            follow_up,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desk() -> (SupervisorDesk, Arc<SqliteHelpRequestStore>, Arc<KnowledgeRepository>) {
        let requests = Arc::new(SqliteHelpRequestStore::in_memory().unwrap());
        let knowledge = Arc::new(KnowledgeRepository::in_memory().unwrap());
        (
            SupervisorDesk::new(requests.clone(), knowledge.clone()),
            requests,
            knowledge,
        )
    }

    async fn create(store: &SqliteHelpRequestStore, question: &str) -> HelpRequest {
        use desk_core::HelpRequestStore;
        store.create("test-user-123", question).await.unwrap()
    }

    #[tokio::test]
    async fn test_resolve_learns_and_texts_back() {
        let (desk, requests, knowledge) = desk();
        let request = create(&requests, "Do you sell gift cards?").await;

        let resolution = desk
            .resolve(request.id(), "Yes, in any amount.", "services")
            .unwrap();

        assert!(resolution.request.is_resolved());
        assert_eq!(
            resolution.follow_up,
            "Regarding your question 'Do you sell gift cards?', the answer is: Yes, in any amount."
        );
        let learned = resolution.learned.unwrap();
        assert_eq!(learned.category.as_deref(), Some("services"));
        assert_eq!(learned.keywords, vec!["sell", "gift", "cards"]);

        let base = knowledge
            .load_base(Arc::new(desk_core::KeywordOverlapMatcher), 0.6)
            .unwrap();
        assert_eq!(
            base.find_answer("Do you sell gift cards?").unwrap().text,
            "Yes, in any amount."
        );
        assert!(desk.pending().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_known_question_is_not_learned_twice() {
        let (desk, requests, knowledge) = desk();
        let first = create(&requests, "Is parking free?").await;
        let second = create(&requests, "Is parking free?").await;

        assert!(desk.resolve(first.id(), "Yes.", "facilities").unwrap().learned.is_some());
        assert!(desk.resolve(second.id(), "Yes.", "facilities").unwrap().learned.is_none());
        assert_eq!(knowledge.count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_blank_answer_or_category_is_rejected() {
        let (desk, requests, _) = desk();
        let request = create(&requests, "Q?").await;

        assert!(matches!(
            desk.resolve(request.id(), "  ", "general"),
            Err(Error::InvalidTransition(_))
        ));
        assert!(matches!(
            desk.resolve(request.id(), "Answer", ""),
            Err(Error::InvalidTransition(_))
        ));
        assert_eq!(desk.pending().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_resolve_twice_fails() {
        let (desk, requests, _) = desk();
        let request = create(&requests, "Q?").await;

        desk.resolve(request.id(), "A", "general").unwrap();
        assert!(desk.resolve(request.id(), "B", "general").is_err());
        assert!(matches!(
            desk.resolve("missing", "A", "general"),
            Err(Error::HelpRequestNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_pending_is_oldest_first() {
        let (desk, requests, _) = desk();
        create(&requests, "First?").await;
        create(&requests, "Second?").await;

        let pending = desk.pending().unwrap();
        let questions: Vec<_> = pending.iter().map(|r| r.question_text()).collect();
        assert_eq!(questions, vec!["First?", "Second?"]);
    }
}
