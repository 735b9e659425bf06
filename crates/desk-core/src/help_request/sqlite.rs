//! Help request persistence using SQLite

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rusqlite::{Connection, OptionalExtension, Row, params};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::help_request::{
    ChangeEvent, HelpRequest, HelpRequestStore, HelpStatus, Subscription, SubscriptionId,
};
use crate::{Error, Result};

const SELECT_COLUMNS: &str = "SELECT id, customer_id, question_text, status, received_at,
        supervisor_response, resolved_at FROM help_requests";

struct Subscriber {
    request_id: String,
    tx: mpsc::UnboundedSender<ChangeEvent>,
}

/// SQLite-based help request store with in-process change notification
///
/// Writes made through this handle (creation, supervisor resolution) are
/// pushed to the subscribers of the affected request.
pub struct SqliteHelpRequestStore {
    conn: Mutex<Connection>,
    subscribers: DashMap<SubscriptionId, Subscriber>,
    next_subscription: AtomicU64,
}

impl SqliteHelpRequestStore {
    /// Open (or create) the store at the given database path
    pub fn new(db_path: &str) -> Result<Self> {
        debug!("Opening help request database at: {}", db_path);
        let conn = Connection::open(db_path)?;
        let store = Self::with_connection(conn);
        store.init_tables()?;
        info!("SqliteHelpRequestStore initialized successfully");
        Ok(store)
    }

    /// Create an in-memory store (emulator mode and tests)
    pub fn in_memory() -> Result<Self> {
        let store = Self::with_connection(Connection::open_in_memory()?);
        store.init_tables()?;
        Ok(store)
    }

    fn with_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
            subscribers: DashMap::new(),
            next_subscription: AtomicU64::new(1),
        }
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Other("help request database lock poisoned".to_string()))
    }

    fn init_tables(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS help_requests (
                id TEXT PRIMARY KEY,
                customer_id TEXT NOT NULL,
                question_text TEXT NOT NULL,
                status TEXT NOT NULL,
                received_at TEXT NOT NULL,
                supervisor_response TEXT,
                resolved_at TEXT
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_help_requests_status ON help_requests(status)",
            [],
        )?;
        Ok(())
    }

    fn insert(&self, request: &HelpRequest) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO help_requests
                (id, customer_id, question_text, status, received_at, supervisor_response, resolved_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                request.id(),
                request.customer_id(),
                request.question_text(),
                request.status().as_str(),
                request.received_at().to_rfc3339(),
                request.supervisor_response(),
                request.resolved_at().map(|at| at.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    fn load(&self, id: &str) -> Result<Option<HelpRequest>> {
        let conn = self.conn()?;
        Self::load_in(&conn, id)
    }

    fn load_in(conn: &Connection, id: &str) -> Result<Option<HelpRequest>> {
        let mut stmt = conn.prepare(&format!("{} WHERE id = ?1", SELECT_COLUMNS))?;
        let columns = stmt.query_row(params![id], Columns::from_row).optional()?;
        columns.map(Columns::into_request).transpose()
    }

    /// List requests with the given status, oldest first
    ///
    /// Rows that fail validation are skipped with a warning.
    pub fn list_by_status(&self, status: HelpStatus) -> Result<Vec<HelpRequest>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE lower(status) = ?1 ORDER BY received_at ASC, rowid ASC",
            SELECT_COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![status.as_str()], Columns::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut requests = Vec::with_capacity(rows.len());
        for columns in rows {
            match columns.into_request() {
                Ok(request) => requests.push(request),
                Err(e) => warn!("Skipping unreadable help request: {}", e),
            }
        }
        Ok(requests)
    }

    /// Resolve a pending request with the supervisor's answer
    ///
    /// Subscribers of the request are notified with the new snapshot.
    ///
    /// # Errors
    /// `HelpRequestNotFound` for an unknown id, `InvalidTransition` if the
    /// request is already resolved or the answer is blank
    pub fn resolve(&self, id: &str, response: &str) -> Result<HelpRequest> {
        // Lock held through notify so a concurrent subscribe cannot miss this change
        let conn = self.conn()?;
        let mut request =
            Self::load_in(&conn, id)?.ok_or_else(|| Error::HelpRequestNotFound(id.to_string()))?;
        request.resolve(response, Utc::now())?;

        let updated = conn.execute(
            "UPDATE help_requests
             SET status = ?2, supervisor_response = ?3, resolved_at = ?4
             WHERE id = ?1 AND lower(status) = 'pending'",
            params![
                request.id(),
                request.status().as_str(),
                request.supervisor_response(),
                request.resolved_at().map(|at| at.to_rfc3339()),
            ],
        )?;
        if updated == 0 {
            return Err(Error::InvalidTransition(format!(
                "help request {} was resolved concurrently",
                id
            )));
        }

        info!(request_id = %id, "Help request resolved");
        self.notify(id, Some(request.to_document()?));
        Ok(request)
    }

    /// Number of open change subscriptions
    pub fn active_subscriptions(&self) -> usize {
        self.subscribers.len()
    }

    fn notify(&self, request_id: &str, document: Option<serde_json::Value>) {
        for subscriber in self.subscribers.iter() {
            if subscriber.request_id != request_id {
                continue;
            }
            if subscriber
                .tx
                .send(ChangeEvent::Snapshot(document.clone()))
                .is_err()
            {
                debug!(subscription = *subscriber.key(), "Subscriber gone, dropping notification");
            }
        }
    }
}

#[async_trait]
impl HelpRequestStore for SqliteHelpRequestStore {
    async fn create(&self, customer_id: &str, question_text: &str) -> Result<HelpRequest> {
        let request = HelpRequest::pending(uuid::Uuid::new_v4().to_string(), customer_id, question_text);
        self.insert(&request)?;
        debug!(request_id = %request.id(), "Help request created");
        Ok(request)
    }

    async fn get(&self, id: &str) -> Result<Option<HelpRequest>> {
        self.load(id)
    }

    async fn subscribe(&self, request_id: &str) -> Result<Subscription> {
        let conn = self.conn()?;
        let snapshot = Self::load_in(&conn, request_id)?
            .map(|r| r.to_document())
            .transpose()?;

        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.next_subscription.fetch_add(1, Ordering::Relaxed);
        tx.send(ChangeEvent::Snapshot(snapshot))
            .map_err(|e| Error::Subscription(e.to_string()))?;
        self.subscribers.insert(
            id,
            Subscriber {
                request_id: request_id.to_string(),
                tx,
            },
        );
        drop(conn);

        debug!(subscription = id, request_id = %request_id, "Subscribed to help request");
        Ok(Subscription::new(id, request_id, rx))
    }

    async fn unsubscribe(&self, subscription_id: SubscriptionId) -> Result<()> {
        if self.subscribers.remove(&subscription_id).is_some() {
            debug!(subscription = subscription_id, "Unsubscribed from help request");
        }
        Ok(())
    }
}

/// Raw row values, validated by `into_request`
struct Columns {
    id: String,
    customer_id: String,
    question_text: String,
    status: String,
    received_at: String,
    supervisor_response: Option<String>,
    resolved_at: Option<String>,
}

impl Columns {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            customer_id: row.get(1)?,
            question_text: row.get(2)?,
            status: row.get(3)?,
            received_at: row.get(4)?,
            supervisor_response: row.get(5)?,
            resolved_at: row.get(6)?,
        })
    }

    fn into_request(self) -> Result<HelpRequest> {
        let received_at = parse_timestamp(&self.received_at)?;
        let resolved_at = self.resolved_at.as_deref().map(parse_timestamp).transpose()?;
        HelpRequest::from_columns(
            self.id,
            self.customer_id,
            self.question_text,
            self.status,
            received_at,
            self.supervisor_response,
            resolved_at,
        )
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::MalformedRecord(format!("bad timestamp '{}': {}", value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_get() -> Result<()> {
        let store = SqliteHelpRequestStore::in_memory()?;
        let created = store.create("test-user-123", "Do you offer student discounts?").await?;

        assert!(!created.id().is_empty());
        assert_eq!(created.status(), HelpStatus::Pending);

        let loaded = store.get(created.id()).await?.unwrap();
        assert_eq!(loaded.question_text(), "Do you offer student discounts?");
        assert_eq!(loaded.customer_id(), "test-user-123");
        assert!(store.get("missing").await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_get_reads_resolution_from_disk() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("help.db");
        let path = path.to_str().unwrap();

        let id = {
            let store = SqliteHelpRequestStore::new(path)?;
            let created = store.create("cust", "Is parking free?").await?;
            store.resolve(created.id(), "Yes, behind the salon.")?;
            created.id().to_string()
        };

        let reopened = SqliteHelpRequestStore::new(path)?;
        let loaded = reopened.get(&id).await?.unwrap();
        assert_eq!(loaded.status(), HelpStatus::Resolved);
        assert_eq!(loaded.resolution(), Some("Yes, behind the salon."));
        Ok(())
    }

    #[tokio::test]
    async fn test_ids_are_unique() -> Result<()> {
        let store = SqliteHelpRequestStore::in_memory()?;
        let a = store.create("cust", "Q1?").await?;
        let b = store.create("cust", "Q1?").await?;
        assert_ne!(a.id(), b.id());
        Ok(())
    }

    #[tokio::test]
    async fn test_subscribe_delivers_initial_and_resolution() -> Result<()> {
        let store = SqliteHelpRequestStore::in_memory()?;
        let request = store.create("cust", "Do you do color treatments?").await?;

        let mut sub = store.subscribe(request.id()).await?;
        assert_eq!(store.active_subscriptions(), 1);

        let initial = match sub.next().await {
            Some(ChangeEvent::Snapshot(Some(doc))) => HelpRequest::from_document(&doc)?,
            other => panic!("unexpected event: {:?}", other),
        };
        assert_eq!(initial.status(), HelpStatus::Pending);

        store.resolve(request.id(), "Yes, we do.")?;
        let resolved = match sub.next().await {
            Some(ChangeEvent::Snapshot(Some(doc))) => HelpRequest::from_document(&doc)?,
            other => panic!("unexpected event: {:?}", other),
        };
        assert_eq!(resolved.resolution(), Some("Yes, we do."));

        store.unsubscribe(sub.id()).await?;
        store.unsubscribe(sub.id()).await?;
        assert_eq!(store.active_subscriptions(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_subscriptions_are_scoped_to_one_request() -> Result<()> {
        let store = SqliteHelpRequestStore::in_memory()?;
        let first = store.create("cust", "First?").await?;
        let second = store.create("cust", "Second?").await?;

        let mut sub = store.subscribe(first.id()).await?;
        let _initial = sub.next().await;

        store.resolve(second.id(), "Answer to second")?;
        assert!(sub.try_next().is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_subscribe_to_missing_request() -> Result<()> {
        let store = SqliteHelpRequestStore::in_memory()?;
        let mut sub = store.subscribe("missing").await?;
        assert_eq!(sub.next().await, Some(ChangeEvent::Snapshot(None)));
        Ok(())
    }

    #[tokio::test]
    async fn test_resolve_is_one_way() -> Result<()> {
        let store = SqliteHelpRequestStore::in_memory()?;
        let request = store.create("cust", "Q?").await?;

        store.resolve(request.id(), "First answer")?;
        let again = store.resolve(request.id(), "Second answer");
        assert!(matches!(again, Err(Error::InvalidTransition(_))));

        let stored = store.get(request.id()).await?.unwrap();
        assert_eq!(stored.resolution(), Some("First answer"));

        assert!(matches!(
            store.resolve("missing", "x"),
            Err(Error::HelpRequestNotFound(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_list_by_status() -> Result<()> {
        let store = SqliteHelpRequestStore::in_memory()?;
        let first = store.create("cust", "First?").await?;
        store.create("cust", "Second?").await?;
        store.resolve(first.id(), "Done")?;

        let pending = store.list_by_status(HelpStatus::Pending)?;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].question_text(), "Second?");

        let resolved = store.list_by_status(HelpStatus::Resolved)?;
        assert_eq!(resolved.len(), 1);
        Ok(())
    }
}
