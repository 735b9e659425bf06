//! Knowledge entry storage using SQLite

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::knowledge::{AnswerMatcher, KnowledgeBase, KnowledgeEntry};
use crate::{Error, Result};

/// SQLite-based storage for knowledge entries
pub struct KnowledgeRepository {
    conn: Mutex<Connection>,
}

impl KnowledgeRepository {
    /// Open (or create) the repository at the given database path
    pub fn new(db_path: &str) -> Result<Self> {
        debug!("Opening knowledge database at: {}", db_path);
        let conn = Connection::open(db_path)?;
        let repo = Self {
            conn: Mutex::new(conn),
        };
        repo.init_tables()?;
        info!("KnowledgeRepository initialized successfully");
        Ok(repo)
    }

    /// Create an in-memory repository (emulator mode and tests)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let repo = Self {
            conn: Mutex::new(conn),
        };
        repo.init_tables()?;
        Ok(repo)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Other("knowledge database lock poisoned".to_string()))
    }

    fn init_tables(&self) -> Result<()> {
        self.conn()?.execute(
            "CREATE TABLE IF NOT EXISTS knowledge_base (
                id TEXT PRIMARY KEY,
                question_text TEXT NOT NULL,
                answer_text TEXT NOT NULL,
                category TEXT,
                question_keywords TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
            [],
        )?;
        Ok(())
    }

    /// Save an entry
    pub fn add(&self, entry: &KnowledgeEntry) -> Result<()> {
        let keywords_json = serde_json::to_string(&entry.keywords)?;
        self.conn()?.execute(
            "INSERT OR REPLACE INTO knowledge_base
                (id, question_text, answer_text, category, question_keywords, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                entry.id,
                entry.question_text,
                entry.answer_text,
                entry.category,
                keywords_json,
                entry.created_at.to_rfc3339(),
            ],
        )?;
        debug!("Saved knowledge entry with id: {}", entry.id);
        Ok(())
    }

    /// Add a question/answer pair unless the exact question already exists
    ///
    /// Returns the new entry, or `None` when it was skipped.
    pub fn add_if_absent(
        &self,
        question_text: &str,
        answer_text: &str,
        category: Option<&str>,
    ) -> Result<Option<KnowledgeEntry>> {
        if self.find_by_question(question_text)?.is_some() {
            debug!("Question already exists, skipping: {}", question_text);
            return Ok(None);
        }

        let mut entry = KnowledgeEntry::new(question_text, answer_text);
        if let Some(category) = category {
            entry = entry.with_category(category);
        }
        self.add(&entry)?;
        Ok(Some(entry))
    }

    /// Find an entry by its exact question text
    pub fn find_by_question(&self, question_text: &str) -> Result<Option<KnowledgeEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, question_text, answer_text, category, question_keywords, created_at
             FROM knowledge_base WHERE question_text = ?1 LIMIT 1",
        )?;
        let entry = stmt.query_row(params![question_text], entry_from_row).optional()?;
        Ok(entry)
    }

    /// List all entries in insertion order
    pub fn list_all(&self) -> Result<Vec<KnowledgeEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, question_text, answer_text, category, question_keywords, created_at
             FROM knowledge_base ORDER BY rowid ASC",
        )?;
        let entries = stmt
            .query_map([], entry_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        debug!("Loaded {} knowledge entries", entries.len());
        Ok(entries)
    }

    /// Count entries
    pub fn count(&self) -> Result<usize> {
        let count: i64 =
            self.conn()?
                .query_row("SELECT COUNT(*) FROM knowledge_base", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Snapshot the stored entries into a lookup surface
    pub fn load_base(&self, matcher: Arc<dyn AnswerMatcher>, threshold: f64) -> Result<KnowledgeBase> {
        Ok(KnowledgeBase::new(self.list_all()?)
            .with_matcher(matcher)
            .with_threshold(threshold))
    }

    /// Populate from a seed file, skipping questions already present
    ///
    /// Returns the number of entries added.
    pub fn seed_from_file<P: AsRef<Path>>(&self, path: P) -> Result<usize> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read seed file: {}", e)))?;
        let seed: SeedFile = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse seed file: {}", e)))?;
        self.seed(&seed)
    }

    /// Populate from parsed seed entries
    pub fn seed(&self, seed: &SeedFile) -> Result<usize> {
        let mut added = 0;
        for item in &seed.entries {
            if self
                .add_if_absent(&item.question, &item.answer, item.category.as_deref())?
                .is_some()
            {
                added += 1;
            }
        }
        info!("Seeded {} of {} knowledge entries", added, seed.entries.len());
        Ok(added)
    }
}

/// Seed file layout (`[[entries]]` tables)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub entries: Vec<SeedEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedEntry {
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub category: Option<String>,
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<KnowledgeEntry> {
    let id: String = row.get(0)?;
    let keywords_json: String = row.get(4)?;
    let created_at_str: String = row.get(5)?;

    Ok(KnowledgeEntry {
        keywords: parse_keywords(&id, &keywords_json),
        created_at: parse_created_at(&id, &created_at_str),
        id,
        question_text: row.get(1)?,
        answer_text: row.get(2)?,
        category: row.get(3)?,
    })
}

/// Unreadable keywords leave the entry unmatchable by keyword overlap
fn parse_keywords(id: &str, raw: &str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_else(|e| {
        warn!(entry_id = %id, "Unreadable question_keywords, entry will not match: {}", e);
        Vec::new()
    })
}

fn parse_created_at(id: &str, raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|e| {
            warn!(entry_id = %id, "Unreadable created_at '{}', using now: {}", raw, e);
            Utc::now()
        })
}
