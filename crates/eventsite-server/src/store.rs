//! Contact request storage

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("invalid metadata: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("store task failed: {0}")]
    Interrupted(String),
}

/// A stored contact form submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactRequest {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub message: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Fields of a submission before it is stored
#[derive(Debug, Clone, Default)]
pub struct NewContactRequest {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub message: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

pub trait ContactStore: Send + Sync {
    fn create(&self, new: NewContactRequest) -> Result<ContactRequest, StoreError>;

    /// All requests, newest first
    fn list(&self) -> Result<Vec<ContactRequest>, StoreError>;

    fn get(&self, id: i64) -> Result<Option<ContactRequest>, StoreError>;

    /// Whether the backing database answers
    fn ping(&self) -> bool;
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS contact_requests (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL,
    email       TEXT NOT NULL,
    phone       VARCHAR(20),
    message     TEXT NOT NULL,
    ip_address  VARCHAR(45),
    user_agent  TEXT,
    metadata    TEXT NOT NULL DEFAULT '{}',
    created_at  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_contact_requests_created_at
    ON contact_requests (created_at);
";

const COLUMNS: &str =
    "id, name, email, phone, message, ip_address, user_agent, metadata, created_at";

/// ContactStore backed by rusqlite (bundled SQLite)
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create the database and its table
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

// Timestamps are stored as fixed-width RFC 3339 so text order is time order.
fn format_time(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ContactRequest> {
    let metadata: String = row.get(7)?;
    let metadata = serde_json::from_str(&metadata)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(7, Type::Text, Box::new(e)))?;

    let created_at: String = row.get(8)?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(8, Type::Text, Box::new(e)))?
        .with_timezone(&Utc);

    Ok(ContactRequest {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        phone: row.get(3)?,
        message: row.get(4)?,
        ip_address: row.get(5)?,
        user_agent: row.get(6)?,
        metadata,
        created_at,
    })
}

impl ContactStore for SqliteStore {
    fn create(&self, new: NewContactRequest) -> Result<ContactRequest, StoreError> {
        let created_at = Utc::now().trunc_subsecs(6);
        let metadata = serde_json::to_string(&new.metadata)?;

        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO contact_requests
                (name, email, phone, message, ip_address, user_agent, metadata, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                new.name,
                new.email,
                new.phone,
                new.message,
                new.ip_address,
                new.user_agent,
                metadata,
                format_time(&created_at),
            ],
        )?;
        let id = conn.last_insert_rowid();

        Ok(ContactRequest {
            id,
            name: new.name,
            email: new.email,
            phone: new.phone,
            message: new.message,
            ip_address: new.ip_address,
            user_agent: new.user_agent,
            metadata: new.metadata,
            created_at,
        })
    }

    fn list(&self) -> Result<Vec<ContactRequest>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM contact_requests ORDER BY created_at DESC, id DESC"
        ))?;
        let requests = stmt
            .query_map([], read_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(requests)
    }

    fn get(&self, id: i64) -> Result<Option<ContactRequest>, StoreError> {
        let conn = self.conn.lock();
        let request = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM contact_requests WHERE id = ?1"),
                [id],
                read_row,
            )
            .optional()?;
        Ok(request)
    }

    fn ping(&self) -> bool {
        self.conn
            .lock()
            .query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .is_ok()
    }
}
