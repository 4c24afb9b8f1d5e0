use std::path::Path;
use std::sync::{Mutex, PoisonError};

use rusqlite::Connection;
use thiserror::Error;
use tracing::info;

const CURRENT_SCHEMA_VERSION: i64 = 1;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Schema error: {0}")]
    Schema(String),
}

/// Shared handle to the embedded SQLite database.
///
/// All access goes through `with_conn`; the internal mutex serializes
/// writers, which keeps every store operation atomic within this process.
/// Transactions stay short, so the lock is never held across I/O.
pub struct Db {
    conn: Mutex<Connection>,
}

impl Db {
    /// Open (or create) the database file and bring the schema up to date.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        Self::initialize(&conn)?;
        info!(db = %path.display(), "SQLite database opened");

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory database, used by tests.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run a closure against the connection under the database lock.
    /// Generic over the error type so callers can surface their own
    /// domain errors from inside a transaction.
    pub fn with_conn<T, E>(&self, f: impl FnOnce(&Connection) -> Result<T, E>) -> Result<T, E> {
        // A poisoned lock means a panic mid-query; the connection itself
        // remains usable, so recover it rather than propagating the poison.
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        f(&conn)
    }

    fn initialize(conn: &Connection) -> Result<(), DbError> {
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )?;

        let current: i64 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
        if current > CURRENT_SCHEMA_VERSION {
            return Err(DbError::Schema(format!(
                "database schema version {} is newer than supported version {}",
                current, CURRENT_SCHEMA_VERSION
            )));
        }

        if current < 1 {
            Self::migrate_to_v1(conn)?;
            conn.execute_batch(&format!("PRAGMA user_version = {}", 1))?;
        }

        Ok(())
    }

    fn migrate_to_v1(conn: &Connection) -> Result<(), DbError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                id TEXT PRIMARY KEY,
                original_filename TEXT NOT NULL,
                stored_filename TEXT NOT NULL,
                file_size INTEGER NOT NULL,
                file_hash TEXT NOT NULL,
                mime_type TEXT NOT NULL,
                usage_type TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'UPLOADED',
                progress INTEGER NOT NULL DEFAULT 0,
                message TEXT,
                error_code TEXT,
                error_message TEXT,
                cancel_requested INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                started_at TEXT,
                completed_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status);
            CREATE INDEX IF NOT EXISTS idx_jobs_created_at ON jobs(created_at);
            CREATE INDEX IF NOT EXISTS idx_jobs_file_hash ON jobs(file_hash);

            CREATE TABLE IF NOT EXISTS audio_meta (
                job_id TEXT PRIMARY KEY REFERENCES jobs(id) ON DELETE CASCADE,
                file_path TEXT NOT NULL,
                duration_seconds REAL NOT NULL,
                sample_rate INTEGER,
                channels INTEGER,
                bitrate INTEGER
            );

            CREATE TABLE IF NOT EXISTS raw_transcripts (
                job_id TEXT PRIMARY KEY REFERENCES jobs(id) ON DELETE CASCADE,
                text TEXT NOT NULL,
                language TEXT,
                confidence REAL NOT NULL,
                model_used TEXT NOT NULL,
                processing_time_seconds REAL NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS corrected_transcripts (
                job_id TEXT PRIMARY KEY REFERENCES jobs(id) ON DELETE CASCADE,
                text TEXT NOT NULL,
                model_used TEXT NOT NULL,
                processing_time_seconds REAL NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS summaries (
                job_id TEXT PRIMARY KEY REFERENCES jobs(id) ON DELETE CASCADE,
                formatted_text TEXT NOT NULL,
                details TEXT NOT NULL,
                model_used TEXT NOT NULL,
                confidence REAL NOT NULL,
                processing_time_seconds REAL NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS processing_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                job_id TEXT NOT NULL REFERENCES jobs(id) ON DELETE CASCADE,
                level TEXT NOT NULL,
                message TEXT NOT NULL,
                details TEXT,
                timestamp TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_logs_job_id ON processing_logs(job_id);
            "#,
        )?;

        Ok(())
    }
}
