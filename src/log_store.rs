//! Generation audit log over SQLite.
//!
//! One row per generation attempt, whether it was filtered, failed the
//! gate, or succeeded. The same table doubles as the seeding source for
//! the exemplar store: rows with both a question and a generated statement
//! become (query, sql) seed pairs.

use crate::error::{Result, WardError};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;

/// One audit row. Timestamps are RFC 3339 strings.
#[derive(Debug, Clone, Default)]
pub struct GenerationRecord {
    pub input_received_at: String,
    pub user_input_text: String,
    /// "passed" or "rejected".
    pub filter_status: String,
    pub filter_reason: Option<String>,
    pub filter_completed_at: Option<String>,
    pub generated_sql: Option<String>,
    pub llm_requested_at: Option<String>,
    pub llm_responded_at: Option<String>,
    pub validation_reason: Option<String>,
    pub model_name: Option<String>,
}

pub struct GenerationLogStore {
    db: Mutex<Connection>,
}

impl GenerationLogStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)
            .map_err(|e| WardError::LogStore(format!("failed to open {}: {}", path.display(), e)))?;
        Self::init_schema(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| WardError::LogStore(e.to_string()))?;
        Self::init_schema(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS generation_log (
                log_id                  INTEGER PRIMARY KEY AUTOINCREMENT,
                input_received_at       TEXT NOT NULL,
                user_input_text         TEXT NOT NULL,
                filter_status           TEXT NOT NULL,
                filter_reason           TEXT,
                filter_completed_at     TEXT,
                generated_sql           TEXT,
                llm_requested_at        TEXT,
                llm_responded_at        TEXT,
                validation_reason       TEXT,
                model_name              TEXT
            )",
        )
        .map_err(|e| WardError::LogStore(format!("failed to create log schema: {}", e)))?;
        Ok(())
    }

    /// Insert one audit row, returning its log_id.
    pub fn record(&self, record: &GenerationRecord) -> Result<i64> {
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO generation_log (
                input_received_at, user_input_text, filter_status, filter_reason,
                filter_completed_at, generated_sql, llm_requested_at,
                llm_responded_at, validation_reason, model_name
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                record.input_received_at,
                record.user_input_text,
                record.filter_status,
                record.filter_reason,
                record.filter_completed_at,
                record.generated_sql,
                record.llm_requested_at,
                record.llm_responded_at,
                record.validation_reason,
                record.model_name,
            ],
        )
        .map_err(|e| WardError::LogStore(format!("failed to write log row: {}", e)))?;
        Ok(db.last_insert_rowid())
    }

    /// Seed pairs for the exemplar store: rows where both the question and
    /// the generated SQL are present and non-empty, in insertion order, at
    /// most `limit`.
    pub fn history_pairs(&self, limit: usize) -> Result<Vec<(String, String)>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db
            .prepare(
                "SELECT user_input_text, generated_sql FROM generation_log
                 WHERE user_input_text <> ''
                   AND generated_sql IS NOT NULL
                   AND generated_sql <> ''
                 ORDER BY log_id ASC
                 LIMIT ?1",
            )
            .map_err(|e| WardError::LogStore(e.to_string()))?;
        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(|e| WardError::LogStore(e.to_string()))?;
        let mut pairs = Vec::new();
        for row in rows {
            pairs.push(row.map_err(|e| WardError::LogStore(e.to_string()))?);
        }
        Ok(pairs)
    }

    pub fn count(&self) -> Result<usize> {
        let db = self.db.lock().unwrap();
        let count: i64 = db
            .query_row("SELECT COUNT(*) FROM generation_log", [], |row| row.get(0))
            .map_err(|e| WardError::LogStore(e.to_string()))?;
        Ok(count as usize)
    }
}
