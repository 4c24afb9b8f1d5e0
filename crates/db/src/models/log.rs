use chrono::{DateTime, Utc};
use rusqlite::Row;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ts_col;

/// Append-only per-job audit trail entry. Writes are best-effort and never
/// share a transaction with a state update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingLog {
    pub id: i64,
    pub job_id: Uuid,
    pub level: LogLevel,
    pub message: String,
    pub details: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "INFO" => Some(LogLevel::Info),
            "WARN" => Some(LogLevel::Warn),
            "ERROR" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

impl ProcessingLog {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let job_id: String = row.get("job_id")?;
        let level: String = row.get("level")?;
        let details: Option<String> = row.get("details")?;
        Ok(Self {
            id: row.get("id")?,
            job_id: Uuid::parse_str(&job_id).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    0,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })?,
            level: LogLevel::from_str(&level).unwrap_or(LogLevel::Info),
            message: row.get("message")?,
            details: details.and_then(|d| serde_json::from_str(&d).ok()),
            timestamp: ts_col(row, "timestamp")?,
        })
    }
}
