use chrono::{DateTime, Utc};
use rusqlite::Row;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ts_col;

fn parse_job_id(value: &str) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Verbatim transcript produced by the Transcribe stage. Insert-once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTranscript {
    #[serde(skip)]
    pub job_id: Uuid,
    pub text: String,
    pub language: Option<String>,
    pub confidence: f64,
    pub model_used: String,
    pub processing_time_seconds: f64,
    pub created_at: DateTime<Utc>,
}

impl RawTranscript {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let job_id: String = row.get("job_id")?;
        Ok(Self {
            job_id: parse_job_id(&job_id)?,
            text: row.get("text")?,
            language: row.get("language")?,
            confidence: row.get("confidence")?,
            model_used: row.get("model_used")?,
            processing_time_seconds: row.get("processing_time_seconds")?,
            created_at: ts_col(row, "created_at")?,
        })
    }
}

/// Context-corrected transcript produced by the Correct stage. Insert-once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectedTranscript {
    #[serde(skip)]
    pub job_id: Uuid,
    pub text: String,
    pub model_used: String,
    pub processing_time_seconds: f64,
    pub created_at: DateTime<Utc>,
}

impl CorrectedTranscript {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let job_id: String = row.get("job_id")?;
        Ok(Self {
            job_id: parse_job_id(&job_id)?,
            text: row.get("text")?,
            model_used: row.get("model_used")?,
            processing_time_seconds: row.get("processing_time_seconds")?,
            created_at: ts_col(row, "created_at")?,
        })
    }
}
