use chrono::{DateTime, Utc};
use rusqlite::Row;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ts_col;

/// Structured meeting-minutes summary produced by the Summarize stage.
/// `formatted_text` is the Markdown served to clients verbatim; `details`
/// is the section breakdown parsed out of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    #[serde(skip)]
    pub job_id: Uuid,
    pub formatted_text: String,
    pub details: SummaryDetails,
    pub model_used: String,
    pub confidence: f64,
    pub processing_time_seconds: f64,
    pub created_at: DateTime<Utc>,
}

/// Meeting-shaped section breakdown. A heading the model omitted is kept
/// as an empty list/string rather than being dropped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryDetails {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub agenda: Vec<String>,
    #[serde(default)]
    pub decisions: Vec<String>,
    #[serde(default)]
    pub todo: Vec<String>,
    #[serde(default)]
    pub next_actions: Vec<String>,
    #[serde(default)]
    pub next_meeting: String,
}

impl Summary {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let job_id: String = row.get("job_id")?;
        let details: String = row.get("details")?;
        Ok(Self {
            job_id: Uuid::parse_str(&job_id).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    0,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })?,
            formatted_text: row.get("formatted_text")?,
            details: serde_json::from_str(&details).unwrap_or_default(),
            model_used: row.get("model_used")?,
            confidence: row.get("confidence")?,
            processing_time_seconds: row.get("processing_time_seconds")?,
            created_at: ts_col(row, "created_at")?,
        })
    }
}
