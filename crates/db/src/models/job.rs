use chrono::{DateTime, Utc};
use rusqlite::Row;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{opt_ts_col, ts_col};

/// One end-to-end processing unit from a single upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub original_filename: String,
    pub stored_filename: String,
    pub file_size: u64,
    pub file_hash: String,
    pub mime_type: String,
    pub usage_type: UsageType,
    pub status: JobStatus,
    pub progress: u8,
    pub message: Option<String>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    #[serde(skip)]
    pub cancel_requested: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Uploaded,
    Transcribing,
    Correcting,
    Summarizing,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Uploaded => "UPLOADED",
            JobStatus::Transcribing => "TRANSCRIBING",
            JobStatus::Correcting => "CORRECTING",
            JobStatus::Summarizing => "SUMMARIZING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
            JobStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "UPLOADED" => Some(JobStatus::Uploaded),
            "TRANSCRIBING" => Some(JobStatus::Transcribing),
            "CORRECTING" => Some(JobStatus::Correcting),
            "SUMMARIZING" => Some(JobStatus::Summarizing),
            "COMPLETED" => Some(JobStatus::Completed),
            "FAILED" => Some(JobStatus::Failed),
            "CANCELLED" => Some(JobStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// A stage is executing (or was executing when the process died).
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            JobStatus::Transcribing | JobStatus::Correcting | JobStatus::Summarizing
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageType {
    Meeting,
    /// Accepted but summarized with the meeting prompt.
    Interview,
}

impl UsageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UsageType::Meeting => "meeting",
            UsageType::Interview => "interview",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "meeting" => Some(UsageType::Meeting),
            "interview" => Some(UsageType::Interview),
            _ => None,
        }
    }
}

impl Job {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let id: String = row.get("id")?;
        let status: String = row.get("status")?;
        let usage_type: String = row.get("usage_type")?;
        let cancel_requested: i64 = row.get("cancel_requested")?;

        Ok(Self {
            id: Uuid::parse_str(&id).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    0,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })?,
            original_filename: row.get("original_filename")?,
            stored_filename: row.get("stored_filename")?,
            file_size: row.get::<_, i64>("file_size")? as u64,
            file_hash: row.get("file_hash")?,
            mime_type: row.get("mime_type")?,
            usage_type: UsageType::from_str(&usage_type).unwrap_or(UsageType::Meeting),
            status: JobStatus::from_str(&status).unwrap_or(JobStatus::Failed),
            progress: row.get::<_, i64>("progress")? as u8,
            message: row.get("message")?,
            error_code: row.get("error_code")?,
            error_message: row.get("error_message")?,
            cancel_requested: cancel_requested != 0,
            created_at: ts_col(row, "created_at")?,
            updated_at: ts_col(row, "updated_at")?,
            started_at: opt_ts_col(row, "started_at")?,
            completed_at: opt_ts_col(row, "completed_at")?,
        })
    }
}
