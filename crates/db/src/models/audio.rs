use rusqlite::Row;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Audio file metadata, written once by intake and immutable afterwards.
/// The file at `file_path` exists exactly as long as this row does.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioMeta {
    #[serde(skip)]
    pub job_id: Uuid,
    #[serde(skip)]
    pub file_path: String,
    pub duration_seconds: f64,
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
    pub bitrate: Option<u32>,
}

impl AudioMeta {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let job_id: String = row.get("job_id")?;
        Ok(Self {
            job_id: Uuid::parse_str(&job_id).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    0,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })?,
            file_path: row.get("file_path")?,
            duration_seconds: row.get("duration_seconds")?,
            sample_rate: row.get::<_, Option<i64>>("sample_rate")?.map(|v| v as u32),
            channels: row.get::<_, Option<i64>>("channels")?.map(|v| v as u16),
            bitrate: row.get::<_, Option<i64>>("bitrate")?.map(|v| v as u32),
        })
    }
}
