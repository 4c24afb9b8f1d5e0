pub mod audio;
pub mod job;
pub mod log;
pub mod summary;
pub mod transcript;

pub use audio::AudioMeta;
pub use job::{Job, JobStatus, UsageType};
pub use log::{LogLevel, ProcessingLog};
pub use summary::{Summary, SummaryDetails};
pub use transcript::{CorrectedTranscript, RawTranscript};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::Row;

/// Timestamps are stored as fixed-width RFC 3339 UTC strings so that
/// lexicographic ordering in SQL matches chronological ordering.
pub fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_ts(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(value).map(|ts| ts.with_timezone(&Utc))
}

pub(crate) fn ts_col(row: &Row<'_>, col: &str) -> rusqlite::Result<DateTime<Utc>> {
    let value: String = row.get(col)?;
    parse_ts(&value)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))
}

pub(crate) fn opt_ts_col(row: &Row<'_>, col: &str) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let value: Option<String> = row.get(col)?;
    match value {
        Some(value) => parse_ts(&value)
            .map(Some)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e))),
        None => Ok(None),
    }
}
