use std::collections::BTreeMap;

use chrono::Utc;
use gijiroku_db::models::{
    fmt_ts, AudioMeta, CorrectedTranscript, Job, JobStatus, LogLevel, ProcessingLog, RawTranscript,
    Summary, SummaryDetails, UsageType,
};
use gijiroku_db::{Db, DbError};
use rusqlite::{params, OptionalExtension};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Db(#[from] DbError),
    #[error("Job not found")]
    NotFound,
    #[error("Progress regression refused: {current} -> {requested}")]
    ProgressRegression { current: u8, requested: u8 },
    #[error("Invalid state transition: {0}")]
    InvalidState(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Db(DbError::Sqlite(err))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

pub struct NewJob {
    pub id: Uuid,
    pub original_filename: String,
    pub stored_filename: String,
    pub file_size: u64,
    pub file_hash: String,
    pub mime_type: String,
    pub usage_type: UsageType,
    pub message: Option<String>,
}

pub struct NewAudioMeta {
    pub file_path: String,
    pub duration_seconds: f64,
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
    pub bitrate: Option<u32>,
}

pub struct NewRawTranscript {
    pub text: String,
    pub language: Option<String>,
    pub confidence: f64,
    pub model_used: String,
    pub processing_time_seconds: f64,
}

pub struct NewCorrectedTranscript {
    pub text: String,
    pub model_used: String,
    pub processing_time_seconds: f64,
}

pub struct NewSummary {
    pub formatted_text: String,
    pub details: SummaryDetails,
    pub model_used: String,
    pub confidence: f64,
    pub processing_time_seconds: f64,
}

/// Read projection covering a job and everything its stages produced.
pub struct JobResults {
    pub job: Job,
    pub audio: Option<AudioMeta>,
    pub raw: Option<RawTranscript>,
    pub corrected: Option<CorrectedTranscript>,
    pub summary: Option<Summary>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    NotFound,
    /// Job already reached a terminal state; nothing to do.
    AlreadyTerminal,
    /// Job had not been claimed yet and is now CANCELLED.
    Cancelled,
    /// Job is running; the flag is set and the worker will honor it.
    Flagged,
}

pub struct PurgedJob {
    pub id: Uuid,
    pub file_path: Option<String>,
}

#[derive(Debug, Clone)]
pub enum ReprocessOutcome {
    NotFound,
    /// Only FAILED jobs are re-runnable in place.
    NotFailed,
    Reset(Job),
}

#[derive(Debug, Serialize)]
pub struct JobStatistics {
    pub status_distribution: BTreeMap<String, u64>,
    pub usage_distribution: BTreeMap<String, u64>,
    pub total_file_size_bytes: u64,
    pub total_jobs: u64,
}

/// Durable state for jobs and their stage outputs.
///
/// Every operation is a single short transaction; the connection lock in
/// [`Db`] serializes writers, which is what makes `claim_next_ready`
/// at-most-once across concurrent workers. Stage ordering is the engine's
/// responsibility, not the store's.
pub struct Store {
    db: Db,
}

impl Store {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub fn ping(&self) -> StoreResult<()> {
        self.db.with_conn(|conn| -> StoreResult<()> {
            conn.query_row("SELECT 1", [], |_| Ok(()))?;
            Ok(())
        })
    }

    /// Insert a job in UPLOADED together with its audio metadata, atomically.
    pub fn create_job(&self, job: NewJob, meta: NewAudioMeta) -> StoreResult<Job> {
        let now = fmt_ts(Utc::now());
        self.db.with_conn(|conn| -> StoreResult<()> {
            let tx = conn.unchecked_transaction()?;
            tx.execute(
                "INSERT INTO jobs (id, original_filename, stored_filename, file_size, file_hash,
                 mime_type, usage_type, status, progress, message, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'UPLOADED', 0, ?8, ?9, ?9)",
                params![
                    job.id.to_string(),
                    job.original_filename,
                    job.stored_filename,
                    job.file_size as i64,
                    job.file_hash,
                    job.mime_type,
                    job.usage_type.as_str(),
                    job.message,
                    now,
                ],
            )?;
            tx.execute(
                "INSERT INTO audio_meta (job_id, file_path, duration_seconds, sample_rate,
                 channels, bitrate)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    job.id.to_string(),
                    meta.file_path,
                    meta.duration_seconds,
                    meta.sample_rate.map(|v| v as i64),
                    meta.channels.map(|v| v as i64),
                    meta.bitrate.map(|v| v as i64),
                ],
            )?;
            tx.commit()?;
            Ok(())
        })?;

        debug!(job_id = %job.id, "Job created");
        self.get_job(&job.id)?.ok_or(StoreError::NotFound)
    }

    pub fn get_job(&self, id: &Uuid) -> StoreResult<Option<Job>> {
        let id = id.to_string();
        self.db.with_conn(|conn| -> StoreResult<Option<Job>> {
            Ok(conn
                .query_row("SELECT * FROM jobs WHERE id = ?1", params![id], |row| {
                    Job::from_row(row)
                })
                .optional()?)
        })
    }

    /// Dedup lookup: a non-terminal job with the same content hash and
    /// usage type. Completed jobs are re-runnable and never match.
    pub fn find_active_by_hash(
        &self,
        file_hash: &str,
        usage_type: UsageType,
    ) -> StoreResult<Option<Job>> {
        self.db.with_conn(|conn| -> StoreResult<Option<Job>> {
            Ok(conn
                .query_row(
                    "SELECT * FROM jobs
                     WHERE file_hash = ?1 AND usage_type = ?2
                       AND status NOT IN ('COMPLETED', 'FAILED', 'CANCELLED')
                     ORDER BY created_at ASC LIMIT 1",
                    params![file_hash, usage_type.as_str()],
                    |row| Job::from_row(row),
                )
                .optional()?)
        })
    }

    pub fn list_jobs(&self, limit: u64, offset: u64) -> StoreResult<(Vec<Job>, u64)> {
        self.db.with_conn(|conn| -> StoreResult<(Vec<Job>, u64)> {
            let total: u64 = conn.query_row("SELECT COUNT(*) FROM jobs", [], |row| row.get(0))?;
            let mut stmt =
                conn.prepare("SELECT * FROM jobs ORDER BY created_at DESC LIMIT ?1 OFFSET ?2")?;
            let jobs = stmt
                .query_map(params![limit as i64, offset as i64], Job::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok((jobs, total))
        })
    }

    /// Atomically claim the oldest UPLOADED job, transitioning it to
    /// TRANSCRIBING and stamping `started_at`. At-most-once across callers.
    pub fn claim_next_ready(&self) -> StoreResult<Option<Job>> {
        let now = fmt_ts(Utc::now());
        self.db.with_conn(|conn| -> StoreResult<Option<Job>> {
            let tx = conn.unchecked_transaction()?;
            let job = tx
                .query_row(
                    "SELECT * FROM jobs WHERE status = 'UPLOADED'
                     ORDER BY created_at ASC LIMIT 1",
                    [],
                    |row| Job::from_row(row),
                )
                .optional()?;

            let mut job = match job {
                Some(job) => job,
                None => {
                    tx.commit()?;
                    return Ok(None);
                }
            };

            tx.execute(
                "UPDATE jobs SET status = 'TRANSCRIBING', started_at = ?2, updated_at = ?2
                 WHERE id = ?1",
                params![job.id.to_string(), now],
            )?;
            tx.commit()?;

            job.status = JobStatus::Transcribing;
            Ok(Some(job))
        })
    }

    /// Jobs a previous process left mid-stage; the engine requeues these on
    /// startup and the stage output rows decide what actually re-runs.
    pub fn interrupted_jobs(&self) -> StoreResult<Vec<Job>> {
        self.db.with_conn(|conn| -> StoreResult<Vec<Job>> {
            let mut stmt = conn.prepare(
                "SELECT * FROM jobs
                 WHERE status IN ('TRANSCRIBING', 'CORRECTING', 'SUMMARIZING')
                 ORDER BY created_at ASC",
            )?;
            let jobs = stmt
                .query_map([], Job::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(jobs)
        })
    }

    /// Monotonic progress write. A value below the current progress is
    /// refused unless the new status is FAILED or CANCELLED (those go
    /// through `mark_failed` / `mark_cancelled` instead).
    pub fn update_progress(
        &self,
        id: &Uuid,
        status: JobStatus,
        progress: u8,
        message: &str,
    ) -> StoreResult<()> {
        let now = fmt_ts(Utc::now());
        let id_str = id.to_string();
        self.db.with_conn(|conn| -> StoreResult<()> {
            let tx = conn.unchecked_transaction()?;
            let current: Option<(String, i64)> = tx
                .query_row(
                    "SELECT status, progress FROM jobs WHERE id = ?1",
                    params![id_str],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            let (current_status, current_progress) = current.ok_or(StoreError::NotFound)?;
            let current_status = JobStatus::from_str(&current_status).unwrap_or(JobStatus::Failed);
            if current_status.is_terminal() {
                return Err(StoreError::InvalidState(format!(
                    "job {} is already {}",
                    id_str,
                    current_status.as_str()
                )));
            }

            let regression = (progress as i64) < current_progress
                && !matches!(status, JobStatus::Failed | JobStatus::Cancelled);
            if regression {
                return Err(StoreError::ProgressRegression {
                    current: current_progress as u8,
                    requested: progress,
                });
            }

            tx.execute(
                "UPDATE jobs SET status = ?2, progress = ?3, message = ?4, updated_at = ?5
                 WHERE id = ?1",
                params![id_str, status.as_str(), progress as i64, message, now],
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    /// Transcribe stage output: raw transcript row + transition to
    /// CORRECTING at the stage ceiling, in one transaction. Idempotent.
    pub fn save_raw_transcript(
        &self,
        id: &Uuid,
        transcript: NewRawTranscript,
        message: &str,
    ) -> StoreResult<()> {
        let now = fmt_ts(Utc::now());
        let id_str = id.to_string();
        self.db.with_conn(|conn| -> StoreResult<()> {
            let tx = conn.unchecked_transaction()?;
            tx.execute(
                "INSERT INTO raw_transcripts (job_id, text, language, confidence, model_used,
                 processing_time_seconds, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(job_id) DO UPDATE SET
                    text = excluded.text,
                    language = excluded.language,
                    confidence = excluded.confidence,
                    model_used = excluded.model_used,
                    processing_time_seconds = excluded.processing_time_seconds",
                params![
                    id_str,
                    transcript.text,
                    transcript.language,
                    transcript.confidence,
                    transcript.model_used,
                    transcript.processing_time_seconds,
                    now,
                ],
            )?;
            tx.execute(
                "UPDATE jobs SET status = 'CORRECTING', progress = 50, message = ?2,
                 updated_at = ?3 WHERE id = ?1",
                params![id_str, message, now],
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    /// Correct stage output: corrected transcript row + transition to
    /// SUMMARIZING at the stage ceiling, in one transaction. Idempotent.
    pub fn save_corrected_transcript(
        &self,
        id: &Uuid,
        transcript: NewCorrectedTranscript,
        message: &str,
    ) -> StoreResult<()> {
        let now = fmt_ts(Utc::now());
        let id_str = id.to_string();
        self.db.with_conn(|conn| -> StoreResult<()> {
            let tx = conn.unchecked_transaction()?;
            tx.execute(
                "INSERT INTO corrected_transcripts (job_id, text, model_used,
                 processing_time_seconds, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(job_id) DO UPDATE SET
                    text = excluded.text,
                    model_used = excluded.model_used,
                    processing_time_seconds = excluded.processing_time_seconds",
                params![
                    id_str,
                    transcript.text,
                    transcript.model_used,
                    transcript.processing_time_seconds,
                    now,
                ],
            )?;
            tx.execute(
                "UPDATE jobs SET status = 'SUMMARIZING', progress = 70, message = ?2,
                 updated_at = ?3 WHERE id = ?1",
                params![id_str, message, now],
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    /// Summarize stage output: summary row + transition to COMPLETED with
    /// progress 100 and `completed_at`, in one transaction. Idempotent.
    pub fn save_summary(&self, id: &Uuid, summary: NewSummary, message: &str) -> StoreResult<()> {
        let now = fmt_ts(Utc::now());
        let id_str = id.to_string();
        let details = serde_json::to_string(&summary.details)?;
        self.db.with_conn(|conn| -> StoreResult<()> {
            let tx = conn.unchecked_transaction()?;
            tx.execute(
                "INSERT INTO summaries (job_id, formatted_text, details, model_used, confidence,
                 processing_time_seconds, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(job_id) DO UPDATE SET
                    formatted_text = excluded.formatted_text,
                    details = excluded.details,
                    model_used = excluded.model_used,
                    confidence = excluded.confidence,
                    processing_time_seconds = excluded.processing_time_seconds",
                params![
                    id_str,
                    summary.formatted_text,
                    details,
                    summary.model_used,
                    summary.confidence,
                    summary.processing_time_seconds,
                    now,
                ],
            )?;
            tx.execute(
                "UPDATE jobs SET status = 'COMPLETED', progress = 100, message = ?2,
                 completed_at = ?3, updated_at = ?3 WHERE id = ?1",
                params![id_str, message, now],
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    /// Terminal failure. No-op when the job already reached a terminal
    /// state, so a late failure never overwrites a cancellation.
    pub fn mark_failed(&self, id: &Uuid, error_code: &str, error_message: &str) -> StoreResult<()> {
        let now = fmt_ts(Utc::now());
        let id_str = id.to_string();
        self.db.with_conn(|conn| -> StoreResult<()> {
            conn.execute(
                "UPDATE jobs SET status = 'FAILED', error_code = ?2, error_message = ?3,
                 message = ?4, completed_at = ?5, updated_at = ?5
                 WHERE id = ?1 AND status NOT IN ('COMPLETED', 'FAILED', 'CANCELLED')",
                params![id_str, error_code, error_message, "処理エラー", now],
            )?;
            Ok(())
        })
    }

    /// Put a FAILED job back to UPLOADED so the pipeline picks it up
    /// again without a fresh upload. Error fields are cleared; surviving
    /// stage output rows stay and the re-run resumes past them.
    pub fn reset_for_reprocess(&self, id: &Uuid) -> StoreResult<ReprocessOutcome> {
        let now = fmt_ts(Utc::now());
        let id_str = id.to_string();
        self.db.with_conn(|conn| -> StoreResult<ReprocessOutcome> {
            let tx = conn.unchecked_transaction()?;
            let status: Option<String> = tx
                .query_row(
                    "SELECT status FROM jobs WHERE id = ?1",
                    params![id_str],
                    |row| row.get(0),
                )
                .optional()?;

            let status = match status.and_then(|s| JobStatus::from_str(&s)) {
                Some(status) => status,
                None => return Ok(ReprocessOutcome::NotFound),
            };
            if status != JobStatus::Failed {
                return Ok(ReprocessOutcome::NotFailed);
            }

            tx.execute(
                "UPDATE jobs SET status = 'UPLOADED', progress = 0, message = ?2,
                 error_code = NULL, error_message = NULL, cancel_requested = 0,
                 started_at = NULL, completed_at = NULL, updated_at = ?3
                 WHERE id = ?1",
                params![id_str, "再処理準備中...", now],
            )?;
            let job = tx
                .query_row("SELECT * FROM jobs WHERE id = ?1", params![id_str], |row| {
                    Job::from_row(row)
                })
                .optional()?
                .ok_or(StoreError::NotFound)?;
            tx.commit()?;
            Ok(ReprocessOutcome::Reset(job))
        })
    }

    /// Terminal cancellation; progress is left where it was. Idempotent.
    pub fn mark_cancelled(&self, id: &Uuid) -> StoreResult<()> {
        let now = fmt_ts(Utc::now());
        let id_str = id.to_string();
        self.db.with_conn(|conn| -> StoreResult<()> {
            conn.execute(
                "UPDATE jobs SET status = 'CANCELLED', message = ?2, cancel_requested = 1,
                 completed_at = ?3, updated_at = ?3
                 WHERE id = ?1 AND status NOT IN ('COMPLETED', 'FAILED', 'CANCELLED')",
                params![id_str, "キャンセルされました", now],
            )?;
            Ok(())
        })
    }

    /// Cancellation entry point used by the HTTP surface. Unclaimed jobs
    /// flip to CANCELLED immediately; running jobs only get the flag and
    /// the worker converts it at its next checkpoint.
    pub fn request_cancel(&self, id: &Uuid) -> StoreResult<CancelOutcome> {
        let now = fmt_ts(Utc::now());
        let id_str = id.to_string();
        self.db.with_conn(|conn| -> StoreResult<CancelOutcome> {
            let tx = conn.unchecked_transaction()?;
            let status: Option<String> = tx
                .query_row(
                    "SELECT status FROM jobs WHERE id = ?1",
                    params![id_str],
                    |row| row.get(0),
                )
                .optional()?;

            let status = match status.and_then(|s| JobStatus::from_str(&s)) {
                Some(status) => status,
                None => return Ok(CancelOutcome::NotFound),
            };

            let outcome = if status.is_terminal() {
                CancelOutcome::AlreadyTerminal
            } else if status == JobStatus::Uploaded {
                tx.execute(
                    "UPDATE jobs SET status = 'CANCELLED', message = ?2, cancel_requested = 1,
                     completed_at = ?3, updated_at = ?3 WHERE id = ?1",
                    params![id_str, "キャンセルされました", now],
                )?;
                CancelOutcome::Cancelled
            } else {
                tx.execute(
                    "UPDATE jobs SET cancel_requested = 1, updated_at = ?2 WHERE id = ?1",
                    params![id_str, now],
                )?;
                CancelOutcome::Flagged
            };
            tx.commit()?;
            Ok(outcome)
        })
    }

    pub fn cancel_requested(&self, id: &Uuid) -> StoreResult<bool> {
        let id_str = id.to_string();
        self.db.with_conn(|conn| -> StoreResult<bool> {
            let flag: Option<i64> = conn
                .query_row(
                    "SELECT cancel_requested FROM jobs WHERE id = ?1",
                    params![id_str],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(flag.unwrap_or(0) != 0)
        })
    }

    pub fn get_audio_meta(&self, id: &Uuid) -> StoreResult<Option<AudioMeta>> {
        let id_str = id.to_string();
        self.db.with_conn(|conn| -> StoreResult<Option<AudioMeta>> {
            Ok(conn
                .query_row(
                    "SELECT * FROM audio_meta WHERE job_id = ?1",
                    params![id_str],
                    AudioMeta::from_row,
                )
                .optional()?)
        })
    }

    pub fn get_raw_transcript(&self, id: &Uuid) -> StoreResult<Option<RawTranscript>> {
        let id_str = id.to_string();
        self.db.with_conn(|conn| -> StoreResult<Option<RawTranscript>> {
            Ok(conn
                .query_row(
                    "SELECT * FROM raw_transcripts WHERE job_id = ?1",
                    params![id_str],
                    RawTranscript::from_row,
                )
                .optional()?)
        })
    }

    pub fn get_corrected_transcript(&self, id: &Uuid) -> StoreResult<Option<CorrectedTranscript>> {
        let id_str = id.to_string();
        self.db
            .with_conn(|conn| -> StoreResult<Option<CorrectedTranscript>> {
                Ok(conn
                    .query_row(
                        "SELECT * FROM corrected_transcripts WHERE job_id = ?1",
                        params![id_str],
                        CorrectedTranscript::from_row,
                    )
                    .optional()?)
            })
    }

    pub fn get_summary(&self, id: &Uuid) -> StoreResult<Option<Summary>> {
        let id_str = id.to_string();
        self.db.with_conn(|conn| -> StoreResult<Option<Summary>> {
            Ok(conn
                .query_row(
                    "SELECT * FROM summaries WHERE job_id = ?1",
                    params![id_str],
                    Summary::from_row,
                )
                .optional()?)
        })
    }

    pub fn get_results(&self, id: &Uuid) -> StoreResult<Option<JobResults>> {
        let job = match self.get_job(id)? {
            Some(job) => job,
            None => return Ok(None),
        };
        Ok(Some(JobResults {
            audio: self.get_audio_meta(id)?,
            raw: self.get_raw_transcript(id)?,
            corrected: self.get_corrected_transcript(id)?,
            summary: self.get_summary(id)?,
            job,
        }))
    }

    /// ProcessingLog append. Callers treat this as best-effort; it never
    /// shares a transaction with a state update.
    pub fn append_log(
        &self,
        id: &Uuid,
        level: LogLevel,
        message: &str,
        details: Option<serde_json::Value>,
    ) -> StoreResult<()> {
        let now = fmt_ts(Utc::now());
        let id_str = id.to_string();
        let details = details.map(|d| d.to_string());
        self.db.with_conn(|conn| -> StoreResult<()> {
            conn.execute(
                "INSERT INTO processing_logs (job_id, level, message, details, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id_str, level.as_str(), message, details, now],
            )?;
            Ok(())
        })
    }

    pub fn logs_for_job(&self, id: &Uuid, limit: u64) -> StoreResult<Vec<ProcessingLog>> {
        let id_str = id.to_string();
        self.db.with_conn(|conn| -> StoreResult<Vec<ProcessingLog>> {
            let mut stmt = conn.prepare(
                "SELECT * FROM processing_logs WHERE job_id = ?1
                 ORDER BY timestamp DESC, id DESC LIMIT ?2",
            )?;
            let logs = stmt
                .query_map(params![id_str, limit as i64], ProcessingLog::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(logs)
        })
    }

    /// TTL purge: terminal jobs older than the cutoff are removed (cascade
    /// takes the dependent rows) and their audio paths are handed back so
    /// the caller can unlink the files.
    pub fn purge_terminal_older_than(&self, days: u32) -> StoreResult<Vec<PurgedJob>> {
        let cutoff = fmt_ts(Utc::now() - chrono::Duration::days(days as i64));
        self.db.with_conn(|conn| -> StoreResult<Vec<PurgedJob>> {
            let tx = conn.unchecked_transaction()?;
            let mut stmt = tx.prepare(
                "SELECT j.id, a.file_path FROM jobs j
                 LEFT JOIN audio_meta a ON a.job_id = j.id
                 WHERE j.status IN ('COMPLETED', 'FAILED', 'CANCELLED')
                   AND j.created_at < ?1",
            )?;
            let purged = stmt
                .query_map(params![cutoff], |row| {
                    let id: String = row.get(0)?;
                    let file_path: Option<String> = row.get(1)?;
                    Ok((id, file_path))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            drop(stmt);

            let mut result = Vec::with_capacity(purged.len());
            for (id, file_path) in purged {
                tx.execute("DELETE FROM jobs WHERE id = ?1", params![id])?;
                if let Ok(id) = Uuid::parse_str(&id) {
                    result.push(PurgedJob { id, file_path });
                }
            }
            tx.commit()?;
            Ok(result)
        })
    }

    pub fn job_statistics(&self) -> StoreResult<JobStatistics> {
        self.db.with_conn(|conn| -> StoreResult<JobStatistics> {
            let mut status_distribution = BTreeMap::new();
            let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM jobs GROUP BY status")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })?;
            for row in rows {
                let (status, count) = row?;
                status_distribution.insert(status, count);
            }
            drop(stmt);

            let mut usage_distribution = BTreeMap::new();
            let mut stmt =
                conn.prepare("SELECT usage_type, COUNT(*) FROM jobs GROUP BY usage_type")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })?;
            for row in rows {
                let (usage, count) = row?;
                usage_distribution.insert(usage, count);
            }
            drop(stmt);

            let total_file_size_bytes: i64 = conn.query_row(
                "SELECT COALESCE(SUM(file_size), 0) FROM jobs",
                [],
                |row| row.get(0),
            )?;
            let total_jobs: i64 = conn.query_row("SELECT COUNT(*) FROM jobs", [], |row| row.get(0))?;

            Ok(JobStatistics {
                status_distribution,
                usage_distribution,
                total_file_size_bytes: total_file_size_bytes as u64,
                total_jobs: total_jobs as u64,
            })
        })
    }
}
