use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use gijiroku_db::models::{
    AudioMeta, Job, JobStatus, LogLevel, ProcessingLog, SummaryDetails, UsageType,
};
use gijiroku_services::{CancelOutcome, JobResults, ReprocessOutcome};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use crate::response::{ok, Envelope};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub id: Uuid,
    pub filename: String,
    pub original_filename: String,
    pub file_size: u64,
    pub mime_type: String,
    pub usage_type: UsageType,
    pub status_code: JobStatus,
    pub progress: u8,
    pub message: Option<String>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioMeta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcription_result: Option<TranscriptionResult>,
}

#[derive(Debug, Serialize)]
pub struct TranscriptionResult {
    pub text: String,
    pub language: Option<String>,
    pub confidence: f64,
    pub model_used: String,
    pub processing_time_seconds: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub corrected_text: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub job_id: Uuid,
    pub usage_type: UsageType,
    pub formatted_text: String,
    pub details: SummaryDetails,
    pub model_used: String,
    pub confidence: f64,
    pub processing_time_seconds: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct JobListResponse {
    pub jobs: Vec<JobResponse>,
    pub total: u64,
}

impl JobResponse {
    fn from_job(job: Job) -> Self {
        Self {
            id: job.id,
            filename: job.stored_filename,
            original_filename: job.original_filename,
            file_size: job.file_size,
            mime_type: job.mime_type,
            usage_type: job.usage_type,
            status_code: job.status,
            progress: job.progress,
            message: job.message,
            error_code: job.error_code,
            error_message: job.error_message,
            created_at: job.created_at,
            updated_at: job.updated_at,
            started_at: job.started_at,
            completed_at: job.completed_at,
            audio: None,
            transcription_result: None,
        }
    }

    fn from_results(results: JobResults) -> Self {
        let corrected_text = results.corrected.map(|c| c.text);
        let transcription_result = results.raw.map(|raw| TranscriptionResult {
            text: raw.text,
            language: raw.language,
            confidence: raw.confidence,
            model_used: raw.model_used,
            processing_time_seconds: raw.processing_time_seconds,
            corrected_text,
        });

        let mut response = Self::from_job(results.job);
        response.audio = results.audio;
        response.transcription_result = transcription_result;
        response
    }
}

pub(crate) fn parse_job_id(id: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(id).map_err(|_| ApiError::bad_request("ジョブIDの形式が不正です"))
}

/// POST /api/v1/transcriptions — multipart upload (`file`, `usage_type`).
pub async fn create(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Envelope<JobResponse>>), ApiError> {
    let mut file: Option<(String, Option<String>, Vec<u8>)> = None;
    let mut usage_type: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Multipart error: {e}")))?
    {
        match field.name().unwrap_or("") {
            "file" => {
                let filename = field.file_name().unwrap_or("").to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Failed to read file: {e}")))?;
                file = Some((filename, content_type, bytes.to_vec()));
            }
            "usage_type" => {
                usage_type = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| ApiError::bad_request(format!("Failed to read field: {e}")))?,
                );
            }
            _ => {}
        }
    }

    let (filename, content_type, bytes) =
        file.ok_or_else(|| ApiError::bad_request("ファイルが選択されていません"))?;
    let usage_type = usage_type
        .as_deref()
        .and_then(UsageType::from_str)
        .ok_or_else(|| ApiError::bad_request("usage_type は meeting または interview です"))?;

    let job = state
        .intake
        .accept(&filename, content_type.as_deref(), &bytes, usage_type)
        .await?;
    state.engine.notify_new_job();

    Ok((StatusCode::CREATED, ok(JobResponse::from_job(job))))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// GET /api/v1/transcriptions
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Envelope<JobListResponse>>, ApiError> {
    let limit = params.limit.unwrap_or(50).min(100);
    let offset = params.offset.unwrap_or(0);

    let (jobs, total) = state.store.list_jobs(limit, offset)?;
    Ok(ok(JobListResponse {
        jobs: jobs.into_iter().map(JobResponse::from_job).collect(),
        total,
    }))
}

/// GET /api/v1/transcriptions/{id}
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<JobResponse>>, ApiError> {
    let id = parse_job_id(&id)?;
    let results = state
        .store
        .get_results(&id)?
        .ok_or_else(ApiError::not_found)?;
    Ok(ok(JobResponse::from_results(results)))
}

/// GET /api/v1/transcriptions/{id}/summary
pub async fn summary(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<SummaryResponse>>, ApiError> {
    let id = parse_job_id(&id)?;
    let job = state.store.get_job(&id)?.ok_or_else(ApiError::not_found)?;
    if job.status != JobStatus::Completed {
        return Err(ApiError::not_completed());
    }

    let summary = state
        .store
        .get_summary(&id)?
        .ok_or_else(|| ApiError::internal("要約データが見つかりません"))?;

    Ok(ok(SummaryResponse {
        job_id: id,
        usage_type: job.usage_type,
        formatted_text: summary.formatted_text,
        details: summary.details,
        model_used: summary.model_used,
        confidence: summary.confidence,
        processing_time_seconds: summary.processing_time_seconds,
        created_at: summary.created_at,
    }))
}

/// GET /api/v1/transcriptions/{id}/logs
pub async fn logs(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<Vec<ProcessingLog>>>, ApiError> {
    let id = parse_job_id(&id)?;
    state.store.get_job(&id)?.ok_or_else(ApiError::not_found)?;
    Ok(ok(state.store.logs_for_job(&id, 100)?))
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub id: Uuid,
    pub cancel_requested: bool,
}

/// DELETE /api/v1/transcriptions/{id} — request cancellation. Idempotent:
/// repeating the call on a terminated job still returns 200.
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<CancelResponse>>, ApiError> {
    let id = parse_job_id(&id)?;
    match state.store.request_cancel(&id)? {
        CancelOutcome::NotFound => Err(ApiError::not_found()),
        _ => Ok(ok(CancelResponse {
            id,
            cancel_requested: true,
        })),
    }
}

/// POST /api/v1/transcriptions/{id}/reprocess — restart a FAILED job in
/// place. Stage outputs that survived the failure are kept, so the
/// pipeline resumes at the stage that actually broke.
pub async fn reprocess(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<JobResponse>>, ApiError> {
    let id = parse_job_id(&id)?;
    match state.store.reset_for_reprocess(&id)? {
        ReprocessOutcome::NotFound => Err(ApiError::not_found()),
        ReprocessOutcome::NotFailed => Err(ApiError::bad_request(
            "再処理は失敗したジョブのみ可能です",
        )),
        ReprocessOutcome::Reset(job) => {
            if let Err(e) =
                state
                    .store
                    .append_log(&id, LogLevel::Info, "再処理を開始します", None)
            {
                tracing::warn!(job_id = %id, error = %e, "Failed to write processing log");
            }
            state.engine.notify_new_job();
            Ok(ok(JobResponse::from_job(job)))
        }
    }
}

/// GET /api/v1/statistics
pub async fn statistics(
    State(state): State<AppState>,
) -> Result<Json<Envelope<gijiroku_services::JobStatistics>>, ApiError> {
    Ok(ok(state.store.job_statistics()?))
}
