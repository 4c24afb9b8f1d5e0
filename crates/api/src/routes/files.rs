use std::io::Write;

use axum::{
    body::Body,
    extract::{Path, State},
    response::Response,
};
use gijiroku_db::models::JobStatus;
use gijiroku_services::JobResults;
use zip::write::SimpleFileOptions;

use crate::error::ApiError;
use crate::routes::transcriptions::parse_job_id;
use crate::state::AppState;

fn completed_results(state: &AppState, id: &str) -> Result<JobResults, ApiError> {
    let id = parse_job_id(id)?;
    let results = state
        .store
        .get_results(&id)?
        .ok_or_else(ApiError::not_found)?;
    if results.job.status != JobStatus::Completed {
        return Err(ApiError::not_completed());
    }
    Ok(results)
}

fn attachment(content_type: &str, filename: &str, body: Vec<u8>) -> Result<Response, ApiError> {
    Response::builder()
        .header("Content-Type", content_type)
        .header(
            "Content-Disposition",
            format!("attachment; filename=\"{filename}\""),
        )
        .body(Body::from(body))
        .map_err(|e| ApiError::internal(format!("Failed to build response: {e}")))
}

fn transcription_text(results: &JobResults) -> Result<String, ApiError> {
    let raw = results
        .raw
        .as_ref()
        .ok_or_else(|| ApiError::internal("転写データが見つかりません"))?;

    let duration = results
        .audio
        .as_ref()
        .map(|a| a.duration_seconds)
        .unwrap_or(0.0);

    Ok(format!(
        "転写結果\nファイル名: {}\n使用モデル: {}\n信頼度: {:.2}\n音声長: {:.1}秒\n言語: {}\n\n--- 転写テキスト ---\n{}\n",
        results.job.original_filename,
        raw.model_used,
        raw.confidence,
        duration,
        raw.language.as_deref().unwrap_or("unknown"),
        raw.text,
    ))
}

/// GET /api/v1/files/{id}/transcription.txt
pub async fn transcription_txt(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let results = completed_results(&state, &id)?;
    let content = transcription_text(&results)?;
    attachment(
        "text/plain; charset=utf-8",
        "transcription.txt",
        content.into_bytes(),
    )
}

/// GET /api/v1/files/{id}/summary.txt — the Markdown summary, verbatim.
pub async fn summary_txt(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let results = completed_results(&state, &id)?;
    let summary = results
        .summary
        .as_ref()
        .ok_or_else(|| ApiError::internal("要約データが見つかりません"))?;
    attachment(
        "text/plain; charset=utf-8",
        "summary.txt",
        summary.formatted_text.clone().into_bytes(),
    )
}

/// GET /api/v1/files/{id}/export — every artifact as a ZIP archive.
pub async fn export(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let results = completed_results(&state, &id)?;
    let summary = results
        .summary
        .as_ref()
        .ok_or_else(|| ApiError::internal("要約データが見つかりません"))?;

    let zip_err = |e: zip::result::ZipError| ApiError::internal(format!("ZIP error: {e}"));
    let io_err = |e: std::io::Error| ApiError::internal(format!("ZIP write error: {e}"));

    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();

    writer
        .start_file("transcription.txt", options)
        .map_err(zip_err)?;
    writer
        .write_all(transcription_text(&results)?.as_bytes())
        .map_err(io_err)?;

    if let Some(corrected) = &results.corrected {
        writer.start_file("corrected.txt", options).map_err(zip_err)?;
        writer.write_all(corrected.text.as_bytes()).map_err(io_err)?;
    }

    writer.start_file("summary.md", options).map_err(zip_err)?;
    writer
        .write_all(summary.formatted_text.as_bytes())
        .map_err(io_err)?;

    let export_json = serde_json::json!({
        "metadata": {
            "job_id": results.job.id,
            "original_filename": results.job.original_filename,
            "usage_type": results.job.usage_type,
            "model_used": summary.model_used,
            "confidence": summary.confidence,
            "created_at": summary.created_at,
        },
        "details": summary.details,
    });
    writer.start_file("summary.json", options).map_err(zip_err)?;
    writer
        .write_all(
            serde_json::to_vec_pretty(&export_json)
                .map_err(|e| ApiError::internal(format!("JSON error: {e}")))?
                .as_slice(),
        )
        .map_err(io_err)?;

    let cursor = writer.finish().map_err(zip_err)?;
    attachment("application/zip", "export.zip", cursor.into_inner())
}
