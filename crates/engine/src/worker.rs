//! Worker loop and the per-job stage protocol.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use gijiroku_db::models::{Job, JobStatus, LogLevel};
use gijiroku_services::{
    NewCorrectedTranscript, NewRawTranscript, NewSummary, Store, StoreError,
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::backend::{BackendError, ChatOptions};
use crate::engine::Engine;
use crate::{prompts, summary};

// The fixed per-stage milestones of the progress protocol.
const PROGRESS_TRANSCRIBE_START: u8 = 10;
const PROGRESS_CORRECT_START: u8 = 50;
const PROGRESS_CORRECT_MID: u8 = 60;
const PROGRESS_SUMMARIZE_START: u8 = 70;
const PROGRESS_SUMMARIZE_MID: u8 = 90;

// The LLM stages report no usable confidence; this constant is passed
// through opaquely.
const SUMMARY_CONFIDENCE: f64 = 0.85;

/// Worker task: claim a job, run it to a terminal state, repeat.
pub(crate) async fn run(engine: Arc<Engine>, worker_id: usize) {
    debug!(worker_id, "Worker started");

    loop {
        if engine.shutting_down() {
            break;
        }
        if engine.is_degraded() {
            // WHISPER_LOAD_FAILED: refuse further work until restart.
            tokio::time::sleep(engine.config.poll_interval).await;
            continue;
        }

        let job = match engine.next_job() {
            Ok(Some(job)) => job,
            Ok(None) => {
                tokio::select! {
                    _ = engine.wait_for_job() => {}
                    _ = tokio::time::sleep(engine.config.poll_interval) => {}
                }
                continue;
            }
            Err(e) => {
                warn!(worker_id, error = %e, "Failed to fetch next job");
                tokio::time::sleep(engine.config.poll_interval).await;
                continue;
            }
        };

        let job_id = job.id;
        engine.mark_running(job_id);
        run_job(&engine, job).await;
        engine.clear_running(&job_id);
    }

    debug!(worker_id, "Worker stopped");
}

enum Completion {
    Completed,
    Cancelled,
    Failed,
}

async fn run_job(engine: &Engine, job: Job) {
    let id = job.id;
    info!(job_id = %id, status = job.status.as_str(), "Processing job");

    match run_stages(engine, &job).await {
        Ok(Completion::Completed) => {
            info!(job_id = %id, "Job completed");
            engine.log(&id, LogLevel::Info, "COMPLETED");
        }
        Ok(Completion::Cancelled) => info!(job_id = %id, "Job cancelled"),
        Ok(Completion::Failed) => {}
        Err(e) => {
            // STORE_ERROR: abort the current operation; the job keeps its
            // in-flight status and is re-run after the next restart.
            error!(job_id = %id, error = %e, "Store error, leaving job for recovery");
        }
    }
}

async fn run_stages(engine: &Engine, job: &Job) -> Result<Completion, StoreError> {
    let id = &job.id;
    let store = &engine.store;

    // ---- Transcribe -------------------------------------------------
    if store.get_raw_transcript(id)?.is_none() {
        if check_cancel(engine, id)? {
            return Ok(Completion::Cancelled);
        }
        post_milestone(
            store,
            id,
            JobStatus::Transcribing,
            PROGRESS_TRANSCRIBE_START,
            "音声転写を開始します...",
        )?;

        let audio = store
            .get_audio_meta(id)?
            .ok_or_else(|| StoreError::InvalidState("audio_meta row missing".to_string()))?;

        let started = Instant::now();
        let speech = Arc::clone(&engine.speech);
        let result = call_with_retry(engine, id, "transcribe", || {
            let speech = Arc::clone(&speech);
            let path = audio.file_path.clone();
            async move { speech.transcribe(Path::new(&path), None).await }
        })
        .await;

        let transcript = match result {
            Ok(t) => t,
            Err(e) => return fail_job(engine, id, &e),
        };

        // A cancellation that raced the backend call discards the result.
        if check_cancel(engine, id)? {
            return Ok(Completion::Cancelled);
        }

        store.save_raw_transcript(
            id,
            NewRawTranscript {
                text: transcript.text,
                language: transcript.language,
                confidence: transcript.confidence,
                model_used: transcript.model,
                processing_time_seconds: started.elapsed().as_secs_f64(),
            },
            "転写が完了しました",
        )?;
        engine.log(id, LogLevel::Info, "転写ステージ完了");
    }

    // ---- Correct ----------------------------------------------------
    if store.get_corrected_transcript(id)?.is_none() {
        if check_cancel(engine, id)? {
            return Ok(Completion::Cancelled);
        }
        post_milestone(
            store,
            id,
            JobStatus::Correcting,
            PROGRESS_CORRECT_START,
            "文脈補正を実行しています...",
        )?;

        let raw = store
            .get_raw_transcript(id)?
            .ok_or_else(|| StoreError::InvalidState("raw transcript missing".to_string()))?;

        let options = ChatOptions {
            num_predict: 2000,
            temperature: 0.3,
            top_p: 0.9,
            timeout_secs: engine.config.correct_timeout_secs,
        };
        let started = Instant::now();
        let chat = Arc::clone(&engine.chat);
        let result = call_with_retry(engine, id, "correct", || {
            let chat = Arc::clone(&chat);
            let text = raw.text.clone();
            let options = options.clone();
            async move {
                chat.generate(Some(prompts::CORRECTION_SYSTEM), &text, &options)
                    .await
            }
        })
        .await;

        let reply = match result {
            Ok(r) => r,
            Err(e) => return fail_job(engine, id, &e),
        };

        post_milestone(
            store,
            id,
            JobStatus::Correcting,
            PROGRESS_CORRECT_MID,
            "補正結果を確認しています...",
        )?;

        if check_cancel(engine, id)? {
            return Ok(Completion::Cancelled);
        }

        // An empty correction falls back to the verbatim transcript.
        let text = if reply.text.trim().is_empty() {
            raw.text.clone()
        } else {
            reply.text.trim().to_string()
        };

        store.save_corrected_transcript(
            id,
            NewCorrectedTranscript {
                text,
                model_used: reply.model,
                processing_time_seconds: started.elapsed().as_secs_f64(),
            },
            "文脈補正が完了しました",
        )?;
        engine.log(id, LogLevel::Info, "文脈補正ステージ完了");
    }

    // ---- Summarize --------------------------------------------------
    if store.get_summary(id)?.is_none() {
        if check_cancel(engine, id)? {
            return Ok(Completion::Cancelled);
        }
        post_milestone(
            store,
            id,
            JobStatus::Summarizing,
            PROGRESS_SUMMARIZE_START,
            "AI要約を生成しています...",
        )?;

        let corrected = store
            .get_corrected_transcript(id)?
            .ok_or_else(|| StoreError::InvalidState("corrected transcript missing".to_string()))?;

        let options = ChatOptions {
            num_predict: 1000,
            temperature: 0.7,
            top_p: 0.9,
            timeout_secs: engine.config.summarize_timeout_secs,
        };
        let started = Instant::now();
        let chat = Arc::clone(&engine.chat);
        let result = call_with_retry(engine, id, "summarize", || {
            let chat = Arc::clone(&chat);
            let text = corrected.text.clone();
            let options = options.clone();
            async move {
                chat.generate(Some(prompts::SUMMARY_SYSTEM), &text, &options)
                    .await
            }
        })
        .await;

        let reply = match result {
            Ok(r) => r,
            Err(e) => return fail_job(engine, id, &e),
        };

        post_milestone(
            store,
            id,
            JobStatus::Summarizing,
            PROGRESS_SUMMARIZE_MID,
            "要約を整形しています...",
        )?;

        if check_cancel(engine, id)? {
            return Ok(Completion::Cancelled);
        }

        let parsed = summary::parse_summary_markdown(&reply.text);
        if parsed.formatted_text.is_empty() {
            let e = BackendError::LlmBadResponse("empty summary".to_string());
            return fail_job(engine, id, &e);
        }

        store.save_summary(
            id,
            NewSummary {
                formatted_text: parsed.formatted_text,
                details: parsed.details,
                model_used: reply.model,
                confidence: SUMMARY_CONFIDENCE,
                processing_time_seconds: started.elapsed().as_secs_f64(),
            },
            "処理が完了しました",
        )?;
    }

    Ok(Completion::Completed)
}

/// Milestone writes are advisory; a resumed job may already be past the
/// milestone, in which case the store's monotonic guard fires and the
/// write is simply dropped.
fn post_milestone(
    store: &Store,
    id: &Uuid,
    status: JobStatus,
    progress: u8,
    message: &str,
) -> Result<(), StoreError> {
    match store.update_progress(id, status, progress, message) {
        Err(StoreError::ProgressRegression { current, requested }) => {
            debug!(job_id = %id, current, requested, "Milestone behind resumed progress, skipped");
            Ok(())
        }
        other => other,
    }
}

fn check_cancel(engine: &Engine, id: &Uuid) -> Result<bool, StoreError> {
    if engine.store.cancel_requested(id)? {
        engine.store.mark_cancelled(id)?;
        engine.log(id, LogLevel::Info, "キャンセル要求を受理しました");
        return Ok(true);
    }
    Ok(false)
}

/// Engine-owned retry budget: transient backend failures are retried in
/// place with backoff, each attempt leaving a WARN in the processing log.
async fn call_with_retry<T, F, Fut>(
    engine: &Engine,
    id: &Uuid,
    stage: &str,
    mut call: F,
) -> Result<T, BackendError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, BackendError>>,
{
    let budget = engine.config.retry_backoff.len();
    let mut attempt = 0;

    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < budget => {
                let delay = engine.config.retry_backoff[attempt];
                attempt += 1;
                warn!(job_id = %id, stage, error = %e, attempt, "Stage failed, retrying");
                engine.log(
                    id,
                    LogLevel::Warn,
                    &format!("{}: リトライします ({}回目)", e.code(), attempt),
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

fn fail_job(engine: &Engine, id: &Uuid, err: &BackendError) -> Result<Completion, StoreError> {
    if err.is_load_failure() {
        engine.set_degraded(&err.to_string());
        error!(job_id = %id, "Whisper model load failed; engine degraded");
    }

    engine.store.mark_failed(id, err.code(), &err.to_string())?;
    engine.log(id, LogLevel::Error, &format!("{}: {}", err.code(), err));
    error!(job_id = %id, code = err.code(), error = %err, "Job failed");
    Ok(Completion::Failed)
}
