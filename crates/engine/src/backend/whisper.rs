use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use super::{BackendError, SpeechBackend, SpeechSegment, SpeechTranscript};
use crate::audio;

// whisper.cpp reports no aggregate confidence for a run.
const DEFAULT_CONFIDENCE: f64 = 0.95;

enum LoadState {
    NotLoaded,
    Loaded(Arc<WhisperContext>),
    /// Load failures are sticky; every later call fails fast until the
    /// operator fixes the model and restarts.
    Failed(String),
}

/// Local Whisper backend using whisper.cpp via whisper-rs.
///
/// The GGML model is loaded lazily on first use. The state mutex
/// serializes both loading and inference: concurrent first callers wait
/// for the load, and at most one transcription is in flight per process.
pub struct WhisperBackend {
    model_path: PathBuf,
    model_name: String,
    default_language: Option<String>,
    timeout_secs: u64,
    state: Mutex<LoadState>,
}

impl WhisperBackend {
    pub fn new(
        model_path: PathBuf,
        model_name: String,
        default_language: Option<String>,
        timeout_secs: u64,
    ) -> Self {
        Self {
            model_path,
            model_name,
            default_language,
            timeout_secs,
            state: Mutex::new(LoadState::NotLoaded),
        }
    }

    async fn context(&self, state: &mut LoadState) -> Result<Arc<WhisperContext>, BackendError> {
        match state {
            LoadState::Loaded(ctx) => Ok(Arc::clone(ctx)),
            LoadState::Failed(msg) => Err(BackendError::WhisperLoadFailed(msg.clone())),
            LoadState::NotLoaded => {
                let path = self.model_path.to_string_lossy().into_owned();
                info!(model = %self.model_name, path = %path, "Loading Whisper model");

                let loaded = tokio::task::spawn_blocking(move || {
                    WhisperContext::new_with_params(&path, WhisperContextParameters::default())
                })
                .await;

                match loaded {
                    Ok(Ok(ctx)) => {
                        let ctx = Arc::new(ctx);
                        *state = LoadState::Loaded(Arc::clone(&ctx));
                        info!(model = %self.model_name, "Whisper model loaded");
                        Ok(ctx)
                    }
                    Ok(Err(e)) => {
                        let msg = format!(
                            "failed to load model '{}': {}",
                            self.model_path.display(),
                            e
                        );
                        *state = LoadState::Failed(msg.clone());
                        Err(BackendError::WhisperLoadFailed(msg))
                    }
                    Err(e) => {
                        let msg = format!("model load task failed: {e}");
                        *state = LoadState::Failed(msg.clone());
                        Err(BackendError::WhisperLoadFailed(msg))
                    }
                }
            }
        }
    }
}

#[async_trait]
impl SpeechBackend for WhisperBackend {
    async fn transcribe(
        &self,
        audio_path: &Path,
        language: Option<&str>,
    ) -> Result<SpeechTranscript, BackendError> {
        let mut state = self.state.lock().await;
        let ctx = self.context(&mut state).await?;

        let lang = language
            .map(str::to_owned)
            .or_else(|| self.default_language.clone());

        let path = audio_path.to_path_buf();
        let samples = tokio::task::spawn_blocking(move || audio::load_pcm16k(&path))
            .await
            .map_err(|e| BackendError::WhisperInferenceFailed(format!("decode task failed: {e}")))?
            .map_err(|e| BackendError::WhisperInferenceFailed(e.to_string()))?;

        debug!(samples = samples.len(), "Audio decoded for inference");

        let lang_for_run = lang.clone();
        let inference =
            tokio::task::spawn_blocking(move || run_inference(&ctx, &samples, lang_for_run));

        let (text, segments) =
            match tokio::time::timeout(Duration::from_secs(self.timeout_secs), inference).await {
                Ok(Ok(result)) => result?,
                Ok(Err(e)) => {
                    return Err(BackendError::WhisperInferenceFailed(format!(
                        "inference task failed: {e}"
                    )))
                }
                Err(_) => return Err(BackendError::WhisperTimeout(self.timeout_secs)),
            };

        debug!(text_len = text.len(), segments = segments.len(), "Transcription complete");

        Ok(SpeechTranscript {
            text,
            segments,
            language: lang,
            confidence: DEFAULT_CONFIDENCE,
            model: self.model_name.clone(),
        })
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

fn run_inference(
    ctx: &WhisperContext,
    samples: &[f32],
    language: Option<String>,
) -> Result<(String, Vec<SpeechSegment>), BackendError> {
    let mut state = ctx
        .create_state()
        .map_err(|e| BackendError::WhisperInferenceFailed(format!("failed to create state: {e}")))?;

    let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
    if let Some(ref lang) = language {
        params.set_language(Some(lang));
    }
    params.set_print_progress(false);
    params.set_print_special(false);
    params.set_print_realtime(false);
    params.set_print_timestamps(false);

    state
        .full(params, samples)
        .map_err(|e| BackendError::WhisperInferenceFailed(e.to_string()))?;

    let n_segments = state.full_n_segments();
    let mut text = String::new();
    let mut segments = Vec::new();
    for i in 0..n_segments {
        if let Some(segment) = state.get_segment(i) {
            if let Ok(seg_text) = segment.to_str() {
                text.push_str(seg_text);
                let trimmed = seg_text.trim();
                if !trimmed.is_empty() {
                    segments.push(SpeechSegment {
                        index: segments.len(),
                        text: trimmed.to_string(),
                    });
                }
            }
        }
    }

    Ok((text.trim().to_string(), segments))
}
