pub mod ollama;
pub mod whisper;

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

/// Typed failures from the inference backends. The engine switches on
/// these at stage boundaries; the variant decides retry eligibility and
/// the `error_code` persisted on a FAILED job.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Whisperモデルの読み込みに失敗しました: {0}")]
    WhisperLoadFailed(String),
    #[error("音声転写に失敗しました: {0}")]
    WhisperInferenceFailed(String),
    #[error("音声転写が{0}秒でタイムアウトしました")]
    WhisperTimeout(u64),
    #[error("LLMサーバーに接続できません: {0}")]
    LlmUnavailable(String),
    #[error("LLMリクエストが{0}秒でタイムアウトしました")]
    LlmTimeout(u64),
    #[error("LLMの応答を解釈できません: {0}")]
    LlmBadResponse(String),
    #[error("LLMモデルが見つかりません: {0}")]
    LlmModelMissing(String),
}

impl BackendError {
    pub fn code(&self) -> &'static str {
        match self {
            BackendError::WhisperLoadFailed(_) => "WHISPER_LOAD_FAILED",
            BackendError::WhisperInferenceFailed(_) => "WHISPER_INFERENCE_FAILED",
            BackendError::WhisperTimeout(_) => "WHISPER_TIMEOUT",
            BackendError::LlmUnavailable(_) => "LLM_UNAVAILABLE",
            BackendError::LlmTimeout(_) => "LLM_TIMEOUT",
            BackendError::LlmBadResponse(_) => "LLM_BAD_RESPONSE",
            BackendError::LlmModelMissing(_) => "LLM_MODEL_MISSING",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BackendError::WhisperTimeout(_)
                | BackendError::WhisperInferenceFailed(_)
                | BackendError::LlmUnavailable(_)
                | BackendError::LlmTimeout(_)
        )
    }

    /// A sticky model-load failure; the engine degrades itself and stops
    /// claiming work until operator intervention.
    pub fn is_load_failure(&self) -> bool {
        matches!(self, BackendError::WhisperLoadFailed(_))
    }
}

#[derive(Debug, Clone)]
pub struct SpeechSegment {
    pub index: usize,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct SpeechTranscript {
    pub text: String,
    pub segments: Vec<SpeechSegment>,
    pub language: Option<String>,
    pub confidence: f64,
    pub model: String,
}

/// Audio-to-text backend. Implementations are pure adapters: no retry
/// policy, no persistence, no orchestration.
#[async_trait]
pub trait SpeechBackend: Send + Sync {
    async fn transcribe(
        &self,
        audio_path: &Path,
        language: Option<&str>,
    ) -> Result<SpeechTranscript, BackendError>;

    fn model_name(&self) -> &str;
}

#[derive(Debug, Clone)]
pub struct ChatOptions {
    pub num_predict: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct ChatReply {
    pub text: String,
    pub model: String,
    pub finish_reason: Option<String>,
}

/// Text-to-text backend (one prompt in, one reply out).
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn generate(
        &self,
        system: Option<&str>,
        prompt: &str,
        options: &ChatOptions,
    ) -> Result<ChatReply, BackendError>;

    /// Cheap liveness probe for the health endpoint.
    async fn check_available(&self) -> bool {
        true
    }

    fn model_name(&self) -> &str;
}
