//! Scriptable fake backends for end-to-end tests.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use gijiroku_engine::{
    BackendError, ChatBackend, ChatOptions, ChatReply, SpeechBackend, SpeechSegment,
    SpeechTranscript,
};

/// Canned summarizer reply containing every canonical heading.
pub const SUMMARY_MD: &str = "# 要約\nテスト会議の要約です。\n\n## 議題・議論内容\n- テスト議題\n\n## 決定事項\n- テスト決定\n\n## ToDo\n- [ ] テストタスク\n\n## 次のアクション\n- 次のアクション項目\n\n## 次回会議\n未定";

pub struct FakeSpeech {
    text: String,
    delay: Duration,
    pub calls: AtomicUsize,
}

impl FakeSpeech {
    pub fn ok(text: &str) -> Self {
        Self {
            text: text.to_string(),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    /// Transcription takes `delay`, giving tests a window in which the
    /// job is observably TRANSCRIBING.
    pub fn slow(text: &str, delay: Duration) -> Self {
        Self {
            delay,
            ..Self::ok(text)
        }
    }
}

#[async_trait]
impl SpeechBackend for FakeSpeech {
    async fn transcribe(
        &self,
        _audio_path: &Path,
        language: Option<&str>,
    ) -> Result<SpeechTranscript, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.delay > Duration::ZERO {
            tokio::time::sleep(self.delay).await;
        }
        Ok(SpeechTranscript {
            text: self.text.clone(),
            segments: vec![SpeechSegment {
                index: 0,
                text: self.text.clone(),
            }],
            language: language.map(str::to_owned).or(Some("ja".to_string())),
            confidence: 0.95,
            model: "fake-whisper".to_string(),
        })
    }

    fn model_name(&self) -> &str {
        "fake-whisper"
    }
}

pub struct FakeChat {
    /// Each pending failure turns one call into LLM_UNAVAILABLE.
    unavailable_failures: AtomicUsize,
    /// Each pending stall makes one call hang (for crash simulations).
    stalled_calls: AtomicUsize,
    pub calls: AtomicUsize,
}

impl FakeChat {
    pub fn ok() -> Self {
        Self {
            unavailable_failures: AtomicUsize::new(0),
            stalled_calls: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_first(n: usize) -> Self {
        Self {
            unavailable_failures: AtomicUsize::new(n),
            ..Self::ok()
        }
    }

    pub fn stalling_first(n: usize) -> Self {
        Self {
            stalled_calls: AtomicUsize::new(n),
            ..Self::ok()
        }
    }

    fn take(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl ChatBackend for FakeChat {
    async fn generate(
        &self,
        system: Option<&str>,
        prompt: &str,
        _options: &ChatOptions,
    ) -> Result<ChatReply, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if Self::take(&self.stalled_calls) {
            // Long enough that the test kills the engine first.
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
        if Self::take(&self.unavailable_failures) {
            return Err(BackendError::LlmUnavailable("HTTP 503".to_string()));
        }

        let is_summary = system.map(|s| s.contains("議事録")).unwrap_or(false);
        let text = if is_summary {
            SUMMARY_MD.to_string()
        } else {
            format!("{prompt}。")
        };

        Ok(ChatReply {
            text,
            model: "fake-llm".to_string(),
            finish_reason: Some("stop".to_string()),
        })
    }

    fn model_name(&self) -> &str {
        "fake-llm"
    }
}
