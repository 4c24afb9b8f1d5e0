use std::time::Duration;

/// Engine tuning knobs; the API layer maps `Settings` onto this.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Worker task count. Whisper inference is serialized inside the
    /// backend, so values above 1 only overlap the LLM stages.
    pub worker_count: usize,
    pub correct_timeout_secs: u64,
    pub summarize_timeout_secs: u64,
    pub retention_days: u32,
    /// Idle poll fallback; new uploads also wake workers via notify.
    pub poll_interval: Duration,
    /// Per-stage retry backoff; the length is the retry budget.
    pub retry_backoff: Vec<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            worker_count: 1,
            correct_timeout_secs: 120,
            summarize_timeout_secs: 300,
            retention_days: 7,
            poll_interval: Duration::from_millis(500),
            retry_backoff: vec![Duration::from_secs(1), Duration::from_secs(4)],
        }
    }
}
