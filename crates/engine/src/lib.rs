pub mod backend;
pub mod config;
pub mod engine;
pub mod prompts;
pub mod summary;
pub mod worker;

mod audio;

pub use backend::{
    BackendError, ChatBackend, ChatOptions, ChatReply, SpeechBackend, SpeechSegment,
    SpeechTranscript,
};
pub use backend::ollama::OllamaBackend;
pub use backend::whisper::WhisperBackend;
pub use config::EngineConfig;
pub use engine::Engine;
