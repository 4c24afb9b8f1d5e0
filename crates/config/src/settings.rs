use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment};
use serde::Deserialize;

/// Runtime configuration, sourced from flat environment variables
/// (`WHISPER_MODEL`, `OLLAMA_BASE_URL`, ...) with built-in defaults.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub host: String,
    pub port: u16,

    pub data_dir: String,
    pub upload_dir: String,
    pub max_file_size_bytes: u64,
    pub file_retention_days: u32,

    pub worker_count: usize,

    pub whisper_model: String,
    pub whisper_device: String,
    /// Path to the GGML model file; derived from `whisper_model` when unset.
    pub whisper_model_path: Option<String>,

    pub ollama_base_url: String,
    pub ollama_model: String,

    pub transcribe_timeout_secs: u64,
    pub correct_timeout_secs: u64,
    pub summarize_timeout_secs: u64,
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("host", "0.0.0.0")?
            .set_default("port", 8100)?
            .set_default("data_dir", "./data")?
            .set_default("upload_dir", "./uploads")?
            .set_default("max_file_size_bytes", 52_428_800u64)?
            .set_default("file_retention_days", 7)?
            .set_default("worker_count", 1)?
            .set_default("whisper_model", "large-v3-turbo")?
            .set_default("whisper_device", "cpu")?
            .set_default("ollama_base_url", "http://127.0.0.1:11434")?
            .set_default("ollama_model", "gemma-2-2b-jpn-it")?
            .set_default("transcribe_timeout_secs", 900)?
            .set_default("correct_timeout_secs", 120)?
            .set_default("summarize_timeout_secs", 300)?
            .add_source(Environment::default().try_parsing(true))
            .build()?;

        config.try_deserialize()
    }

    /// Location of the SQLite database file under `data_dir`.
    pub fn database_path(&self) -> PathBuf {
        Path::new(&self.data_dir).join("gijiroku.db")
    }

    pub fn upload_dir(&self) -> PathBuf {
        PathBuf::from(&self.upload_dir)
    }

    /// GGML model file for the Whisper backend. `WHISPER_MODEL_PATH` wins;
    /// otherwise the conventional `models/ggml-<model>.bin` layout is used.
    pub fn whisper_model_path(&self) -> PathBuf {
        match &self.whisper_model_path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(format!("models/ggml-{}.bin", self.whisper_model)),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::load().expect("Failed to load default settings")
    }
}
