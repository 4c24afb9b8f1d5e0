use std::sync::Arc;

use gijiroku_config::Settings;
use gijiroku_db::Db;
use gijiroku_engine::{
    ChatBackend, Engine, EngineConfig, OllamaBackend, SpeechBackend, WhisperBackend,
};
use gijiroku_services::{AudioIntake, Store, SymphoniaProbe};

#[derive(Clone)]
pub struct AppState {
    pub settings: Settings,
    pub store: Arc<Store>,
    pub intake: Arc<AudioIntake>,
    pub engine: Arc<Engine>,
}

impl AppState {
    /// Production wiring: SQLite under `data_dir`, a local Whisper model
    /// and the Ollama host from settings.
    pub fn from_settings(settings: Settings) -> anyhow::Result<Self> {
        let db = Db::open(&settings.database_path())?;
        let store = Arc::new(Store::new(db));

        // whisper.cpp picks its compute path at build time; the device
        // setting is surfaced here so operators can see what was asked for.
        tracing::info!(
            model = %settings.whisper_model,
            device = %settings.whisper_device,
            "Configuring Whisper backend"
        );
        let speech: Arc<dyn SpeechBackend> = Arc::new(WhisperBackend::new(
            settings.whisper_model_path(),
            settings.whisper_model.clone(),
            Some("ja".to_string()),
            settings.transcribe_timeout_secs,
        ));
        let chat: Arc<dyn ChatBackend> = Arc::new(OllamaBackend::new(
            &settings.ollama_base_url,
            &settings.ollama_model,
        ));

        Ok(Self::with_backends(settings, store, speech, chat))
    }

    /// Shared wiring; tests inject their own store and fake backends.
    pub fn with_backends(
        settings: Settings,
        store: Arc<Store>,
        speech: Arc<dyn SpeechBackend>,
        chat: Arc<dyn ChatBackend>,
    ) -> Self {
        let engine_config = EngineConfig {
            worker_count: settings.worker_count,
            correct_timeout_secs: settings.correct_timeout_secs,
            summarize_timeout_secs: settings.summarize_timeout_secs,
            retention_days: settings.file_retention_days,
            ..EngineConfig::default()
        };
        let engine = Engine::new(Arc::clone(&store), speech, chat, engine_config);

        let intake = Arc::new(AudioIntake::new(
            Arc::clone(&store),
            Arc::new(SymphoniaProbe),
            settings.upload_dir(),
            settings.max_file_size_bytes,
        ));

        Self {
            settings,
            store,
            intake,
            engine,
        }
    }

    /// Body limit for uploads: the configured file cap plus room for the
    /// multipart framing, so an oversized file reaches our own size check
    /// and gets the FILE_TOO_LARGE envelope instead of a bare 413.
    pub fn body_limit(&self) -> usize {
        self.settings.max_file_size_bytes as usize + 2 * 1024 * 1024
    }
}
