use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use dashmap::DashMap;
use gijiroku_db::models::{Job, LogLevel};
use gijiroku_services::{Store, StoreError};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backend::{ChatBackend, SpeechBackend};
use crate::config::EngineConfig;
use crate::worker;

/// Pipeline engine: a fixed pool of worker tasks advancing jobs through
/// Transcribe -> Correct -> Summarize, plus a TTL purge task.
///
/// Created once at startup and shared via `Arc`; the backends are
/// injected so tests can substitute fakes.
pub struct Engine {
    pub(crate) store: Arc<Store>,
    pub(crate) speech: Arc<dyn SpeechBackend>,
    pub(crate) chat: Arc<dyn ChatBackend>,
    pub(crate) config: EngineConfig,
    job_notify: Notify,
    /// Jobs found mid-stage at startup; drained before new claims.
    recovery: Mutex<VecDeque<Uuid>>,
    /// Jobs currently held by a worker.
    running: DashMap<Uuid, ()>,
    degraded: AtomicBool,
    /// The load failure that degraded the engine, for the health surface.
    degraded_reason: Mutex<Option<String>>,
    shutdown: AtomicBool,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Engine {
    pub fn new(
        store: Arc<Store>,
        speech: Arc<dyn SpeechBackend>,
        chat: Arc<dyn ChatBackend>,
        config: EngineConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            speech,
            chat,
            config,
            job_notify: Notify::new(),
            recovery: Mutex::new(VecDeque::new()),
            running: DashMap::new(),
            degraded: AtomicBool::new(false),
            degraded_reason: Mutex::new(None),
            shutdown: AtomicBool::new(false),
            handles: Mutex::new(Vec::new()),
        })
    }

    /// Requeue interrupted jobs, then spawn the worker pool and the purge
    /// task.
    pub fn start(self: &Arc<Self>) -> Result<(), StoreError> {
        let interrupted = self.store.interrupted_jobs()?;
        if !interrupted.is_empty() {
            info!(count = interrupted.len(), "Requeueing interrupted jobs");
            let mut queue = self.lock_recovery();
            for job in &interrupted {
                queue.push_back(job.id);
            }
        }

        let worker_count = self.config.worker_count.max(1);
        let mut handles = self.lock_handles();
        for worker_id in 0..worker_count {
            let engine = Arc::clone(self);
            handles.push(tokio::spawn(worker::run(engine, worker_id)));
        }

        let engine = Arc::clone(self);
        handles.push(tokio::spawn(purge_loop(engine)));

        info!(worker_count, "Pipeline engine started");
        Ok(())
    }

    /// Stop all engine tasks. Jobs that were mid-stage stay in their
    /// in-flight status and are recovered by the next `start`.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.job_notify.notify_waiters();
        for handle in self.lock_handles().drain(..) {
            handle.abort();
        }
        info!("Pipeline engine stopped");
    }

    /// Wake idle workers after an upload.
    pub fn notify_new_job(&self) {
        self.job_notify.notify_waiters();
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    pub(crate) fn set_degraded(&self, reason: &str) {
        self.degraded.store(true, Ordering::SeqCst);
        *self
            .degraded_reason
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(reason.to_string());
    }

    pub fn degraded_reason(&self) -> Option<String> {
        self.degraded_reason
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    pub(crate) async fn wait_for_job(&self) {
        self.job_notify.notified().await;
    }

    /// Recovered jobs first, then a fresh claim from the store.
    pub(crate) fn next_job(&self) -> Result<Option<Job>, StoreError> {
        loop {
            let recovered = self.lock_recovery().pop_front();
            match recovered {
                Some(id) => match self.store.get_job(&id)? {
                    // A job cancelled or purged while queued is skipped.
                    Some(job) if !job.status.is_terminal() => return Ok(Some(job)),
                    _ => continue,
                },
                None => break,
            }
        }
        self.store.claim_next_ready()
    }

    pub(crate) fn mark_running(&self, id: Uuid) {
        self.running.insert(id, ());
    }

    pub(crate) fn clear_running(&self, id: &Uuid) {
        self.running.remove(id);
    }

    pub fn running_count(&self) -> usize {
        self.running.len()
    }

    pub fn whisper_status(&self) -> &'static str {
        if self.is_degraded() {
            "DEGRADED"
        } else {
            "OK"
        }
    }

    pub async fn llm_status(&self) -> &'static str {
        if self.chat.check_available().await {
            "OK"
        } else {
            "DEGRADED"
        }
    }

    pub(crate) fn log(&self, id: &Uuid, level: LogLevel, message: &str) {
        if let Err(e) = self.store.append_log(id, level, message, None) {
            warn!(job_id = %id, error = %e, "Failed to append processing log");
        }
    }

    fn lock_recovery(&self) -> std::sync::MutexGuard<'_, VecDeque<Uuid>> {
        self.recovery.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_handles(&self) -> std::sync::MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Hourly TTL purge: expired terminal jobs leave the store and their
/// audio files leave the disk.
async fn purge_loop(engine: Arc<Engine>) {
    loop {
        if engine.shutting_down() {
            break;
        }

        match engine
            .store
            .purge_terminal_older_than(engine.config.retention_days)
        {
            Ok(purged) if !purged.is_empty() => {
                info!(count = purged.len(), "Purged expired jobs");
                for job in purged {
                    if let Some(path) = job.file_path {
                        if let Err(e) = tokio::fs::remove_file(&path).await {
                            debug!(path, error = %e, "Audio file already gone");
                        }
                    }
                }
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Purge pass failed"),
        }

        tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
    }
}
