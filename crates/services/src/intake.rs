use std::path::PathBuf;
use std::sync::Arc;

use gijiroku_db::models::{Job, LogLevel, UsageType};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::probe::AudioProbe;
use crate::store::{NewAudioMeta, NewJob, Store, StoreError};

#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("アップロードされたファイルが空です")]
    EmptyFile,
    #[error("ファイルサイズが制限を超えています（最大: {max_bytes} バイト）")]
    FileTooLarge { max_bytes: u64 },
    #[error("サポートされていないファイル形式です: {0}")]
    InvalidFormat(String),
    #[error("音声ファイルを解析できません: {0}")]
    CorruptFile(String),
    #[error("不正なリクエストです: {0}")]
    InvalidRequest(String),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl IntakeError {
    pub fn code(&self) -> &'static str {
        match self {
            IntakeError::EmptyFile => "EMPTY_FILE",
            IntakeError::FileTooLarge { .. } => "FILE_TOO_LARGE",
            IntakeError::InvalidFormat(_) => "INVALID_FORMAT",
            IntakeError::CorruptFile(_) => "CORRUPT_FILE",
            IntakeError::InvalidRequest(_) => "INVALID_REQUEST",
            IntakeError::Store(_) | IntakeError::Io(_) => "INTERNAL",
        }
    }
}

/// Logical audio format shared by extension, sniffed content and MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogicalFormat {
    M4a,
    Wav,
    Mp3,
}

impl LogicalFormat {
    fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "m4a" | "mp4" => Some(LogicalFormat::M4a),
            "wav" => Some(LogicalFormat::Wav),
            "mp3" => Some(LogicalFormat::Mp3),
            _ => None,
        }
    }

    fn canonical_mime(&self) -> &'static str {
        match self {
            LogicalFormat::M4a => "audio/m4a",
            LogicalFormat::Wav => "audio/wav",
            LogicalFormat::Mp3 => "audio/mp3",
        }
    }
}

/// The fixed normalization table: every accepted MIME spelling collapses to
/// its canonical form. Unknown MIME types are rejected.
fn normalize_mime(mime: &str) -> Option<(&'static str, LogicalFormat)> {
    match mime.to_ascii_lowercase().as_str() {
        "audio/m4a" | "audio/x-m4a" | "audio/mp4" => Some(("audio/m4a", LogicalFormat::M4a)),
        "audio/wav" | "audio/wave" | "audio/x-wav" => Some(("audio/wav", LogicalFormat::Wav)),
        "audio/mp3" | "audio/mpeg" => Some(("audio/mp3", LogicalFormat::Mp3)),
        _ => None,
    }
}

/// Magic-byte sniffing; the declared MIME type is not trusted on its own.
fn sniff_format(bytes: &[u8]) -> Option<LogicalFormat> {
    if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE" {
        return Some(LogicalFormat::Wav);
    }
    if bytes.len() >= 12 && &bytes[4..8] == b"ftyp" {
        return Some(LogicalFormat::M4a);
    }
    if bytes.len() >= 3 && &bytes[0..3] == b"ID3" {
        return Some(LogicalFormat::Mp3);
    }
    if bytes.len() >= 2 && bytes[0] == 0xFF && bytes[1] & 0xE0 == 0xE0 {
        return Some(LogicalFormat::Mp3);
    }
    None
}

const DANGEROUS_SEQUENCES: [&str; 10] =
    ["..", "/", "\\", ":", "*", "?", "\"", "<", ">", "|"];

fn validate_filename(name: &str) -> Result<(), IntakeError> {
    if name.is_empty() {
        return Err(IntakeError::InvalidRequest(
            "ファイル名が指定されていません".to_string(),
        ));
    }
    if name.chars().count() > 255 {
        return Err(IntakeError::InvalidRequest(
            "ファイル名が長すぎます".to_string(),
        ));
    }
    if DANGEROUS_SEQUENCES.iter().any(|seq| name.contains(seq)) {
        return Err(IntakeError::InvalidRequest(
            "ファイル名に使用できない文字が含まれています".to_string(),
        ));
    }
    Ok(())
}

/// Validates, persists and registers an uploaded recording.
///
/// Validation short-circuits on the first failure and nothing is persisted
/// unless the whole chain (including the probe) succeeds.
pub struct AudioIntake {
    store: Arc<Store>,
    probe: Arc<dyn AudioProbe>,
    upload_dir: PathBuf,
    max_file_size: u64,
}

impl AudioIntake {
    pub fn new(
        store: Arc<Store>,
        probe: Arc<dyn AudioProbe>,
        upload_dir: PathBuf,
        max_file_size: u64,
    ) -> Self {
        Self {
            store,
            probe,
            upload_dir,
            max_file_size,
        }
    }

    pub async fn accept(
        &self,
        original_name: &str,
        declared_mime: Option<&str>,
        bytes: &[u8],
        usage_type: UsageType,
    ) -> Result<Job, IntakeError> {
        // 1. Size bounds. Exactly max_file_size is still accepted.
        if bytes.is_empty() {
            return Err(IntakeError::EmptyFile);
        }
        if bytes.len() as u64 > self.max_file_size {
            return Err(IntakeError::FileTooLarge {
                max_bytes: self.max_file_size,
            });
        }

        // 2. Extension and sniffed content must name the same format.
        validate_filename(original_name)?;
        let ext = original_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .ok_or_else(|| IntakeError::InvalidFormat("拡張子がありません".to_string()))?;
        let format = LogicalFormat::from_extension(&ext).ok_or_else(|| {
            IntakeError::InvalidFormat(format!("拡張子 .{ext} はサポートされていません"))
        })?;
        let sniffed = sniff_format(bytes).ok_or_else(|| {
            IntakeError::InvalidFormat("音声データとして認識できません".to_string())
        })?;
        if sniffed != format {
            return Err(IntakeError::InvalidFormat(format!(
                "ファイル内容が拡張子 .{ext} と一致しません"
            )));
        }

        // 3. MIME normalization of the declared type.
        let mime_type = match declared_mime {
            Some(declared) => {
                let (normalized, logical) = normalize_mime(declared)
                    .ok_or_else(|| IntakeError::InvalidFormat(declared.to_string()))?;
                if logical != format {
                    return Err(IntakeError::InvalidFormat(format!(
                        "MIMEタイプ {declared} が拡張子 .{ext} と一致しません"
                    )));
                }
                normalized
            }
            None => format.canonical_mime(),
        };

        // 4. Content hash; an active job with identical content is reused.
        let file_hash = hex::encode(Sha256::digest(bytes));
        if let Some(existing) = self.store.find_active_by_hash(&file_hash, usage_type)? {
            info!(job_id = %existing.id, hash = %file_hash, "Duplicate upload, returning active job");
            return Ok(existing);
        }

        // 5. Content-addressed persistence, then probe. A probe failure
        // removes the file again so a rejected upload leaves no trace.
        let dir = self.upload_dir.join(&file_hash[..2]);
        tokio::fs::create_dir_all(&dir).await?;
        let stored_filename = format!("{file_hash}.{ext}");
        let path = dir.join(&stored_filename);
        tokio::fs::write(&path, bytes).await?;

        let audio = match self.probe.probe(&path).await {
            Ok(info) => info,
            Err(e) => {
                let _ = tokio::fs::remove_file(&path).await;
                return Err(IntakeError::CorruptFile(e.to_string()));
            }
        };

        let job_id = Uuid::new_v4();
        let job = NewJob {
            id: job_id,
            original_filename: original_name.to_string(),
            stored_filename,
            file_size: bytes.len() as u64,
            file_hash,
            mime_type: mime_type.to_string(),
            usage_type,
            message: Some("ファイルアップロード完了".to_string()),
        };
        let meta = NewAudioMeta {
            file_path: path.to_string_lossy().to_string(),
            duration_seconds: audio.duration_seconds,
            sample_rate: audio.sample_rate,
            channels: audio.channels,
            bitrate: audio.bitrate,
        };

        let job = match self.store.create_job(job, meta) {
            Ok(job) => job,
            Err(e) => {
                let _ = tokio::fs::remove_file(&path).await;
                return Err(e.into());
            }
        };

        if let Err(e) = self.store.append_log(
            &job.id,
            LogLevel::Info,
            &format!("転写ジョブ作成: {original_name}"),
            None,
        ) {
            warn!(job_id = %job.id, error = %e, "Failed to write processing log");
        }

        info!(
            job_id = %job.id,
            filename = %original_name,
            size_bytes = bytes.len(),
            mime = %job.mime_type,
            "Upload accepted"
        );
        Ok(job)
    }
}
