use std::path::Path;

use async_trait::async_trait;
use symphonia::core::codecs::CODEC_TYPE_NULL;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;

/// Container-level metadata extracted from an uploaded recording.
#[derive(Debug, Clone)]
pub struct AudioInfo {
    pub duration_seconds: f64,
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
    pub bitrate: Option<u32>,
}

#[derive(Debug, Error)]
#[error("{0}")]
pub struct ProbeError(pub String);

/// Collaborator that inspects an audio file on disk. Intake only needs the
/// shape of the answer, so tests substitute their own implementation.
#[async_trait]
pub trait AudioProbe: Send + Sync {
    async fn probe(&self, path: &Path) -> Result<AudioInfo, ProbeError>;
}

/// Probe backed by symphonia's format readers (wav/m4a/mp4/mp3).
pub struct SymphoniaProbe;

#[async_trait]
impl AudioProbe for SymphoniaProbe {
    async fn probe(&self, path: &Path) -> Result<AudioInfo, ProbeError> {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || probe_blocking(&path))
            .await
            .map_err(|e| ProbeError(format!("probe task failed: {e}")))?
    }
}

fn probe_blocking(path: &Path) -> Result<AudioInfo, ProbeError> {
    let file_size = std::fs::metadata(path)
        .map_err(|e| ProbeError(format!("cannot stat {}: {e}", path.display())))?
        .len();

    let src = std::fs::File::open(path)
        .map_err(|e| ProbeError(format!("cannot open {}: {e}", path.display())))?;
    let mss = MediaSourceStream::new(Box::new(src), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| ProbeError(format!("unrecognized audio container: {e}")))?;

    let format = probed.format;
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| ProbeError("no decodable audio track".to_string()))?;

    let params = &track.codec_params;
    let sample_rate = params.sample_rate;
    let channels = params.channels.map(|c| c.count() as u16);

    let duration_seconds = match (params.n_frames, sample_rate) {
        (Some(frames), Some(rate)) if rate > 0 => frames as f64 / rate as f64,
        // Containers that do not declare a frame count (some MP3 streams):
        // estimate from byte size at a nominal 128 kbps.
        _ => (file_size as f64 / (128.0 * 1024.0 / 8.0)).max(1.0),
    };

    let bitrate = if duration_seconds > 0.0 {
        Some((file_size as f64 * 8.0 / duration_seconds) as u32)
    } else {
        None
    };

    Ok(AudioInfo {
        duration_seconds,
        sample_rate,
        channels,
        bitrate,
    })
}
