//! WAV export
//!
//! Offline render followed by PCM encoding. [`export_wav`] blocks the
//! calling thread; [`spawn_export`] runs the same work on a worker thread
//! and hands back a cancellable [`ExportJob`].

use std::path::Path;
use std::thread::{self, JoinHandle};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use super::offline::{OfflineRenderer, RenderWarning};
use super::progress::{CancelToken, ProgressSink};
use crate::config::EngineConfig;
use crate::engine::buffer::SUPPORTED_SAMPLE_RATES;
use crate::engine::wav::{encode_wav, BitDepth};
use crate::error::{Result, SonoscapeError};
use crate::scene::SceneSnapshot;

/// Output format for an export
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExportSettings {
    pub sample_rate: u32,
    pub bit_depth: BitDepth,
    /// Overrides the scene's reverb level when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reverb_level: Option<f32>,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self::cd_quality()
    }
}

impl ExportSettings {
    pub fn new(sample_rate: u32, bit_depth: BitDepth) -> Self {
        Self {
            sample_rate,
            bit_depth,
            reverb_level: None,
        }
    }

    /// 44.1 kHz, 16-bit
    pub fn cd_quality() -> Self {
        Self::new(44100, BitDepth::Int16)
    }

    /// 48 kHz, 24-bit
    pub fn high_quality() -> Self {
        Self::new(48000, BitDepth::Int24)
    }

    /// 96 kHz, 32-bit float
    pub fn max_quality() -> Self {
        Self::new(96000, BitDepth::Float32)
    }

    pub fn with_reverb_level(mut self, level: f32) -> Self {
        self.reverb_level = Some(level);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !SUPPORTED_SAMPLE_RATES.contains(&self.sample_rate) {
            return Err(SonoscapeError::invalid_parameter(
                "sample_rate",
                self.sample_rate,
                format!("one of {:?}", SUPPORTED_SAMPLE_RATES),
            ));
        }
        if let Some(level) = self.reverb_level {
            if !level.is_finite() || level < 0.0 {
                return Err(SonoscapeError::invalid_parameter(
                    "reverb_level",
                    level,
                    "a finite value >= 0",
                ));
            }
        }
        Ok(())
    }
}

/// What an export produced
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportReport {
    pub sample_rate: u32,
    pub bit_depth: BitDepth,
    pub channels: usize,
    pub frames: usize,
    pub duration_secs: f64,
    /// Encoded size including the 44-byte header
    pub bytes: usize,
    pub sources_rendered: usize,
    pub reverb_level: f32,
    pub warnings: Vec<RenderWarning>,
    pub rendered_at: DateTime<Utc>,
}

/// Encoded WAV bytes with their report
#[derive(Debug, Clone)]
pub struct ExportArtifact {
    pub bytes: Vec<u8>,
    pub report: ExportReport,
}

impl ExportArtifact {
    /// Write the WAV bytes to `path`
    pub fn write_to(&self, path: &Path) -> Result<()> {
        std::fs::write(path, &self.bytes)?;
        Ok(())
    }
}

/// Render `snapshot` and encode it as a WAV file in memory
///
/// # Errors
/// * `InvalidParameter` - If the settings are invalid
/// * `Cancelled` - If `cancel` fires before encoding finishes
/// * `RenderFailure` / `EncodeFailure` - If the pipeline itself fails
#[instrument(skip_all, fields(sample_rate = settings.sample_rate, bit_depth = %settings.bit_depth))]
pub fn export_wav(
    snapshot: &SceneSnapshot,
    settings: &ExportSettings,
    config: &EngineConfig,
    progress: &dyn ProgressSink,
    cancel: &CancelToken,
) -> Result<ExportArtifact> {
    settings.validate()?;
    let reverb_level = settings.reverb_level.unwrap_or(snapshot.reverb_level());

    let renderer = OfflineRenderer::new(*config);
    let mix = renderer.render(snapshot, settings.sample_rate, reverb_level, progress, cancel)?;

    cancel.check()?;
    progress.report(&format!("Encoding WAV ({})...", settings.bit_depth));
    let bytes = encode_wav(&mix.buffer, settings.bit_depth)?;
    cancel.check()?;

    let report = ExportReport {
        sample_rate: settings.sample_rate,
        bit_depth: settings.bit_depth,
        channels: mix.buffer.num_channels(),
        frames: mix.report.frames,
        duration_secs: mix.report.duration_secs,
        bytes: bytes.len(),
        sources_rendered: mix.report.sources_rendered,
        reverb_level,
        warnings: mix.report.warnings,
        rendered_at: Utc::now(),
    };
    info!(bytes = report.bytes, frames = report.frames, "export complete");

    Ok(ExportArtifact { bytes, report })
}

/// A running background export
#[derive(Debug)]
pub struct ExportJob {
    handle: JoinHandle<Result<ExportArtifact>>,
    cancel: CancelToken,
}

impl ExportJob {
    /// Request cancellation; `join` will then return `Err(Cancelled)`
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the export to finish
    pub fn join(self) -> Result<ExportArtifact> {
        self.handle.join().map_err(|_| SonoscapeError::RenderFailure {
            reason: "export worker panicked".to_string(),
        })?
    }
}

/// Run [`export_wav`] on a worker thread
///
/// The snapshot is moved to the worker, so the caller may keep editing the
/// live scene while the export runs.
pub fn spawn_export(
    snapshot: SceneSnapshot,
    settings: ExportSettings,
    config: EngineConfig,
    progress: Box<dyn ProgressSink + Send>,
) -> ExportJob {
    let cancel = CancelToken::new();
    let worker_cancel = cancel.clone();
    let handle = thread::spawn(move || {
        export_wav(&snapshot, &settings, &config, progress.as_ref(), &worker_cancel)
    });
    ExportJob { handle, cancel }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::wav::{encoded_len, WAV_HEADER_LEN};
    use crate::render::progress::NullProgress;
    use crate::scene::{AudioHandle, Scene, Source};
    use test_case::test_case;

    fn tone_scene(duration: f64) -> Scene {
        let mut scene = Scene::new();
        scene.add(
            Source::new("tone")
                .with_audio(AudioHandle::tone(440.0, 1.0))
                .with_timeline(0.0, Some(duration)),
        );
        scene
    }

    #[test_case(ExportSettings::cd_quality(), 2 ; "16-bit")]
    #[test_case(ExportSettings::high_quality(), 3 ; "24-bit")]
    #[test_case(ExportSettings::max_quality(), 4 ; "float")]
    fn test_export_size(settings: ExportSettings, bytes_per_sample: usize) {
        let scene = tone_scene(1.0);
        let artifact = export_wav(
            &scene.snapshot(),
            &settings,
            &EngineConfig::default(),
            &NullProgress,
            &CancelToken::new(),
        )
        .unwrap();

        let frames = settings.sample_rate as usize;
        assert_eq!(artifact.bytes.len(), WAV_HEADER_LEN + frames * 2 * bytes_per_sample);
        assert_eq!(artifact.bytes.len(), encoded_len(frames, 2, settings.bit_depth));
        assert_eq!(artifact.report.bytes, artifact.bytes.len());
        assert_eq!(&artifact.bytes[0..4], b"RIFF");
    }

    #[test]
    fn test_rejects_unsupported_sample_rate() {
        let settings = ExportSettings::new(22050, BitDepth::Int16);
        let err = export_wav(
            &tone_scene(1.0).snapshot(),
            &settings,
            &EngineConfig::default(),
            &NullProgress,
            &CancelToken::new(),
        )
        .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_PARAMETER");
    }

    #[test]
    fn test_reverb_override() {
        let mut scene = tone_scene(1.0);
        scene.reverb_level = 0.3;
        let settings = ExportSettings::cd_quality().with_reverb_level(0.0);
        let artifact = export_wav(
            &scene.snapshot(),
            &settings,
            &EngineConfig::default(),
            &NullProgress,
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(artifact.report.reverb_level, 0.0);
    }

    #[test]
    fn test_encoding_progress_message() {
        use std::sync::Mutex;
        let messages = Mutex::new(Vec::<String>::new());
        let sink = |m: &str| messages.lock().unwrap().push(m.to_string());
        export_wav(
            &tone_scene(1.0).snapshot(),
            &ExportSettings::cd_quality(),
            &EngineConfig::default(),
            &sink,
            &CancelToken::new(),
        )
        .unwrap();
        let messages = messages.into_inner().unwrap();
        assert_eq!(messages.last().map(String::as_str), Some("Encoding WAV (16-bit)..."));
    }

    #[test]
    fn test_background_export_matches_blocking() {
        let scene = tone_scene(1.0);
        let job = spawn_export(
            scene.snapshot(),
            ExportSettings::cd_quality(),
            EngineConfig::default(),
            Box::new(NullProgress),
        );
        let background = job.join().unwrap();
        let blocking = export_wav(
            &scene.snapshot(),
            &ExportSettings::cd_quality(),
            &EngineConfig::default(),
            &NullProgress,
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(background.bytes, blocking.bytes);
    }

    #[test]
    fn test_cancelled_background_export() {
        let job = spawn_export(
            tone_scene(30.0).snapshot(),
            ExportSettings::max_quality(),
            EngineConfig::default(),
            Box::new(NullProgress),
        );
        job.cancel();
        assert!(matches!(job.join(), Err(SonoscapeError::Cancelled)));
    }

    #[test]
    fn test_settings_json() {
        let settings: ExportSettings =
            serde_json::from_str(r#"{"sample_rate":48000,"bit_depth":24}"#).unwrap();
        assert_eq!(settings, ExportSettings::high_quality());
        assert!(serde_json::from_str::<ExportSettings>(r#"{"sample_rate":48000,"bit_depth":12}"#).is_err());
    }
}
