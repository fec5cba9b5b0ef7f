//! Offline render pipeline
//!
//! Renders a scene snapshot into one stereo buffer covering the whole
//! timeline:
//! 1. validate and decode every source's audio once (failures become warnings)
//! 2. bake each trajectory into a [`PositionCurve`]
//! 3. schedule each source at `[round(start * sr), round(min(end, total) * sr))`
//! 4. run the voices block by block, updating panner positions per block
//! 5. convolve the reverb send and add it at the global wet level
//!
//! The output is exactly `ceil(total * sr)` frames; the reverb tail past the
//! timeline end is cut.

use std::fmt;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::cache::DecodeCache;
use super::curve::PositionCurve;
use super::progress::{CancelToken, ProgressSink};
use crate::config::EngineConfig;
use crate::dsp::reverb::{convolve_offline, ReverbImpulse};
use crate::dsp::voice::Voice;
use crate::engine::buffer::{AudioBuffer, ChannelLayout, MAX_RENDER_FRAMES};
use crate::error::{Result, SonoscapeError};
use crate::scene::{SceneSnapshot, SourceId};

/// Blocks rendered between cancellation checks
const CANCEL_CHECK_INTERVAL: usize = 64;

/// A non-fatal problem encountered while rendering
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RenderWarning {
    /// The source's audio could not be decoded; it was left out of the mix
    DecodeFailed {
        source_id: SourceId,
        name: String,
        reason: String,
    },
    /// The source has parameters that cannot be rendered; it was left out of the mix
    InvalidSource {
        source_id: SourceId,
        name: String,
        reason: String,
    },
    /// The source starts at or after the end of the timeline
    SourceBeyondTimeline {
        source_id: SourceId,
        name: String,
        start: f64,
    },
    /// Nothing audible was scheduled; the output is silence
    EmptyTimeline,
}

impl fmt::Display for RenderWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderWarning::DecodeFailed { name, reason, .. }
            | RenderWarning::InvalidSource { name, reason, .. } => {
                write!(f, "Skipped '{}': {}", name, reason)
            }
            RenderWarning::SourceBeyondTimeline { name, start, .. } => {
                write!(f, "Skipped '{}': starts at {:.3}s, after the timeline ends", name, start)
            }
            RenderWarning::EmptyTimeline => write!(f, "No audible sources; rendered silence"),
        }
    }
}

/// Summary of a finished render
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderReport {
    pub sample_rate: u32,
    pub frames: usize,
    pub duration_secs: f64,
    /// Sources that contributed audio
    pub sources_rendered: usize,
    pub reverb_applied: bool,
    pub warnings: Vec<RenderWarning>,
}

/// Final mix plus its report
#[derive(Debug, Clone)]
pub struct RenderedMix {
    pub buffer: AudioBuffer,
    pub report: RenderReport,
}

struct ScheduledVoice {
    id: SourceId,
    voice: Voice,
    curve: PositionCurve,
    start_frame: usize,
    stop_frame: usize,
}

/// Renders scene snapshots to stereo buffers
#[derive(Debug, Clone, Default)]
pub struct OfflineRenderer {
    config: EngineConfig,
}

impl OfflineRenderer {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Render `snapshot` at `sample_rate` with the given reverb wet level
    ///
    /// # Errors
    /// * `InvalidParameter` - If the sample rate, reverb level or config is invalid
    /// * `RenderFailure` - If the timeline is too long or the mix is not finite
    /// * `Cancelled` - If `cancel` fires; no partial output is returned
    pub fn render(
        &self,
        snapshot: &SceneSnapshot,
        sample_rate: u32,
        reverb_level: f32,
        progress: &dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<RenderedMix> {
        self.config.validate()?;
        if sample_rate == 0 {
            return Err(SonoscapeError::invalid_parameter("sample_rate", 0, "> 0"));
        }
        if !reverb_level.is_finite() || reverb_level < 0.0 {
            return Err(SonoscapeError::invalid_parameter(
                "reverb_level",
                reverb_level,
                "a finite value >= 0",
            ));
        }

        let total = snapshot.total_duration_with_min(self.config.timeline.min_duration_secs);
        let sr = sample_rate as f64;
        let exact_frames = (total * sr).ceil();
        if !exact_frames.is_finite() || exact_frames > MAX_RENDER_FRAMES as f64 {
            return Err(SonoscapeError::RenderFailure {
                reason: format!("timeline of {:.1}s is too long to render at {} Hz", total, sample_rate),
            });
        }
        let frames = exact_frames as usize;

        info!(
            sources = snapshot.sources().len(),
            duration_secs = total,
            sample_rate,
            "starting offline render"
        );

        let mut warnings = Vec::new();

        // Decode
        let mut cache = DecodeCache::new(sample_rate);
        let mut decoded = Vec::new();
        for source in snapshot.sources() {
            cancel.check()?;
            if let Err(e) = source.validate() {
                warn!(source = %source.label(), error = %e, "skipping invalid source");
                warnings.push(RenderWarning::InvalidSource {
                    source_id: source.id(),
                    name: source.label(),
                    reason: e.to_string(),
                });
                continue;
            }
            let Some(handle) = &source.audio else {
                debug!(source = %source.label(), "no audio attached, skipping");
                continue;
            };
            progress.report(&format!("Loading: {}", source.label()));
            match cache.load(handle) {
                Ok(content) => decoded.push((source, content)),
                Err(e) => {
                    warn!(source = %source.label(), error = %e, "failed to decode source audio");
                    warnings.push(RenderWarning::DecodeFailed {
                        source_id: source.id(),
                        name: source.label(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        // Schedule
        cancel.check()?;
        progress.report("Scheduling timeline...");
        let mut voices = Vec::with_capacity(decoded.len());
        for (source, content) in decoded {
            if source.timeline_start >= total {
                warnings.push(RenderWarning::SourceBeyondTimeline {
                    source_id: source.id(),
                    name: source.label(),
                    start: source.timeline_start,
                });
                continue;
            }

            let end = source.timeline_end().min(total);
            let start_frame = ((source.timeline_start * sr).round() as usize).min(frames);
            let stop_frame = ((end * sr).round() as usize).min(frames);

            let mut voice = Voice::new(Some(content), self.config.panner, sample_rate);
            voice.set_gain(source.volume);

            voices.push(ScheduledVoice {
                id: source.id(),
                voice,
                curve: PositionCurve::bake(source, self.config.render.curve_step_secs),
                start_frame,
                stop_frame,
            });
        }
        voices.sort_by_key(|v| v.id);

        let sources_rendered = voices.iter().filter(|v| v.stop_frame > v.start_frame).count();
        if sources_rendered == 0 {
            warnings.push(RenderWarning::EmptyTimeline);
        }

        // Render
        progress.report("Rendering audio...");
        let block = self.config.render.block_size;
        let mut dry = AudioBuffer::with_rate(frames, ChannelLayout::Stereo, sample_rate);
        let mut send = AudioBuffer::with_rate(frames, ChannelLayout::Stereo, sample_rate);
        let mut block_dry = AudioBuffer::with_rate(block, ChannelLayout::Stereo, sample_rate);
        let mut block_send = AudioBuffer::with_rate(block, ChannelLayout::Stereo, sample_rate);

        for (index, block_start) in (0..frames).step_by(block).enumerate() {
            if index % CANCEL_CHECK_INTERVAL == 0 {
                cancel.check()?;
            }
            let len = block.min(frames - block_start);
            let block_end = block_start + len;
            let time = block_start as f64 / sr;
            block_dry.clear();
            block_send.clear();

            let mut any = false;
            for scheduled in &mut voices {
                let from = scheduled.start_frame.max(block_start);
                let to = scheduled.stop_frame.min(block_end);
                if from >= to {
                    continue;
                }
                scheduled.voice.set_position(scheduled.curve.value_at(time));
                scheduled.voice.render(
                    len,
                    (from - block_start)..(to - block_start),
                    &mut block_dry,
                    &mut block_send,
                );
                any = true;
            }

            if any {
                for ch in 0..2 {
                    dry.samples[ch][block_start..block_end].copy_from_slice(&block_dry.samples[ch][..len]);
                    send.samples[ch][block_start..block_end].copy_from_slice(&block_send.samples[ch][..len]);
                }
            }
        }

        // Reverb
        cancel.check()?;
        let reverb_applied = reverb_level > 0.0 && sources_rendered > 0;
        if reverb_applied {
            let impulse = ReverbImpulse::generate(&self.config.reverb, sample_rate)?;
            let wet = convolve_offline(&send, &impulse, self.config.render.convolution_block)?;
            cancel.check()?;
            for (out, wet) in dry.samples.iter_mut().zip(&wet.samples) {
                for (o, w) in out.iter_mut().zip(wet) {
                    *o += w * reverb_level;
                }
            }
        }

        if !dry.is_finite() {
            return Err(SonoscapeError::RenderFailure {
                reason: "mix contains non-finite samples".to_string(),
            });
        }

        info!(
            frames,
            sources_rendered,
            warnings = warnings.len(),
            "offline render complete"
        );

        Ok(RenderedMix {
            buffer: dry,
            report: RenderReport {
                sample_rate,
                frames,
                duration_secs: total,
                sources_rendered,
                reverb_applied,
                warnings,
            },
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
