//! Source Entity
//!
//! A sound placed in the scene: anchor position, volume, audio content,
//! timeline placement and automation.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::trajectory::{evaluate, Automation, Vec3};
use crate::engine::buffer::{AudioBuffer, MAX_RENDER_FRAMES};
use crate::error::{Result, SonoscapeError};

/// Clip length used when a source has no explicit timeline duration
pub const DEFAULT_CLIP_SECS: f64 = 10.0;

/// Default anchor for new sources: five metres in front of the listener
pub const DEFAULT_ANCHOR: Vec3 = Vec3::new(0.0, 0.0, -5.0);

/// Longest generated tone, sized so it fits at the highest export rate
pub const MAX_TONE_SECS: f64 = MAX_RENDER_FRAMES as f64 / 96_000.0;

/// Opaque, immutable source identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(Uuid);

impl SourceId {
    pub fn new() -> Self {
        SourceId(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for SourceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for SourceId {
    fn from(uuid: Uuid) -> Self {
        SourceId(uuid)
    }
}

/// Reference to decodable audio content
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AudioHandle {
    /// WAV file on disk
    File { path: PathBuf },
    /// Generated sine tone
    Tone { frequency_hz: f32, duration_secs: f32 },
    /// Encoded WAV bytes held in memory
    #[serde(skip)]
    Bytes(Arc<[u8]>),
    /// Already-decoded audio (e.g. generated upstream)
    #[serde(skip)]
    Buffer(Arc<AudioBuffer>),
}

impl AudioHandle {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        AudioHandle::File { path: path.into() }
    }

    pub fn tone(frequency_hz: f32, duration_secs: f32) -> Self {
        AudioHandle::Tone {
            frequency_hz,
            duration_secs,
        }
    }

    /// Reject generator parameters that cannot produce finite audio
    pub fn validate(&self) -> Result<()> {
        if let AudioHandle::Tone {
            frequency_hz,
            duration_secs,
        } = self
        {
            if !(frequency_hz.is_finite() && *frequency_hz > 0.0) {
                return Err(SonoscapeError::invalid_parameter(
                    "frequency_hz",
                    frequency_hz,
                    "a finite value > 0",
                ));
            }
            let duration = f64::from(*duration_secs);
            if !(duration.is_finite() && duration > 0.0 && duration <= MAX_TONE_SECS) {
                return Err(SonoscapeError::invalid_parameter(
                    "duration_secs",
                    duration_secs,
                    format!("a finite value in (0, {}]", MAX_TONE_SECS),
                ));
            }
        }
        Ok(())
    }

    /// Short human-readable description for progress messages
    pub fn describe(&self) -> String {
        match self {
            AudioHandle::File { path } => path.display().to_string(),
            AudioHandle::Tone {
                frequency_hz,
                duration_secs,
            } => format!("{} Hz tone ({} s)", frequency_hz, duration_secs),
            AudioHandle::Bytes(bytes) => format!("{} bytes in memory", bytes.len()),
            AudioHandle::Buffer(buffer) => format!("{:.2} s buffer", buffer.duration_secs()),
        }
    }
}

fn default_volume() -> f32 {
    1.0
}

fn default_anchor() -> Vec3 {
    DEFAULT_ANCHOR
}

/// A positioned, automatable sound on the timeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    #[serde(default)]
    id: SourceId,
    #[serde(default)]
    pub name: String,
    /// User-authored base position; automation never writes it
    #[serde(default = "default_anchor")]
    pub anchor: Vec3,
    /// Linear gain
    #[serde(default = "default_volume")]
    pub volume: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioHandle>,
    /// Seconds from scene start when the clip begins
    #[serde(default)]
    pub timeline_start: f64,
    /// Clip length in seconds; falls back to the clip default when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeline_duration: Option<f64>,
    #[serde(default)]
    pub automation: Automation,
}

impl Source {
    /// Create an empty (silent) source at the default anchor
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: SourceId::new(),
            name: name.into(),
            anchor: DEFAULT_ANCHOR,
            volume: 1.0,
            audio: None,
            timeline_start: 0.0,
            timeline_duration: None,
            automation: Automation::None,
        }
    }

    pub fn with_audio(mut self, audio: AudioHandle) -> Self {
        self.audio = Some(audio);
        self
    }

    pub fn with_anchor(mut self, anchor: Vec3) -> Self {
        self.anchor = anchor;
        self
    }

    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = volume;
        self
    }

    pub fn with_timeline(mut self, start: f64, duration: Option<f64>) -> Self {
        self.timeline_start = start;
        self.timeline_duration = duration;
        self
    }

    pub fn with_automation(mut self, automation: Automation) -> Self {
        self.automation = automation;
        self
    }

    pub fn id(&self) -> SourceId {
        self.id
    }

    /// Display label, falling back to the id for unnamed sources
    pub fn label(&self) -> String {
        if self.name.is_empty() {
            self.id.to_string()
        } else {
            self.name.clone()
        }
    }

    /// Clip length with the fallback applied
    pub fn effective_duration(&self) -> f64 {
        self.effective_duration_or(DEFAULT_CLIP_SECS)
    }

    /// Clip length with a caller-supplied fallback
    pub fn effective_duration_or(&self, fallback: f64) -> f64 {
        self.timeline_duration.unwrap_or(fallback)
    }

    /// End of the clip on the global timeline
    pub fn timeline_end(&self) -> f64 {
        self.timeline_start + self.effective_duration()
    }

    /// Whether the clip covers `time`: `[start, start + duration)`
    pub fn is_active_at(&self, time: f64) -> bool {
        time >= self.timeline_start && time < self.timeline_end()
    }

    /// Position at global timeline `time`
    pub fn position_at(&self, time: f64) -> Vec3 {
        self.position_at_relative(time - self.timeline_start)
    }

    /// Position at `relative_time` seconds into the clip
    pub fn position_at_relative(&self, relative_time: f64) -> Vec3 {
        evaluate(
            relative_time,
            self.anchor,
            &self.automation,
            self.effective_duration(),
        )
    }

    /// Check the invariants the engine relies on
    pub fn validate(&self) -> Result<()> {
        if !self.timeline_start.is_finite() || self.timeline_start < 0.0 {
            return Err(SonoscapeError::invalid_parameter(
                "timeline_start",
                self.timeline_start,
                "a finite value >= 0",
            ));
        }
        if let Some(duration) = self.timeline_duration {
            if !duration.is_finite() || duration < 0.0 {
                return Err(SonoscapeError::invalid_parameter(
                    "timeline_duration",
                    duration,
                    "a finite value >= 0",
                ));
            }
        }
        if !self.volume.is_finite() {
            return Err(SonoscapeError::invalid_parameter(
                "volume",
                self.volume,
                "a finite gain",
            ));
        }
        if !self.anchor.is_finite() {
            return Err(SonoscapeError::invalid_parameter(
                "anchor",
                format!("{:?}", self.anchor),
                "finite coordinates",
            ));
        }
        self.automation.validate()?;
        if let Some(audio) = &self.audio {
            audio.validate()?;
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
