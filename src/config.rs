//! Engine configuration
//!
//! Every tunable of the live graph and the offline renderer, loadable from
//! JSON. Missing fields take their defaults, so `{}` is a valid config.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::dsp::impulse::ImpulseResponseConfig;
use crate::dsp::panner::PannerConfig;
use crate::engine::transport::TICK_CAP_SECS;
use crate::error::{Result, SonoscapeError};
use crate::scene::MIN_TIMELINE_SECS;

fn default_curve_step() -> f64 {
    0.05
}

fn default_block_size() -> usize {
    128
}

fn default_offline_convolution_block() -> usize {
    4096
}

fn default_live_convolution_block() -> usize {
    1024
}

fn default_tick_cap() -> f64 {
    TICK_CAP_SECS
}

fn default_min_duration() -> f64 {
    MIN_TIMELINE_SECS
}

/// Offline render settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Spacing of baked position-curve points in seconds
    #[serde(default = "default_curve_step")]
    pub curve_step_secs: f64,
    /// Frames per render quantum; positions update once per quantum
    #[serde(default = "default_block_size")]
    pub block_size: usize,
    /// Reverb partition length in frames
    #[serde(default = "default_offline_convolution_block")]
    pub convolution_block: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            curve_step_secs: default_curve_step(),
            block_size: default_block_size(),
            convolution_block: default_offline_convolution_block(),
        }
    }
}

/// Live playback settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LiveConfig {
    /// Largest transport advance per tick
    #[serde(default = "default_tick_cap")]
    pub tick_cap_secs: f64,
    /// Reverb partition length in frames (also the reverb latency)
    #[serde(default = "default_live_convolution_block")]
    pub convolution_block: usize,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            tick_cap_secs: default_tick_cap(),
            convolution_block: default_live_convolution_block(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimelineConfig {
    /// Floor applied to the computed scene length
    #[serde(default = "default_min_duration")]
    pub min_duration_secs: f64,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            min_duration_secs: default_min_duration(),
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub panner: PannerConfig,
    #[serde(default)]
    pub reverb: ImpulseResponseConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub live: LiveConfig,
    #[serde(default)]
    pub timeline: TimelineConfig,
}

impl EngineConfig {
    /// Load from a JSON file and validate
    ///
    /// # Errors
    /// * `FileNotFound` - If the file cannot be read
    /// * `Serialization` - If the JSON is malformed
    /// * `InvalidParameter` - If a value is out of range
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| SonoscapeError::FileNotFound {
            path: path.display().to_string(),
            source: Some(e),
        })?;
        let config: EngineConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Write as pretty-printed JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.panner.validate()?;
        self.reverb.validate()?;

        if !(self.render.curve_step_secs.is_finite() && self.render.curve_step_secs > 0.0) {
            return Err(SonoscapeError::invalid_parameter(
                "render.curve_step_secs",
                self.render.curve_step_secs,
                "> 0",
            ));
        }
        if self.render.block_size == 0 {
            return Err(SonoscapeError::invalid_parameter(
                "render.block_size",
                0,
                ">= 1",
            ));
        }
        for (param, block) in [
            ("render.convolution_block", self.render.convolution_block),
            ("live.convolution_block", self.live.convolution_block),
        ] {
            if block == 0 {
                return Err(SonoscapeError::invalid_parameter(param, block, ">= 1"));
            }
        }
        if !(self.live.tick_cap_secs.is_finite() && self.live.tick_cap_secs > 0.0) {
            return Err(SonoscapeError::invalid_parameter(
                "live.tick_cap_secs",
                self.live.tick_cap_secs,
                "> 0",
            ));
        }
        if !(self.timeline.min_duration_secs.is_finite() && self.timeline.min_duration_secs > 0.0) {
            return Err(SonoscapeError::invalid_parameter(
                "timeline.min_duration_secs",
                self.timeline.min_duration_secs,
                "> 0",
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
