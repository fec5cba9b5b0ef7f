//! Per-source voice
//!
//! Signal path for one source: looping buffer player -> spatial panner,
//! then the panned signal is split two ways:
//! - through the volume gain and level meter into the dry bus
//! - straight into the shared reverb send

use std::ops::Range;
use std::sync::Arc;

use super::panner::{PannerConfig, SpatialPanner};
use crate::engine::buffer::{rms, AudioBuffer};
use crate::scene::Vec3;

/// One source's playback state and processing chain
#[derive(Debug, Clone)]
pub struct Voice {
    content: Option<Arc<AudioBuffer>>,
    cursor: usize,
    playing: bool,
    gain: f32,
    level: f32,
    panner: SpatialPanner,
    mono: Vec<f32>,
    left: Vec<f32>,
    right: Vec<f32>,
}

impl Voice {
    pub fn new(content: Option<Arc<AudioBuffer>>, panner: PannerConfig, sample_rate: u32) -> Self {
        Self {
            content,
            cursor: 0,
            playing: false,
            gain: 1.0,
            level: 0.0,
            panner: SpatialPanner::new(panner, sample_rate),
            mono: Vec::new(),
            left: Vec::new(),
            right: Vec::new(),
        }
    }

    /// Whether decoded audio is attached
    pub fn has_content(&self) -> bool {
        self.content.as_ref().is_some_and(|c| !c.is_empty())
    }

    pub fn set_content(&mut self, content: Option<Arc<AudioBuffer>>) {
        self.content = content;
        self.cursor = 0;
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Start looping playback at `offset_secs` into the content
    pub fn start(&mut self, offset_secs: f64) {
        self.seek(offset_secs);
        self.playing = true;
        self.panner.reset();
    }

    pub fn stop(&mut self) {
        self.playing = false;
        self.level = 0.0;
    }

    /// Move the read cursor to `offset_secs` (wrapped to the content length)
    pub fn seek(&mut self, offset_secs: f64) {
        self.cursor = match &self.content {
            Some(content) if !content.is_empty() => {
                let frame = (offset_secs.max(0.0) * content.sample_rate as f64).floor() as usize;
                frame % content.num_samples()
            }
            _ => 0,
        };
    }

    /// Current read position in frames
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    /// Apply a new volume immediately; playback state is unaffected
    pub fn set_gain(&mut self, gain: f32) {
        self.gain = gain;
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.panner.set_position(position);
    }

    pub fn position(&self) -> Vec3 {
        self.panner.position()
    }

    /// Continue where `previous` left off: position, playing state and
    /// cursor (wrapped to this voice's content)
    pub fn take_over(&mut self, previous: &Voice) {
        self.set_position(previous.position());
        if previous.is_playing() {
            self.cursor = match &self.content {
                Some(content) if !content.is_empty() => previous.cursor % content.num_samples(),
                _ => 0,
            };
            self.playing = true;
        }
    }

    /// RMS of the most recent dry output block
    pub fn level(&self) -> f32 {
        self.level
    }

    /// Render one block, mixing into `dry` and `send`
    ///
    /// Only frames inside `active` read from the content; the rest of the
    /// block feeds silence to the panner. Both buses must be stereo and at
    /// least `block_len` long.
    pub fn render(
        &mut self,
        block_len: usize,
        active: Range<usize>,
        dry: &mut AudioBuffer,
        send: &mut AudioBuffer,
    ) {
        let active = active.start.min(block_len)..active.end.min(block_len);
        let content = match &self.content {
            Some(content) if !content.is_empty() && !active.is_empty() => Arc::clone(content),
            _ => {
                self.level = 0.0;
                return;
            }
        };

        self.mono.clear();
        self.mono.resize(block_len, 0.0);
        self.left.resize(block_len, 0.0);
        self.right.resize(block_len, 0.0);

        let len = content.num_samples();
        let channels = content.num_channels();
        let scale = 1.0 / channels as f32;
        for frame in &mut self.mono[active.clone()] {
            *frame = content
                .samples
                .iter()
                .map(|c| c[self.cursor])
                .sum::<f32>()
                * scale;
            self.cursor += 1;
            if self.cursor >= len {
                self.cursor = 0;
            }
        }

        self.panner
            .process(&self.mono, &mut self.left, &mut self.right);

        let gain = self.gain;
        for (bus, panned) in [(0, &self.left), (1, &self.right)] {
            for (out, s) in send.samples[bus][..block_len].iter_mut().zip(panned.iter()) {
                *out += s;
            }
            for (out, s) in dry.samples[bus][..block_len].iter_mut().zip(panned.iter()) {
                *out += s * gain;
            }
        }

        let left_level = rms(&self.left[active.clone()]);
        let right_level = rms(&self.right[active]);
        self.level = ((left_level * left_level + right_level * right_level) * 0.5).sqrt() * gain.abs();
    }
}

// ============================================================================
// Tests
// ============================================================================
