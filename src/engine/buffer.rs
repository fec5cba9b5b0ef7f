//! Planar audio buffers
//!
//! One buffer type is shared by decoding, the live graph, the offline
//! renderer and the WAV encoder. Buffers carry their own sample rate; the
//! engine runs at whatever rate the caller renders at.

use crate::error::{Result, SonoscapeError};

/// Sample rates accepted for export
pub const SUPPORTED_SAMPLE_RATES: [u32; 4] = [44100, 48000, 88200, 96000];

/// Longest buffer the engine allocates, in frames (just under the 32-bit WAV limit)
pub const MAX_RENDER_FRAMES: usize = 500_000_000;

/// Linear RMS of a slice. Empty slices read as silence.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let energy: f64 = samples.iter().map(|&s| f64::from(s).powi(2)).sum();
    (energy / samples.len() as f64).sqrt() as f32
}

/// Channel count of a freshly allocated buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelLayout {
    Mono,
    #[default]
    Stereo,
}

impl ChannelLayout {
    pub fn num_channels(self) -> usize {
        match self {
            ChannelLayout::Mono => 1,
            ChannelLayout::Stereo => 2,
        }
    }
}

/// Planar `f32` audio: `samples[channel][frame]`
///
/// # Example
/// ```
/// use sonoscape::engine::{AudioBuffer, ChannelLayout};
///
/// let block = AudioBuffer::with_rate(128, ChannelLayout::Stereo, 48000);
/// assert_eq!(block.num_channels(), 2);
/// assert_eq!(block.num_samples(), 128);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub samples: Vec<Vec<f32>>,
    pub sample_rate: u32,
}

impl AudioBuffer {
    /// Silent buffer of `frames` frames
    pub fn with_rate(frames: usize, layout: ChannelLayout, sample_rate: u32) -> Self {
        Self {
            samples: vec![vec![0.0; frames]; layout.num_channels()],
            sample_rate,
        }
    }

    /// Wrap planar channel data; every channel must have the same length
    pub fn from_channels(samples: Vec<Vec<f32>>, sample_rate: u32) -> Result<Self> {
        let Some(first) = samples.first() else {
            return Err(SonoscapeError::invalid_parameter("channels", 0, "at least one channel"));
        };
        let frames = first.len();
        if let Some((index, ragged)) = samples.iter().enumerate().find(|(_, ch)| ch.len() != frames) {
            return Err(SonoscapeError::invalid_parameter(
                "channels",
                format!("channel {} has {} frames", index, ragged.len()),
                format!("{} frames in every channel", frames),
            ));
        }
        Ok(Self { samples, sample_rate })
    }

    /// Split interleaved frames (`L R L R ...`) into planar channels
    pub fn from_interleaved(interleaved: &[f32], channels: usize, sample_rate: u32) -> Result<Self> {
        if channels == 0 || interleaved.len() % channels != 0 {
            return Err(SonoscapeError::invalid_parameter(
                "interleaved",
                format!("{} samples over {} channels", interleaved.len(), channels),
                "whole frames of at least one channel",
            ));
        }
        let samples = (0..channels)
            .map(|ch| interleaved.iter().skip(ch).step_by(channels).copied().collect())
            .collect();
        Ok(Self { samples, sample_rate })
    }

    /// Frames interleaved channel by channel
    pub fn to_interleaved(&self) -> Vec<f32> {
        (0..self.num_samples())
            .flat_map(|frame| self.samples.iter().map(move |ch| ch[frame]))
            .collect()
    }

    pub fn num_channels(&self) -> usize {
        self.samples.len()
    }

    /// Frames per channel
    pub fn num_samples(&self) -> usize {
        self.samples.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.num_samples() == 0
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.num_samples() as f64 / f64::from(self.sample_rate)
        }
    }

    pub fn channel(&self, index: usize) -> &[f32] {
        &self.samples[index]
    }

    pub fn channel_mut(&mut self, index: usize) -> &mut [f32] {
        &mut self.samples[index]
    }

    pub fn is_rectangular(&self) -> bool {
        let frames = self.num_samples();
        self.samples.iter().all(|ch| ch.len() == frames)
    }

    /// No NaN or infinite samples
    pub fn is_finite(&self) -> bool {
        self.samples.iter().flatten().all(|s| s.is_finite())
    }

    /// Largest absolute sample value
    pub fn peak(&self) -> f32 {
        self.samples.iter().flatten().fold(0.0, |acc, s| acc.max(s.abs()))
    }

    /// Zero every sample in place
    pub fn clear(&mut self) {
        self.samples.iter_mut().for_each(|ch| ch.fill(0.0));
    }

    /// Copy converted to `target_rate` by linear interpolation
    pub fn resampled(&self, target_rate: u32) -> AudioBuffer {
        if target_rate == self.sample_rate || self.sample_rate == 0 {
            return self.clone();
        }
        let ratio = f64::from(target_rate) / f64::from(self.sample_rate);
        AudioBuffer {
            samples: self.samples.iter().map(|ch| resample_linear(ch, ratio)).collect(),
            sample_rate: target_rate,
        }
    }
}

/// Stretch `samples` by `ratio` (output / input rate)
///
/// Aliases when downsampling; decoded assets are expected to sit near the
/// render rate.
pub fn resample_linear(samples: &[f32], ratio: f64) -> Vec<f32> {
    if samples.is_empty() || !(ratio > 0.0) {
        return Vec::new();
    }
    let out_len = (samples.len() as f64 * ratio).ceil() as usize;
    let last = samples.len() - 1;
    (0..out_len)
        .map(|i| {
            let pos = i as f64 / ratio;
            let index = pos.floor() as usize;
            if index >= last {
                return samples[last];
            }
            let frac = (pos - index as f64) as f32;
            samples[index] + (samples[index + 1] - samples[index]) * frac
        })
        .collect()
}
