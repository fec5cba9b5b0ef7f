//! Convolution reverb bus
//!
//! Stereo convolution of the shared reverb send against an impulse response.
//! Left send convolves with IR channel 0, right send with channel 1 (a mono
//! IR is used for both sides). The IR is pre-scaled by the convolver
//! normalisation when enabled.

use std::sync::Arc;

use super::convolver::{PartitionedConvolver, StreamingConvolver};
use super::impulse::{generate_impulse_response, normalization_scale, ImpulseResponseConfig};
use crate::engine::buffer::AudioBuffer;
use crate::error::{Result, SonoscapeError};

/// Prepared impulse response shared between reverb instances
#[derive(Debug, Clone)]
pub struct ReverbImpulse {
    left: Arc<[f32]>,
    right: Arc<[f32]>,
    sample_rate: u32,
}

impl ReverbImpulse {
    /// Wrap an existing IR buffer
    ///
    /// # Arguments
    /// * `ir` - Mono or stereo impulse response
    /// * `normalize` - Apply convolver power normalisation
    pub fn from_buffer(ir: &AudioBuffer, normalize: bool) -> Result<Self> {
        if ir.num_channels() == 0 || ir.num_channels() > 2 {
            return Err(SonoscapeError::UnsupportedFormat {
                format: format!("{}-channel impulse response", ir.num_channels()),
            });
        }
        let scale = if normalize { normalization_scale(ir) } else { 1.0 };
        let scaled = |c: usize| -> Arc<[f32]> { ir.channel(c).iter().map(|s| s * scale).collect() };
        let left = scaled(0);
        let right = if ir.num_channels() == 2 { scaled(1) } else { left.clone() };
        Ok(Self {
            left,
            right,
            sample_rate: ir.sample_rate,
        })
    }

    /// Synthesise and prepare an IR for `sample_rate`
    pub fn generate(config: &ImpulseResponseConfig, sample_rate: u32) -> Result<Self> {
        config.validate()?;
        let ir = generate_impulse_response(config, sample_rate);
        Self::from_buffer(&ir, config.normalize)
    }

    pub fn len(&self) -> usize {
        self.left.len()
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

/// Whole-buffer convolution for offline rendering
pub fn convolve_offline(send: &AudioBuffer, impulse: &ReverbImpulse, block: usize) -> Result<AudioBuffer> {
    if send.num_channels() != 2 {
        return Err(SonoscapeError::RenderFailure {
            reason: format!("reverb send must be stereo, got {} channels", send.num_channels()),
        });
    }
    let left = PartitionedConvolver::new(&impulse.left, block)?.convolve(send.channel(0));
    let right = PartitionedConvolver::new(&impulse.right, block)?.convolve(send.channel(1));
    AudioBuffer::from_channels(vec![left, right], send.sample_rate)
}

/// Streaming stereo reverb for the live graph
#[derive(Debug)]
pub struct ConvolutionReverb {
    left: StreamingConvolver,
    right: StreamingConvolver,
}

impl ConvolutionReverb {
    pub fn new(impulse: &ReverbImpulse, block: usize) -> Result<Self> {
        Ok(Self {
            left: StreamingConvolver::new(&impulse.left, block)?,
            right: StreamingConvolver::new(&impulse.right, block)?,
        })
    }

    /// Latency in samples
    pub fn latency(&self) -> usize {
        self.left.latency()
    }

    pub fn reset(&mut self) {
        self.left.reset();
        self.right.reset();
    }

    /// Convolve a stereo send block into `wet` (overwritten)
    pub fn process(&mut self, send: &AudioBuffer, wet: &mut AudioBuffer) {
        if send.num_channels() < 2 || wet.num_channels() < 2 {
            return;
        }
        self.left.process(send.channel(0), wet.channel_mut(0));
        self.right.process(send.channel(1), wet.channel_mut(1));
    }
}

// ============================================================================
// Tests
// ============================================================================
