//! Synthetic reverb impulse responses
//!
//! Stereo decaying noise: white noise per channel, darkened by a low-pass
//! whose cutoff sweeps exponentially downward, shaped by an exponential
//! amplitude envelope. Generation is seeded so renders are reproducible.

use std::f64::consts::PI;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::engine::buffer::{AudioBuffer, ChannelLayout};
use crate::error::{Result, SonoscapeError};

/// Cutoff the sweep starts from
const SWEEP_START_HZ: f64 = 20000.0;

/// Envelope level reached at the decay time
const DECAY_FLOOR: f64 = 0.001;

/// Fraction of the IR duration over which the cutoff sweeps
const SWEEP_FRACTION: f64 = 0.8;

/// Convolver calibration applied when normalising
const GAIN_CALIBRATION_DB: f64 = -58.0;
const GAIN_CALIBRATION_SAMPLE_RATE: f64 = 44100.0;
const MIN_POWER: f64 = 0.000125;

fn default_duration() -> f64 {
    3.0
}

fn default_decay() -> f64 {
    2.5
}

fn default_brightness() -> f64 {
    0.4
}

fn default_seed() -> u64 {
    0x5EED_0A0D
}

fn default_normalize() -> bool {
    true
}

/// Impulse response parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImpulseResponseConfig {
    /// IR length in seconds
    #[serde(default = "default_duration")]
    pub duration_secs: f64,
    /// Time for the envelope to fall to -60 dB
    #[serde(default = "default_decay")]
    pub decay_secs: f64,
    /// 0..1; sets the final low-pass cutoff (`200 + brightness * 3000` Hz)
    #[serde(default = "default_brightness")]
    pub brightness: f64,
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Apply convolver power normalisation to the reverb bus
    #[serde(default = "default_normalize")]
    pub normalize: bool,
}

impl Default for ImpulseResponseConfig {
    fn default() -> Self {
        Self {
            duration_secs: default_duration(),
            decay_secs: default_decay(),
            brightness: default_brightness(),
            seed: default_seed(),
            normalize: default_normalize(),
        }
    }
}

impl ImpulseResponseConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.duration_secs.is_finite() && self.duration_secs > 0.0) {
            return Err(SonoscapeError::invalid_parameter(
                "duration_secs",
                self.duration_secs,
                "> 0",
            ));
        }
        if !(self.decay_secs.is_finite() && self.decay_secs > 0.0) {
            return Err(SonoscapeError::invalid_parameter(
                "decay_secs",
                self.decay_secs,
                "> 0",
            ));
        }
        if !(0.0..=1.0).contains(&self.brightness) {
            return Err(SonoscapeError::invalid_parameter(
                "brightness",
                self.brightness,
                "0.0 to 1.0",
            ));
        }
        Ok(())
    }

    /// Final cutoff of the low-pass sweep in Hz
    pub fn end_cutoff_hz(&self) -> f64 {
        200.0 + self.brightness * 3000.0
    }
}

/// Generate a stereo impulse response at `sample_rate`
pub fn generate_impulse_response(config: &ImpulseResponseConfig, sample_rate: u32) -> AudioBuffer {
    let sr = sample_rate.max(1) as f64;
    let len = (config.duration_secs.max(0.0) * sr).round() as usize;
    let mut ir = AudioBuffer::with_rate(len, ChannelLayout::Stereo, sample_rate);
    let mut rng = StdRng::seed_from_u64(config.seed);

    let sweep_secs = (config.duration_secs * SWEEP_FRACTION).max(f64::EPSILON);
    let sweep_ratio = config.end_cutoff_hz() / SWEEP_START_HZ;
    let decay_secs = config.decay_secs.max(f64::EPSILON);

    for channel in ir.samples.iter_mut() {
        let mut state = 0.0f64;
        for (i, sample) in channel.iter_mut().enumerate() {
            let t = i as f64 / sr;
            let noise: f64 = rng.gen_range(-1.0..1.0);

            let cutoff = if t < sweep_secs {
                SWEEP_START_HZ * sweep_ratio.powf(t / sweep_secs)
            } else {
                config.end_cutoff_hz()
            };
            let a = (-2.0 * PI * cutoff.min(sr * 0.45) / sr).exp();
            state = (1.0 - a) * noise + a * state;

            let envelope = if t < decay_secs {
                DECAY_FLOOR.powf(t / decay_secs)
            } else {
                DECAY_FLOOR
            };
            *sample = (state * envelope) as f32;
        }
    }

    ir
}

/// Scale a convolver applies to a normalised IR
///
/// `1 / rms_power * 10^(-58/20) * (44100 / sample_rate)`, with the power
/// floored so silent responses stay bounded.
pub fn normalization_scale(ir: &AudioBuffer) -> f32 {
    let channels = ir.num_channels();
    let len = ir.num_samples();
    if channels == 0 || len == 0 {
        return 1.0;
    }

    let sum: f64 = ir
        .samples
        .iter()
        .flat_map(|c| c.iter())
        .map(|&s| (s as f64) * (s as f64))
        .sum();
    let mut power = (sum / (channels * len) as f64).sqrt();
    if !power.is_finite() || power < MIN_POWER {
        power = MIN_POWER;
    }

    let mut scale = 1.0 / power;
    scale *= 10f64.powf(GAIN_CALIBRATION_DB * 0.05);
    if ir.sample_rate > 0 {
        scale *= GAIN_CALIBRATION_SAMPLE_RATE / ir.sample_rate as f64;
    }
    scale as f32
}

// ============================================================================
// Tests
// ============================================================================
