//! Spatial panner
//!
//! Places a mono signal around a listener fixed at the origin, facing -Z
//! with +Y up. Gain follows the inverse distance law; direction comes from
//! the listener-relative azimuth.
//!
//! Two panning models:
//! - `EqualPower`: constant-power left/right gains from azimuth
//! - `Hrtf`: equal-power gains plus interaural time difference (Woodworth
//!   spherical-head model) and a head-shadow low-pass on the far ear
//!
//! Gains and delays ramp across each processed block so per-block position
//! updates do not zipper.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SonoscapeError};
use crate::scene::Vec3;

/// Radius of the modelled head in metres
const HEAD_RADIUS_M: f64 = 0.0875;

/// Speed of sound in m/s
const SPEED_OF_SOUND: f64 = 343.0;

/// Far-ear low-pass cutoff for a fully lateral source
const SHADOW_MIN_CUTOFF_HZ: f64 = 3000.0;

/// Far-ear low-pass cutoff for a centred source
const SHADOW_MAX_CUTOFF_HZ: f64 = 20000.0;

const LISTENER_FRONT: Vec3 = Vec3::new(0.0, 0.0, -1.0);
const LISTENER_UP: Vec3 = Vec3::new(0.0, 1.0, 0.0);

/// Panning algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PanningModel {
    EqualPower,
    #[default]
    Hrtf,
}

fn default_ref_distance() -> f64 {
    2.0
}

fn default_max_distance() -> f64 {
    50.0
}

fn default_rolloff() -> f64 {
    1.0
}

/// Panner parameters shared by the live graph and the offline renderer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PannerConfig {
    #[serde(default)]
    pub model: PanningModel,
    /// Distance at which the source plays at unity gain
    #[serde(default = "default_ref_distance")]
    pub ref_distance: f64,
    /// Distance beyond which attenuation stops increasing
    #[serde(default = "default_max_distance")]
    pub max_distance: f64,
    #[serde(default = "default_rolloff")]
    pub rolloff_factor: f64,
}

impl Default for PannerConfig {
    fn default() -> Self {
        Self {
            model: PanningModel::Hrtf,
            ref_distance: default_ref_distance(),
            max_distance: default_max_distance(),
            rolloff_factor: default_rolloff(),
        }
    }
}

impl PannerConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.ref_distance.is_finite() && self.ref_distance > 0.0) {
            return Err(SonoscapeError::invalid_parameter(
                "ref_distance",
                self.ref_distance,
                "> 0",
            ));
        }
        if !(self.max_distance.is_finite() && self.max_distance >= self.ref_distance) {
            return Err(SonoscapeError::invalid_parameter(
                "max_distance",
                self.max_distance,
                format!(">= ref_distance ({})", self.ref_distance),
            ));
        }
        if !(self.rolloff_factor.is_finite() && self.rolloff_factor >= 0.0) {
            return Err(SonoscapeError::invalid_parameter(
                "rolloff_factor",
                self.rolloff_factor,
                ">= 0",
            ));
        }
        Ok(())
    }

    /// Inverse-model distance gain; distance is clamped to `[ref, max]`
    pub fn distance_gain(&self, distance: f64) -> f64 {
        let d = distance.clamp(self.ref_distance, self.max_distance);
        self.ref_distance / (self.ref_distance + self.rolloff_factor * (d - self.ref_distance))
    }
}

/// Listener-relative azimuth and elevation in degrees
///
/// Azimuth is 0 straight ahead, +90 hard right, -90 hard left, ±180 behind.
pub fn azimuth_elevation(position: Vec3) -> (f64, f64) {
    let direction = position.normalized();
    if direction == Vec3::ZERO {
        return (0.0, 0.0);
    }

    let right = LISTENER_FRONT.cross(LISTENER_UP).normalized();
    let up_component = direction.dot(LISTENER_UP);
    let projected = (direction - LISTENER_UP * up_component).normalized();

    let mut azimuth = projected.dot(right).clamp(-1.0, 1.0).acos().to_degrees();
    if projected.dot(LISTENER_FRONT) < 0.0 {
        azimuth = 360.0 - azimuth;
    }
    azimuth = if (0.0..=270.0).contains(&azimuth) {
        90.0 - azimuth
    } else {
        450.0 - azimuth
    };

    let elevation = 90.0 - up_component.clamp(-1.0, 1.0).acos().to_degrees();
    (azimuth, elevation.clamp(-90.0, 90.0))
}

/// Equal-power (left, right) gains for a mono source at `azimuth` degrees
///
/// Rear azimuths fold onto the front hemisphere.
pub fn equal_power_gains(azimuth: f64) -> (f64, f64) {
    let mut az = azimuth.clamp(-180.0, 180.0);
    if az < -90.0 {
        az = -180.0 - az;
    } else if az > 90.0 {
        az = 180.0 - az;
    }
    let x = (az + 90.0) / 180.0;
    ((x * PI / 2.0).cos(), (x * PI / 2.0).sin())
}

/// Interaural time difference in seconds (positive: left ear lags)
pub fn interaural_time_difference(azimuth: f64, elevation: f64) -> f64 {
    let lateral = (azimuth.to_radians().sin() * elevation.to_radians().cos()).asin();
    HEAD_RADIUS_M / SPEED_OF_SOUND * (lateral + lateral.sin())
}

/// Per-ear rendering parameters derived from a position
#[derive(Debug, Clone, Copy, PartialEq, Default)]
struct EarState {
    gain_left: f32,
    gain_right: f32,
    delay_left: f32,
    delay_right: f32,
    shadow_left: f32,
    shadow_right: f32,
}

/// One-pole low-pass coefficient for `cutoff_hz`
fn one_pole_coefficient(cutoff_hz: f64, sample_rate: f64) -> f32 {
    let cutoff = cutoff_hz.min(sample_rate * 0.45);
    (-2.0 * PI * cutoff / sample_rate).exp() as f32
}

/// Mono-in, stereo-out spatial panner
#[derive(Debug, Clone)]
pub struct SpatialPanner {
    config: PannerConfig,
    sample_rate: f64,
    position: Vec3,
    current: EarState,
    target: EarState,
    primed: bool,
    ring: Vec<f32>,
    mask: usize,
    write_pos: usize,
    shadow_state_left: f32,
    shadow_state_right: f32,
}

impl SpatialPanner {
    pub fn new(config: PannerConfig, sample_rate: u32) -> Self {
        let sample_rate = sample_rate.max(1) as f64;
        let max_itd = HEAD_RADIUS_M / SPEED_OF_SOUND * (PI / 2.0 + 1.0);
        let ring_len = ((max_itd * sample_rate).ceil() as usize + 4).next_power_of_two();
        let mut panner = Self {
            config,
            sample_rate,
            position: Vec3::ZERO,
            current: EarState::default(),
            target: EarState::default(),
            primed: false,
            ring: vec![0.0; ring_len],
            mask: ring_len - 1,
            write_pos: 0,
            shadow_state_left: 0.0,
            shadow_state_right: 0.0,
        };
        panner.set_position(crate::scene::DEFAULT_ANCHOR);
        panner
    }

    pub fn config(&self) -> &PannerConfig {
        &self.config
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Move the source; takes effect over the next processed block
    ///
    /// Non-finite positions are ignored and the last finite one is kept.
    pub fn set_position(&mut self, position: Vec3) {
        if !position.is_finite() {
            return;
        }
        self.position = position;
        self.target = self.ear_state(position);
    }

    /// Clear delay lines and filter state; the next block starts at target
    pub fn reset(&mut self) {
        self.ring.fill(0.0);
        self.write_pos = 0;
        self.shadow_state_left = 0.0;
        self.shadow_state_right = 0.0;
        self.primed = false;
    }

    fn ear_state(&self, position: Vec3) -> EarState {
        let (azimuth, elevation) = azimuth_elevation(position);
        let distance_gain = self.config.distance_gain(position.length());
        let (left, right) = equal_power_gains(azimuth);

        let mut state = EarState {
            gain_left: (left * distance_gain) as f32,
            gain_right: (right * distance_gain) as f32,
            ..EarState::default()
        };

        if self.config.model == PanningModel::Hrtf {
            let itd = interaural_time_difference(azimuth, elevation);
            let delay = (itd.abs() * self.sample_rate) as f32;
            let lateral = azimuth.to_radians().sin().abs() * elevation.to_radians().cos();
            let cutoff =
                SHADOW_MAX_CUTOFF_HZ - (SHADOW_MAX_CUTOFF_HZ - SHADOW_MIN_CUTOFF_HZ) * lateral;
            let shadow = one_pole_coefficient(cutoff, self.sample_rate);
            if itd > 0.0 {
                state.delay_left = delay;
                state.shadow_left = shadow;
            } else if itd < 0.0 {
                state.delay_right = delay;
                state.shadow_right = shadow;
            }
        }

        state
    }

    #[inline]
    fn read_delayed(&self, delay: f32) -> f32 {
        let pos = self.write_pos as f32 + self.ring.len() as f32 - delay;
        let index = pos.floor();
        let frac = pos - index;
        let index = index as usize;
        let a = self.ring[index & self.mask];
        let b = self.ring[(index + 1) & self.mask];
        a + (b - a) * frac
    }

    /// Pan `input` into `left`/`right`, overwriting them
    ///
    /// All three slices must have the same length.
    pub fn process(&mut self, input: &[f32], left: &mut [f32], right: &mut [f32]) {
        let len = input.len().min(left.len()).min(right.len());
        if len == 0 {
            return;
        }
        if !self.primed {
            self.current = self.target;
            self.primed = true;
        }

        let from = self.current;
        let to = self.target;
        let step = 1.0 / len as f32;

        for i in 0..len {
            let t = (i + 1) as f32 * step;
            let gain_left = from.gain_left + (to.gain_left - from.gain_left) * t;
            let gain_right = from.gain_right + (to.gain_right - from.gain_right) * t;
            let delay_left = from.delay_left + (to.delay_left - from.delay_left) * t;
            let delay_right = from.delay_right + (to.delay_right - from.delay_right) * t;

            self.ring[self.write_pos] = input[i];
            let mut l = self.read_delayed(delay_left);
            let mut r = self.read_delayed(delay_right);

            // Head shadow on the far ear
            self.shadow_state_left = (1.0 - to.shadow_left) * l + to.shadow_left * self.shadow_state_left;
            self.shadow_state_right =
                (1.0 - to.shadow_right) * r + to.shadow_right * self.shadow_state_right;
            l = self.shadow_state_left;
            r = self.shadow_state_right;

            left[i] = l * gain_left;
            right[i] = r * gain_right;
            self.write_pos = (self.write_pos + 1) & self.mask;
        }

        self.current = to;
    }
}

// ============================================================================
// Tests
// ============================================================================
