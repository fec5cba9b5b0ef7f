//! Trajectory Evaluator
//!
//! Pure position math shared by live preview and offline export. Both paths
//! call [`evaluate`]; nothing else in the crate computes automated positions,
//! so a preview frame and an exported curve sample at the same relative time
//! are bit-identical.

use std::f64::consts::PI;
use std::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SonoscapeError};

/// A point in scene space (listener at the origin, facing -Z, Y up)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn dot(self, other: Vec3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(self, other: Vec3) -> Vec3 {
        Vec3::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    pub fn length(self) -> f64 {
        self.dot(self).sqrt()
    }

    pub fn distance(self, other: Vec3) -> f64 {
        (self - other).length()
    }

    /// Unit vector in the same direction, or zero for a zero-length vector
    pub fn normalized(self) -> Vec3 {
        let len = self.length();
        if len > 0.0 {
            self * (1.0 / len)
        } else {
            Vec3::ZERO
        }
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl Add for Vec3 {
    type Output = Vec3;

    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Vec3;

    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Vec3;

    fn mul(self, rhs: f64) -> Vec3 {
        Vec3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

// ============================================================================
// Automation variants
// ============================================================================

fn default_radius() -> f64 {
    5.0
}

fn default_speed() -> f64 {
    1.0
}

fn default_frequency() -> f64 {
    1.0
}

fn default_amplitude() -> f64 {
    2.0
}

/// Circular path in the XZ plane at the anchor's height
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrbitParams {
    #[serde(default = "default_radius")]
    pub radius: f64,
    /// Angular speed in radians per second
    #[serde(default = "default_speed")]
    pub speed: f64,
    #[serde(default)]
    pub center_x: f64,
    #[serde(default)]
    pub center_z: f64,
    /// Starting angle in degrees
    #[serde(default)]
    pub initial_angle: f64,
}

impl Default for OrbitParams {
    fn default() -> Self {
        Self {
            radius: default_radius(),
            speed: default_speed(),
            center_x: 0.0,
            center_z: 0.0,
            initial_angle: 0.0,
        }
    }
}

/// Eased translation from the anchor to a target
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LinearParams {
    #[serde(default)]
    pub target_pos: Vec3,
    /// Overrides the clip duration as the travel time when set and positive
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

/// Sinusoidal vertical oscillation around the anchor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PulseParams {
    /// Oscillation rate in Hz
    #[serde(default = "default_frequency")]
    pub frequency: f64,
    #[serde(default = "default_amplitude")]
    pub amplitude: f64,
}

impl Default for PulseParams {
    fn default() -> Self {
        Self {
            frequency: default_frequency(),
            amplitude: default_amplitude(),
        }
    }
}

/// Time-driven position modulation applied on top of a source's anchor
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Automation {
    #[default]
    None,
    Orbit(OrbitParams),
    Linear(LinearParams),
    Pulse(PulseParams),
}

impl Automation {
    /// Variant name as used in scene files
    pub fn kind(&self) -> &'static str {
        match self {
            Automation::None => "none",
            Automation::Orbit(_) => "orbit",
            Automation::Linear(_) => "linear",
            Automation::Pulse(_) => "pulse",
        }
    }

    /// True when the position depends on time
    pub fn is_animated(&self) -> bool {
        !matches!(self, Automation::None)
    }

    /// Reject parameters that would evaluate to non-finite positions
    pub fn validate(&self) -> Result<()> {
        fn finite(param: &str, value: f64) -> Result<()> {
            if value.is_finite() {
                Ok(())
            } else {
                Err(SonoscapeError::invalid_parameter(param, value, "a finite value"))
            }
        }

        match self {
            Automation::None => Ok(()),
            Automation::Orbit(orbit) => {
                finite("orbit.radius", orbit.radius)?;
                if orbit.radius < 0.0 {
                    return Err(SonoscapeError::invalid_parameter("orbit.radius", orbit.radius, ">= 0"));
                }
                finite("orbit.speed", orbit.speed)?;
                finite("orbit.center_x", orbit.center_x)?;
                finite("orbit.center_z", orbit.center_z)?;
                finite("orbit.initial_angle", orbit.initial_angle)
            }
            Automation::Linear(linear) => {
                if !linear.target_pos.is_finite() {
                    return Err(SonoscapeError::invalid_parameter(
                        "linear.target_pos",
                        format!("{:?}", linear.target_pos),
                        "finite coordinates",
                    ));
                }
                match linear.duration {
                    Some(duration) => finite("linear.duration", duration),
                    None => Ok(()),
                }
            }
            Automation::Pulse(pulse) => {
                finite("pulse.frequency", pulse.frequency)?;
                finite("pulse.amplitude", pulse.amplitude)
            }
        }
    }
}

/// Cubic ease-out: fast start, settles onto the target
#[inline]
pub fn ease_out_cubic(progress: f64) -> f64 {
    1.0 - (1.0 - progress).powi(3)
}

/// Evaluate a source's position at `relative_time` seconds into its clip
///
/// Negative relative times evaluate as `t = 0`. `clip_duration` is the travel
/// time for linear automation unless the automation carries its own.
pub fn evaluate(relative_time: f64, anchor: Vec3, automation: &Automation, clip_duration: f64) -> Vec3 {
    let t = if relative_time > 0.0 { relative_time } else { 0.0 };

    match automation {
        Automation::None => anchor,
        Automation::Orbit(orbit) => {
            let angle = t * orbit.speed + orbit.initial_angle.to_radians();
            Vec3::new(
                orbit.center_x + angle.cos() * orbit.radius,
                anchor.y,
                orbit.center_z + angle.sin() * orbit.radius,
            )
        }
        Automation::Linear(linear) => {
            let duration = match linear.duration {
                Some(d) if d > 0.0 => d,
                _ => clip_duration,
            };
            let progress = if duration > 0.0 {
                (t / duration).min(1.0)
            } else {
                1.0
            };
            if progress >= 1.0 {
                return linear.target_pos;
            }
            let eased = ease_out_cubic(progress);
            let target = linear.target_pos;
            Vec3::new(
                anchor.x + (target.x - anchor.x) * eased,
                anchor.y + (target.y - anchor.y) * eased,
                anchor.z + (target.z - anchor.z) * eased,
            )
        }
        Automation::Pulse(pulse) => {
            let offset = (t * pulse.frequency * 2.0 * PI).sin() * pulse.amplitude;
            Vec3::new(anchor.x, anchor.y + offset, anchor.z)
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
