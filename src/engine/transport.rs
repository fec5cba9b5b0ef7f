//! Timeline Transport
//!
//! The single shared clock for live playback. Two states, `Stopped` and
//! `Playing`; while playing, each host tick advances the playhead by the
//! elapsed wall-clock time, capped so a stalled host cannot skip past the
//! end-of-timeline stop.

use std::fmt;
use std::time::Instant;

use tracing::debug;

/// Largest single advance accepted from a tick, in seconds
pub const TICK_CAP_SECS: f64 = 0.1;

/// Transport states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    /// Not advancing (default state)
    #[default]
    Stopped,
    /// Advancing with wall-clock time
    Playing,
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportState::Stopped => write!(f, "Stopped"),
            TransportState::Playing => write!(f, "Playing"),
        }
    }
}

/// Outcome of a tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransportEvent {
    /// Transport is stopped; nothing moved
    Idle,
    /// Playhead moved from `from` to `to`
    Advanced { from: f64, to: f64 },
    /// End of timeline reached; playhead reset to 0 and transport stopped
    Finished,
}

/// Playhead clock with play/pause/stop/seek
#[derive(Debug, Clone)]
pub struct Transport {
    state: TransportState,

    /// Current playhead position in seconds
    current_time: f64,

    /// Per-tick advance cap in seconds
    tick_cap: f64,

    /// Wall-clock reference of the previous tick
    last_tick: Option<Instant>,
}

impl Default for Transport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport {
    pub fn new() -> Self {
        Self::with_tick_cap(TICK_CAP_SECS)
    }

    /// Create a transport with a custom tick cap
    ///
    /// # Arguments
    /// * `tick_cap` - Largest advance per tick in seconds (non-positive or
    ///   non-finite values fall back to [`TICK_CAP_SECS`])
    pub fn with_tick_cap(tick_cap: f64) -> Self {
        let tick_cap = if tick_cap.is_finite() && tick_cap > 0.0 {
            tick_cap
        } else {
            TICK_CAP_SECS
        };
        Self {
            state: TransportState::Stopped,
            current_time: 0.0,
            tick_cap,
            last_tick: None,
        }
    }

    // ========================================================================
    // Transport Controls
    // ========================================================================

    /// Start playing from the current position
    ///
    /// State transition: Stopped -> Playing. Captures `now` as the wall-clock
    /// reference for the next tick; the playhead is not reset.
    pub fn play(&mut self, now: Instant) {
        match self.state {
            TransportState::Stopped => {
                self.state = TransportState::Playing;
                self.last_tick = Some(now);
                debug!(time = self.current_time, "transport play");
            }
            TransportState::Playing => {
                debug!("transport already playing");
            }
        }
    }

    /// Stop advancing, keeping the playhead where it is
    pub fn pause(&mut self) {
        if self.state == TransportState::Playing {
            debug!(time = self.current_time, "transport paused");
        }
        self.state = TransportState::Stopped;
        self.last_tick = None;
    }

    /// Stop and reset the playhead to 0
    pub fn stop(&mut self) {
        self.state = TransportState::Stopped;
        self.current_time = 0.0;
        self.last_tick = None;
        debug!("transport stopped, playhead reset");
    }

    /// Jump to `time` seconds (clamped to >= 0); allowed in either state
    pub fn seek(&mut self, time: f64) {
        self.current_time = if time.is_finite() { time.max(0.0) } else { 0.0 };
        debug!(time = self.current_time, "transport seek");
    }

    /// Advance by the wall-clock time elapsed since the previous tick
    ///
    /// # Arguments
    /// * `now` - Current wall-clock instant from the host loop
    /// * `total_duration` - Scene length; reaching it stops the transport
    pub fn tick(&mut self, now: Instant, total_duration: f64) -> TransportEvent {
        if self.state != TransportState::Playing {
            return TransportEvent::Idle;
        }
        let delta = match self.last_tick {
            Some(previous) => now.saturating_duration_since(previous).as_secs_f64(),
            None => 0.0,
        };
        self.last_tick = Some(now);
        self.advance(delta, total_duration)
    }

    /// Advance by an explicit delta in seconds (clamped to `[0, tick_cap]`)
    pub fn advance(&mut self, delta_secs: f64, total_duration: f64) -> TransportEvent {
        if self.state != TransportState::Playing {
            return TransportEvent::Idle;
        }

        let delta = if delta_secs.is_finite() {
            delta_secs.clamp(0.0, self.tick_cap)
        } else {
            0.0
        };
        let from = self.current_time;
        let next = from + delta;

        if next >= total_duration {
            self.stop();
            debug!(total_duration, "timeline finished");
            return TransportEvent::Finished;
        }

        self.current_time = next;
        TransportEvent::Advanced { from, to: next }
    }

    // ========================================================================
    // State Queries
    // ========================================================================

    pub fn is_playing(&self) -> bool {
        self.state == TransportState::Playing
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    /// Current playhead position in seconds
    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn tick_cap(&self) -> f64 {
        self.tick_cap
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
