//! Live Playback
//!
//! Real-time preview: the per-source voice graph and the session that
//! drives it from the transport clock.

pub mod graph;
pub mod session;

pub use graph::{LiveGraph, VoiceEvent};
pub use session::{PreviewSession, TickReport};
