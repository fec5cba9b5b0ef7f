//! Sonoscape - Spatial Audio Timeline Engine
//!
//! Sonoscape places sound sources in 3D space around a fixed listener and
//! schedules them on a shared timeline. Each source can follow an automation
//! (orbit, linear glide, pulse) and feeds a shared convolution reverb.
//!
//! # Architecture
//!
//! - `scene`: sources, trajectories, and the timeline they live on
//! - `dsp`: spatial panner, impulse-response generator, partitioned convolver
//! - `render`: offline bounce of a scene snapshot and WAV export
//! - `playback`: transport-driven live graph for real-time preview
//!
//! Both the offline and live paths share the same per-source voice, so a
//! preview and an export of the same scene sound alike.

pub mod cli;
pub mod config;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod playback;
pub mod render;
pub mod scene;

pub use config::EngineConfig;
pub use error::{Result, SonoscapeError};
pub use render::{export_wav, ExportSettings, OfflineRenderer};
pub use scene::{Scene, Source, SourceId};
