//! Offline Rendering
//!
//! Non-real-time rendering of a scene snapshot to a stereo buffer and on to
//! an encoded WAV file.

pub mod cache;
pub mod curve;
pub mod export;
pub mod offline;
pub mod progress;

pub use cache::DecodeCache;
pub use curve::PositionCurve;
pub use export::{export_wav, spawn_export, ExportArtifact, ExportJob, ExportReport, ExportSettings};
pub use offline::{OfflineRenderer, RenderReport, RenderWarning, RenderedMix};
pub use progress::{CancelToken, NullProgress, ProgressSink, TracingProgress};
