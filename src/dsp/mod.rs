//! DSP Library
//!
//! Spatialisation and reverb building blocks shared by the live graph and
//! the offline renderer.

pub mod convolver;
pub mod impulse;
pub mod panner;
pub mod reverb;
pub mod voice;

pub use convolver::{PartitionedConvolver, StreamingConvolver};
pub use impulse::{generate_impulse_response, normalization_scale, ImpulseResponseConfig};
pub use panner::{azimuth_elevation, PannerConfig, PanningModel, SpatialPanner};
pub use reverb::{convolve_offline, ConvolutionReverb, ReverbImpulse};
pub use voice::Voice;
