//! Audio Engine Module
//!
//! Core audio plumbing:
//! - Planar audio buffers and level helpers
//! - WAV decoding and tone generation
//! - PCM encoding
//! - Timeline transport

pub mod buffer;
pub mod io;
pub mod transport;
pub mod wav;

pub use buffer::{AudioBuffer, ChannelLayout};
pub use io::{decode_wav_bytes, generate_test_tone, import_audio};
pub use transport::{Transport, TransportEvent, TransportState, TICK_CAP_SECS};
pub use wav::{encode_wav, write_wav, BitDepth};
