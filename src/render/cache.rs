//! Decoded-audio cache
//!
//! Decoding is the only I/O-bound step of a render. Each distinct piece of
//! content is decoded once and shared between every source that uses it.
//! Entries are keyed by a SHA-256 digest of the content itself, so two
//! handles pointing at identical bytes share one buffer.

use std::collections::HashMap;
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::engine::buffer::AudioBuffer;
use crate::engine::io::{decode_wav_bytes, generate_test_tone, read_file};
use crate::error::{Result, SonoscapeError};
use crate::scene::AudioHandle;

/// Content-addressed store of decoded buffers at one sample rate
#[derive(Debug)]
pub struct DecodeCache {
    sample_rate: u32,
    entries: HashMap<String, Arc<AudioBuffer>>,
    hits: usize,
}

fn hex_digest(hasher: Sha256) -> String {
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// Content key for encoded bytes
pub fn bytes_key(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"bytes:");
    hasher.update(bytes);
    hex_digest(hasher)
}

fn tone_key(frequency_hz: f32, duration_secs: f32) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"tone:");
    hasher.update(frequency_hz.to_le_bytes());
    hasher.update(duration_secs.to_le_bytes());
    hex_digest(hasher)
}

fn buffer_key(buffer: &AudioBuffer) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"pcm:");
    hasher.update(buffer.sample_rate.to_le_bytes());
    hasher.update((buffer.num_channels() as u64).to_le_bytes());
    for channel in &buffer.samples {
        for sample in channel {
            hasher.update(sample.to_le_bytes());
        }
    }
    hex_digest(hasher)
}

impl DecodeCache {
    /// Create a cache that resamples everything to `sample_rate`
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            entries: HashMap::new(),
            hits: 0,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of distinct decoded buffers
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Loads served without decoding
    pub fn hits(&self) -> usize {
        self.hits
    }

    /// Decode `handle` (or fetch it) at the cache's sample rate
    ///
    /// # Errors
    /// * `FileNotFound` - If a file handle cannot be read
    /// * `InvalidAudio` / `UnsupportedFormat` - If the content does not decode
    /// * `InvalidAudio` - If the content decodes to zero frames
    pub fn load(&mut self, handle: &AudioHandle) -> Result<Arc<AudioBuffer>> {
        match handle {
            AudioHandle::File { path } => {
                let bytes = read_file(path)?;
                let key = bytes_key(&bytes);
                self.get_or_decode(key, || decode_wav_bytes(&bytes))
            }
            AudioHandle::Bytes(bytes) => {
                let key = bytes_key(bytes);
                self.get_or_decode(key, || decode_wav_bytes(bytes))
            }
            AudioHandle::Tone {
                frequency_hz,
                duration_secs,
            } => {
                let key = tone_key(*frequency_hz, *duration_secs);
                let rate = self.sample_rate;
                self.get_or_decode(key, || generate_test_tone(*frequency_hz, *duration_secs, rate))
            }
            AudioHandle::Buffer(buffer) => {
                let key = buffer_key(buffer);
                self.get_or_decode(key, || Ok(AudioBuffer::clone(buffer)))
            }
        }
    }

    fn get_or_decode<F>(&mut self, key: String, decode: F) -> Result<Arc<AudioBuffer>>
    where
        F: FnOnce() -> Result<AudioBuffer>,
    {
        if let Some(buffer) = self.entries.get(&key) {
            self.hits += 1;
            return Ok(Arc::clone(buffer));
        }

        let decoded = decode()?;
        if decoded.is_empty() || decoded.num_channels() == 0 {
            return Err(SonoscapeError::InvalidAudio {
                reason: "audio contains no samples".to_string(),
                source: None,
            });
        }
        if !decoded.is_rectangular() {
            return Err(SonoscapeError::InvalidAudio {
                reason: "channels have different lengths".to_string(),
                source: None,
            });
        }

        let source_rate = decoded.sample_rate;
        let buffer = Arc::new(decoded.resampled(self.sample_rate));
        debug!(
            key = &key[..12],
            frames = buffer.num_samples(),
            source_rate,
            target_rate = self.sample_rate,
            "decoded audio"
        );
        self.entries.insert(key, Arc::clone(&buffer));
        Ok(buffer)
    }
}

// ============================================================================
// Tests
// ============================================================================
