//! Audio decoding for Sonoscape
//!
//! Decodes source content into planar float buffers. WAV is the supported
//! container (via `hound`); integer samples are normalised to [-1, 1).
//! Also hosts the tone generator backing `AudioHandle::Tone`.

use std::io::{Cursor, Read};
use std::path::Path;

use hound::{SampleFormat, WavReader};

use crate::engine::buffer::{AudioBuffer, ChannelLayout, MAX_RENDER_FRAMES};
use crate::error::{Result, SonoscapeError};

/// Read a file fully into memory
///
/// # Errors
/// * `FileNotFound` - If the file does not exist or cannot be opened
pub fn read_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| SonoscapeError::FileNotFound {
        path: path.display().to_string(),
        source: Some(e),
    })
}

/// Decode WAV bytes into an AudioBuffer at the file's own sample rate
///
/// # Errors
/// * `InvalidAudio` - If the bytes are not a readable WAV stream
/// * `UnsupportedFormat` - If the sample format is not handled
pub fn decode_wav_bytes(bytes: &[u8]) -> Result<AudioBuffer> {
    let reader = WavReader::new(Cursor::new(bytes)).map_err(|e| SonoscapeError::InvalidAudio {
        reason: format!("Failed to open WAV stream: {}", e),
        source: Some(Box::new(e)),
    })?;

    let spec = reader.spec();
    let channels = spec.channels as usize;
    if channels == 0 {
        return Err(SonoscapeError::UnsupportedFormat {
            format: "0-channel audio".to_string(),
        });
    }

    let interleaved = read_samples_as_f32(reader, spec.bits_per_sample, spec.sample_format)?;
    AudioBuffer::from_interleaved(&interleaved, channels, spec.sample_rate)
}

/// Import a WAV file from disk
pub fn import_audio(path: &Path) -> Result<AudioBuffer> {
    let bytes = read_file(path)?;
    decode_wav_bytes(&bytes)
}

/// Generate a mono sine tone
///
/// # Arguments
/// * `frequency` - Frequency of the sine wave in Hz
/// * `duration_secs` - Duration of the tone in seconds
/// * `sample_rate` - Sample rate of the generated buffer
///
/// # Errors
/// * `InvalidParameter` - If the frequency or duration is not finite and
///   positive, or the tone would exceed `MAX_RENDER_FRAMES`
pub fn generate_test_tone(frequency: f32, duration_secs: f32, sample_rate: u32) -> Result<AudioBuffer> {
    if !(frequency.is_finite() && frequency > 0.0) {
        return Err(SonoscapeError::invalid_parameter("frequency_hz", frequency, "a finite value > 0"));
    }
    if !(duration_secs.is_finite() && duration_secs > 0.0) {
        return Err(SonoscapeError::invalid_parameter(
            "duration_secs",
            duration_secs,
            "a finite value > 0",
        ));
    }
    let frames = f64::from(duration_secs) * f64::from(sample_rate);
    if frames > MAX_RENDER_FRAMES as f64 {
        return Err(SonoscapeError::invalid_parameter(
            "duration_secs",
            duration_secs,
            format!("at most {} frames at {} Hz", MAX_RENDER_FRAMES, sample_rate),
        ));
    }

    let mut buffer = AudioBuffer::with_rate(frames as usize, ChannelLayout::Mono, sample_rate);
    let angular_freq = 2.0 * std::f64::consts::PI * f64::from(frequency) / f64::from(sample_rate);
    for (i, sample) in buffer.samples[0].iter_mut().enumerate() {
        *sample = (angular_freq * i as f64).sin() as f32;
    }

    Ok(buffer)
}

/// Read samples from WAV reader and convert to f32
fn read_samples_as_f32<R: Read>(
    mut reader: WavReader<R>,
    bits_per_sample: u16,
    sample_format: SampleFormat,
) -> Result<Vec<f32>> {
    fn invalid(bits: &str, e: hound::Error) -> SonoscapeError {
        SonoscapeError::InvalidAudio {
            reason: format!("Failed to read {} samples: {}", bits, e),
            source: Some(Box::new(e)),
        }
    }

    match sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(|e| invalid("float", e)),
        SampleFormat::Int => match bits_per_sample {
            8 => reader
                .samples::<i8>()
                .map(|s| s.map(|v| v as f32 / 128.0))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(|e| invalid("8-bit", e)),
            16 => reader
                .samples::<i16>()
                .map(|s| s.map(|v| v as f32 / 32768.0))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(|e| invalid("16-bit", e)),
            24 => reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / 8_388_608.0))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(|e| invalid("24-bit", e)),
            32 => reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / 2_147_483_648.0))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(|e| invalid("32-bit int", e)),
            _ => Err(SonoscapeError::UnsupportedFormat {
                format: format!("{}-bit integer audio", bits_per_sample),
            }),
        },
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::wav::{encode_wav, BitDepth};
    use approx::assert_abs_diff_eq;
    use tempfile::tempdir;

    #[test]
    fn test_generate_test_tone() {
        let buffer = generate_test_tone(441.0, 1.0, 44100).unwrap();
        assert_eq!(buffer.num_samples(), 44100);
        assert_eq!(buffer.num_channels(), 1);
        assert_eq!(buffer.sample_rate, 44100);
        // 100 samples per cycle: quarter cycle peaks at 1.0
        assert_abs_diff_eq!(buffer.samples[0][25], 1.0, epsilon = 1e-4);
    }

    #[test]
    fn test_tone_rejects_bad_parameters() {
        for (frequency, duration) in [(f32::NAN, 1.0), (0.0, 1.0), (440.0, f32::INFINITY), (440.0, -1.0)] {
            let err = generate_test_tone(frequency, duration, 44100).unwrap_err();
            assert_eq!(err.error_code(), "INVALID_PARAMETER");
        }
        // Refused before allocating
        assert!(generate_test_tone(440.0, 1.0e9, 44100).is_err());
    }

    #[test]
    fn test_decode_encoded_float_wav() {
        let tone = generate_test_tone(1000.0, 0.1, 48000).unwrap();
        let bytes = encode_wav(&tone, BitDepth::Float32).unwrap();
        let decoded = decode_wav_bytes(&bytes).unwrap();
        assert_eq!(decoded, tone);
    }

    #[test]
    fn test_decode_16bit_within_quantization() {
        let tone = generate_test_tone(220.0, 0.05, 44100).unwrap();
        let bytes = encode_wav(&tone, BitDepth::Int16).unwrap();
        let decoded = decode_wav_bytes(&bytes).unwrap();
        assert_eq!(decoded.num_samples(), tone.num_samples());
        for (a, b) in tone.samples[0].iter().zip(&decoded.samples[0]) {
            assert!((a - b).abs() < 1e-4);
        }
    }

    #[test]
    fn test_decode_garbage_is_invalid_audio() {
        let err = decode_wav_bytes(b"definitely not a wav file").unwrap_err();
        assert_eq!(err.error_code(), "INVALID_AUDIO");
    }

    #[test]
    fn test_import_from_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let tone = generate_test_tone(440.0, 0.2, 44100).unwrap();
        std::fs::write(&path, encode_wav(&tone, BitDepth::Int24).unwrap()).unwrap();

        let imported = import_audio(&path).unwrap();
        assert_eq!(imported.num_samples(), tone.num_samples());
        assert_eq!(imported.sample_rate, 44100);
    }

    #[test]
    fn test_import_nonexistent_file() {
        match import_audio(Path::new("/nonexistent/path/audio.wav")).unwrap_err() {
            SonoscapeError::FileNotFound { path, .. } => assert!(path.contains("nonexistent")),
            other => panic!("Expected FileNotFound error, got: {:?}", other),
        }
    }
}
