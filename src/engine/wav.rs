//! PCM Encoder
//!
//! Serializes a rendered float buffer into a canonical 44-byte-header WAV
//! container. Integer PCM (format 1) for 16/24-bit, IEEE float (format 3) for
//! 32-bit. Samples are clipped to [-1, 1] and interleaved frame by frame.
//!
//! The header is written by hand rather than through `hound`, which switches
//! to WAVE_FORMAT_EXTENSIBLE (and a longer header) for 24-bit output.

use std::fmt;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::engine::buffer::AudioBuffer;
use crate::error::{Result, SonoscapeError};

/// Size of the canonical RIFF/WAVE header in bytes
pub const WAV_HEADER_LEN: usize = 44;

const FORMAT_PCM: u16 = 1;
const FORMAT_IEEE_FLOAT: u16 = 3;

/// Output sample format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum BitDepth {
    /// 16-bit signed integer PCM
    #[default]
    Int16,
    /// 24-bit signed integer PCM (3 bytes, little-endian)
    Int24,
    /// 32-bit IEEE-754 float
    Float32,
}

impl BitDepth {
    /// Bits per sample as written in the header
    pub fn bits(self) -> u16 {
        match self {
            BitDepth::Int16 => 16,
            BitDepth::Int24 => 24,
            BitDepth::Float32 => 32,
        }
    }

    /// Bytes per sample
    pub fn bytes_per_sample(self) -> usize {
        self.bits() as usize / 8
    }

    /// WAV `audioFormat` tag
    pub fn format_tag(self) -> u16 {
        match self {
            BitDepth::Float32 => FORMAT_IEEE_FLOAT,
            _ => FORMAT_PCM,
        }
    }

    /// Parse from a bit count (16, 24 or 32)
    pub fn from_bits(bits: u16) -> Result<Self> {
        match bits {
            16 => Ok(BitDepth::Int16),
            24 => Ok(BitDepth::Int24),
            32 => Ok(BitDepth::Float32),
            other => Err(SonoscapeError::invalid_parameter(
                "bit_depth",
                other,
                "16, 24 or 32",
            )),
        }
    }
}

impl TryFrom<u16> for BitDepth {
    type Error = SonoscapeError;

    fn try_from(bits: u16) -> Result<Self> {
        BitDepth::from_bits(bits)
    }
}

impl From<BitDepth> for u16 {
    fn from(depth: BitDepth) -> u16 {
        depth.bits()
    }
}

impl fmt::Display for BitDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BitDepth::Float32 => write!(f, "32-bit float"),
            other => write!(f, "{}-bit", other.bits()),
        }
    }
}

/// Exact encoded size for a buffer shape
pub fn encoded_len(num_frames: usize, num_channels: usize, bit_depth: BitDepth) -> usize {
    WAV_HEADER_LEN + num_frames * num_channels * bit_depth.bytes_per_sample()
}

/// Quantize a sample to 16-bit signed integer
///
/// Negative values scale by 32768, positive by 32767.
#[inline]
pub fn quantize_i16(sample: f32) -> i16 {
    let s = sample.clamp(-1.0, 1.0);
    let scaled = if s < 0.0 { s * 32768.0 } else { s * 32767.0 };
    scaled.round() as i16
}

/// Quantize a sample to a 24-bit signed integer held in an i32
#[inline]
pub fn quantize_i24(sample: f32) -> i32 {
    let s = sample.clamp(-1.0, 1.0) as f64;
    let scaled = if s < 0.0 { s * 8_388_608.0 } else { s * 8_388_607.0 };
    scaled.round() as i32
}

/// Encode a buffer into WAV bytes
///
/// # Errors
/// * `EncodeFailure` - If the buffer has no channels, ragged channels, or a
///   shape whose data chunk would not fit the 32-bit RIFF size fields
pub fn encode_wav(buffer: &AudioBuffer, bit_depth: BitDepth) -> Result<Vec<u8>> {
    let num_channels = buffer.num_channels();
    let num_frames = buffer.num_samples();

    if num_channels == 0 || num_channels > u16::MAX as usize {
        return Err(SonoscapeError::EncodeFailure {
            reason: format!("cannot encode {} channels", num_channels),
        });
    }
    if !buffer.is_rectangular() {
        return Err(SonoscapeError::EncodeFailure {
            reason: "channels have differing lengths".to_string(),
        });
    }
    if buffer.sample_rate == 0 {
        return Err(SonoscapeError::EncodeFailure {
            reason: "sample rate is zero".to_string(),
        });
    }

    let bytes_per_sample = bit_depth.bytes_per_sample();
    let block_align = num_channels * bytes_per_sample;
    let data_len = num_frames
        .checked_mul(block_align)
        .filter(|len| *len <= (u32::MAX as usize) - 36)
        .ok_or_else(|| SonoscapeError::EncodeFailure {
            reason: format!(
                "{} frames x {} channels exceeds the 4 GiB WAV limit",
                num_frames, num_channels
            ),
        })?;

    let mut out = Vec::with_capacity(WAV_HEADER_LEN + data_len);
    write_header(
        &mut out,
        num_channels as u16,
        buffer.sample_rate,
        bit_depth,
        data_len as u32,
    )?;

    for frame in 0..num_frames {
        for channel in &buffer.samples {
            let sample = channel[frame];
            match bit_depth {
                BitDepth::Int16 => out.extend_from_slice(&quantize_i16(sample).to_le_bytes()),
                BitDepth::Int24 => {
                    let bytes = quantize_i24(sample).to_le_bytes();
                    out.extend_from_slice(&bytes[..3]);
                }
                BitDepth::Float32 => {
                    out.extend_from_slice(&sample.clamp(-1.0, 1.0).to_le_bytes())
                }
            }
        }
    }

    let expected = encoded_len(num_frames, num_channels, bit_depth);
    if out.len() != expected {
        return Err(SonoscapeError::EncodeFailure {
            reason: format!("wrote {} bytes, expected {}", out.len(), expected),
        });
    }

    Ok(out)
}

/// Encode a buffer and write it to `path`
pub fn write_wav(buffer: &AudioBuffer, bit_depth: BitDepth, path: &Path) -> Result<()> {
    let bytes = encode_wav(buffer, bit_depth)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

fn write_header<W: Write>(
    out: &mut W,
    channels: u16,
    sample_rate: u32,
    bit_depth: BitDepth,
    data_len: u32,
) -> Result<()> {
    let block_align = channels as u32 * bit_depth.bytes_per_sample() as u32;
    let byte_rate = sample_rate.checked_mul(block_align).ok_or_else(|| {
        SonoscapeError::EncodeFailure {
            reason: format!("byte rate overflows for {} Hz", sample_rate),
        }
    })?;

    out.write_all(b"RIFF")?;
    out.write_all(&(36 + data_len).to_le_bytes())?;
    out.write_all(b"WAVE")?;
    out.write_all(b"fmt ")?;
    out.write_all(&16u32.to_le_bytes())?;
    out.write_all(&bit_depth.format_tag().to_le_bytes())?;
    out.write_all(&channels.to_le_bytes())?;
    out.write_all(&sample_rate.to_le_bytes())?;
    out.write_all(&byte_rate.to_le_bytes())?;
    out.write_all(&(block_align as u16).to_le_bytes())?;
    out.write_all(&bit_depth.bits().to_le_bytes())?;
    out.write_all(b"data")?;
    out.write_all(&data_len.to_le_bytes())?;
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::buffer::ChannelLayout;
    use std::io::Cursor;
    use test_case::test_case;

    fn stereo(left: Vec<f32>, right: Vec<f32>) -> AudioBuffer {
        AudioBuffer::from_channels(vec![left, right], 44100).unwrap()
    }

    fn u16_at(bytes: &[u8], offset: usize) -> u16 {
        u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
    }

    fn u32_at(bytes: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes([
            bytes[offset],
            bytes[offset + 1],
            bytes[offset + 2],
            bytes[offset + 3],
        ])
    }

    #[test_case(BitDepth::Int16, 1, 2 ; "pcm 16")]
    #[test_case(BitDepth::Int24, 1, 3 ; "pcm 24")]
    #[test_case(BitDepth::Float32, 3, 4 ; "float 32")]
    fn test_header_fields(depth: BitDepth, format: u16, bytes_per_sample: u32) {
        let buffer = stereo(vec![0.0; 10], vec![0.0; 10]);
        let bytes = encode_wav(&buffer, depth).unwrap();

        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");
        assert_eq!(&bytes[12..16], b"fmt ");
        assert_eq!(&bytes[36..40], b"data");
        assert_eq!(u32_at(&bytes, 4) as usize, bytes.len() - 8);
        assert_eq!(u16_at(&bytes, 20), format);
        assert_eq!(u16_at(&bytes, 22), 2);
        assert_eq!(u32_at(&bytes, 24), 44100);
        assert_eq!(u32_at(&bytes, 28), 44100 * 2 * bytes_per_sample);
        assert_eq!(u16_at(&bytes, 32) as u32, 2 * bytes_per_sample);
        assert_eq!(u16_at(&bytes, 34), depth.bits());
        assert_eq!(u32_at(&bytes, 40), 10 * 2 * bytes_per_sample);
    }

    #[test_case(BitDepth::Int16 ; "16")]
    #[test_case(BitDepth::Int24 ; "24")]
    #[test_case(BitDepth::Float32 ; "32")]
    fn test_exact_length(depth: BitDepth) {
        let buffer = AudioBuffer::with_rate(1234, ChannelLayout::Stereo, 48000);
        let bytes = encode_wav(&buffer, depth).unwrap();
        assert_eq!(bytes.len(), encoded_len(1234, 2, depth));
        assert_eq!(bytes.len(), 44 + 1234 * 2 * depth.bytes_per_sample());
    }

    #[test]
    fn test_quantize_16_extremes_and_clipping() {
        assert_eq!(quantize_i16(1.0), 32767);
        assert_eq!(quantize_i16(-1.0), -32768);
        assert_eq!(quantize_i16(2.5), 32767);
        assert_eq!(quantize_i16(-7.0), -32768);
        assert_eq!(quantize_i16(0.0), 0);
    }

    #[test]
    fn test_quantize_24_extremes() {
        assert_eq!(quantize_i24(1.0), 8_388_607);
        assert_eq!(quantize_i24(-1.0), -8_388_608);
        assert_eq!(quantize_i24(0.5), 4_194_304);
    }

    #[test]
    fn test_24bit_twos_complement_bytes() {
        let buffer = AudioBuffer::from_channels(vec![vec![-1.0, 1.0]], 44100).unwrap();
        let bytes = encode_wav(&buffer, BitDepth::Int24).unwrap();
        assert_eq!(&bytes[44..47], &[0x00, 0x00, 0x80]);
        assert_eq!(&bytes[47..50], &[0xFF, 0xFF, 0x7F]);
    }

    #[test]
    fn test_interleaving_order() {
        let buffer = stereo(vec![1.0, 0.0], vec![-1.0, 0.5]);
        let bytes = encode_wav(&buffer, BitDepth::Int16).unwrap();
        let samples: Vec<i16> = bytes[44..]
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        assert_eq!(samples, vec![32767, -32768, 0, 16384]);
    }

    #[test]
    fn test_16bit_roundtrip_through_hound() {
        let left: Vec<f32> = (0..500).map(|i| ((i as f32) * 0.05).sin() * 0.9).collect();
        let right: Vec<f32> = left.iter().map(|s| -s).collect();
        let buffer = stereo(left, right);
        let bytes = encode_wav(&buffer, BitDepth::Int16).unwrap();

        let mut reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        let decoded: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        for (original, q) in buffer.to_interleaved().iter().zip(decoded) {
            let back = if q < 0 { q as f32 / 32768.0 } else { q as f32 / 32767.0 };
            assert!((original - back).abs() <= 1.0 / 32768.0);
        }
    }

    #[test]
    fn test_float_roundtrip_is_exact() {
        let buffer = stereo(vec![0.123_456_7, -0.987_654_3, 1.0], vec![0.0, 1e-7, -1.0]);
        let bytes = encode_wav(&buffer, BitDepth::Float32).unwrap();

        let mut reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.spec().sample_format, hound::SampleFormat::Float);
        let decoded: Vec<f32> = reader.samples::<f32>().map(|s| s.unwrap()).collect();
        assert_eq!(decoded, buffer.to_interleaved());
    }

    #[test]
    fn test_24bit_readable_by_hound() {
        let buffer = stereo(vec![0.25, -0.25], vec![0.75, -0.75]);
        let bytes = encode_wav(&buffer, BitDepth::Int24).unwrap();
        let mut reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.spec().bits_per_sample, 24);
        let decoded: Vec<i32> = reader.samples::<i32>().map(|s| s.unwrap()).collect();
        assert_eq!(decoded, vec![2_097_152, 6_291_455, -2_097_152, -6_291_456]);
    }

    #[test]
    fn test_rejects_ragged_buffer() {
        let buffer = AudioBuffer {
            samples: vec![vec![0.0; 4], vec![0.0; 3]],
            sample_rate: 44100,
        };
        let err = encode_wav(&buffer, BitDepth::Int16).unwrap_err();
        assert_eq!(err.error_code(), "ENCODE_FAILURE");
    }

    #[test]
    fn test_bit_depth_parsing() {
        assert_eq!(BitDepth::from_bits(24).unwrap(), BitDepth::Int24);
        assert!(BitDepth::from_bits(8).is_err());
        assert_eq!(BitDepth::Float32.to_string(), "32-bit float");
        assert_eq!(serde_json::to_string(&BitDepth::Int24).unwrap(), "24");
        let parsed: BitDepth = serde_json::from_str("32").unwrap();
        assert_eq!(parsed, BitDepth::Float32);
    }
}
