//! PCM sample formats and byte-level sample conversion.
//!
//! Raw PCM handled by this crate is always interleaved. 8-bit samples are unsigned
//! with a 128 offset (the WAV convention); 16- and 32-bit samples are signed
//! little-endian.

use std::fmt;

use crate::error::ConfigError;

pub const DEFAULT_CHANNELS: u16 = 2;
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;
pub const DEFAULT_BITS: SampleBits = SampleBits::S16;
/// Highest accepted sample rate.
pub const MAX_SAMPLE_RATE: u32 = 384_000;

/// Sample width of a PCM stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SampleBits {
    U8,
    S16,
    S32,
}

impl SampleBits {
    /// Map a bits-per-sample value onto a supported sample width.
    pub fn from_bits(bits: u16) -> Result<Self, ConfigError> {
        match bits {
            8 => Ok(Self::U8),
            16 => Ok(Self::S16),
            32 => Ok(Self::S32),
            other => Err(ConfigError::UnsupportedBits(other)),
        }
    }

    pub fn bits(self) -> u16 {
        match self {
            Self::U8 => 8,
            Self::S16 => 16,
            Self::S32 => 32,
        }
    }

    pub fn bytes(self) -> usize {
        usize::from(self.bits() / 8)
    }
}

/// Channel count, rate and sample width of one stream endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PcmFormat {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits: SampleBits,
}

impl PcmFormat {
    /// Build a validated format.
    ///
    /// Only mono and stereo are accepted, and the rate must lie in `1..=MAX_SAMPLE_RATE`.
    pub fn new(channels: u16, sample_rate: u32, bits: u16) -> Result<Self, ConfigError> {
        if channels != 1 && channels != 2 {
            return Err(ConfigError::UnsupportedChannels(channels));
        }
        if sample_rate == 0 || sample_rate > MAX_SAMPLE_RATE {
            return Err(ConfigError::UnsupportedRate(sample_rate));
        }
        Ok(Self {
            channels,
            sample_rate,
            bits: SampleBits::from_bits(bits)?,
        })
    }

    /// Bytes per interleaved frame (`channels × bytes per sample`).
    pub fn frame_size(&self) -> usize {
        usize::from(self.channels) * self.bits.bytes()
    }

    pub fn bytes_for_frames(&self, frames: usize) -> usize {
        frames.saturating_mul(self.frame_size())
    }
}

impl Default for PcmFormat {
    fn default() -> Self {
        Self {
            channels: DEFAULT_CHANNELS,
            sample_rate: DEFAULT_SAMPLE_RATE,
            bits: DEFAULT_BITS,
        }
    }
}

impl fmt::Display for PcmFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}ch @ {} Hz, {}-bit",
            self.channels,
            self.sample_rate,
            self.bits.bits()
        )
    }
}

/// Decode raw PCM bytes into normalized `f32` samples, appending to `out`.
///
/// A trailing partial sample is ignored.
pub fn decode_samples(bits: SampleBits, bytes: &[u8], out: &mut Vec<f32>) {
    match bits {
        SampleBits::U8 => {
            out.extend(bytes.iter().map(|&b| <f32 as cpal::Sample>::from_sample(b)));
        }
        SampleBits::S16 => {
            out.extend(bytes.chunks_exact(2).map(|b| {
                <f32 as cpal::Sample>::from_sample(i16::from_le_bytes([b[0], b[1]]))
            }));
        }
        SampleBits::S32 => {
            out.extend(bytes.chunks_exact(4).map(|b| {
                <f32 as cpal::Sample>::from_sample(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            }));
        }
    }
}

/// Encode normalized `f32` samples as raw PCM bytes, appending to `out`.
pub fn encode_samples(bits: SampleBits, samples: &[f32], out: &mut Vec<u8>) {
    out.reserve(samples.len() * bits.bytes());
    match bits {
        SampleBits::U8 => {
            out.extend(samples.iter().map(|&s| <u8 as cpal::Sample>::from_sample(s)));
        }
        SampleBits::S16 => {
            for &s in samples {
                out.extend_from_slice(&<i16 as cpal::Sample>::from_sample(s).to_le_bytes());
            }
        }
        SampleBits::S32 => {
            for &s in samples {
                out.extend_from_slice(&<i32 as cpal::Sample>::from_sample(s).to_le_bytes());
            }
        }
    }
}
