//! Sine test-tone generator writing raw signed 16-bit PCM.

use std::f64::consts::PI;
use std::io::{self, Write};

pub const DEFAULT_FREQUENCY_HZ: f64 = 500.0;
pub const DEFAULT_SECONDS: u32 = 60;

/// Peak amplitude as a fraction of full scale.
const AMPLITUDE: f64 = 0.8;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SineSpec {
    pub frequency_hz: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub seconds: u32,
}

impl SineSpec {
    pub fn total_frames(&self) -> u64 {
        u64::from(self.seconds) * u64::from(self.sample_rate)
    }
}

/// Sample `i` of the tone: `round(0.8 × 32767 × sin(2π F i / S))`.
pub fn sine_sample(i: u64, frequency_hz: f64, sample_rate: u32) -> i16 {
    let phase = 2.0 * PI * frequency_hz * i as f64 / f64::from(sample_rate.max(1));
    (AMPLITUDE * f64::from(i16::MAX) * phase.sin()).round() as i16
}

/// Write the whole tone to `writer`, one second per write, every channel carrying the same sample.
///
/// Returns the number of frames written.
pub fn write_sine<W: Write>(writer: &mut W, spec: &SineSpec) -> io::Result<u64> {
    let channels = usize::from(spec.channels.max(1));
    let rate = u64::from(spec.sample_rate);
    let mut block: Vec<u8> = Vec::with_capacity(spec.sample_rate as usize * channels * 2);
    let mut i: u64 = 0;

    for _ in 0..spec.seconds {
        block.clear();
        for _ in 0..rate {
            let bytes = sine_sample(i, spec.frequency_hz, spec.sample_rate).to_le_bytes();
            for _ in 0..channels {
                block.extend_from_slice(&bytes);
            }
            i += 1;
        }
        writer.write_all(&block)?;
    }
    writer.flush()?;

    tracing::info!(
        frames = i,
        frequency_hz = spec.frequency_hz,
        sample_rate = spec.sample_rate,
        channels = spec.channels,
        "sine written"
    );
    Ok(i)
}
