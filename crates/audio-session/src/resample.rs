//! One-shot file-to-file sample-rate conversion.
//!
//! Reads raw interleaved PCM one second at a time, decodes to `f32`, runs each block
//! through Rubato's asynchronous sinc resampler and re-encodes at the input's own
//! sample width and channel count.

use std::io::{self, Read, Write};

use anyhow::{Context, Result, anyhow};
use audioadapter_buffers::direct::InterleavedSlice;
use rubato::{
    Async, FixedAsync, Indexing, Resampler, SincInterpolationParameters, SincInterpolationType,
    WindowFunction, calculate_cutoff,
};

use crate::format::{PcmFormat, decode_samples, encode_samples};

pub const DEFAULT_QUALITY: u8 = 4;
pub const MAX_QUALITY: u8 = 10;

/// What to convert: the input stream's format and the rate to convert it to.
#[derive(Clone, Copy, Debug)]
pub struct ResampleJob {
    pub input: PcmFormat,
    pub output_rate: u32,
    /// `0..=MAX_QUALITY`; higher is slower and cleaner.
    pub quality: u8,
}

impl ResampleJob {
    pub fn output_format(&self) -> PcmFormat {
        PcmFormat {
            sample_rate: self.output_rate,
            ..self.input
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResampleStats {
    pub blocks: u64,
    pub frames_in: u64,
    pub frames_out: u64,
}

/// Sinc parameters for a quality level.
///
/// Sinc length runs 16..=256 and oversampling 32..=256 across `0..=MAX_QUALITY`.
/// Interpolation is linear below 4, quadratic for 4 to 6, cubic above.
pub fn sinc_params_for_quality(quality: u8) -> SincInterpolationParameters {
    let q = usize::from(quality.min(MAX_QUALITY));
    let max_q = usize::from(MAX_QUALITY);

    let sinc_len = 16 + q * (256 - 16) / max_q;
    let oversampling_factor = 32 + q * (256 - 32) / max_q;
    let interpolation = match q {
        0..=3 => SincInterpolationType::Linear,
        4..=6 => SincInterpolationType::Quadratic,
        _ => SincInterpolationType::Cubic,
    };
    let window = WindowFunction::BlackmanHarris2;

    SincInterpolationParameters {
        sinc_len,
        f_cutoff: calculate_cutoff(sinc_len, window),
        interpolation,
        oversampling_factor,
        window,
    }
}

/// Convert all of `reader` to `job.output_rate`, appending to `writer`.
///
/// A trailing partial frame in the input is ignored.
pub fn resample_stream<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    job: &ResampleJob,
) -> Result<ResampleStats> {
    let input = job.input;
    PcmFormat::new(input.channels, job.output_rate, input.bits.bits())?;

    let channels = usize::from(input.channels);
    let block_frames = (input.sample_rate as usize).max(1);
    let ratio = job.output_rate as f64 / input.sample_rate as f64;
    let params = sinc_params_for_quality(job.quality);

    let mut resampler: Box<dyn Resampler<f32>> = Box::new(
        Async::<f32>::new_sinc(ratio, 1.1, &params, block_frames, channels, FixedAsync::Input)
            .map_err(|e| anyhow!("resampler init error: {e}"))?,
    );

    tracing::info!(
        from = input.sample_rate,
        to = job.output_rate,
        quality = job.quality,
        sinc_len = params.sinc_len,
        "resampling"
    );

    let mut raw = vec![0u8; input.bytes_for_frames(block_frames)];
    let mut samples_in: Vec<f32> = Vec::with_capacity(block_frames * channels);
    let mut samples_out = vec![0.0f32; resampler.output_frames_max() * channels];
    let mut encoded: Vec<u8> = Vec::new();
    let mut stats = ResampleStats::default();

    let mut indexing = Indexing {
        input_offset: 0,
        output_offset: 0,
        active_channels_mask: None,
        partial_len: None,
    };

    loop {
        let filled = read_full(reader, &mut raw).context("read resample input")?;
        let frames = filled / input.frame_size();
        if frames == 0 {
            break;
        }

        samples_in.clear();
        decode_samples(input.bits, &raw[..frames * input.frame_size()], &mut samples_in);
        let partial = frames < block_frames;
        if partial {
            samples_in.resize(block_frames * channels, 0.0);
        }

        let input_adapter = InterleavedSlice::new(&samples_in, channels, block_frames)
            .map_err(|e| anyhow!("interleaved slice (input) error: {e}"))?;
        let out_capacity_frames = samples_out.len() / channels;
        let mut output_adapter =
            InterleavedSlice::new_mut(&mut samples_out, channels, out_capacity_frames)
                .map_err(|e| anyhow!("interleaved slice (output) error: {e}"))?;

        indexing.partial_len = partial.then_some(frames);

        let (_nbr_in, nbr_out) = resampler
            .process_into_buffer(&input_adapter, &mut output_adapter, Some(&indexing))
            .map_err(|e| anyhow!("resampler process error: {e}"))?;

        // The padded tail produces a full block of output; keep only what the real frames map to.
        let keep = if partial {
            nbr_out.min((frames as f64 * ratio).ceil() as usize)
        } else {
            nbr_out
        };

        encoded.clear();
        encode_samples(input.bits, &samples_out[..keep * channels], &mut encoded);
        writer.write_all(&encoded).context("write resample output")?;

        stats.blocks += 1;
        stats.frames_in += frames as u64;
        stats.frames_out += keep as u64;
        tracing::debug!(block = stats.blocks, frames_in = frames, frames_out = keep, "block resampled");

        if partial {
            break;
        }
    }

    writer.flush().context("flush resample output")?;
    Ok(stats)
}

fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn mono16(rate: u32) -> PcmFormat {
        PcmFormat::new(1, rate, 16).unwrap()
    }

    #[test]
    fn quality_scales_sinc_parameters() {
        let low = sinc_params_for_quality(0);
        assert_eq!(low.sinc_len, 16);
        assert_eq!(low.oversampling_factor, 32);
        assert!(matches!(low.interpolation, SincInterpolationType::Linear));

        let default = sinc_params_for_quality(DEFAULT_QUALITY);
        assert!(matches!(default.interpolation, SincInterpolationType::Quadratic));

        let high = sinc_params_for_quality(MAX_QUALITY);
        assert_eq!(high.sinc_len, 256);
        assert_eq!(high.oversampling_factor, 256);
        assert!(matches!(high.interpolation, SincInterpolationType::Cubic));

        let clamped = sinc_params_for_quality(200);
        assert_eq!(clamped.sinc_len, 256);
    }

    #[test]
    fn upsampling_doubles_frame_count_approximately() {
        let input: Vec<u8> = (0..12_000i32)
            .flat_map(|i| (((i % 64) - 32) as i16 * 256).to_le_bytes())
            .collect();
        let job = ResampleJob {
            input: mono16(8_000),
            output_rate: 16_000,
            quality: DEFAULT_QUALITY,
        };
        let mut out = Vec::new();

        let stats = resample_stream(&mut Cursor::new(input), &mut out, &job).unwrap();

        assert_eq!(stats.blocks, 2);
        assert_eq!(stats.frames_in, 12_000);
        assert!((20_000..=28_000).contains(&stats.frames_out), "{stats:?}");
        assert_eq!(out.len() as u64, stats.frames_out * 2);
    }

    #[test]
    fn output_keeps_input_width_and_channels() {
        let job = ResampleJob {
            input: PcmFormat::new(2, 8_000, 8).unwrap(),
            output_rate: 4_000,
            quality: 0,
        };
        assert_eq!(job.output_format().channels, 2);
        assert_eq!(job.output_format().sample_rate, 4_000);

        let mut out = Vec::new();
        let stats = resample_stream(&mut Cursor::new(vec![128u8; 8_000 * 2]), &mut out, &job).unwrap();
        assert_eq!(out.len() as u64, stats.frames_out * 2);
    }

    #[test]
    fn out_of_range_output_rate_is_rejected_before_reading() {
        let job = ResampleJob {
            input: mono16(8_000),
            output_rate: 4_000_000_000,
            quality: DEFAULT_QUALITY,
        };
        let err = resample_stream(&mut Cursor::new(vec![0u8; 16]), &mut Vec::<u8>::new(), &job).unwrap_err();
        assert_eq!(
            err.downcast_ref::<crate::error::ConfigError>(),
            Some(&crate::error::ConfigError::UnsupportedRate(4_000_000_000))
        );
    }

    #[test]
    fn empty_input_produces_no_output() {
        let job = ResampleJob {
            input: mono16(8_000),
            output_rate: 16_000,
            quality: 2,
        };
        let mut out = Vec::new();
        let stats = resample_stream(&mut Cursor::new(Vec::new()), &mut out, &job).unwrap();
        assert_eq!(stats, ResampleStats::default());
        assert!(out.is_empty());
    }
}
