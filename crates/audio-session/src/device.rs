//! Capture/playback device discovery and selection.
//!
//! Thin wrappers around CPAL for:
//! - listing capture and playback devices with their numeric ids
//! - selecting either the default device or a device by id
//! - choosing a stream config that carries a session's channels and rate as-is

use std::fmt;

use anyhow::{Context, Result, anyhow};
use cpal::traits::{DeviceTrait, HostTrait};

use crate::error::ConfigError;
use crate::format::PcmFormat;

/// Data direction of a device endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Capture,
    Playback,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Capture => f.write_str("capture"),
            Self::Playback => f.write_str("playback"),
        }
    }
}

/// Enumerate the host devices for `direction`, in id order.
pub fn devices(host: &cpal::Host, direction: Direction) -> Result<Vec<cpal::Device>> {
    let devices: Vec<cpal::Device> = match direction {
        Direction::Capture => host.input_devices().context("No capture devices")?.collect(),
        Direction::Playback => host.output_devices().context("No playback devices")?.collect(),
    };
    Ok(devices)
}

/// Pick a CPAL device for `direction`.
///
/// - If `id` is `Some`, chooses the device at that enumeration index; an index past the
///   end is a [`ConfigError::UnsupportedDevice`].
/// - Otherwise, returns the host default device for that direction.
pub fn pick_device(host: &cpal::Host, direction: Direction, id: Option<u32>) -> Result<cpal::Device> {
    if let Some(id) = id {
        let mut all = devices(host, direction)?;
        let available = all.len();
        let index = usize::try_from(id).unwrap_or(usize::MAX);
        if index >= available {
            return Err(ConfigError::UnsupportedDevice {
                direction,
                id,
                available,
            }
            .into());
        }
        return Ok(all.swap_remove(index));
    }

    let default = match direction {
        Direction::Capture => host.default_input_device(),
        Direction::Playback => host.default_output_device(),
    };
    default.ok_or_else(|| anyhow!("No default {direction} device"))
}

/// Choose a stream config carrying `format`'s channel count and rate unchanged.
///
/// Among the device's supported ranges that contain both, the native sample format
/// with the best rank wins (`f32` first). Errors when no range matches.
pub fn pick_stream_config(
    device: &cpal::Device,
    direction: Direction,
    format: &PcmFormat,
) -> Result<(cpal::StreamConfig, cpal::SampleFormat)> {
    let ranges: Vec<cpal::SupportedStreamConfigRange> = match direction {
        Direction::Capture => device.supported_input_configs()?.collect(),
        Direction::Playback => device.supported_output_configs()?.collect(),
    };

    let mut best: Option<(u8, cpal::SampleFormat)> = None;
    for range in &ranges {
        if !range_supports(
            range.channels(),
            range.min_sample_rate(),
            range.max_sample_rate(),
            format,
        ) {
            continue;
        }
        let rank = sample_format_rank(range.sample_format());
        if best.map(|(b_rank, _)| rank < b_rank).unwrap_or(true) {
            best = Some((rank, range.sample_format()));
        }
    }

    let (_, sample_format) =
        best.ok_or_else(|| anyhow!("{direction} device does not support {format}"))?;

    let config = cpal::StreamConfig {
        channels: format.channels,
        sample_rate: format.sample_rate,
        buffer_size: cpal::BufferSize::Default,
    };
    Ok((config, sample_format))
}

/// Print capture and playback devices with their ids to stdout.
///
/// This is intended for CLI UX (`--list-devices`) rather than structured output.
pub fn list_devices(host: &cpal::Host) -> Result<()> {
    for direction in [Direction::Capture, Direction::Playback] {
        println!("{direction} devices:");
        for (i, d) in devices(host, direction)?.iter().enumerate() {
            println!("  #{i}: {}", d.description()?);
        }
    }
    Ok(())
}

/// Best-effort display name for log lines.
pub fn device_name(device: &cpal::Device) -> String {
    device
        .description()
        .map(|d| d.to_string())
        .unwrap_or_else(|_| "<unknown>".to_string())
}

fn range_supports(channels: u16, min_rate: u32, max_rate: u32, format: &PcmFormat) -> bool {
    channels == format.channels && min_rate <= format.sample_rate && format.sample_rate <= max_rate
}

fn sample_format_rank(format: cpal::SampleFormat) -> u8 {
    match format {
        cpal::SampleFormat::F32 => 0,
        cpal::SampleFormat::I32 => 1,
        cpal::SampleFormat::I16 => 2,
        cpal::SampleFormat::U16 => 3,
        cpal::SampleFormat::U8 => 4,
        _ => 10,
    }
}
