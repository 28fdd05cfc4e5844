//! Capture stage (CPAL input stream) as a live [`Source`].
//!
//! The CPAL callback converts device samples to the session's PCM bytes and pushes
//! them into a bounded [`PcmQueue`] without blocking. The session thread obtains
//! frames from that queue with a short timeout.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use cpal::traits::{DeviceTrait, StreamTrait};

use crate::config::SessionConfig;
use crate::device::{self, Direction};
use crate::endpoint::{Pulled, Source, pull_live};
use crate::format::{PcmFormat, SampleBits, encode_samples};
use crate::queue::{PcmQueue, calc_capacity_bytes};
use crate::stop::StopToken;

/// A running capture stream.
pub struct DeviceSource {
    stream: cpal::Stream,
    queue: Arc<PcmQueue>,
    format: PcmFormat,
    timeout: Duration,
    cancel: StopToken,
}

impl DeviceSource {
    /// Build and start a capture stream delivering `format`.
    ///
    /// `cancel` lets blocked obtains give up once the session is asked to stop.
    pub fn open(
        device: &cpal::Device,
        format: PcmFormat,
        cfg: &SessionConfig,
        cancel: StopToken,
    ) -> Result<Self> {
        let (stream_config, sample_format) =
            device::pick_stream_config(device, Direction::Capture, &format)?;

        let frame_size = format.frame_size();
        let queue = Arc::new(PcmQueue::new(
            frame_size,
            calc_capacity_bytes(format.sample_rate, frame_size, cfg.queue_seconds),
        ));

        let stream = build_input_stream(device, &stream_config, sample_format, &queue, format.bits)?;
        stream.play()?;

        tracing::info!(
            device = %device::device_name(device),
            format = %format,
            sample_format = ?sample_format,
            "capture started"
        );

        Ok(Self {
            stream,
            queue,
            format,
            timeout: cfg.obtain_timeout,
            cancel,
        })
    }

    pub fn format(&self) -> PcmFormat {
        self.format
    }
}

impl Source for DeviceSource {
    fn frame_size(&self) -> usize {
        self.format.frame_size()
    }

    fn is_live(&self) -> bool {
        true
    }

    fn pull_chunk(&mut self, chunk: &mut [u8], frame_count: usize) -> Pulled {
        let queue = &self.queue;
        let timeout = self.timeout;
        pull_live(
            self.format.frame_size(),
            chunk,
            frame_count,
            &self.cancel,
            |dst, max| queue.obtain_read(dst, max, timeout),
        )
    }

    fn stop(&mut self) {
        self.queue.close();
        if let Err(e) = self.stream.pause() {
            tracing::warn!("capture stop failed: {e}");
        }
        tracing::info!(dropped_frames = self.queue.dropped_frames(), "capture stopped");
    }
}

/// Build a CPAL input stream that feeds `queue` with PCM bytes in `bits` width.
fn build_input_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    queue: &Arc<PcmQueue>,
    bits: SampleBits,
) -> Result<cpal::Stream> {
    match sample_format {
        cpal::SampleFormat::F32 => build_stream::<f32>(device, config, queue, bits),
        cpal::SampleFormat::I16 => build_stream::<i16>(device, config, queue, bits),
        cpal::SampleFormat::I32 => build_stream::<i32>(device, config, queue, bits),
        cpal::SampleFormat::U16 => build_stream::<u16>(device, config, queue, bits),
        cpal::SampleFormat::U8 => build_stream::<u8>(device, config, queue, bits),
        other => Err(anyhow!("Unsupported sample format: {other:?}")),
    }
}

/// Type-specialized capture stream builder.
///
/// The callback reuses its scratch buffers, so steady-state capture does not allocate.
fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    queue: &Arc<PcmQueue>,
    bits: SampleBits,
) -> Result<cpal::Stream>
where
    T: cpal::SizedSample,
    f32: cpal::FromSample<T>,
{
    let queue_cb = queue.clone();
    let queue_err = queue.clone();
    let mut samples: Vec<f32> = Vec::new();
    let mut bytes: Vec<u8> = Vec::new();

    let stream = device.build_input_stream(
        config,
        move |data: &[T], _| {
            samples.clear();
            samples.extend(data.iter().map(|&s| <f32 as cpal::Sample>::from_sample(s)));
            bytes.clear();
            encode_samples(bits, &samples, &mut bytes);
            queue_cb.push_nonblocking(&bytes);
        },
        move |err| {
            tracing::warn!("capture stream error: {err}");
            queue_err.fail(err.to_string());
        },
        None,
    )?;

    Ok(stream)
}
