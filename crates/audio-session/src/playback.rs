//! Playback stage (CPAL output stream) as a live [`Sink`].
//!
//! Builds the CPAL output stream and provides the real-time audio callback.
//! The callback:
//! - drains whole frames from the shared [`PcmQueue`] without blocking
//! - converts the session's PCM bytes to the device sample format
//! - fills underruns with silence and counts them
//!
//! No channel mapping happens here: the stream is opened with the session's own
//! channel count.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use cpal::traits::{DeviceTrait, StreamTrait};

use crate::config::SessionConfig;
use crate::device::{self, Direction};
use crate::endpoint::{Sink, push_live};
use crate::format::{PcmFormat, decode_samples};
use crate::queue::{PcmQueue, calc_capacity_bytes};
use crate::stop::StopToken;

/// A running playback stream.
pub struct DeviceSink {
    stream: cpal::Stream,
    queue: Arc<PcmQueue>,
    format: PcmFormat,
    timeout: Duration,
    drain_timeout: Duration,
    cancel: StopToken,
}

impl DeviceSink {
    /// Build and start a playback stream accepting `format`.
    pub fn open(
        device: &cpal::Device,
        format: PcmFormat,
        cfg: &SessionConfig,
        cancel: StopToken,
    ) -> Result<Self> {
        let (stream_config, sample_format) =
            device::pick_stream_config(device, Direction::Playback, &format)?;

        let frame_size = format.frame_size();
        let queue = Arc::new(PcmQueue::new(
            frame_size,
            calc_capacity_bytes(format.sample_rate, frame_size, cfg.queue_seconds),
        ));

        let stream = build_output_stream(device, &stream_config, sample_format, &queue, format)?;
        stream.play()?;

        tracing::info!(
            device = %device::device_name(device),
            format = %format,
            sample_format = ?sample_format,
            "playback started"
        );

        Ok(Self {
            stream,
            queue,
            format,
            timeout: cfg.obtain_timeout,
            drain_timeout: cfg.drain_timeout,
            cancel,
        })
    }

    pub fn format(&self) -> PcmFormat {
        self.format
    }
}

impl Sink for DeviceSink {
    fn frame_size(&self) -> usize {
        self.format.frame_size()
    }

    fn push_chunk(&mut self, chunk: &[u8], frame_count: usize) -> usize {
        let queue = &self.queue;
        let timeout = self.timeout;
        push_live(
            self.format.frame_size(),
            chunk,
            frame_count,
            &self.cancel,
            |src, max| queue.commit_write(src, max, timeout),
        )
    }

    /// Let queued audio play out (bounded by the drain timeout), then pause the stream.
    fn stop(&mut self) {
        self.queue.close();
        if !self.queue.wait_drained(self.drain_timeout) {
            tracing::warn!(
                buffered_frames = self.queue.len_frames(),
                "playback queue did not drain before stop"
            );
        }
        if let Err(e) = self.stream.pause() {
            tracing::warn!("playback stop failed: {e}");
        }
        tracing::info!(underrun_frames = self.queue.underrun_frames(), "playback stopped");
    }
}

/// Build a CPAL output stream that plays PCM bytes from `queue`.
///
/// ## Real-time constraints
/// The callback never waits on the condition variable. Underruns are filled with
/// silence.
fn build_output_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    queue: &Arc<PcmQueue>,
    format: PcmFormat,
) -> Result<cpal::Stream> {
    match sample_format {
        cpal::SampleFormat::F32 => build_stream::<f32>(device, config, queue, format),
        cpal::SampleFormat::I16 => build_stream::<i16>(device, config, queue, format),
        cpal::SampleFormat::I32 => build_stream::<i32>(device, config, queue, format),
        cpal::SampleFormat::U16 => build_stream::<u16>(device, config, queue, format),
        cpal::SampleFormat::U8 => build_stream::<u8>(device, config, queue, format),
        other => Err(anyhow!("Unsupported sample format: {other:?}")),
    }
}

/// Type-specialized stream builder for CPAL sample formats.
fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    queue: &Arc<PcmQueue>,
    format: PcmFormat,
) -> Result<cpal::Stream>
where
    T: cpal::Sample + cpal::SizedSample + cpal::FromSample<f32>,
{
    let channels_out = usize::from(format.channels);
    let frame_size = format.frame_size();
    let bits = format.bits;

    let queue_cb = queue.clone();
    let queue_err = queue.clone();
    let mut bytes: Vec<u8> = Vec::new();
    let mut samples: Vec<f32> = Vec::new();

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _| {
            let frames = data.len() / channels_out;
            bytes.resize(frames * frame_size, 0);
            let got = queue_cb.pop_nonblocking(&mut bytes);

            samples.clear();
            decode_samples(bits, &bytes[..got * frame_size], &mut samples);
            fill_output(data, &samples);

            if got < frames {
                queue_cb.note_underrun(frames - got);
            }
        },
        move |err| {
            tracing::warn!("playback stream error: {err}");
            queue_err.fail(err.to_string());
        },
        None,
    )?;

    Ok(stream)
}

/// Copy decoded samples into the device buffer; anything past them is silence.
fn fill_output<T>(data: &mut [T], samples: &[f32])
where
    T: cpal::Sample + cpal::FromSample<f32>,
{
    for (i, out) in data.iter_mut().enumerate() {
        let s = samples.get(i).copied().unwrap_or(0.0);
        *out = <T as cpal::Sample>::from_sample::<f32>(s);
    }
}
