//! Demo runtime: turns a resolved [`DemoConfig`] into endpoints and runs them.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use audio_session::capture::DeviceSource;
use audio_session::config::SessionConfig;
use audio_session::device::{self, Direction};
use audio_session::endpoint::{FileSink, FileSource, Sink, Source};
use audio_session::format::PcmFormat;
use audio_session::pipeline::{CopyOutcome, CopyReport, Session};
use audio_session::playback::DeviceSink;
use audio_session::resample::{self, ResampleJob};
use audio_session::sine::{self, SineSpec};
use audio_session::stop::StopToken;
use audio_session::wav;

use crate::cli::EndpointArg;
use crate::config::{CopyConfig, DemoConfig, FormatOverrides, Mode};
use crate::signal::{Interrupts, TimerGuard};

/// Run the configured mode to completion.
///
/// `timer` is the armed `--duration` guard. A copy session disarms it before
/// unregistering itself; the other modes hold it until they return.
pub fn run(
    config: &DemoConfig,
    interrupts: &Arc<Interrupts>,
    timer: Option<TimerGuard>,
) -> Result<()> {
    match &config.mode {
        Mode::ListDevices => device::list_devices(&cpal::default_host()),
        Mode::Resample {
            input,
            output,
            in_format,
            out_rate,
            quality,
        } => run_resample(input, output, *in_format, *out_rate, *quality),
        Mode::Sine { output, spec } => run_sine(output, spec),
        Mode::Copy(copy) => {
            let report = run_copy(copy, config, interrupts, timer)?;
            if report.outcome == CopyOutcome::Aborted {
                tracing::warn!("session ended after a transfer failure");
            }
            Ok(())
        }
    }
}

/// File-to-file rate conversion.
pub fn run_resample(
    input: &Path,
    output: &Path,
    in_format: FormatOverrides,
    out_rate: u32,
    quality: u8,
) -> Result<()> {
    let input_file = open_input_file(input, in_format)?;
    let job = ResampleJob {
        input: input_file.format,
        output_rate: out_rate,
        quality,
    };
    // Fail before the output file is created.
    PcmFormat::new(job.input.channels, out_rate, job.input.bits.bits())?;
    let mut reader = input_file.reader;
    let file = File::create(output).with_context(|| format!("create {:?}", output))?;
    let mut writer = BufWriter::new(file);

    let stats = resample::resample_stream(&mut reader, &mut writer, &job)?;
    tracing::info!(
        blocks = stats.blocks,
        frames_in = stats.frames_in,
        frames_out = stats.frames_out,
        output = %job.output_format(),
        "resample finished"
    );
    Ok(())
}

pub fn run_sine(output: &Path, spec: &SineSpec) -> Result<()> {
    let file = File::create(output).with_context(|| format!("create {:?}", output))?;
    let mut writer = BufWriter::new(file);
    sine::write_sine(&mut writer, spec).with_context(|| format!("write {:?}", output))?;
    Ok(())
}

/// Source side of a session: format known, device chosen, nothing streaming yet.
enum PreparedSource {
    File(BufReader<File>),
    Device(cpal::Device),
}

enum PreparedSink<'a> {
    File(&'a Path),
    Device(cpal::Device),
}

/// Resolve both endpoints, open them, register the session for interrupts and run it.
///
/// Formats and device ids are all resolved before the first stream is built, so a
/// bad output setting never leaves a capture stream running.
pub fn run_copy(
    copy: &CopyConfig,
    config: &DemoConfig,
    interrupts: &Arc<Interrupts>,
    timer: Option<TimerGuard>,
) -> Result<CopyReport> {
    let needs_host = !matches!(copy.input, Some(EndpointArg::File(_)))
        || !matches!(copy.output, Some(EndpointArg::File(_)));
    let host = needs_host.then(cpal::default_host);

    let (prepared_source, in_format, from_wav) = prepare_source(copy, host.as_ref())?;
    // Only a WAV header carries over to the output; otherwise unset fields take the defaults.
    let out_base = if from_wav { in_format } else { PcmFormat::default() };
    let out_format = copy.out_format.resolve(out_base)?;
    let prepared_sink = prepare_sink(copy, host.as_ref())?;

    tracing::info!(input = %in_format, output = %out_format, "session formats");

    let stop = StopToken::new();
    let source = open_source(prepared_source, in_format, &config.session, &stop)?;
    let sink = open_sink(prepared_sink, out_format, &config.session, &stop)?;

    let chunk_frames = config.session.chunk_frames(in_format.sample_rate);
    let session = Session::new(source, sink, chunk_frames, stop.clone());

    let active = interrupts.activate(stop);
    let report = session.run();
    drop(timer);
    drop(active);
    Ok(report)
}

fn prepare_source(
    copy: &CopyConfig,
    host: Option<&cpal::Host>,
) -> Result<(PreparedSource, PcmFormat, bool)> {
    match &copy.input {
        Some(EndpointArg::File(path)) => {
            let input = open_input_file(path, copy.in_format)?;
            tracing::info!(path = ?path, format = %input.format, wav = input.from_wav, "input file");
            Ok((PreparedSource::File(input.reader), input.format, input.from_wav))
        }
        device_arg => {
            let host = host.context("no audio host")?;
            let format = copy.in_format.resolve(PcmFormat::default())?;
            let device = device::pick_device(host, Direction::Capture, device_id(device_arg))?;
            Ok((PreparedSource::Device(device), format, false))
        }
    }
}

fn prepare_sink<'a>(copy: &'a CopyConfig, host: Option<&cpal::Host>) -> Result<PreparedSink<'a>> {
    match &copy.output {
        Some(EndpointArg::File(path)) => Ok(PreparedSink::File(path)),
        device_arg => {
            let host = host.context("no audio host")?;
            let device = device::pick_device(host, Direction::Playback, device_id(device_arg))?;
            Ok(PreparedSink::Device(device))
        }
    }
}

fn open_source(
    prepared: PreparedSource,
    format: PcmFormat,
    cfg: &SessionConfig,
    stop: &StopToken,
) -> Result<Box<dyn Source>> {
    Ok(match prepared {
        PreparedSource::File(reader) => Box::new(FileSource::new(reader, format.frame_size())),
        PreparedSource::Device(device) => {
            Box::new(DeviceSource::open(&device, format, cfg, stop.clone())?)
        }
    })
}

fn open_sink(
    prepared: PreparedSink<'_>,
    format: PcmFormat,
    cfg: &SessionConfig,
    stop: &StopToken,
) -> Result<Box<dyn Sink>> {
    Ok(match prepared {
        PreparedSink::File(path) => {
            tracing::info!(path = ?path, format = %format, "output file");
            Box::new(FileSink::create(path, format.frame_size())?)
        }
        PreparedSink::Device(device) => {
            Box::new(DeviceSink::open(&device, format, cfg, stop.clone())?)
        }
    })
}

fn device_id(arg: &Option<EndpointArg>) -> Option<u32> {
    match arg {
        Some(EndpointArg::Device(id)) => Some(*id),
        _ => None,
    }
}

#[derive(Debug)]
struct InputFile {
    reader: BufReader<File>,
    format: PcmFormat,
    from_wav: bool,
}

/// Open an input file, reading a WAV header when the extension says so.
///
/// A WAV header supplies the format; command-line fields still override it.
fn open_input_file(path: &Path, overrides: FormatOverrides) -> Result<InputFile> {
    let file = File::open(path).with_context(|| format!("open {:?}", path))?;
    let mut reader = BufReader::new(file);

    let from_wav = wav::is_wav_path(path);
    let base = if from_wav {
        let header = wav::read_header(&mut reader).with_context(|| format!("read wav header {:?}", path))?;
        header.pcm_format()?
    } else {
        PcmFormat::default()
    };

    Ok(InputFile {
        reader,
        format: overrides.resolve(base)?,
        from_wav,
    })
}
