use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, bail};
use audio_session::config::SessionConfig;
use audio_session::error::ConfigError;
use audio_session::format::{DEFAULT_SAMPLE_RATE, PcmFormat, SampleBits};
use audio_session::sine::SineSpec;

use crate::cli::{Args, EndpointArg};

/// Process exit status for setup failures and `--help`.
pub const EXIT_FAILURE: i32 = -1;

/// Format fields given on the command line for one endpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FormatOverrides {
    pub channels: Option<u16>,
    pub rate: Option<u32>,
    pub bits: Option<u16>,
}

impl FormatOverrides {
    /// Fill unset fields from `base` and validate the result.
    pub fn resolve(&self, base: PcmFormat) -> Result<PcmFormat, ConfigError> {
        PcmFormat::new(
            self.channels.unwrap_or(base.channels),
            self.rate.unwrap_or(base.sample_rate),
            self.bits.unwrap_or(base.bits.bits()),
        )
    }
}

#[derive(Clone, Debug)]
pub struct CopyConfig {
    /// `None` selects the default capture device.
    pub input: Option<EndpointArg>,
    /// `None` selects the default playback device.
    pub output: Option<EndpointArg>,
    pub in_format: FormatOverrides,
    pub out_format: FormatOverrides,
}

#[derive(Clone, Debug)]
pub enum Mode {
    ListDevices,
    Resample {
        input: PathBuf,
        output: PathBuf,
        in_format: FormatOverrides,
        out_rate: u32,
        quality: u8,
    },
    Sine {
        output: PathBuf,
        spec: SineSpec,
    },
    Copy(CopyConfig),
}

#[derive(Clone, Debug)]
pub struct DemoConfig {
    pub mode: Mode,
    /// Auto-stop timer, armed at startup.
    pub duration: Option<Duration>,
    pub session: SessionConfig,
}

impl DemoConfig {
    /// Resolve the run mode from parsed arguments.
    ///
    /// Priority: device listing, then `--resample`, then `--sine`, then a copy session.
    /// Explicit format values are validated here, before any endpoint is opened.
    pub fn from_args(args: &Args) -> Result<Self> {
        let in_format = FormatOverrides {
            channels: args.in_channel,
            rate: args.in_rate,
            bits: args.in_bits,
        };
        let out_format = FormatOverrides {
            channels: args.out_channel,
            rate: args.out_rate,
            bits: args.out_bits,
        };

        let mode = if args.list_devices {
            Mode::ListDevices
        } else if let Some(quality) = args.resample {
            let (Some(EndpointArg::File(input)), Some(EndpointArg::File(output))) =
                (&args.input, &args.output)
            else {
                bail!("--resample needs an input file and an output file");
            };
            in_format.resolve(PcmFormat::default())?;
            let out_rate = FormatOverrides {
                rate: Some(args.out_rate.unwrap_or(DEFAULT_SAMPLE_RATE)),
                ..Default::default()
            }
            .resolve(PcmFormat::default())?
            .sample_rate;
            Mode::Resample {
                input: input.clone(),
                output: output.clone(),
                in_format,
                out_rate,
                quality,
            }
        } else if let Some(frequency) = args.sine {
            let Some(EndpointArg::File(output)) = &args.output else {
                bail!("--sine needs an output file");
            };
            Mode::Sine {
                output: output.clone(),
                spec: sine_spec(frequency, args)?,
            }
        } else {
            in_format.resolve(PcmFormat::default())?;
            out_format.resolve(PcmFormat::default())?;
            Mode::Copy(CopyConfig {
                input: args.input.clone(),
                output: args.output.clone(),
                in_format,
                out_format,
            })
        };

        Ok(Self {
            mode,
            duration: args.duration.map(Duration::from_secs),
            session: SessionConfig::default(),
        })
    }
}

/// The tone takes the output channels and rate (defaults when unset). Sine output
/// is always 16-bit; other requested widths are replaced with a warning.
fn sine_spec(frequency: u32, args: &Args) -> Result<SineSpec> {
    let requested = FormatOverrides {
        channels: args.out_channel,
        rate: args.out_rate,
        bits: None,
    }
    .resolve(PcmFormat::default())?;

    if let Some(bits) = args.out_bits {
        if bits != SampleBits::S16.bits() {
            tracing::warn!(requested = bits, "sine output is 16-bit only; using 16");
        }
    }

    Ok(SineSpec {
        frequency_hz: f64::from(frequency),
        sample_rate: requested.sample_rate,
        channels: requested.channels,
        seconds: args.sine_seconds,
    })
}
