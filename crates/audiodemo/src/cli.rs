use std::path::PathBuf;
use std::str::FromStr;

use clap::Parser;

/// A stream endpoint named on the command line.
///
/// Arguments starting with a digit are device ids (leading digits only, so `1abc` is
/// device 1). Anything else is a file path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EndpointArg {
    Device(u32),
    File(PathBuf),
}

impl FromStr for EndpointArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err("empty endpoint".to_string());
        }
        if s.starts_with(|c: char| c.is_ascii_digit()) {
            let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
            return digits
                .parse::<u32>()
                .map(EndpointArg::Device)
                .map_err(|e| format!("invalid device id {s:?}: {e}"));
        }
        Ok(EndpointArg::File(PathBuf::from(s)))
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "audiodemo",
    version,
    about = "Copy audio between capture/playback devices and raw PCM files"
)]
pub struct Args {
    /// Source: capture device id or input file (raw PCM, or WAV by extension)
    #[arg(long = "in", value_name = "DEVICE|FILE")]
    pub input: Option<EndpointArg>,

    /// Sink: playback device id or output file (raw PCM)
    #[arg(long = "out", value_name = "DEVICE|FILE")]
    pub output: Option<EndpointArg>,

    /// Input channel count (1 or 2)
    #[arg(long)]
    pub in_channel: Option<u16>,

    /// Output channel count (1 or 2); defaults to the input's
    #[arg(long)]
    pub out_channel: Option<u16>,

    /// Input sample rate in Hz
    #[arg(long)]
    pub in_rate: Option<u32>,

    /// Output sample rate in Hz; defaults to the input's
    #[arg(long)]
    pub out_rate: Option<u32>,

    /// Input bits per sample (8, 16 or 32)
    #[arg(long)]
    pub in_bits: Option<u16>,

    /// Output bits per sample; defaults to the input's
    #[arg(long)]
    pub out_bits: Option<u16>,

    /// Stop automatically after this many seconds
    #[arg(long, value_name = "SECS")]
    pub duration: Option<u64>,

    /// Convert the input file's rate to --out-rate (quality 0..=10)
    #[arg(
        long,
        value_name = "Q",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "4",
        value_parser = clap::value_parser!(u8).range(0..=10)
    )]
    pub resample: Option<u8>,

    /// Write a sine tone of this frequency (Hz) to the output file
    #[arg(
        long,
        value_name = "HZ",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "500"
    )]
    pub sine: Option<u32>,

    /// Length of the sine tone in seconds
    #[arg(long, default_value_t = 60)]
    pub sine_seconds: u32,

    /// List capture and playback devices and exit
    #[arg(long)]
    pub list_devices: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("audiodemo").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn endpoint_digit_prefix_is_device() {
        assert_eq!("0".parse::<EndpointArg>(), Ok(EndpointArg::Device(0)));
        assert_eq!("12".parse::<EndpointArg>(), Ok(EndpointArg::Device(12)));
        assert_eq!("1abc".parse::<EndpointArg>(), Ok(EndpointArg::Device(1)));
    }

    #[test]
    fn endpoint_otherwise_is_file() {
        assert_eq!(
            "take.pcm".parse::<EndpointArg>(),
            Ok(EndpointArg::File(PathBuf::from("take.pcm")))
        );
        assert_eq!(
            "./1.raw".parse::<EndpointArg>(),
            Ok(EndpointArg::File(PathBuf::from("./1.raw")))
        );
        assert!("".parse::<EndpointArg>().is_err());
    }

    #[test]
    fn parses_copy_flags() {
        let args = parse(&["--in", "0", "--out", "out.pcm", "--in-rate", "48000", "--out-bits", "32", "--duration", "5"]);
        assert_eq!(args.input, Some(EndpointArg::Device(0)));
        assert_eq!(args.output, Some(EndpointArg::File(PathBuf::from("out.pcm"))));
        assert_eq!(args.in_rate, Some(48_000));
        assert_eq!(args.out_bits, Some(32));
        assert_eq!(args.duration, Some(5));
        assert_eq!(args.resample, None);
        assert_eq!(args.sine, None);
        assert_eq!(args.sine_seconds, 60);
    }

    #[test]
    fn optional_values_take_defaults_when_bare() {
        let args = parse(&["--resample", "--sine"]);
        assert_eq!(args.resample, Some(4));
        assert_eq!(args.sine, Some(500));

        let args = parse(&["--resample=9", "--sine=1000"]);
        assert_eq!(args.resample, Some(9));
        assert_eq!(args.sine, Some(1000));
    }

    #[test]
    fn resample_quality_is_bounded() {
        let res = Args::try_parse_from(["audiodemo", "--resample=11"]);
        assert!(res.is_err());
    }

    #[test]
    fn help_is_an_error_kind() {
        let err = Args::try_parse_from(["audiodemo", "-h"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }
}
