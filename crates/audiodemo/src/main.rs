//! audiodemo: a manual test harness for the audio session stack.
//!
//! ## Modes
//! - copy (default): capture device or PCM/WAV file → playback device or PCM file,
//!   until Ctrl-C, `--duration` or end of the input file.
//! - `--resample[=Q]`: one-shot file-to-file sample-rate conversion.
//! - `--sine[=F]`: write a raw 16-bit sine tone file.
//! - `--list-devices`: print capture and playback devices with their ids.

use anyhow::Result;
use audiodemo::cli::Args;
use audiodemo::config::{DemoConfig, EXIT_FAILURE};
use audiodemo::runtime;
use audiodemo::signal::{self, Interrupts};
use clap::Parser;
use clap::error::ErrorKind;
use tracing_subscriber::EnvFilter;

fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            let code = match e.kind() {
                ErrorKind::DisplayVersion => 0,
                _ => EXIT_FAILURE,
            };
            std::process::exit(code);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,audiodemo=info,audio_session=info")
        }))
        .init();

    if let Err(e) = run(&args) {
        tracing::error!("{e:#}");
        std::process::exit(EXIT_FAILURE);
    }
}

fn run(args: &Args) -> Result<()> {
    let config = DemoConfig::from_args(args)?;
    let interrupts = Interrupts::shared();
    signal::install_handlers(&interrupts)?;
    let timer = config
        .duration
        .map(|d| signal::arm_timer(&interrupts, d));
    runtime::run(&config, &interrupts, timer)
}
