//! Error types for session setup and data transfer.

use std::io;

use thiserror::Error;

use crate::device::Direction;

/// Rejected session parameters, detected before any endpoint is opened.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unsupported {direction} device id {id} ({available} available)")]
    UnsupportedDevice {
        direction: Direction,
        id: u32,
        available: usize,
    },

    #[error("unsupported channel count {0} (expected 1 or 2)")]
    UnsupportedChannels(u16),

    #[error("unsupported bit depth {0} (expected 8, 16 or 32)")]
    UnsupportedBits(u16),

    #[error("unsupported sample rate {0}")]
    UnsupportedRate(u32),
}

impl ConfigError {
    /// Negative status code reported for this validation failure.
    pub fn code(&self) -> i32 {
        match self {
            Self::UnsupportedDevice { .. } => -1,
            Self::UnsupportedChannels(_) => -2,
            Self::UnsupportedBits(_) => -3,
            Self::UnsupportedRate(_) => -4,
        }
    }
}

/// WAV header rejection, one variant (and code) per cause.
#[derive(Error, Debug)]
pub enum WavError {
    #[error("short wav header: read {read} of {expected} bytes")]
    ShortHeader { read: usize, expected: usize },

    #[error("invalid fcc {} {}", String::from_utf8_lossy(.riff), String::from_utf8_lossy(.wave))]
    BadMagic { riff: [u8; 4], wave: [u8; 4] },

    #[error("unsupported wav format tag {0} (only PCM is supported)")]
    NotPcm(u16),

    #[error("wav header read failed: {0}")]
    Io(#[from] io::Error),
}

impl WavError {
    pub fn code(&self) -> i32 {
        match self {
            Self::ShortHeader { .. } | Self::Io(_) => -1,
            Self::BadMagic { .. } => -2,
            Self::NotPcm(_) => -3,
        }
    }
}

/// Outcome of a single obtain/commit on a live device endpoint.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error("timed out")]
    TimedOut,

    #[error("would block")]
    WouldBlock,

    #[error("{0}")]
    Failed(String),
}

impl TransferError {
    /// Timeouts and would-block conditions are retried, never surfaced.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TimedOut | Self::WouldBlock)
    }
}
