//! Streaming audio session library.
//!
//! Moves PCM frames between a capture device or file and a playback device or file,
//! one chunk at a time, until stopped or the source is exhausted. Also provides a
//! one-shot rate conversion pass, a WAV header reader and a sine tone generator.

pub mod capture;
pub mod config;
pub mod device;
pub mod endpoint;
pub mod error;
pub mod format;
pub mod pipeline;
pub mod playback;
pub mod queue;
pub mod resample;
pub mod sine;
pub mod stop;
pub mod wav;
