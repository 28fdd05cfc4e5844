//! Streaming copy loop: source → chunk → sink, until stopped or exhausted.
//!
//! One thread pulls a chunk from the source and pushes it to the sink, in strict
//! alternation. The [`StopToken`] is checked at every chunk boundary. File sources
//! end the loop at end-of-stream; live sources only end it by stop request or a
//! fatal transfer failure.
//!
//! When source and sink frame sizes differ only the frame *count* is rescaled
//! (`read × in / out`); the bytes themselves are passed through untouched.

use crate::endpoint::{ChunkEnd, Sink, Source};
use crate::stop::StopToken;

/// Why a copy loop ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CopyOutcome {
    /// The stop token was cleared by someone else.
    Stopped,
    /// The source ran out of data.
    EndOfStream,
    /// A fatal transfer failure on either side.
    Aborted,
}

/// Progress summary of one copy loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CopyReport {
    pub chunks: u64,
    pub frames_read: u64,
    pub frames_written: u64,
    pub outcome: CopyOutcome,
}

/// Frames to write for `read_frames` source frames: `floor(read × in / out)`.
pub fn rescale_frames(read_frames: usize, in_frame_size: usize, out_frame_size: usize) -> usize {
    if in_frame_size == out_frame_size {
        return read_frames;
    }
    read_frames.saturating_mul(in_frame_size) / out_frame_size.max(1)
}

/// Chunk buffer length that holds `chunk_frames` at either frame size.
pub fn chunk_buffer_len(chunk_frames: usize, in_frame_size: usize, out_frame_size: usize) -> usize {
    chunk_frames.saturating_mul(in_frame_size.max(out_frame_size))
}

/// Run the copy loop over a caller-owned `chunk` until `stop` clears or the source ends.
///
/// Reaching end-of-stream clears `stop` as well. Endpoints are not stopped here; see
/// [`Session::run`] for the full lifecycle.
pub fn copy_stream(
    source: &mut dyn Source,
    sink: &mut dyn Sink,
    chunk: &mut [u8],
    chunk_frames: usize,
    stop: &StopToken,
) -> CopyReport {
    let in_fs = source.frame_size();
    let out_fs = sink.frame_size();
    debug_assert!(chunk.len() >= chunk_buffer_len(chunk_frames, in_fs, out_fs));

    let mut report = CopyReport {
        chunks: 0,
        frames_read: 0,
        frames_written: 0,
        outcome: CopyOutcome::Stopped,
    };

    loop {
        if !stop.is_running() {
            report.outcome = CopyOutcome::Stopped;
            break;
        }

        let pulled = source.pull_chunk(chunk, chunk_frames);
        let write_frames = rescale_frames(pulled.frames, in_fs, out_fs);
        let remaining = if write_frames > 0 {
            sink.push_chunk(chunk, write_frames)
        } else {
            0
        };

        report.chunks += 1;
        report.frames_read += pulled.frames as u64;
        report.frames_written += (write_frames - remaining) as u64;
        tracing::debug!(
            read = pulled.frames,
            written = write_frames - remaining,
            "chunk transferred"
        );

        if remaining > 0 {
            report.outcome = if stop.is_running() {
                CopyOutcome::Aborted
            } else {
                CopyOutcome::Stopped
            };
            break;
        }

        match pulled.end {
            ChunkEnd::More => {}
            ChunkEnd::EndOfStream => {
                stop.stop();
                report.outcome = CopyOutcome::EndOfStream;
                break;
            }
            ChunkEnd::Aborted => {
                report.outcome = CopyOutcome::Aborted;
                break;
            }
        }
    }

    report
}

/// One copy session: both endpoints, the transfer chunk and the stop token.
///
/// The session owns everything exclusively for its lifetime.
pub struct Session {
    source: Box<dyn Source>,
    sink: Box<dyn Sink>,
    chunk: Vec<u8>,
    chunk_frames: usize,
    stop: StopToken,
}

impl Session {
    pub fn new(
        source: Box<dyn Source>,
        sink: Box<dyn Sink>,
        chunk_frames: usize,
        stop: StopToken,
    ) -> Self {
        let chunk_frames = chunk_frames.max(1);
        let len = chunk_buffer_len(chunk_frames, source.frame_size(), sink.frame_size());
        Self {
            source,
            sink,
            chunk: vec![0u8; len],
            chunk_frames,
            stop,
        }
    }

    pub fn stop_token(&self) -> &StopToken {
        &self.stop
    }

    /// Run the loop, then tear down: sink, then source, then the chunk, then the handles.
    pub fn run(self) -> CopyReport {
        let Self {
            mut source,
            mut sink,
            mut chunk,
            chunk_frames,
            stop,
        } = self;

        tracing::info!(
            chunk_frames,
            live_source = source.is_live(),
            in_frame_size = source.frame_size(),
            out_frame_size = sink.frame_size(),
            "copy session started"
        );

        let report = copy_stream(source.as_mut(), sink.as_mut(), &mut chunk, chunk_frames, &stop);

        sink.stop();
        source.stop();
        drop(chunk);
        drop(sink);
        drop(source);

        tracing::info!(
            chunks = report.chunks,
            frames_read = report.frames_read,
            frames_written = report.frames_written,
            outcome = ?report.outcome,
            "copy session finished"
        );
        report
    }
}
