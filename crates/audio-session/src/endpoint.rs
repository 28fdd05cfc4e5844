//! Stream endpoints: the source and sink sides of a copy session.
//!
//! A [`Source`] fills a caller-owned chunk with whole frames; a [`Sink`] drains one.
//! File endpoints live here. Device endpoints (`capture`, `playback`) are built on
//! [`pull_live`] / [`push_live`], which implement the obtain/retry contract shared by
//! every live stream.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use anyhow::{Context, Result};

use crate::error::TransferError;
use crate::stop::StopToken;

/// How a pull ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkEnd {
    /// The chunk was filled; more data may follow.
    More,
    /// The source is exhausted. Only file sources report this.
    EndOfStream,
    /// A fatal transfer failure cut the pull short.
    Aborted,
}

/// Result of one [`Source::pull_chunk`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pulled {
    pub frames: usize,
    pub end: ChunkEnd,
}

pub trait Source {
    /// Bytes per frame delivered by this source.
    fn frame_size(&self) -> usize;

    /// Whether this is a live device (never exhausted, runs until stopped).
    fn is_live(&self) -> bool;

    /// Obtain up to `frame_count` frames into the front of `chunk`.
    ///
    /// `chunk` must hold at least `frame_count × frame_size` bytes.
    fn pull_chunk(&mut self, chunk: &mut [u8], frame_count: usize) -> Pulled;

    /// Stop producing data. Called once, after the sink has been stopped.
    fn stop(&mut self) {}
}

pub trait Sink {
    /// Bytes per frame accepted by this sink.
    fn frame_size(&self) -> usize;

    /// Write `frame_count` frames from the front of `chunk`.
    ///
    /// Returns the number of frames left unwritten (zero on success).
    fn push_chunk(&mut self, chunk: &[u8], frame_count: usize) -> usize;

    /// Flush and stop. Called once, before the source is stopped.
    fn stop(&mut self) {}
}

/// Fill `chunk` with up to `frame_count` frames from a live stream.
///
/// `obtain(dst, max_frames)` returns the number of frames it copied into the front of `dst`.
/// Timeouts and would-block results are retried for as long as `cancel` is running;
/// any other failure aborts with the frames obtained so far.
pub fn pull_live<F>(
    frame_size: usize,
    chunk: &mut [u8],
    frame_count: usize,
    cancel: &StopToken,
    mut obtain: F,
) -> Pulled
where
    F: FnMut(&mut [u8], usize) -> Result<usize, TransferError>,
{
    let mut to_read = frame_count;

    while to_read > 0 {
        let offset = (frame_count - to_read) * frame_size;
        let end = offset + to_read * frame_size;
        match obtain(&mut chunk[offset..end], to_read) {
            Ok(n) => to_read -= n.min(to_read),
            Err(e) if e.is_transient() => {
                if !cancel.is_running() {
                    break;
                }
            }
            Err(e) => {
                tracing::warn!(remaining = to_read, "cannot read from capture stream: {e}");
                return Pulled {
                    frames: frame_count - to_read,
                    end: ChunkEnd::Aborted,
                };
            }
        }
    }

    Pulled {
        frames: frame_count - to_read,
        end: ChunkEnd::More,
    }
}

/// Write `frame_count` frames from `chunk` to a live stream.
///
/// `commit(src, max_frames)` returns the number of frames it accepted from the front of `src`.
/// Retries transient failures while `cancel` is running. Returns frames left unwritten.
pub fn push_live<F>(
    frame_size: usize,
    chunk: &[u8],
    frame_count: usize,
    cancel: &StopToken,
    mut commit: F,
) -> usize
where
    F: FnMut(&[u8], usize) -> Result<usize, TransferError>,
{
    let mut to_write = frame_count;

    while to_write > 0 {
        let offset = (frame_count - to_write) * frame_size;
        let end = offset + to_write * frame_size;
        match commit(&chunk[offset..end], to_write) {
            Ok(n) => to_write -= n.min(to_write),
            Err(e) if e.is_transient() => {
                if !cancel.is_running() {
                    break;
                }
            }
            Err(e) => {
                tracing::warn!(remaining = to_write, "cannot write to playback stream: {e}");
                break;
            }
        }
    }

    to_write
}

/// Raw PCM file (or any reader) as a source.
pub struct FileSource<R> {
    reader: R,
    frame_size: usize,
}

impl FileSource<BufReader<File>> {
    pub fn open(path: &Path, frame_size: usize) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("open {:?}", path))?;
        Ok(Self::new(BufReader::new(file), frame_size))
    }
}

impl<R: Read> FileSource<R> {
    /// Wrap a reader already positioned at the first sample byte.
    pub fn new(reader: R, frame_size: usize) -> Self {
        Self {
            reader,
            frame_size: frame_size.max(1),
        }
    }
}

impl<R: Read> Source for FileSource<R> {
    fn frame_size(&self) -> usize {
        self.frame_size
    }

    fn is_live(&self) -> bool {
        false
    }

    fn pull_chunk(&mut self, chunk: &mut [u8], frame_count: usize) -> Pulled {
        let want = frame_count * self.frame_size;
        let (filled, failed) = read_full(&mut self.reader, &mut chunk[..want]);
        let frames = filled / self.frame_size;

        let end = if failed {
            ChunkEnd::Aborted
        } else if frames < frame_count {
            ChunkEnd::EndOfStream
        } else {
            ChunkEnd::More
        };
        Pulled { frames, end }
    }
}

/// Read until `buf` is full or EOF. Returns bytes read and whether an I/O error stopped it.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> (usize, bool) {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::warn!(read = filled, "file read failed: {e}");
                return (filled, true);
            }
        }
    }
    (filled, false)
}

/// Raw PCM file (or any writer) as a sink.
pub struct FileSink<W> {
    writer: W,
    frame_size: usize,
}

impl FileSink<BufWriter<File>> {
    pub fn create(path: &Path, frame_size: usize) -> Result<Self> {
        let file = File::create(path).with_context(|| format!("create {:?}", path))?;
        Ok(Self::new(BufWriter::new(file), frame_size))
    }
}

impl<W: Write> FileSink<W> {
    pub fn new(writer: W, frame_size: usize) -> Self {
        Self {
            writer,
            frame_size: frame_size.max(1),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> Sink for FileSink<W> {
    fn frame_size(&self) -> usize {
        self.frame_size
    }

    fn push_chunk(&mut self, chunk: &[u8], frame_count: usize) -> usize {
        let bytes = &chunk[..frame_count * self.frame_size];
        match self.writer.write_all(bytes).and_then(|_| self.writer.flush()) {
            Ok(()) => 0,
            Err(e) => {
                tracing::warn!(frames = frame_count, "file write failed: {e}");
                frame_count
            }
        }
    }

    fn stop(&mut self) {
        if let Err(e) = self.writer.flush() {
            tracing::warn!("file flush failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::other("disk gone"))
        }
    }

    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::other("disk full"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn file_source_reads_full_chunks_then_reports_eof() {
        let data: Vec<u8> = (0..20).collect();
        let mut src = FileSource::new(Cursor::new(data), 4);
        let mut chunk = vec![0u8; 12];

        let first = src.pull_chunk(&mut chunk, 3);
        assert_eq!(first, Pulled { frames: 3, end: ChunkEnd::More });
        assert_eq!(&chunk[..12], &(0..12).collect::<Vec<u8>>()[..]);

        let second = src.pull_chunk(&mut chunk, 3);
        assert_eq!(second, Pulled { frames: 2, end: ChunkEnd::EndOfStream });
        assert_eq!(&chunk[..8], &(12..20).collect::<Vec<u8>>()[..]);
    }

    #[test]
    fn file_source_discards_trailing_partial_frame() {
        let mut src = FileSource::new(Cursor::new(vec![1u8; 7]), 4);
        let mut chunk = vec![0u8; 16];
        let pulled = src.pull_chunk(&mut chunk, 4);
        assert_eq!(pulled, Pulled { frames: 1, end: ChunkEnd::EndOfStream });
    }

    #[test]
    fn file_source_reports_io_error_as_abort() {
        let mut src = FileSource::new(FailingReader, 2);
        let mut chunk = vec![0u8; 8];
        assert_eq!(src.pull_chunk(&mut chunk, 4).end, ChunkEnd::Aborted);
        assert!(!src.is_live());
    }

    #[test]
    fn file_sink_writes_only_requested_frames() {
        let mut sink = FileSink::new(Vec::new(), 2);
        assert_eq!(sink.push_chunk(&[1, 2, 3, 4, 5, 6], 2), 0);
        sink.stop();
        assert_eq!(sink.into_inner(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn file_sink_reports_all_frames_unwritten_on_error() {
        let mut sink = FileSink::new(FailingWriter, 2);
        assert_eq!(sink.push_chunk(&[0; 8], 4), 4);
    }

    #[test]
    fn pull_live_retries_transient_failures() {
        let cancel = StopToken::new();
        let mut script = vec![
            Err(TransferError::TimedOut),
            Ok(2),
            Err(TransferError::WouldBlock),
            Ok(3),
        ]
        .into_iter();
        let mut chunk = vec![0u8; 10];

        let pulled = pull_live(2, &mut chunk, 5, &cancel, |dst, max| {
            let r = script.next().unwrap_or(Err(TransferError::TimedOut));
            if let Ok(n) = r {
                assert!(n <= max);
                dst[..n * 2].fill(n as u8);
            }
            r
        });

        assert_eq!(pulled, Pulled { frames: 5, end: ChunkEnd::More });
        assert_eq!(chunk, vec![2, 2, 2, 2, 3, 3, 3, 3, 3, 3]);
    }

    #[test]
    fn pull_live_returns_partial_count_on_fatal_failure() {
        let cancel = StopToken::new();
        let mut script = vec![Ok(1), Err(TransferError::Failed("xrun".into()))].into_iter();
        let mut chunk = vec![0u8; 8];

        let pulled = pull_live(2, &mut chunk, 4, &cancel, |_, _| {
            script.next().unwrap_or(Ok(0))
        });
        assert_eq!(pulled, Pulled { frames: 1, end: ChunkEnd::Aborted });
    }

    #[test]
    fn pull_live_gives_up_on_timeout_once_cancelled() {
        let cancel = StopToken::new();
        cancel.stop();
        let mut chunk = vec![0u8; 8];
        let pulled = pull_live(2, &mut chunk, 4, &cancel, |_, _| Err(TransferError::TimedOut));
        assert_eq!(pulled, Pulled { frames: 0, end: ChunkEnd::More });
    }

    #[test]
    fn push_live_offsets_each_commit() {
        let cancel = StopToken::new();
        let mut seen = Vec::new();
        let chunk: Vec<u8> = (0..8).collect();

        let remaining = push_live(2, &chunk, 4, &cancel, |src, max| {
            seen.push(src[0]);
            Ok(max.min(3))
        });

        assert_eq!(remaining, 0);
        assert_eq!(seen, vec![0, 6]);
    }

    #[test]
    fn push_live_reports_remaining_on_fatal_failure() {
        let cancel = StopToken::new();
        let mut calls = 0;
        let remaining = push_live(1, &[0; 6], 6, &cancel, |_, _| {
            calls += 1;
            if calls == 1 {
                Ok(2)
            } else {
                Err(TransferError::Failed("closed".into()))
            }
        });
        assert_eq!(remaining, 4);
    }
}
