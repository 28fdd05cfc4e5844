//! Bounded PCM byte queue between device callbacks and the session thread.
//!
//! [`PcmQueue`] is the handoff for both live directions:
//! - capture callback → queue → session thread (`obtain_read`)
//! - session thread (`commit_write`) → queue → playback callback
//!
//! Callbacks only use the non-blocking side. The session thread uses the
//! blocking-with-timeout side so it can give up and re-check its stop token.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;

use crate::error::TransferError;

/// Thread-safe bounded queue of whole interleaved PCM frames.
///
/// ## Design
/// - Bounded by `capacity_bytes` (rounded down to whole frames, at least one frame).
/// - A single [`Condvar`] signals every state change.
/// - `closed` and `failure` live under the same mutex as the data.
///
/// Only whole frames are ever stored, so readers never see a torn frame.
pub struct PcmQueue {
    frame_size: usize,
    capacity_bytes: usize,
    inner: Mutex<QueueInner>,
    cv: Condvar,
    dropped_frames: AtomicU64,
    underrun_frames: AtomicU64,
}

struct QueueInner {
    data: VecDeque<u8>,
    closed: bool,
    failure: Option<String>,
}

/// Compute a queue capacity in **bytes** for a `(rate, frame_size, seconds)` target.
///
/// - If `seconds` is non-finite or `<= 0.0`, one second is used.
/// - The returned value is `ceil(rate_hz * seconds) * frame_size` (saturating).
pub fn calc_capacity_bytes(rate_hz: u32, frame_size: usize, seconds: f32) -> usize {
    let secs = if seconds.is_finite() && seconds > 0.0 {
        seconds
    } else {
        1.0
    };

    let frames = (rate_hz as f32 * secs).ceil() as usize;
    frames.saturating_mul(frame_size)
}

impl PcmQueue {
    pub fn new(frame_size: usize, capacity_bytes: usize) -> Self {
        let frame_size = frame_size.max(1);
        let capacity_bytes = (capacity_bytes / frame_size).max(1) * frame_size;
        Self {
            frame_size,
            capacity_bytes,
            inner: Mutex::new(QueueInner {
                data: VecDeque::with_capacity(capacity_bytes),
                closed: false,
                failure: None,
            }),
            cv: Condvar::new(),
            dropped_frames: AtomicU64::new(0),
            underrun_frames: AtomicU64::new(0),
        }
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn capacity_frames(&self) -> usize {
        self.capacity_bytes / self.frame_size
    }

    /// Current buffered frames (best-effort snapshot).
    pub fn len_frames(&self) -> usize {
        self.lock().data.len() / self.frame_size
    }

    /// Frames the capture side had to discard because the queue was full.
    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames.load(Ordering::Relaxed)
    }

    /// Frames the playback side filled with silence.
    pub fn underrun_frames(&self) -> u64 {
        self.underrun_frames.load(Ordering::Relaxed)
    }

    pub fn note_underrun(&self, frames: usize) {
        self.underrun_frames
            .fetch_add(frames as u64, Ordering::Relaxed);
    }

    /// Stop accepting writes and wake all waiters. Buffered frames stay readable.
    ///
    /// Idempotent.
    pub fn close(&self) {
        let mut g = self.lock();
        g.closed = true;
        drop(g);
        self.cv.notify_all();
    }

    /// Record a fatal stream error. Subsequent obtain/commit calls fail with it.
    pub fn fail(&self, reason: impl Into<String>) {
        let mut g = self.lock();
        if g.failure.is_none() {
            g.failure = Some(reason.into());
        }
        drop(g);
        self.cv.notify_all();
    }

    /// Append as many whole frames of `bytes` as fit, without blocking.
    ///
    /// Frames that do not fit are dropped and counted. Returns frames accepted.
    pub fn push_nonblocking(&self, bytes: &[u8]) -> usize {
        let offered = bytes.len() / self.frame_size;
        let mut g = self.lock();
        if g.closed {
            return 0;
        }

        let free = (self.capacity_bytes - g.data.len()) / self.frame_size;
        let take = offered.min(free);
        g.data.extend(&bytes[..take * self.frame_size]);
        drop(g);

        if take < offered {
            self.dropped_frames
                .fetch_add((offered - take) as u64, Ordering::Relaxed);
        }
        if take > 0 {
            self.cv.notify_all();
        }
        take
    }

    /// Move up to `dst.len()` bytes worth of whole frames into `dst`, without blocking.
    ///
    /// Returns frames copied (zero when the queue is empty).
    pub fn pop_nonblocking(&self, dst: &mut [u8]) -> usize {
        let mut g = self.lock();
        let available = g.data.len() / self.frame_size;
        let take = available.min(dst.len() / self.frame_size);
        if take == 0 {
            return 0;
        }

        let n = take * self.frame_size;
        for (d, s) in dst[..n].iter_mut().zip(g.data.drain(..n)) {
            *d = s;
        }
        drop(g);
        self.cv.notify_all();
        take
    }

    /// Obtain up to `max_frames` captured frames into `dst`, waiting at most `timeout`.
    ///
    /// - `Ok(n)` with `n >= 1` when data was delivered.
    /// - [`TransferError::TimedOut`] when nothing arrived in time.
    /// - [`TransferError::Failed`] after a stream error, or once closed and drained.
    pub fn obtain_read(
        &self,
        dst: &mut [u8],
        max_frames: usize,
        timeout: Duration,
    ) -> Result<usize, TransferError> {
        let want = max_frames.min(dst.len() / self.frame_size);
        if want == 0 {
            return Err(TransferError::WouldBlock);
        }

        let g = self.lock();
        let (mut g, _) = self
            .cv
            .wait_timeout_while(g, timeout, |inner| {
                inner.data.len() < self.frame_size && !inner.closed && inner.failure.is_none()
            })
            .unwrap_or_else(|e| e.into_inner());

        if let Some(reason) = &g.failure {
            return Err(TransferError::Failed(reason.clone()));
        }

        let available = g.data.len() / self.frame_size;
        if available == 0 {
            return if g.closed {
                Err(TransferError::Failed("stream closed".to_string()))
            } else {
                Err(TransferError::TimedOut)
            };
        }

        let take = available.min(want);
        let n = take * self.frame_size;
        for (d, s) in dst[..n].iter_mut().zip(g.data.drain(..n)) {
            *d = s;
        }
        drop(g);
        self.cv.notify_all();
        Ok(take)
    }

    /// Commit up to `max_frames` frames from `src`, waiting at most `timeout` for space.
    ///
    /// Returns frames accepted (`>= 1`), [`TransferError::TimedOut`] when the queue
    /// stayed full, or [`TransferError::Failed`] after a stream error or close.
    pub fn commit_write(
        &self,
        src: &[u8],
        max_frames: usize,
        timeout: Duration,
    ) -> Result<usize, TransferError> {
        let offered = max_frames.min(src.len() / self.frame_size);
        if offered == 0 {
            return Err(TransferError::WouldBlock);
        }

        let g = self.lock();
        let (mut g, _) = self
            .cv
            .wait_timeout_while(g, timeout, |inner| {
                self.capacity_bytes - inner.data.len() < self.frame_size
                    && !inner.closed
                    && inner.failure.is_none()
            })
            .unwrap_or_else(|e| e.into_inner());

        if let Some(reason) = &g.failure {
            return Err(TransferError::Failed(reason.clone()));
        }
        if g.closed {
            return Err(TransferError::Failed("stream closed".to_string()));
        }

        let free = (self.capacity_bytes - g.data.len()) / self.frame_size;
        if free == 0 {
            return Err(TransferError::TimedOut);
        }

        let take = free.min(offered);
        g.data.extend(&src[..take * self.frame_size]);
        drop(g);
        self.cv.notify_all();
        Ok(take)
    }

    /// Block until the queue is empty, a failure is recorded, or `timeout` elapses.
    ///
    /// Returns `true` if the queue drained.
    pub fn wait_drained(&self, timeout: Duration) -> bool {
        let g = self.lock();
        let (g, _) = self
            .cv
            .wait_timeout_while(g, timeout, |inner| {
                !inner.data.is_empty() && inner.failure.is_none()
            })
            .unwrap_or_else(|e| e.into_inner());
        g.data.is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, QueueInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
