use std::time::Duration;

/// Session tuning parameters shared by the copy loop and the device endpoints.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Chunks per second of source audio (`rate / chunk_divisor` frames per chunk).
    pub chunk_divisor: u32,
    /// How long one device obtain/commit waits before reporting a timeout.
    pub obtain_timeout: Duration,
    /// Device queue capacity in seconds.
    pub queue_seconds: f32,
    /// Upper bound on waiting for queued playback audio when a sink stops.
    pub drain_timeout: Duration,
}

impl SessionConfig {
    /// Frames per transfer chunk for a source running at `sample_rate`.
    pub fn chunk_frames(&self, sample_rate: u32) -> usize {
        (sample_rate / self.chunk_divisor.max(1)).max(1) as usize
    }
}

impl Default for SessionConfig {
    /// One-tenth-second chunks and short obtain timeouts so stop requests are seen quickly.
    fn default() -> Self {
        Self {
            chunk_divisor: 10,
            obtain_timeout: Duration::from_millis(20),
            queue_seconds: 1.0,
            drain_timeout: Duration::from_secs(2),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_frames_is_a_tenth_of_a_second_by_default() {
        let cfg = SessionConfig::default();
        assert_eq!(cfg.chunk_frames(44_100), 4_410);
        assert_eq!(cfg.chunk_frames(48_000), 4_800);
    }

    #[test]
    fn chunk_frames_never_drops_to_zero() {
        let cfg = SessionConfig {
            chunk_divisor: 0,
            ..SessionConfig::default()
        };
        assert_eq!(cfg.chunk_frames(8_000), 8_000);
        assert_eq!(SessionConfig::default().chunk_frames(5), 1);
    }
}
