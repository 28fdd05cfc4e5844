//! Cooperative stop signal for a streaming session.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared "session still running" flag.
///
/// Created running; cleared once by end-of-stream or an external stop request.
/// The copy loop only looks at it between chunks.
#[derive(Clone, Debug)]
pub struct StopToken {
    running: Arc<AtomicBool>,
}

impl StopToken {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Clear the flag. Returns `true` if this call is the one that stopped the session.
    pub fn stop(&self) -> bool {
        self.running.swap(false, Ordering::Relaxed)
    }
}

impl Default for StopToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_running_and_stops_once() {
        let token = StopToken::new();
        assert!(token.is_running());
        assert!(token.stop());
        assert!(!token.is_running());
        assert!(!token.stop());
    }

    #[test]
    fn clones_share_state() {
        let token = StopToken::new();
        let other = token.clone();
        other.stop();
        assert!(!token.is_running());
    }
}
