use std::thread;
use std::time::{Duration, Instant};

use crate::cancel::CancelToken;

/// Holds each frame for its delay, counted from the moment it was written,
/// and reports the achieved frame rate once per second.
pub struct Pacer {
    last_rate_report: Instant,
    frames: u32,
}

impl Pacer {
    pub fn new() -> Pacer {
        Pacer {
            last_rate_report: Instant::now(),
            frames: 0,
        }
    }

    /// Waits out `delay` after a frame written at `written_at`. Returns `false`
    /// if `cancel` fired during the wait.
    pub fn hold(&mut self, written_at: Instant, delay: Duration, cancel: &CancelToken) -> bool {
        self.update_rate();

        let remaining = delay.saturating_sub(written_at.elapsed());
        cancel.sleep(remaining)
    }

    fn update_rate(&mut self) {
        self.frames += 1;

        if self.last_rate_report.elapsed() > Duration::from_secs(1) {
            let cur_thread = thread::current();
            let thread_name = cur_thread.name().unwrap_or("unnamed");
            log::debug!("{} frames/s: {}", thread_name, self.frames);
            self.frames = 0;
            self.last_rate_report = Instant::now();
        }
    }
}

impl Default for Pacer {
    fn default() -> Self {
        Pacer::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn holds_for_the_remaining_delay() {
        let mut pacer = Pacer::new();
        let cancel = CancelToken::new();
        let written_at = Instant::now();
        assert!(pacer.hold(written_at, Duration::from_millis(30), &cancel));
        assert!(written_at.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn late_frames_do_not_wait() {
        let mut pacer = Pacer::new();
        let cancel = CancelToken::new();
        let written_at = Instant::now() - Duration::from_secs(1);
        let start = Instant::now();
        assert!(pacer.hold(written_at, Duration::from_millis(500), &cancel));
        assert!(start.elapsed() < Duration::from_millis(400));
    }

    #[test]
    fn cancelled_hold_returns_false() {
        let mut pacer = Pacer::new();
        let cancel = CancelToken::new();
        cancel.cancel();
        assert!(!pacer.hold(Instant::now(), Duration::from_secs(5), &cancel));
    }
}
