//! Cooperative stop flag shared between a component and its worker thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::constants::STOP_CHECK_INTERVAL;

/// Cloneable running flag checked once per worker loop iteration.
///
/// Starts in the running state; [`stop`](Self::stop) is sticky.
#[derive(Debug, Clone)]
pub struct StopFlag {
    running: Arc<AtomicBool>,
}

impl StopFlag {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Sleep for `duration` in short slices, returning early on stop.
    ///
    /// Returns whether the flag is still running afterwards.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        while self.is_running() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep((deadline - now).min(STOP_CHECK_INTERVAL));
        }
        self.is_running()
    }
}

impl Default for StopFlag {
    fn default() -> Self {
        Self::new()
    }
}
