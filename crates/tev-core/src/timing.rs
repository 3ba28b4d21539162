//! Wall-clock timing for solve-time reporting.

use std::time::Instant;

/// A simple timer that measures elapsed wall-clock time.
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Create and start a new timer.
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Elapsed time in seconds since the timer started.
    pub fn elapsed_seconds(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}
