//! Frame-rate bookkeeping for the live detection loop.
//!
//! [`FpsWindow`] keeps a bounded FIFO of instantaneous frame-rate samples and
//! exposes the rolling average the worker paces against. [`FpsReporter`] rates
//! how often the average is logged so steady-state runs stay quiet.

use std::{
    collections::VecDeque,
    time::{Duration, Instant},
};

/// Fixed-capacity window of instantaneous frame-rate samples.
///
/// When the window is full the oldest sample is evicted before the new one is
/// recorded, so the average always reflects the most recent cycles.
#[derive(Debug, Clone)]
pub struct FpsWindow {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl FpsWindow {
    /// Create a window holding at most `capacity` samples. A zero capacity is
    /// bumped to one so the window always retains the latest sample.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Record one instantaneous frame-rate sample, evicting the oldest entry
    /// when the window is already full.
    pub fn record(&mut self, fps: f64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(fps);
    }

    /// Rolling average over the retained samples, or `0.0` when no samples
    /// have been recorded yet.
    pub fn average(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for FpsWindow {
    fn default() -> Self {
        Self::new(30)
    }
}

/// Tracks when the next periodic frame-rate report is due.
#[derive(Debug)]
pub struct FpsReporter {
    interval: Duration,
    last: Instant,
}

impl FpsReporter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Instant::now(),
        }
    }

    /// Returns `true` once per interval, resetting the countdown when it does.
    pub fn due(&mut self) -> bool {
        if self.last.elapsed() >= self.interval {
            self.last = Instant::now();
            true
        } else {
            false
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}
