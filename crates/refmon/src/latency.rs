//! Transition latency instrumentation.
//!
//! One sample per completed transition: milliseconds between the state
//! change being observed and the replacement process being launched.
//! Samples live in a bounded ring; the oldest is evicted on overflow.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Instant;

use serde::Serialize;

pub const DEFAULT_CAPACITY: usize = 1000;

/// Summary over the current ring contents. All fields are zero when the ring
/// is empty; `std_dev` is the sample standard deviation and zero for fewer
/// than two samples.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Statistics {
    pub count: usize,
    pub latest_ms: f64,
    pub mean_ms: f64,
    pub median_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub std_dev_ms: f64,
}

/// Bounded ring of latency samples with its own lock. Read and append are
/// mutually exclusive; statistics are computed over a copied snapshot.
#[derive(Debug)]
pub struct LatencyTracker {
    samples: Mutex<VecDeque<f64>>,
    capacity: usize,
}

impl LatencyTracker {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity: capacity.max(1),
        }
    }

    /// Record one transition: `launched_at - observed_at` in milliseconds.
    pub fn record(&self, observed_at: Instant, launched_at: Instant) {
        let latency_ms =
            launched_at.saturating_duration_since(observed_at).as_secs_f64() * 1000.0;
        self.push(latency_ms);
    }

    pub fn push(&self, latency_ms: f64) {
        let mut samples = self.lock();
        if samples.len() == self.capacity {
            samples.pop_front();
        }
        samples.push_back(latency_ms);
    }

    pub fn statistics(&self) -> Statistics {
        let snapshot: Vec<f64> = self.lock().iter().copied().collect();
        if snapshot.is_empty() {
            return Statistics::default();
        }

        let count = snapshot.len();
        let latest_ms = snapshot[count - 1];
        let mean_ms = snapshot.iter().sum::<f64>() / count as f64;

        let mut sorted = snapshot.clone();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let median_ms = if count % 2 == 1 {
            sorted[count / 2]
        } else {
            (sorted[count / 2 - 1] + sorted[count / 2]) / 2.0
        };

        let std_dev_ms = if count > 1 {
            let variance = snapshot
                .iter()
                .map(|s| (s - mean_ms).powi(2))
                .sum::<f64>()
                / (count - 1) as f64;
            variance.sqrt()
        } else {
            0.0
        };

        Statistics {
            count,
            latest_ms,
            mean_ms,
            median_ms,
            min_ms: sorted[0],
            max_ms: sorted[count - 1],
            std_dev_ms,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<f64>> {
        match self.samples.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for LatencyTracker {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
