//! # Update Timing
//!
//! Rolling statistics over recent update passes, used by the emitter and
//! the demo binary to report how fast a strategy runs.
//!
//! ## Usage
//!
//! ```rust
//! use fountain::performance::UpdateTimer;
//!
//! let mut timer = UpdateTimer::new();
//!
//! timer.begin_pass();
//! // ... run one update ...
//! timer.end_pass();
//!
//! println!("{:.2} ms", timer.metrics().avg_pass_ms);
//! ```

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Timing statistics over the current sample window
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateMetrics {
    /// Passes per second implied by the average pass time
    pub passes_per_second: f32,
    pub avg_pass_ms: f32,
    pub min_pass_ms: f32,
    pub max_pass_ms: f32,
    /// Total passes recorded since creation or the last reset
    pub total_passes: u64,
}

impl Default for UpdateMetrics {
    fn default() -> Self {
        Self {
            passes_per_second: 0.0,
            avg_pass_ms: 0.0,
            min_pass_ms: f32::MAX,
            max_pass_ms: 0.0,
            total_passes: 0,
        }
    }
}

/// Rolling window of update pass durations
#[derive(Debug, Clone)]
pub struct UpdateTimer {
    /// Ring buffer of recent pass times
    pass_times: VecDeque<Duration>,
    max_samples: usize,
    pass_start: Option<Instant>,
    current_metrics: UpdateMetrics,
}

impl UpdateTimer {
    /// Timer keeping the last 120 passes
    pub fn new() -> Self {
        Self::with_window(120)
    }

    pub fn with_window(max_samples: usize) -> Self {
        let max_samples = max_samples.max(1);
        Self {
            pass_times: VecDeque::with_capacity(max_samples),
            max_samples,
            pass_start: None,
            current_metrics: UpdateMetrics::default(),
        }
    }

    /// Mark the beginning of a pass
    pub fn begin_pass(&mut self) {
        self.pass_start = Some(Instant::now());
    }

    /// Mark the end of a pass; returns its duration if one was started
    pub fn end_pass(&mut self) -> Option<Duration> {
        let elapsed = self.pass_start.take()?.elapsed();
        self.record(elapsed);
        Some(elapsed)
    }

    /// Add a pass duration measured elsewhere
    pub fn record(&mut self, pass_time: Duration) {
        if self.pass_times.len() >= self.max_samples {
            self.pass_times.pop_front();
        }
        self.pass_times.push_back(pass_time);
        self.current_metrics.total_passes += 1;
        self.update_metrics();
    }

    fn update_metrics(&mut self) {
        if self.pass_times.is_empty() {
            return;
        }

        let total_time: Duration = self.pass_times.iter().sum();
        let avg_pass_ms = total_time.as_secs_f32() * 1000.0 / self.pass_times.len() as f32;

        self.current_metrics.avg_pass_ms = avg_pass_ms;
        self.current_metrics.passes_per_second = if avg_pass_ms > 0.0 {
            1000.0 / avg_pass_ms
        } else {
            0.0
        };

        if let (Some(min_time), Some(max_time)) =
            (self.pass_times.iter().min(), self.pass_times.iter().max())
        {
            self.current_metrics.min_pass_ms = min_time.as_secs_f32() * 1000.0;
            self.current_metrics.max_pass_ms = max_time.as_secs_f32() * 1000.0;
        }
    }

    /// Get current timing metrics
    pub fn metrics(&self) -> &UpdateMetrics {
        &self.current_metrics
    }

    /// Pass time history in milliseconds, oldest first
    pub fn history_ms(&self) -> Vec<f32> {
        self.pass_times
            .iter()
            .map(|duration| duration.as_secs_f32() * 1000.0)
            .collect()
    }

    /// Reset all metrics and history
    pub fn reset(&mut self) {
        self.pass_times.clear();
        self.current_metrics = UpdateMetrics::default();
        self.pass_start = None;
    }
}

impl Default for UpdateTimer {
    fn default() -> Self {
        Self::new()
    }
}
