//! Operation metrics with bounded retention.
//!
//! [`MetricsCollector`] is an explicitly owned, injected component: the
//! router records one sample per dispatch, retention is a fixed-capacity
//! ring (oldest samples dropped beyond capacity), and the optional
//! periodic reporter has an explicit lifecycle — spawn it, keep the guard,
//! shut it down. Nothing here is process-global.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;

/// One recorded operation.
#[derive(Debug, Clone)]
pub struct OperationSample {
    pub model: String,
    pub operation: String,
    pub duration: Duration,
    pub success: bool,
}

/// Aggregates over the currently retained samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Samples currently retained.
    pub sampled: usize,
    /// Retained samples that failed.
    pub failures: usize,
    /// Mean duration across retained samples.
    pub average_duration: Duration,
}

/// Bounded ring buffer of operation samples.
pub struct MetricsCollector {
    capacity: usize,
    samples: Mutex<VecDeque<OperationSample>>,
}

impl MetricsCollector {
    /// Create a collector retaining at most `capacity` samples.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            samples: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Record a sample, evicting the oldest once capacity is reached.
    pub fn record(&self, sample: OperationSample) {
        let mut samples = self.samples.lock().unwrap_or_else(PoisonError::into_inner);
        if samples.len() == self.capacity {
            samples.pop_front();
        }
        samples.push_back(sample);
    }

    /// Number of retained samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Aggregate the retained samples.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let samples = self.samples.lock().unwrap_or_else(PoisonError::into_inner);
        let sampled = samples.len();
        let failures = samples.iter().filter(|sample| !sample.success).count();
        let total: Duration = samples.iter().map(|sample| sample.duration).sum();
        let average_duration = if sampled == 0 {
            Duration::ZERO
        } else {
            total / u32::try_from(sampled).unwrap_or(u32::MAX)
        };
        MetricsSnapshot {
            sampled,
            failures,
            average_duration,
        }
    }

    /// Start a periodic task logging a snapshot every `interval`.
    ///
    /// The returned guard owns the task: call [`ReporterGuard::shutdown`]
    /// (or drop the guard) to stop it. Must be called from within a tokio
    /// runtime.
    #[must_use]
    pub fn spawn_reporter(self: &Arc<Self>, interval: Duration) -> ReporterGuard {
        let collector = Arc::clone(self);
        let stop = Arc::new(Notify::new());
        let stop_signal = Arc::clone(&stop);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // interval fires immediately; swallow the first tick
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let snapshot = collector.snapshot();
                        tracing::info!(
                            sampled = snapshot.sampled,
                            failures = snapshot.failures,
                            avg_duration_ms = snapshot.average_duration.as_millis(),
                            "operation metrics"
                        );
                    }
                    () = stop_signal.notified() => break,
                }
            }
        });
        ReporterGuard {
            stop,
            task: Some(task),
        }
    }
}

/// Owns the periodic reporter task; stops it on shutdown or drop.
pub struct ReporterGuard {
    stop: Arc<Notify>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl ReporterGuard {
    /// Stop the reporter.
    pub fn shutdown(self) {
        drop(self);
    }
}

impl Drop for ReporterGuard {
    fn drop(&mut self) {
        self.stop.notify_one();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
