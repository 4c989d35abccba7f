use event::Metric;
use parking_lot::Mutex;

use crate::Error;

/// The destination of a collection cycle.
///
/// Metrics and errors are added from concurrently running tasks, so
/// implementations must be safe to share between threads.
pub trait Accumulator: Send + Sync + 'static {
    fn add_metric(&self, metric: Metric);

    fn add_error(&self, err: Error);
}

/// Keeps everything it received in memory.
#[derive(Debug, Default)]
pub struct MemoryAccumulator {
    metrics: Mutex<Vec<Metric>>,
    errors: Mutex<Vec<String>>,
}

impl MemoryAccumulator {
    pub fn metrics(&self) -> Vec<Metric> {
        self.metrics.lock().clone()
    }

    /// Rendered messages of the recorded errors.
    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().clone()
    }

    /// Drains the stored metrics and errors.
    pub fn take(&self) -> (Vec<Metric>, Vec<String>) {
        let metrics = std::mem::take(&mut *self.metrics.lock());
        let errors = std::mem::take(&mut *self.errors.lock());

        (metrics, errors)
    }
}

impl Accumulator for MemoryAccumulator {
    fn add_metric(&self, metric: Metric) {
        self.metrics.lock().push(metric);
    }

    fn add_error(&self, err: Error) {
        self.errors.lock().push(err.to_string());
    }
}
