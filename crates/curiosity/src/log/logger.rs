//! Metric logger trait and composites.

/// A sink for scalar training metrics.
pub trait MetricLogger: Send + Sync {
    /// Log one scalar.
    fn log_scalar(&self, name: &str, value: f64, step: u64);

    /// Log a group of scalars sharing one step.
    fn log_metrics(&self, metrics: &[(&str, f64)], step: u64) {
        for (name, value) in metrics {
            self.log_scalar(name, *value, step);
        }
    }

    /// Flush pending writes.
    fn close(&self) {}
}

/// Discards everything.
pub struct NoOpLogger;

impl MetricLogger for NoOpLogger {
    fn log_scalar(&self, _name: &str, _value: f64, _step: u64) {}
}

/// Dispatches to multiple backends.
#[derive(Default)]
pub struct CompositeLogger {
    loggers: Vec<Box<dyn MetricLogger>>,
}

impl CompositeLogger {
    pub fn new(loggers: Vec<Box<dyn MetricLogger>>) -> Self {
        Self { loggers }
    }

    pub fn add(&mut self, logger: Box<dyn MetricLogger>) {
        self.loggers.push(logger);
    }

    pub fn len(&self) -> usize {
        self.loggers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loggers.is_empty()
    }
}

impl MetricLogger for CompositeLogger {
    fn log_scalar(&self, name: &str, value: f64, step: u64) {
        for logger in &self.loggers {
            logger.log_scalar(name, value, step);
        }
    }

    fn log_metrics(&self, metrics: &[(&str, f64)], step: u64) {
        for logger in &self.loggers {
            logger.log_metrics(metrics, step);
        }
    }

    fn close(&self) {
        for logger in &self.loggers {
            logger.close();
        }
    }
}

/// Shared handles log into the same backend
impl<L: MetricLogger + ?Sized> MetricLogger for std::sync::Arc<L> {
    fn log_scalar(&self, name: &str, value: f64, step: u64) {
        (**self).log_scalar(name, value, step)
    }

    fn log_metrics(&self, metrics: &[(&str, f64)], step: u64) {
        (**self).log_metrics(metrics, step)
    }

    fn close(&self) {
        (**self).close()
    }
}
