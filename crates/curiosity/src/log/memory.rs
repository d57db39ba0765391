//! In-memory metric history.

use super::MetricLogger;
use crate::Result;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

/// Keeps every logged value as `(step, value)` pairs per metric name.
#[derive(Default)]
pub struct MemoryLogger {
    series: Mutex<BTreeMap<String, Vec<(u64, f64)>>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// History of one metric, oldest first
    pub fn series(&self, name: &str) -> Vec<(u64, f64)> {
        self.series
            .lock()
            .map(|s| s.get(name).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    /// Most recent value of one metric
    pub fn latest(&self, name: &str) -> Option<f64> {
        self.series
            .lock()
            .ok()?
            .get(name)?
            .last()
            .map(|(_, v)| *v)
    }

    /// Names of every metric seen so far
    pub fn names(&self) -> Vec<String> {
        self.series
            .lock()
            .map(|s| s.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// `{"name": [[step, value], ...], ...}`
    pub fn to_json(&self) -> Result<String> {
        let series = self.series.lock().map(|s| s.clone()).unwrap_or_default();
        Ok(serde_json::to_string_pretty(&series)?)
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

impl MetricLogger for MemoryLogger {
    fn log_scalar(&self, name: &str, value: f64, step: u64) {
        if let Ok(mut series) = self.series.lock() {
            series.entry(name.to_string()).or_default().push((step, value));
        }
    }
}
