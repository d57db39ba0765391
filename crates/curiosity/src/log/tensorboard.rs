//! TensorBoard logging backend.

use super::MetricLogger;
use std::path::Path;
use std::sync::Mutex;
use tensorboard_rs::summary_writer::SummaryWriter;

/// Writes TensorBoard event files.
pub struct TensorBoardLogger {
    writer: Mutex<SummaryWriter>,
}

impl TensorBoardLogger {
    pub fn new(log_dir: impl AsRef<Path>) -> Self {
        Self {
            writer: Mutex::new(SummaryWriter::new(log_dir.as_ref())),
        }
    }
}

impl MetricLogger for TensorBoardLogger {
    fn log_scalar(&self, name: &str, value: f64, step: u64) {
        if let Ok(mut writer) = self.writer.lock() {
            writer.add_scalar(name, value as f32, step as usize);
            let _ = writer.flush();
        }
    }

    fn log_metrics(&self, metrics: &[(&str, f64)], step: u64) {
        if let Ok(mut writer) = self.writer.lock() {
            for (name, value) in metrics {
                writer.add_scalar(name, *value as f32, step as usize);
            }
            let _ = writer.flush();
        }
    }

    fn close(&self) {
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writer.flush();
        }
    }
}

#[cfg(all(test, feature = "tensorboard"))]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_writes_event_file() {
        let dir = tempdir().unwrap();
        let logger = TensorBoardLogger::new(dir.path());
        logger.log_metrics(&[("score", 1.5), ("agent_loss", 0.2)], 10);
        logger.log_scalar("epsilon", 0.9, 20);
        logger.close();

        let files: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains("tfevents"))
            .collect();
        assert!(!files.is_empty());
        assert!(files[0].metadata().unwrap().len() > 0);
    }
}
