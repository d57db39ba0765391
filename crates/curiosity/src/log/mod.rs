//! Metric reporting.
//!
//! Training emits a `TrainMetrics` summary at a fixed interval; any
//! `MetricLogger` backend can consume it:
//! - `ConsoleLogger` writes through `tracing`
//! - `MemoryLogger` keeps the full history and exports it as JSON
//! - `TensorBoardLogger` writes event files (optional)
//! - `CompositeLogger` fans out to several backends

mod console;
mod logger;
mod memory;
mod metrics;
#[cfg(feature = "tensorboard")]
mod tensorboard;

pub use console::ConsoleLogger;
pub use logger::{CompositeLogger, MetricLogger, NoOpLogger};
pub use memory::MemoryLogger;
pub use metrics::{MetricsTracker, TrainMetrics, LOSS_WINDOW, SCORE_WINDOW};
#[cfg(feature = "tensorboard")]
pub use tensorboard::TensorBoardLogger;
