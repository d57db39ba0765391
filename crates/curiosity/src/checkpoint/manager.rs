//! Step-indexed checkpoint files with rotation and best-score tracking.

use super::state::Checkpointable;
use crate::config::TrainConfig;
use crate::Result;
use std::fs;
use std::path::{Path, PathBuf};

const PREFIX: &str = "checkpoint_step_";
const EXTENSION: &str = ".bin";
const BEST: &str = "checkpoint_best.bin";

/// Where and how often checkpoints are written.
#[derive(Clone, Debug)]
pub struct CheckpointConfig {
    pub checkpoint_dir: PathBuf,
    /// Save every N training steps (0 disables periodic saves)
    pub save_every: u64,
    /// Keep only the newest N checkpoints (0 keeps all)
    pub keep_last: usize,
    /// Copy the best-scoring checkpoint to `checkpoint_best.bin`
    pub save_best: bool,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            checkpoint_dir: PathBuf::from("checkpoints"),
            save_every: 10_000,
            keep_last: 5,
            save_best: true,
        }
    }
}

impl CheckpointConfig {
    pub fn new(checkpoint_dir: impl Into<PathBuf>) -> Self {
        Self {
            checkpoint_dir: checkpoint_dir.into(),
            ..Default::default()
        }
    }

    /// Checkpoint settings of a training run
    pub fn from_train_config(config: &TrainConfig) -> Self {
        Self {
            checkpoint_dir: config.checkpoint_dir.clone(),
            save_every: config.checkpoint_interval,
            keep_last: config.keep_last,
            save_best: true,
        }
    }

    pub fn save_every(mut self, steps: u64) -> Self {
        self.save_every = steps;
        self
    }

    pub fn keep_last(mut self, n: usize) -> Self {
        self.keep_last = n;
        self
    }

    pub fn save_best(mut self, enabled: bool) -> Self {
        self.save_best = enabled;
        self
    }
}

/// Writes, rotates and restores checkpoint files.
///
/// ```ignore
/// let mut manager = CheckpointManager::new(CheckpointConfig::new("./ckpt").save_every(1000))?;
/// manager.maybe_save(&bundle, step, score)?;
/// let resumed = manager.load_latest(&mut bundle)?;
/// ```
pub struct CheckpointManager {
    config: CheckpointConfig,
    best_score: f64,
    last_saved: Option<u64>,
}

impl CheckpointManager {
    /// Create the manager and its directory
    pub fn new(config: CheckpointConfig) -> Result<Self> {
        fs::create_dir_all(&config.checkpoint_dir)?;
        Ok(Self {
            config,
            best_score: f64::NEG_INFINITY,
            last_saved: None,
        })
    }

    pub fn checkpoint_dir(&self) -> &Path {
        &self.config.checkpoint_dir
    }

    /// Step of the most recent `save` made by this manager
    pub fn last_saved(&self) -> Option<u64> {
        self.last_saved
    }

    /// Whether `step` lands on the configured interval
    pub fn is_due(&self, step: u64) -> bool {
        self.config.save_every > 0 && step > 0 && step % self.config.save_every == 0
    }

    /// Best score seen by `save`, if any
    pub fn best_score(&self) -> Option<f64> {
        self.best_score.is_finite().then_some(self.best_score)
    }

    /// File name used for a given step
    pub fn path_for_step(&self, step: u64) -> PathBuf {
        self.config
            .checkpoint_dir
            .join(format!("{}{:08}{}", PREFIX, step, EXTENSION))
    }

    /// Save when `step` lands on the configured interval.
    pub fn maybe_save<T: Checkpointable>(
        &mut self,
        component: &T,
        step: u64,
        score: f64,
    ) -> Result<Option<PathBuf>> {
        if !self.is_due(step) {
            return Ok(None);
        }
        self.save(component, step, score).map(Some)
    }

    /// Save unconditionally.
    pub fn save<T: Checkpointable>(
        &mut self,
        component: &T,
        step: u64,
        score: f64,
    ) -> Result<PathBuf> {
        let data = component.save_state()?;
        let path = self.path_for_step(step);
        fs::write(&path, &data)?;
        tracing::info!(path = %path.display(), step, bytes = data.len(), "saved checkpoint");
        self.last_saved = Some(step);

        if self.config.save_best && score > self.best_score {
            self.best_score = score;
            fs::copy(&path, self.config.checkpoint_dir.join(BEST))?;
            tracing::info!(score, step, "new best checkpoint");
        }

        if self.config.keep_last > 0 {
            self.rotate()?;
        }
        Ok(path)
    }

    /// Restore the newest checkpoint; returns its step.
    pub fn load_latest<T: Checkpointable>(&self, component: &mut T) -> Result<Option<u64>> {
        let Some(path) = self.list_checkpoints()?.pop() else {
            return Ok(None);
        };
        self.load_from_path(component, &path)?;
        Ok(step_from_path(&path))
    }

    /// Restore `checkpoint_best.bin`; false if there is none.
    pub fn load_best<T: Checkpointable>(&self, component: &mut T) -> Result<bool> {
        let path = self.config.checkpoint_dir.join(BEST);
        if !path.exists() {
            return Ok(false);
        }
        self.load_from_path(component, &path)?;
        Ok(true)
    }

    pub fn load_from_path<T: Checkpointable>(
        &self,
        component: &mut T,
        path: impl AsRef<Path>,
    ) -> Result<()> {
        let data = fs::read(path.as_ref())?;
        component.load_state(&data)?;
        tracing::info!(path = %path.as_ref().display(), "loaded checkpoint");
        Ok(())
    }

    /// Step checkpoints in ascending step order.
    pub fn list_checkpoints(&self) -> Result<Vec<PathBuf>> {
        let entries = match fs::read_dir(&self.config.checkpoint_dir) {
            Ok(e) => e,
            Err(_) => return Ok(Vec::new()),
        };

        let mut checkpoints: Vec<(u64, PathBuf)> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter_map(|p| step_from_path(&p).map(|step| (step, p)))
            .collect();
        checkpoints.sort_by_key(|(step, _)| *step);
        Ok(checkpoints.into_iter().map(|(_, p)| p).collect())
    }

    fn rotate(&self) -> Result<()> {
        let checkpoints = self.list_checkpoints()?;
        let excess = checkpoints.len().saturating_sub(self.config.keep_last);
        for old in &checkpoints[..excess] {
            match fs::remove_file(old) {
                Ok(()) => tracing::debug!(path = %old.display(), "removed old checkpoint"),
                Err(e) => tracing::warn!(path = %old.display(), "failed to remove checkpoint: {}", e),
            }
        }
        Ok(())
    }
}

/// Parse the step out of `checkpoint_step_XXXXXXXX.bin`
fn step_from_path(path: &Path) -> Option<u64> {
    path.file_name()?
        .to_str()?
        .strip_prefix(PREFIX)?
        .strip_suffix(EXTENSION)?
        .parse()
        .ok()
}
