mod pruner;
mod record_log;

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use crate::{
    error::{ControllerError, Result},
    router::TaskType,
};

pub use pruner::prune;
pub use record_log::{
    append_record, is_training_phase, AppendRecord, Metrics, OutcomeRecord, RecordLog,
    ResetCollectedData, TRAINING_PHASE_CYCLES,
};

pub const COLLECTED_DATA_DIR: &str = "collected_data";
pub const TRAINED_MODELS_DIR: &str = "trained_models";
pub const OVERALL_LOG_FILE: &str = "overall_adaptation_options.json";

/// Removed from `collected_data/` when a comparison run restarts.
pub const COLLECTED_DATA_EXTENSIONS: &[&str] = &[".json", ".txt"];
/// Removed from `trained_models/<task>/` when a training run restarts.
pub const MODEL_EXTENSIONS: &[&str] = &[".pkl"];

const MODEL_FILE: &str = "model.pkl";

/// Handle on the on-disk layout, rooted at a configured directory.
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn collected_data_dir(&self) -> PathBuf {
        self.root.join(COLLECTED_DATA_DIR)
    }

    /// The aggregated comparison log.
    pub fn overall_log_path(&self) -> PathBuf {
        self.collected_data_dir().join(OVERALL_LOG_FILE)
    }

    pub fn models_dir(&self, task: TaskType) -> PathBuf {
        self.root.join(TRAINED_MODELS_DIR).join(task.as_str())
    }

    /// Where a task's learner keeps its state between cycles.
    pub fn model_path(&self, task: TaskType) -> PathBuf {
        self.models_dir(task).join(MODEL_FILE)
    }

    /// Creates `collected_data/` and one `trained_models/<task>/` per task.
    ///
    /// # Errors
    /// Returns an io error if any directory cannot be created.
    pub fn ensure_layout(&self) -> io::Result<()> {
        fs::create_dir_all(self.collected_data_dir())?;
        for task in TaskType::ALL {
            fs::create_dir_all(self.models_dir(task))?;
        }
        Ok(())
    }

    /// Clears the output of a previous comparison run.
    ///
    /// # Returns
    /// The number of removed files.
    pub fn reset_collected_data(&self) -> Result<usize> {
        let dir = self.collected_data_dir();
        prune(&dir, COLLECTED_DATA_EXTENSIONS)
            .map_err(|e| ControllerError::storage(format!("pruning {}", dir.display()), e))
    }

    /// Clears the serialized models of a single task.
    ///
    /// # Returns
    /// The number of removed files.
    pub fn reset_models(&self, task: TaskType) -> Result<usize> {
        let dir = self.models_dir(task);
        prune(&dir, MODEL_EXTENSIONS)
            .map_err(|e| ControllerError::storage(format!("pruning {}", dir.display()), e))
    }
}
