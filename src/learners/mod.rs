mod classifier;
mod error;
mod regressor;
mod store;

use std::sync::Arc;

use ndarray::Array2;
use serde_json::{json, Value};

use crate::{router::TaskType, storage::Storage};

pub use classifier::{ClassificationLearner, NearestCentroid};
pub use error::LearnerError;
pub use regressor::{PlLaRegressionLearner, RegressionLearner, Ridge};
pub use store::ModelStore;

/// One feature vector per sample.
pub type Features = Vec<Vec<f64>>;

/// Expected outputs of a training set, one entry per sample.
#[derive(Debug, Clone, PartialEq)]
pub enum Targets {
    Classes(Vec<i64>),
    Values(Vec<f64>),
    /// Packet loss and latency targets of the partial-label regression.
    PlLa { pl: Vec<f64>, la: Vec<f64> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSet {
    pub features: Features,
    pub targets: Targets,
}

impl TrainingSet {
    pub fn new(features: Features, targets: Targets) -> Self {
        Self { features, targets }
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// The seam between the controller and a machine-learning task.
///
/// Implementations own their model state; the controller only forwards the
/// data of each cycle and relays the returned object to the simulator.
pub trait Learner: Send + Sync {
    /// Updates the model with one cycle's worth of labelled samples.
    ///
    /// # Errors
    /// `InvalidInput` / `ShapeMismatch` for data the learner cannot use.
    fn training(&self, set: TrainingSet, cycle: u32) -> Result<Value, LearnerError>;

    /// Predicts the targets of the given samples.
    ///
    /// # Errors
    /// `NotTrained` if no model exists yet.
    fn testing(&self, features: Features) -> Result<Value, LearnerError>;
}

/// One learner per task type.
#[derive(Clone)]
pub struct Learners {
    classification: Arc<dyn Learner>,
    pl_la_classification: Arc<dyn Learner>,
    regression: Arc<dyn Learner>,
    pl_la_regression: Arc<dyn Learner>,
}

impl Learners {
    pub fn new(
        classification: Arc<dyn Learner>,
        pl_la_classification: Arc<dyn Learner>,
        regression: Arc<dyn Learner>,
        pl_la_regression: Arc<dyn Learner>,
    ) -> Self {
        Self {
            classification,
            pl_la_classification,
            regression,
            pl_la_regression,
        }
    }

    /// The built-in learners, each keeping its model under `trained_models/`.
    pub fn baseline(storage: &Storage) -> Self {
        let store = |task| ModelStore::new(storage.model_path(task));

        Self::new(
            Arc::new(ClassificationLearner::new(store(TaskType::Classification))),
            Arc::new(ClassificationLearner::new(store(TaskType::PlLaClassification))),
            Arc::new(RegressionLearner::new(store(TaskType::Regression))),
            Arc::new(PlLaRegressionLearner::new(store(TaskType::PlLaRegression))),
        )
    }

    pub fn get(&self, task: TaskType) -> Arc<dyn Learner> {
        let learner = match task {
            TaskType::Classification => &self.classification,
            TaskType::PlLaClassification => &self.pl_la_classification,
            TaskType::Regression => &self.regression,
            TaskType::PlLaRegression => &self.pl_la_regression,
        };
        Arc::clone(learner)
    }
}

/// Packs samples into a `(samples, features)` matrix.
///
/// # Errors
/// `InvalidInput` if there are no samples or no features, `ShapeMismatch` if
/// the rows differ in length.
pub(crate) fn to_matrix(features: &[Vec<f64>]) -> Result<Array2<f64>, LearnerError> {
    let width = features
        .first()
        .map(Vec::len)
        .ok_or_else(|| LearnerError::InvalidInput("no samples".into()))?;

    if width == 0 {
        return Err(LearnerError::InvalidInput("samples have no features".into()));
    }

    if let Some(row) = features.iter().find(|row| row.len() != width) {
        return Err(LearnerError::ShapeMismatch {
            what: "features",
            got: row.len(),
            expected: width,
        });
    }

    let flat: Vec<f64> = features.iter().flatten().copied().collect();
    Array2::from_shape_vec((features.len(), width), flat)
        .map_err(|e| LearnerError::InvalidInput(e.to_string()))
}

/// Checks that there is one target per sample.
pub(crate) fn check_targets(what: &'static str, got: usize, samples: usize) -> Result<(), LearnerError> {
    if got != samples {
        return Err(LearnerError::ShapeMismatch {
            what,
            got,
            expected: samples,
        });
    }
    Ok(())
}

/// Checks that a stored model and new samples agree on the feature count.
pub(crate) fn check_width(model_width: usize, x: &Array2<f64>) -> Result<(), LearnerError> {
    if x.ncols() != model_width {
        return Err(LearnerError::ShapeMismatch {
            what: "features",
            got: x.ncols(),
            expected: model_width,
        });
    }
    Ok(())
}

/// Acknowledgement returned by a successful training call.
pub(crate) fn trained(cycle: u32, samples: usize) -> Value {
    json!({ "message": "successful", "cycle": cycle, "samples": samples })
}
