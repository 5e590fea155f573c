use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{
    check_targets, check_width, to_matrix, trained, Features, Learner, LearnerError, ModelStore,
    Targets, TrainingSet,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Centroid {
    label: i64,
    sum: Array1<f64>,
    count: usize,
}

/// Assigns each sample the class whose mean feature vector is closest.
///
/// Class sums are accumulated across calls, so training on cycle after cycle
/// behaves like one fit over all samples seen so far.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearestCentroid {
    n_features: usize,
    classes: Vec<Centroid>,
}

impl NearestCentroid {
    pub fn new(n_features: usize) -> Self {
        Self {
            n_features,
            classes: Vec::new(),
        }
    }

    /// Adds labelled samples to the class means.
    pub fn partial_fit(&mut self, x: &Array2<f64>, labels: &[i64]) -> Result<(), LearnerError> {
        check_width(self.n_features, x)?;
        check_targets("target", labels.len(), x.nrows())?;

        for (row, &label) in x.outer_iter().zip(labels) {
            match self.classes.iter_mut().find(|c| c.label == label) {
                Some(centroid) => {
                    centroid.sum += &row;
                    centroid.count += 1;
                }
                None => self.classes.push(Centroid {
                    label,
                    sum: row.to_owned(),
                    count: 1,
                }),
            }
        }

        Ok(())
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Vec<i64>, LearnerError> {
        check_width(self.n_features, x)?;

        let means: Vec<(i64, Array1<f64>)> = self
            .classes
            .iter()
            .map(|c| (c.label, &c.sum / c.count as f64))
            .collect();

        x.outer_iter()
            .map(|row| {
                means
                    .iter()
                    .map(|(label, mean)| (*label, (&row - mean).mapv(|d| d * d).sum()))
                    .min_by(|a, b| a.1.total_cmp(&b.1))
                    .map(|(label, _)| label)
                    .ok_or_else(|| LearnerError::InvalidInput("model has no classes".into()))
            })
            .collect()
    }

    /// Known class labels, in order of first appearance.
    pub fn labels(&self) -> Vec<i64> {
        self.classes.iter().map(|c| c.label).collect()
    }
}

/// Classification learner backed by a [`NearestCentroid`] model.
pub struct ClassificationLearner {
    store: ModelStore,
}

impl ClassificationLearner {
    pub fn new(store: ModelStore) -> Self {
        Self { store }
    }
}

impl Learner for ClassificationLearner {
    fn training(&self, set: TrainingSet, cycle: u32) -> Result<Value, LearnerError> {
        let Targets::Classes(labels) = set.targets else {
            return Err(LearnerError::InvalidInput(
                "classification needs class targets".into(),
            ));
        };

        let x = to_matrix(&set.features)?;
        let mut model = self
            .store
            .load()?
            .unwrap_or_else(|| NearestCentroid::new(x.ncols()));

        model.partial_fit(&x, &labels)?;
        self.store.save(&model)?;

        Ok(trained(cycle, labels.len()))
    }

    fn testing(&self, features: Features) -> Result<Value, LearnerError> {
        let model: NearestCentroid = self.store.load_trained()?;
        let x = to_matrix(&features)?;
        Ok(json!({ "predictions": model.predict(&x)? }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(rows: &[[f64; 2]]) -> Array2<f64> {
        to_matrix(&rows.iter().map(|r| r.to_vec()).collect::<Vec<_>>()).unwrap()
    }

    #[test]
    fn predicts_the_closest_class() {
        let mut model = NearestCentroid::new(2);
        model
            .partial_fit(&matrix(&[[0.0, 0.0], [0.0, 1.0], [10.0, 10.0]]), &[0, 0, 1])
            .unwrap();

        let predictions = model.predict(&matrix(&[[1.0, 0.0], [9.0, 8.0]])).unwrap();

        assert_eq!(predictions, vec![0, 1]);
        assert_eq!(model.labels(), vec![0, 1]);
    }

    #[test]
    fn later_cycles_move_the_means() {
        let mut model = NearestCentroid::new(1);
        model.partial_fit(&matrix1(&[0.0, 10.0]), &[0, 1]).unwrap();
        assert_eq!(model.predict(&matrix1(&[6.0])).unwrap(), vec![1]);

        model.partial_fit(&matrix1(&[8.0]), &[0]).unwrap();
        assert_eq!(model.predict(&matrix1(&[6.0])).unwrap(), vec![0]);
    }

    fn matrix1(values: &[f64]) -> Array2<f64> {
        to_matrix(&values.iter().map(|v| vec![*v]).collect::<Vec<_>>()).unwrap()
    }

    #[test]
    fn rejects_a_different_feature_count() {
        let mut model = NearestCentroid::new(2);
        let err = model.partial_fit(&matrix1(&[1.0]), &[0]).unwrap_err();
        assert!(matches!(err, LearnerError::ShapeMismatch { what: "features", .. }));
    }

    #[test]
    fn learner_persists_between_calls() {
        let dir = tempfile::tempdir().unwrap();
        let learner = ClassificationLearner::new(ModelStore::new(dir.path().join("model.pkl")));

        let set = TrainingSet::new(
            vec![vec![0.0, 0.0], vec![5.0, 5.0]],
            Targets::Classes(vec![3, 7]),
        );
        let ack = learner.training(set, 1).unwrap();
        let out = learner.testing(vec![vec![4.0, 4.5]]).unwrap();

        assert_eq!(ack["samples"], 2);
        assert_eq!(out, json!({ "predictions": [7] }));
    }

    #[test]
    fn testing_before_training_fails() {
        let dir = tempfile::tempdir().unwrap();
        let learner = ClassificationLearner::new(ModelStore::new(dir.path().join("model.pkl")));

        let err = learner.testing(vec![vec![1.0]]).unwrap_err();
        assert!(matches!(err, LearnerError::NotTrained(_)));
    }

    #[test]
    fn rejects_regression_targets() {
        let dir = tempfile::tempdir().unwrap();
        let learner = ClassificationLearner::new(ModelStore::new(dir.path().join("model.pkl")));

        let set = TrainingSet::new(vec![vec![1.0]], Targets::Values(vec![0.5]));
        assert!(matches!(
            learner.training(set, 1),
            Err(LearnerError::InvalidInput(_))
        ));
    }
}
