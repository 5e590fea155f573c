use ndarray::{concatenate, Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{
    check_targets, check_width, to_matrix, trained, Features, Learner, LearnerError, ModelStore,
    Targets, TrainingSet,
};

/// Added to the diagonal of the normal equations so they stay solvable with
/// fewer samples than features.
const RIDGE_PENALTY: f64 = 1e-6;

/// Linear least squares with an intercept and a small L2 penalty.
///
/// Only the sufficient statistics `XᵀX` and `Xᵀy` are kept, so calling
/// [`Ridge::partial_fit`] once per cycle gives the same weights as fitting all
/// samples at once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ridge {
    n_features: usize,
    gram: Array2<f64>,
    moment: Array1<f64>,
    samples: usize,
}

impl Ridge {
    pub fn new(n_features: usize) -> Self {
        let dim = n_features + 1;
        Self {
            n_features,
            gram: Array2::zeros((dim, dim)),
            moment: Array1::zeros(dim),
            samples: 0,
        }
    }

    pub fn partial_fit(&mut self, x: &Array2<f64>, y: &[f64]) -> Result<(), LearnerError> {
        check_width(self.n_features, x)?;
        check_targets("target", y.len(), x.nrows())?;

        let xa = with_intercept(x)?;
        let y = ArrayView1::from(y);

        self.gram += &xa.t().dot(&xa);
        self.moment += &xa.t().dot(&y);
        self.samples += x.nrows();
        Ok(())
    }

    /// Feature weights followed by the intercept.
    pub fn coefficients(&self) -> Result<Array1<f64>, LearnerError> {
        let mut a = self.gram.clone();
        a.diag_mut().mapv_inplace(|v| v + RIDGE_PENALTY);
        solve(a, self.moment.clone())
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Vec<f64>, LearnerError> {
        check_width(self.n_features, x)?;
        let w = self.coefficients()?;
        Ok(with_intercept(x)?.dot(&w).to_vec())
    }

    pub fn samples(&self) -> usize {
        self.samples
    }
}

fn with_intercept(x: &Array2<f64>) -> Result<Array2<f64>, LearnerError> {
    let ones = Array2::<f64>::ones((x.nrows(), 1));
    concatenate(Axis(1), &[x.view(), ones.view()])
        .map_err(|e| LearnerError::InvalidInput(e.to_string()))
}

/// Solves `a · w = b` by Gaussian elimination with partial pivoting.
fn solve(mut a: Array2<f64>, mut b: Array1<f64>) -> Result<Array1<f64>, LearnerError> {
    let n = b.len();

    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| a[[i, col]].abs().total_cmp(&a[[j, col]].abs()))
            .unwrap_or(col);

        if a[[pivot, col]].abs() < f64::EPSILON {
            return Err(LearnerError::InvalidInput("singular normal equations".into()));
        }

        if pivot != col {
            for k in 0..n {
                a.swap([col, k], [pivot, k]);
            }
            b.swap(col, pivot);
        }

        for row in col + 1..n {
            let factor = a[[row, col]] / a[[col, col]];
            for k in col..n {
                a[[row, k]] -= factor * a[[col, k]];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut w = Array1::<f64>::zeros(n);
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[[row, k]] * w[k]).sum();
        w[row] = (b[row] - tail) / a[[row, row]];
    }
    Ok(w)
}

/// Regression learner backed by a [`Ridge`] model.
pub struct RegressionLearner {
    store: ModelStore,
}

impl RegressionLearner {
    pub fn new(store: ModelStore) -> Self {
        Self { store }
    }
}

impl Learner for RegressionLearner {
    fn training(&self, set: TrainingSet, cycle: u32) -> Result<Value, LearnerError> {
        let Targets::Values(y) = set.targets else {
            return Err(LearnerError::InvalidInput(
                "regression needs numeric targets".into(),
            ));
        };

        let x = to_matrix(&set.features)?;
        let mut model = self.store.load()?.unwrap_or_else(|| Ridge::new(x.ncols()));

        model.partial_fit(&x, &y)?;
        self.store.save(&model)?;

        Ok(trained(cycle, y.len()))
    }

    fn testing(&self, features: Features) -> Result<Value, LearnerError> {
        let model: Ridge = self.store.load_trained()?;
        let x = to_matrix(&features)?;
        Ok(json!({ "predictions": model.predict(&x)? }))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct PlLaModel {
    pl: Ridge,
    la: Ridge,
}

/// Partial-label regression: one [`Ridge`] model for packet loss and one for
/// latency, trained on the same features.
pub struct PlLaRegressionLearner {
    store: ModelStore,
}

impl PlLaRegressionLearner {
    pub fn new(store: ModelStore) -> Self {
        Self { store }
    }
}

impl Learner for PlLaRegressionLearner {
    fn training(&self, set: TrainingSet, cycle: u32) -> Result<Value, LearnerError> {
        let Targets::PlLa { pl, la } = set.targets else {
            return Err(LearnerError::InvalidInput(
                "pllaregression needs target_pl and target_la".into(),
            ));
        };

        let x = to_matrix(&set.features)?;
        let mut model = self.store.load()?.unwrap_or_else(|| PlLaModel {
            pl: Ridge::new(x.ncols()),
            la: Ridge::new(x.ncols()),
        });

        model.pl.partial_fit(&x, &pl)?;
        model.la.partial_fit(&x, &la)?;
        self.store.save(&model)?;

        Ok(trained(cycle, pl.len()))
    }

    fn testing(&self, features: Features) -> Result<Value, LearnerError> {
        let model: PlLaModel = self.store.load_trained()?;
        let x = to_matrix(&features)?;
        Ok(json!({
            "predictions_pl": model.pl.predict(&x)?,
            "predictions_la": model.la.predict(&x)?,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(values: &[f64]) -> Array2<f64> {
        to_matrix(&values.iter().map(|v| vec![*v]).collect::<Vec<_>>()).unwrap()
    }

    fn assert_close(got: &[f64], expected: &[f64]) {
        assert_eq!(got.len(), expected.len());
        for (g, e) in got.iter().zip(expected) {
            assert!((g - e).abs() < 1e-4, "got {got:?}, expected {expected:?}");
        }
    }

    #[test]
    fn fits_a_line() {
        let mut model = Ridge::new(1);
        model
            .partial_fit(&column(&[0.0, 1.0, 2.0, 3.0]), &[1.0, 3.0, 5.0, 7.0])
            .unwrap();

        assert_close(&model.coefficients().unwrap().to_vec(), &[2.0, 1.0]);
        assert_close(&model.predict(&column(&[10.0])).unwrap(), &[21.0]);
    }

    #[test]
    fn partial_fits_match_a_single_fit() {
        let x = [0.0, 1.0, 2.0, 3.0, 4.0];
        let y = [0.5, 1.0, 2.5, 2.0, 4.0];

        let mut once = Ridge::new(1);
        once.partial_fit(&column(&x), &y).unwrap();

        let mut split = Ridge::new(1);
        split.partial_fit(&column(&x[..2]), &y[..2]).unwrap();
        split.partial_fit(&column(&x[2..]), &y[2..]).unwrap();

        assert_eq!(split.samples(), 5);
        assert_close(
            &split.coefficients().unwrap().to_vec(),
            &once.coefficients().unwrap().to_vec(),
        );
    }

    #[test]
    fn single_sample_is_still_solvable() {
        let mut model = Ridge::new(2);
        let x = to_matrix(&[vec![1.0, 2.0]]).unwrap();
        model.partial_fit(&x, &[3.0]).unwrap();

        let prediction = model.predict(&x).unwrap();
        assert_close(&prediction, &[3.0]);
    }

    #[test]
    fn solve_rejects_a_singular_system() {
        let a = Array2::zeros((2, 2));
        let b = Array1::zeros(2);
        assert!(matches!(solve(a, b), Err(LearnerError::InvalidInput(_))));
    }

    #[test]
    fn plla_learner_predicts_both_targets() {
        let dir = tempfile::tempdir().unwrap();
        let learner = PlLaRegressionLearner::new(ModelStore::new(dir.path().join("model.pkl")));

        let set = TrainingSet::new(
            vec![vec![0.0], vec![1.0], vec![2.0]],
            Targets::PlLa {
                pl: vec![0.0, 1.0, 2.0],
                la: vec![10.0, 8.0, 6.0],
            },
        );
        learner.training(set, 3).unwrap();

        let out = learner.testing(vec![vec![4.0]]).unwrap();
        let pl = out["predictions_pl"][0].as_f64().unwrap();
        let la = out["predictions_la"][0].as_f64().unwrap();

        assert!((pl - 4.0).abs() < 1e-3);
        assert!((la - 2.0).abs() < 1e-3);
    }

    #[test]
    fn plla_learner_rejects_mismatched_targets() {
        let dir = tempfile::tempdir().unwrap();
        let learner = PlLaRegressionLearner::new(ModelStore::new(dir.path().join("model.pkl")));

        let set = TrainingSet::new(
            vec![vec![0.0], vec![1.0]],
            Targets::PlLa {
                pl: vec![0.0, 1.0],
                la: vec![1.0],
            },
        );

        let err = learner.training(set, 1).unwrap_err();
        assert!(matches!(err, LearnerError::ShapeMismatch { .. }));
        assert!(!dir.path().join("model.pkl").exists());
    }
}
