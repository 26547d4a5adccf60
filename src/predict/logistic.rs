//! Binary logistic regression on standardised features.
//!
//! Features are centred and scaled with the training mean and standard
//! deviation, then fitted with `linfa-logistic` (L2 penalty on the
//! coefficients only, intercept unpenalised).

use linfa::prelude::*;
use linfa::Dataset;
use linfa_logistic::LogisticRegression;
use log::debug;
use ndarray::{Array1, Array2, Axis};
use serde::Serialize;

use crate::data::model::NumericColumn;
use crate::error::{AnalysisError, Result};

/// Optimiser tunables.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainParams {
    pub max_iterations: u64,
    /// Gradient norm below which the optimiser stops.
    pub tolerance: f64,
    /// Inverse L2 strength; larger means weaker regularisation.
    pub regularization_c: f64,
}

/// Per-feature centring and scaling learned from the training split.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Standardizer {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl Standardizer {
    fn fit(x: &Array2<f64>) -> Self {
        let n = x.nrows() as f64;
        let mut mean = Vec::with_capacity(x.ncols());
        let mut scale = Vec::with_capacity(x.ncols());
        for column in x.axis_iter(Axis(1)) {
            let m = column.sum() / n;
            let var = column.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / n;
            mean.push(m);
            // A constant feature carries no signal; leave it centred at zero.
            scale.push(if var > 0.0 { var.sqrt() } else { 1.0 });
        }
        Standardizer { mean, scale }
    }

    fn transform(&self, x: &Array2<f64>) -> Array2<f64> {
        let mut out = x.clone();
        for (j, mut column) in out.axis_iter_mut(Axis(1)).enumerate() {
            column.mapv_inplace(|v| (v - self.mean[j]) / self.scale[j]);
        }
        out
    }
}

/// A fitted classifier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogisticModel {
    pub features: Vec<NumericColumn>,
    pub standardizer: Standardizer,
    pub intercept: f64,
    /// Coefficients in standardised feature space, one per feature.
    pub coefficients: Vec<f64>,
}

impl LogisticModel {
    /// Probability of label 1 for one raw feature vector.
    pub fn predict_proba(&self, features: &[f64]) -> Result<f64> {
        if features.len() != self.coefficients.len() {
            return Err(AnalysisError::InvalidArgument(format!(
                "expected {} feature values, got {}",
                self.coefficients.len(),
                features.len()
            )));
        }
        let z = features
            .iter()
            .zip(&self.coefficients)
            .enumerate()
            .map(|(j, (v, w))| w * (v - self.standardizer.mean[j]) / self.standardizer.scale[j])
            .sum::<f64>()
            + self.intercept;
        Ok(sigmoid(z))
    }

    pub fn predict(&self, features: &[f64]) -> Result<u8> {
        Ok(u8::from(self.predict_proba(features)? >= 0.5))
    }

    /// Probabilities of label 1 for every row of a raw feature matrix.
    pub fn predict_proba_matrix(&self, x: &Array2<f64>) -> Array1<f64> {
        let z = self
            .standardizer
            .transform(x)
            .dot(&Array1::from(self.coefficients.clone()))
            + self.intercept;
        z.mapv(sigmoid)
    }
}

/// Fit a logistic model to `x` (rows × features) and 0/1 labels `y`.
///
/// Both labels must be present in `y`.
pub fn fit(
    features: &[NumericColumn],
    x: &Array2<f64>,
    y: &Array1<usize>,
    params: &TrainParams,
) -> Result<LogisticModel> {
    if x.nrows() != y.len() || x.ncols() != features.len() {
        return Err(AnalysisError::InvalidArgument(format!(
            "design matrix is {}x{} but there are {} labels and {} features",
            x.nrows(),
            x.ncols(),
            y.len(),
            features.len()
        )));
    }

    let standardizer = Standardizer::fit(x);
    let dataset = Dataset::new(standardizer.transform(x), y.clone());

    // linfa labels the larger class (1) as the positive one.
    let fitted = LogisticRegression::default()
        .alpha(1.0 / params.regularization_c)
        .max_iterations(params.max_iterations)
        .gradient_tolerance(params.tolerance)
        .with_intercept(true)
        .fit(&dataset)
        .map_err(|e| AnalysisError::Model(e.to_string()))?;

    debug!(
        "logistic fit on {} rows: intercept {:.4}, coefficients {:?}",
        x.nrows(),
        fitted.intercept(),
        fitted.params()
    );

    Ok(LogisticModel {
        features: features.to_vec(),
        standardizer,
        intercept: fitted.intercept(),
        coefficients: fitted.params().to_vec(),
    })
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn params() -> TrainParams {
        TrainParams {
            max_iterations: 1000,
            tolerance: 1e-8,
            regularization_c: 1.0,
        }
    }

    #[test]
    fn sigmoid_is_stable_at_extremes() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert!(sigmoid(800.0) <= 1.0);
        assert!(sigmoid(-800.0) >= 0.0);
        assert!(sigmoid(-800.0).is_finite());
    }

    #[test]
    fn learns_a_threshold_on_one_feature() {
        let glucose: Vec<f64> = (0..40).map(|i| 80.0 + 5.0 * i as f64).collect();
        let labels: Vec<usize> = glucose.iter().map(|&g| usize::from(g > 175.0)).collect();
        let x = Array2::from_shape_vec((40, 1), glucose).unwrap();
        let y = Array1::from(labels);

        let model = fit(&[NumericColumn::BloodGlucoseLevel], &x, &y, &params()).unwrap();
        assert!(model.coefficients[0] > 0.0);
        assert_eq!(model.predict(&[90.0]).unwrap(), 0);
        assert_eq!(model.predict(&[260.0]).unwrap(), 1);

        let probs = model.predict_proba_matrix(&x);
        assert!(probs[0] < probs[39]);
        assert!((probs[5] - model.predict_proba(&[x[[5, 0]]]).unwrap()).abs() < 1e-12);
    }

    #[test]
    fn stronger_penalty_shrinks_coefficients() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0]];
        let y = array![0, 0, 1, 0, 1, 1];
        let loose = fit(&[NumericColumn::Age], &x, &y, &params()).unwrap();
        let tight = fit(
            &[NumericColumn::Age],
            &x,
            &y,
            &TrainParams {
                regularization_c: 0.01,
                ..params()
            },
        )
        .unwrap();
        assert!(tight.coefficients[0].abs() < loose.coefficients[0].abs());
    }

    #[test]
    fn constant_feature_is_left_unscaled() {
        let x = array![[1.0, 5.0], [2.0, 5.0], [3.0, 5.0], [4.0, 5.0]];
        let y = array![0, 0, 1, 1];
        let model = fit(
            &[NumericColumn::Age, NumericColumn::Hypertension],
            &x,
            &y,
            &params(),
        )
        .unwrap();
        assert_eq!(model.standardizer.scale[1], 1.0);
        assert_eq!(model.standardizer.mean[1], 5.0);
        assert!(model.coefficients[1].abs() < 1e-6);
    }

    #[test]
    fn wrong_feature_count_is_rejected() {
        let x = array![[1.0], [2.0]];
        let y = array![0, 1];
        let model = fit(&[NumericColumn::Age], &x, &y, &params()).unwrap();
        assert!(model.predict_proba(&[1.0, 2.0]).is_err());
        assert!(fit(&[NumericColumn::Age, NumericColumn::Bmi], &x, &y, &params()).is_err());
    }
}
