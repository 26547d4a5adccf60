//! Diabetes prediction over a filtered view: seeded split, logistic fit,
//! held-out evaluation.

pub mod logistic;
pub mod metrics;
pub mod split;

use log::info;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::data::filter::FilteredView;
use crate::data::model::{NumericColumn, Record};
use crate::error::{AnalysisError, Result};

use logistic::{LogisticModel, TrainParams};
use metrics::ClassificationReport;

/// Tunables of one training run. Every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub features: Vec<NumericColumn>,
    pub label: NumericColumn,
    pub test_fraction: f64,
    pub seed: u64,
    pub max_iterations: u64,
    /// Gradient norm at which the optimiser stops.
    pub tolerance: f64,
    pub regularization_c: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig {
            features: NumericColumn::CLINICAL.to_vec(),
            label: NumericColumn::Diabetes,
            test_fraction: 0.2,
            seed: 42,
            max_iterations: 1000,
            tolerance: 1e-4,
            regularization_c: 1.0,
        }
    }
}

impl ModelConfig {
    pub fn validate(&self) -> Result<()> {
        if self.features.is_empty() {
            return Err(AnalysisError::InvalidArgument("no feature columns".into()));
        }
        if !matches!(
            self.label,
            NumericColumn::Diabetes | NumericColumn::Hypertension | NumericColumn::HeartDisease
        ) {
            return Err(AnalysisError::InvalidArgument(format!(
                "label '{}' is not a binary column",
                self.label
            )));
        }
        if self.features.contains(&self.label) {
            return Err(AnalysisError::InvalidArgument(format!(
                "label '{}' is also a feature",
                self.label
            )));
        }
        if self.max_iterations == 0 {
            return Err(AnalysisError::InvalidArgument(
                "max_iterations must be at least 1".into(),
            ));
        }
        if self.tolerance.is_nan() || self.tolerance < 0.0 {
            return Err(AnalysisError::InvalidArgument(
                "tolerance must be non-negative".into(),
            ));
        }
        if !(self.regularization_c > 0.0 && self.regularization_c.is_finite()) {
            return Err(AnalysisError::InvalidArgument(
                "regularization_c must be positive".into(),
            ));
        }
        Ok(())
    }

    fn train_params(&self) -> TrainParams {
        TrainParams {
            max_iterations: self.max_iterations,
            tolerance: self.tolerance,
            regularization_c: self.regularization_c,
        }
    }
}

/// Everything one training run produced. Rebuilt from scratch on every run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelArtifact {
    pub model: LogisticModel,
    pub train_rows: usize,
    pub test_rows: usize,
    pub test_labels: Vec<u8>,
    pub predictions: Vec<u8>,
    pub evaluation: ClassificationReport,
}

/// Split the view, fit a logistic classifier on the training part and
/// evaluate it on the held-out part.
///
/// Identical `(view, config)` always give identical artifacts.
pub fn train_and_evaluate(view: &FilteredView<'_>, config: &ModelConfig) -> Result<ModelArtifact> {
    config.validate()?;
    view.require_non_empty()?;

    let split = split::train_test_split(view.len(), config.test_fraction, config.seed)?;
    let rows = view.records();
    let train: Vec<&Record> = split.train.iter().map(|&i| rows[i]).collect();
    let test: Vec<&Record> = split.test.iter().map(|&i| rows[i]).collect();

    let (x_train, y_train) = design(&train, config)?;
    let first = y_train[0];
    if y_train.iter().all(|&y| y == first) {
        return Err(AnalysisError::DegenerateLabel { label: first as u8 });
    }

    let model = logistic::fit(&config.features, &x_train, &y_train, &config.train_params())?;

    let (x_test, y_test) = design(&test, config)?;
    let predictions: Vec<u8> = model
        .predict_proba_matrix(&x_test)
        .iter()
        .map(|&p| u8::from(p >= 0.5))
        .collect();
    let test_labels: Vec<u8> = y_test.iter().map(|&y| y as u8).collect();
    let evaluation = ClassificationReport::from_labels(&test_labels, &predictions)?;

    info!(
        "trained on {} rows, accuracy {:.2} on {} held-out rows",
        train.len(),
        evaluation.accuracy,
        test.len()
    );

    Ok(ModelArtifact {
        model,
        train_rows: train.len(),
        test_rows: test.len(),
        test_labels,
        predictions,
        evaluation,
    })
}

/// Feature matrix and 0/1 label vector for a set of records.
fn design(records: &[&Record], config: &ModelConfig) -> Result<(Array2<f64>, Array1<usize>)> {
    let k = config.features.len();
    let values: Vec<f64> = records
        .iter()
        .flat_map(|r| config.features.iter().map(move |&c| r.numeric(c)))
        .collect();
    let x = Array2::from_shape_vec((records.len(), k), values).map_err(|e| {
        AnalysisError::InvalidArgument(format!("cannot shape design matrix: {e}"))
    })?;
    let y = records
        .iter()
        .map(|r| usize::from(r.numeric(config.label) == 1.0))
        .collect();
    Ok((x, y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::tests::record;

    /// Diabetes follows glucose and bmi with a little overlap.
    fn cohort(n: usize) -> Vec<Record> {
        (0..n)
            .map(|i| {
                let glucose = 80.0 + (i * 37 % 200) as f64;
                let bmi = 18.0 + (i * 13 % 25) as f64;
                let diabetic = glucose + 2.0 * bmi > 250.0 || i % 17 == 0;
                let mut r = record("Texas", "Female", 20.0 + (i % 60) as f64, u8::from(diabetic));
                r.blood_glucose_level = glucose;
                r.bmi = bmi;
                r.hypertension = u8::from(i % 5 == 0);
                r.heart_disease = u8::from(i % 11 == 0);
                r
            })
            .collect()
    }

    #[test]
    fn evaluation_is_consistent() {
        let rows = cohort(300);
        let view = FilteredView::from_records(rows.iter().collect());
        let artifact = train_and_evaluate(&view, &ModelConfig::default()).unwrap();

        assert_eq!(artifact.test_rows, 60);
        assert_eq!(artifact.train_rows, 240);
        let cm = artifact.evaluation.confusion_matrix;
        assert_eq!(cm.total(), artifact.test_rows as u64);
        assert!((0.0..=1.0).contains(&artifact.evaluation.accuracy));
        assert!(artifact.evaluation.accuracy > 0.75);
        assert_eq!(artifact.predictions.len(), artifact.test_labels.len());
    }

    #[test]
    fn same_seed_same_artifact() {
        let rows = cohort(200);
        let view = FilteredView::from_records(rows.iter().collect());
        let config = ModelConfig::default();
        let a = train_and_evaluate(&view, &config).unwrap();
        let b = train_and_evaluate(&view, &config).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn single_class_training_data_is_degenerate() {
        let rows: Vec<Record> = (0..50)
            .map(|i| record("Ohio", "Male", 20.0 + i as f64, 0))
            .collect();
        let view = FilteredView::from_records(rows.iter().collect());
        assert!(matches!(
            train_and_evaluate(&view, &ModelConfig::default()),
            Err(AnalysisError::DegenerateLabel { label: 0 })
        ));
    }

    #[test]
    fn empty_view_is_reported() {
        assert!(matches!(
            train_and_evaluate(&FilteredView::default(), &ModelConfig::default()),
            Err(AnalysisError::EmptyFilterResult)
        ));
    }

    #[test]
    fn config_validation() {
        let mut config = ModelConfig::default();
        config.label = NumericColumn::Bmi;
        assert!(config.validate().is_err());

        let mut config = ModelConfig::default();
        config.features.push(NumericColumn::Diabetes);
        assert!(config.validate().is_err());

        let config = ModelConfig {
            regularization_c: 0.0,
            ..ModelConfig::default()
        };
        assert!(config.validate().is_err());

        let config = ModelConfig {
            tolerance: f64::NAN,
            ..ModelConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(AnalysisError::InvalidArgument(_))
        ));

        let parsed: ModelConfig = serde_json::from_str(r#"{"seed": 7}"#).unwrap();
        assert_eq!(parsed.seed, 7);
        assert_eq!(parsed.test_fraction, 0.2);
    }
}
