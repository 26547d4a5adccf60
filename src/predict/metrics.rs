use linfa::metrics::ToConfusionMatrix;
use ndarray::Array1;
use serde::Serialize;

use crate::error::{AnalysisError, Result};

/// 2×2 counts; rows are the true class, columns the predicted class, both
/// ordered `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct ConfusionCounts(pub [[u64; 2]; 2]);

impl ConfusionCounts {
    pub fn total(&self) -> u64 {
        self.0.iter().flatten().sum()
    }

    /// Rows whose true label is `class`.
    pub fn support(&self, class: usize) -> u64 {
        self.0[class][0] + self.0[class][1]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: u64,
}

/// Held-out scores of a binary classifier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationReport {
    pub accuracy: f64,
    pub confusion_matrix: ConfusionCounts,
    /// Indexed by label.
    pub classes: [ClassMetrics; 2],
    pub macro_avg: ClassMetrics,
    pub weighted_avg: ClassMetrics,
}

impl ClassificationReport {
    /// Score `predicted` against `truth`; both hold 0/1 labels.
    pub fn from_labels(truth: &[u8], predicted: &[u8]) -> Result<Self> {
        if truth.len() != predicted.len() {
            return Err(AnalysisError::InvalidArgument(format!(
                "{} true labels but {} predictions",
                truth.len(),
                predicted.len()
            )));
        }
        if truth.is_empty() {
            return Err(AnalysisError::InsufficientRows { needed: 1, found: 0 });
        }

        let mut counts = [[0u64; 2]; 2];
        for (&t, &p) in truth.iter().zip(predicted) {
            if t > 1 || p > 1 {
                return Err(AnalysisError::InvalidArgument(format!(
                    "labels must be 0 or 1, got true={t} predicted={p}"
                )));
            }
            counts[usize::from(t)][usize::from(p)] += 1;
        }
        let counts = ConfusionCounts(counts);

        let truth: Array1<usize> = truth.iter().map(|&t| usize::from(t)).collect();
        let predicted: Array1<usize> = predicted.iter().map(|&p| usize::from(p)).collect();
        let cm = predicted
            .confusion_matrix(truth)
            .map_err(|e| AnalysisError::Model(e.to_string()))?;

        // One-vs-all splits follow the sorted labels present in the data.
        let present: Vec<usize> = (0..2)
            .filter(|&c| counts.support(c) > 0 || counts.0[0][c] + counts.0[1][c] > 0)
            .collect();
        let mut classes = [ClassMetrics {
            precision: 0.0,
            recall: 0.0,
            f1: 0.0,
            support: 0,
        }; 2];
        for (class, split) in present.into_iter().zip(cm.split_one_vs_all()) {
            classes[class] = ClassMetrics {
                precision: score(split.precision()),
                recall: score(split.recall()),
                f1: score(split.f1_score()),
                support: counts.support(class),
            };
        }

        let support = counts.total();
        let mean = |f: fn(&ClassMetrics) -> f64| classes.iter().map(f).sum::<f64>() / 2.0;
        let weighted = |f: fn(&ClassMetrics) -> f64| {
            classes.iter().map(|c| f(c) * c.support as f64).sum::<f64>() / support as f64
        };

        Ok(ClassificationReport {
            accuracy: score(cm.accuracy()),
            confusion_matrix: counts,
            classes,
            macro_avg: ClassMetrics {
                precision: mean(|c| c.precision),
                recall: mean(|c| c.recall),
                f1: mean(|c| c.f1),
                support,
            },
            weighted_avg: ClassMetrics {
                precision: weighted(|c| c.precision),
                recall: weighted(|c| c.recall),
                f1: weighted(|c| c.f1),
                support,
            },
        })
    }
}

/// linfa reports in `f32` and yields NaN on a zero denominator; that is 0 here.
fn score(value: f32) -> f64 {
    if value.is_finite() {
        f64::from(value)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-6;

    #[test]
    fn confusion_rows_are_truth() {
        let truth = [0, 0, 0, 1, 1, 1, 0];
        let pred = [0, 1, 0, 1, 0, 1, 0];
        let report = ClassificationReport::from_labels(&truth, &pred).unwrap();
        assert_eq!(report.confusion_matrix.0, [[3, 1], [1, 2]]);
        assert_eq!(report.confusion_matrix.total(), 7);
        assert!((report.accuracy - 5.0 / 7.0).abs() < EPS);
    }

    #[test]
    fn per_class_and_averaged_metrics() {
        let truth = [0, 0, 0, 0, 1, 1, 1];
        let pred = [0, 0, 0, 1, 1, 1, 0];
        let report = ClassificationReport::from_labels(&truth, &pred).unwrap();

        let negative = report.classes[0];
        assert!((negative.precision - 0.75).abs() < EPS);
        assert!((negative.recall - 0.75).abs() < EPS);
        assert_eq!(negative.support, 4);

        let positive = report.classes[1];
        assert!((positive.precision - 2.0 / 3.0).abs() < EPS);
        assert!((positive.recall - 2.0 / 3.0).abs() < EPS);
        assert!((positive.f1 - 2.0 / 3.0).abs() < EPS);
        assert_eq!(positive.support, 3);

        assert_eq!(report.macro_avg.support, 7);
        let expected_weighted = (0.75 * 4.0 + (2.0 / 3.0) * 3.0) / 7.0;
        assert!((report.weighted_avg.recall - expected_weighted).abs() < EPS);
        assert!((report.macro_avg.precision - (0.75 + 2.0 / 3.0) / 2.0).abs() < EPS);
    }

    #[test]
    fn precision_and_recall_are_not_swapped() {
        // Class 1: 1 of 1 predictions right (precision 1), 1 of 4 found (recall 0.25).
        let truth = [1, 1, 1, 1, 0, 0];
        let pred = [1, 0, 0, 0, 0, 0];
        let report = ClassificationReport::from_labels(&truth, &pred).unwrap();
        assert!((report.classes[1].precision - 1.0).abs() < EPS);
        assert!((report.classes[1].recall - 0.25).abs() < EPS);
        assert!((report.classes[0].precision - 2.0 / 5.0).abs() < EPS);
        assert!((report.classes[0].recall - 1.0).abs() < EPS);
    }

    #[test]
    fn never_predicted_class_scores_zero() {
        let report = ClassificationReport::from_labels(&[0, 0, 1], &[0, 0, 0]).unwrap();
        let positive = report.classes[1];
        assert_eq!(positive.precision, 0.0);
        assert_eq!(positive.recall, 0.0);
        assert_eq!(positive.f1, 0.0);
        assert_eq!(positive.support, 1);
    }

    #[test]
    fn rejects_mismatched_or_non_binary_labels() {
        assert!(ClassificationReport::from_labels(&[0, 1], &[0]).is_err());
        assert!(ClassificationReport::from_labels(&[2], &[0]).is_err());
        assert!(ClassificationReport::from_labels(&[], &[]).is_err());
    }
}
