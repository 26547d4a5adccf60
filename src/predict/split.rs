use log::debug;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::error::{AnalysisError, Result};

/// Row positions (into the filtered view) of each side of a split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Seeded shuffle of `0..n`, then the first `ceil(n * test_fraction)`
/// positions become the test set and the rest the training set.
///
/// The same `(n, test_fraction, seed)` always yields the same split.
pub fn train_test_split(n: usize, test_fraction: f64, seed: u64) -> Result<Split> {
    if !(0.0..1.0).contains(&test_fraction) || test_fraction == 0.0 {
        return Err(AnalysisError::InvalidArgument(format!(
            "test_fraction must be in (0, 1), got {test_fraction}"
        )));
    }

    let n_test = (n as f64 * test_fraction).ceil() as usize;
    if n_test == 0 || n_test >= n {
        return Err(AnalysisError::InsufficientRows {
            needed: 2,
            found: n,
        });
    }

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let train = indices.split_off(n_test);
    debug!(
        "split {n} rows into {} train / {} test (seed {seed})",
        train.len(),
        indices.len()
    );
    Ok(Split {
        train,
        test: indices,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_follow_the_fraction() {
        let split = train_test_split(100, 0.2, 42).unwrap();
        assert_eq!(split.test.len(), 20);
        assert_eq!(split.train.len(), 80);
    }

    #[test]
    fn test_side_is_rounded_up() {
        let split = train_test_split(11, 0.2, 42).unwrap();
        assert_eq!(split.test.len(), 3);
        assert_eq!(split.train.len(), 8);
    }

    #[test]
    fn every_row_lands_on_exactly_one_side() {
        let split = train_test_split(57, 0.3, 7).unwrap();
        let mut all: Vec<usize> = split.train.iter().chain(&split.test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..57).collect::<Vec<_>>());
    }

    #[test]
    fn same_seed_same_split() {
        assert_eq!(
            train_test_split(200, 0.2, 1234).unwrap(),
            train_test_split(200, 0.2, 1234).unwrap()
        );
        assert_ne!(
            train_test_split(200, 0.2, 1).unwrap(),
            train_test_split(200, 0.2, 2).unwrap()
        );
    }

    #[test]
    fn rejects_bad_fraction_and_tiny_inputs() {
        assert!(matches!(
            train_test_split(10, 1.0, 0),
            Err(AnalysisError::InvalidArgument(_))
        ));
        assert!(matches!(
            train_test_split(10, 0.0, 0),
            Err(AnalysisError::InvalidArgument(_))
        ));
        assert!(matches!(
            train_test_split(1, 0.2, 0),
            Err(AnalysisError::InsufficientRows { .. })
        ));
    }

    #[test]
    fn nan_or_negative_fraction_is_rejected() {
        for fraction in [f64::NAN, -0.2, f64::INFINITY] {
            assert!(matches!(
                train_test_split(10, fraction, 0),
                Err(AnalysisError::InvalidArgument(_))
            ));
        }
    }
}
