use log::debug;
use serde::Serialize;

use crate::data::filter::FilteredView;
use crate::data::model::NumericColumn;
use crate::error::{AnalysisError, Result};

/// Symmetric matrix of Pearson coefficients over a fixed column subset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    pub columns: Vec<NumericColumn>,
    /// Row-major, `columns.len()` × `columns.len()`. A pair involving a
    /// column that is constant within the view has no coefficient.
    pub values: Vec<Vec<Option<f64>>>,
}

impl CorrelationMatrix {
    pub fn get(&self, a: NumericColumn, b: NumericColumn) -> Option<f64> {
        let i = self.columns.iter().position(|&c| c == a)?;
        let j = self.columns.iter().position(|&c| c == b)?;
        self.values[i][j]
    }

    /// Columns with zero variance in the view.
    pub fn constant_columns(&self) -> Vec<NumericColumn> {
        self.columns
            .iter()
            .zip(&self.values)
            .filter(|(_, row)| row.iter().all(Option::is_none))
            .map(|(&c, _)| c)
            .collect()
    }
}

/// Pearson correlation for every pair of `columns` over the view.
///
/// Needs at least two rows. Pairs that involve a constant column are `None`.
pub fn correlate(view: &FilteredView<'_>, columns: &[NumericColumn]) -> Result<CorrelationMatrix> {
    view.require_non_empty()?;
    if view.len() < 2 {
        return Err(AnalysisError::InsufficientRows {
            needed: 2,
            found: view.len(),
        });
    }
    if columns.is_empty() {
        return Err(AnalysisError::InvalidArgument(
            "correlation needs at least one column".into(),
        ));
    }

    let n = view.len() as f64;
    let centered: Vec<Vec<f64>> = columns
        .iter()
        .map(|&col| {
            let values: Vec<f64> = view.iter().map(|r| r.numeric(col)).collect();
            let mean = values.iter().sum::<f64>() / n;
            values.into_iter().map(|v| v - mean).collect()
        })
        .collect();

    let norms: Vec<Option<f64>> = centered
        .iter()
        .zip(columns)
        .map(|(dev, col)| {
            let ss: f64 = dev.iter().map(|d| d * d).sum();
            if ss > 0.0 {
                Some(ss.sqrt())
            } else {
                debug!("'{}' is constant in the view; its correlations are null", col.name());
                None
            }
        })
        .collect();

    let k = columns.len();
    let mut values = vec![vec![None; k]; k];
    for i in 0..k {
        let Some(norm_i) = norms[i] else { continue };
        values[i][i] = Some(1.0);
        for j in (i + 1)..k {
            let Some(norm_j) = norms[j] else { continue };
            let cross: f64 = centered[i]
                .iter()
                .zip(&centered[j])
                .map(|(a, b)| a * b)
                .sum();
            let r = (cross / (norm_i * norm_j)).clamp(-1.0, 1.0);
            values[i][j] = Some(r);
            values[j][i] = Some(r);
        }
    }

    Ok(CorrelationMatrix {
        columns: columns.to_vec(),
        values,
    })
}

// ---------------------------------------------------------------------------
// Simple linear regression (regression plots)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinearFit {
    pub x: NumericColumn,
    pub y: NumericColumn,
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
}

impl LinearFit {
    pub fn predict(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }
}

/// Ordinary least squares fit of `y` against `x`.
pub fn linear_fit(view: &FilteredView<'_>, x: NumericColumn, y: NumericColumn) -> Result<LinearFit> {
    view.require_non_empty()?;
    if view.len() < 2 {
        return Err(AnalysisError::InsufficientRows {
            needed: 2,
            found: view.len(),
        });
    }

    let n = view.len() as f64;
    let mean_x = view.iter().map(|r| r.numeric(x)).sum::<f64>() / n;
    let mean_y = view.iter().map(|r| r.numeric(y)).sum::<f64>() / n;

    let (mut sxx, mut sxy, mut syy) = (0.0, 0.0, 0.0);
    for r in view.iter() {
        let dx = r.numeric(x) - mean_x;
        let dy = r.numeric(y) - mean_y;
        sxx += dx * dx;
        sxy += dx * dy;
        syy += dy * dy;
    }

    if sxx == 0.0 {
        return Err(AnalysisError::DegenerateColumn {
            column: x.name().to_string(),
        });
    }

    let slope = sxy / sxx;
    // A constant y is fitted exactly by the flat line.
    let r_squared = if syy == 0.0 { 1.0 } else { (sxy * sxy) / (sxx * syy) };

    Ok(LinearFit {
        x,
        y,
        slope,
        intercept: mean_y - slope * mean_x,
        r_squared,
    })
}
