use thiserror::Error;

/// Every failure the analysis core can surface to its caller.
///
/// None of these abort the process; the caller decides how to present them
/// (for example "no data for current filters").
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// A required column is missing or a cell has the wrong type.
    #[error("schema error in column '{column}'{}: {reason}", fmt_row(.row))]
    Schema {
        column: String,
        row: Option<usize>,
        reason: String,
    },

    #[error("invalid filter criteria: {0}")]
    InvalidCriteria(String),

    #[error("filter matched no records")]
    EmptyFilterResult,

    /// The training split holds a single label value.
    #[error("training data contains only label {label}; cannot fit a binary classifier")]
    DegenerateLabel { label: u8 },

    #[error("need at least {needed} rows, found {found}")]
    InsufficientRows { needed: usize, found: usize },

    #[error("column '{column}' has zero variance")]
    DegenerateColumn { column: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The classifier library rejected the training data or failed to fit.
    #[error("model fitting failed: {0}")]
    Model(String),

    #[error("unsupported file extension: .{0}")]
    UnsupportedFormat(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error(transparent)]
    Arrow(#[from] arrow::error::ArrowError),
}

fn fmt_row(row: &Option<usize>) -> String {
    match row {
        Some(r) => format!(" (row {r})"),
        None => String::new(),
    }
}

impl AnalysisError {
    pub(crate) fn missing_column(column: &str) -> Self {
        AnalysisError::Schema {
            column: column.to_string(),
            row: None,
            reason: "required column is missing".to_string(),
        }
    }

    pub(crate) fn bad_cell(column: &str, row: usize, reason: impl Into<String>) -> Self {
        AnalysisError::Schema {
            column: column.to_string(),
            row: Some(row),
            reason: reason.into(),
        }
    }

    /// Stable machine-readable name of the error kind, used in JSON output.
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisError::Schema { .. } => "schema",
            AnalysisError::InvalidCriteria(_) => "invalid_criteria",
            AnalysisError::EmptyFilterResult => "empty_filter_result",
            AnalysisError::DegenerateLabel { .. } => "degenerate_label",
            AnalysisError::InsufficientRows { .. } => "insufficient_rows",
            AnalysisError::DegenerateColumn { .. } => "degenerate_column",
            AnalysisError::InvalidArgument(_) => "invalid_argument",
            AnalysisError::Model(_) => "model",
            AnalysisError::UnsupportedFormat(_) => "unsupported_format",
            AnalysisError::Io(_) => "io",
            AnalysisError::Csv(_) => "csv",
            AnalysisError::Json(_) => "json",
            AnalysisError::Parquet(_) => "parquet",
            AnalysisError::Arrow(_) => "arrow",
        }
    }
}

pub type Result<T> = std::result::Result<T, AnalysisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_error_mentions_row_and_column() {
        let err = AnalysisError::bad_cell("bmi", 7, "not a number");
        let msg = err.to_string();
        assert!(msg.contains("'bmi'"));
        assert!(msg.contains("row 7"));
        assert_eq!(err.kind(), "schema");
    }

    #[test]
    fn missing_column_has_no_row() {
        let msg = AnalysisError::missing_column("age").to_string();
        assert!(!msg.contains("row"));
    }
}
