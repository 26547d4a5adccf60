//! Command-line interface definitions and argument parsing

use std::path::PathBuf;

use clap::Parser;

use crate::analysis::aggregate::AggregationRequest;
use crate::data::filter::FilterCriteria;
use crate::data::model::{Dataset, NumericColumn};
use crate::error::{AnalysisError, Result};
use crate::pipeline::PipelineConfig;

/// Filter a diabetes health-record table, aggregate it, and train a
/// diabetes classifier on the selection
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the dataset (.csv, .json or .parquet)
    #[arg(short, long)]
    pub input: PathBuf,

    /// Accepted location; repeat for several. Defaults to every location
    #[arg(long = "location")]
    pub locations: Vec<String>,

    /// Accepted gender; repeat for several. Defaults to every gender
    #[arg(long = "gender")]
    pub genders: Vec<String>,

    /// Lower age bound (inclusive). Defaults to the youngest record
    #[arg(long)]
    pub age_min: Option<f64>,

    /// Upper age bound (inclusive). Defaults to the oldest record
    #[arg(long)]
    pub age_max: Option<f64>,

    /// JSON pipeline configuration; missing fields use defaults
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Seed for the train/test split
    #[arg(long)]
    pub seed: Option<u64>,

    /// Share of filtered rows held out for evaluation
    #[arg(long)]
    pub test_fraction: Option<f64>,

    /// Iteration cap for the classifier's optimiser
    #[arg(long)]
    pub max_iterations: Option<u64>,

    /// Group-reduce to compute as GROUP:METRIC:OP (e.g. location:diabetes:sum);
    /// repeat for several. Replaces the configured aggregations
    #[arg(long = "aggregate", value_name = "GROUP:METRIC:OP")]
    pub aggregations: Vec<AggregationRequest>,

    /// Comma-separated numeric columns to correlate
    #[arg(long, value_delimiter = ',')]
    pub correlate: Vec<NumericColumn>,

    /// Write the JSON report here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Leave the filtered rows out of the report
    #[arg(long)]
    pub summary_only: bool,

    /// Score one patient after training: "age,bmi,blood_glucose_level,hypertension,heart_disease"
    #[arg(short, long)]
    pub predict: Option<String>,
}

impl Args {
    /// Criteria from the flags, filling unspecified parts with "everything".
    pub fn criteria(&self, dataset: &Dataset) -> FilterCriteria {
        let mut criteria = FilterCriteria::all(dataset);
        if !self.locations.is_empty() {
            criteria.locations = self.locations.iter().cloned().collect();
        }
        if !self.genders.is_empty() {
            criteria.genders = self.genders.iter().cloned().collect();
        }
        if let Some(min) = self.age_min {
            criteria.age_min = min;
        }
        if let Some(max) = self.age_max {
            criteria.age_max = max;
        }
        criteria
    }

    /// Load `--config` if given and apply the command-line overrides.
    pub fn pipeline_config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_json_file(path)?,
            None => PipelineConfig::default(),
        };
        if let Some(seed) = self.seed {
            config.model.seed = seed;
        }
        if let Some(fraction) = self.test_fraction {
            config.model.test_fraction = fraction;
        }
        if let Some(cap) = self.max_iterations {
            config.model.max_iterations = cap;
        }
        if !self.aggregations.is_empty() {
            config.aggregations = self.aggregations.clone();
        }
        if !self.correlate.is_empty() {
            config.correlation_columns = self.correlate.clone();
        }
        config.validate()?;
        Ok(config)
    }

    /// Parse the `--predict` feature vector, if any.
    pub fn parse_features(&self, expected: usize) -> Result<Option<Vec<f64>>> {
        let Some(raw) = &self.predict else {
            return Ok(None);
        };
        let values = raw
            .split(',')
            .map(|part| {
                part.trim().parse::<f64>().map_err(|_| {
                    AnalysisError::InvalidArgument(format!("invalid feature value: '{part}'"))
                })
            })
            .collect::<Result<Vec<f64>>>()?;
        if values.len() != expected {
            return Err(AnalysisError::InvalidArgument(format!(
                "expected {expected} comma-separated feature values, got {}",
                values.len()
            )));
        }
        Ok(Some(values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::tests::record;
    use crate::data::model::DatasetSchema;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["glucoscope", "--input", "records.csv"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    #[test]
    fn unspecified_filters_select_everything() {
        let ds = Dataset::from_records(
            DatasetSchema::default(),
            vec![
                record("Texas", "Female", 40.2, 0),
                record("Ohio", "Male", 12.0, 1),
            ],
        )
        .unwrap();

        let criteria = args(&[]).criteria(&ds);
        assert_eq!(criteria, FilterCriteria::all(&ds));

        let narrowed = args(&["--location", "Ohio", "--location", "Utah", "--age-max", "30"])
            .criteria(&ds);
        assert_eq!(narrowed.locations.len(), 2);
        assert!(narrowed.locations.contains("Utah"));
        assert_eq!(narrowed.age_max, 30.0);
        assert_eq!(narrowed.genders.len(), 2);
    }

    #[test]
    fn overrides_reach_the_model_config() {
        let config = args(&["--seed", "9", "--test-fraction", "0.25"])
            .pipeline_config()
            .unwrap();
        assert_eq!(config.model.seed, 9);
        assert_eq!(config.model.test_fraction, 0.25);

        assert!(args(&["--max-iterations", "0"]).pipeline_config().is_err());
    }

    #[test]
    fn aggregate_and_correlate_flags_replace_the_defaults() {
        use crate::analysis::aggregate::ReduceOp;
        use crate::data::model::GroupColumn;

        let config = args(&[
            "--aggregate",
            "location:diabetes:sum",
            "--aggregate",
            "gender:bmi:mean",
            "--correlate",
            "age,bmi",
        ])
        .pipeline_config()
        .unwrap();
        assert_eq!(
            config.aggregations,
            vec![
                AggregationRequest::new(GroupColumn::Location, NumericColumn::Diabetes, ReduceOp::Sum),
                AggregationRequest::new(GroupColumn::Gender, NumericColumn::Bmi, ReduceOp::Mean),
            ]
        );
        assert_eq!(
            config.correlation_columns,
            vec![NumericColumn::Age, NumericColumn::Bmi]
        );

        let defaults = args(&[]).pipeline_config().unwrap();
        assert_eq!(defaults.aggregations, AggregationRequest::dashboard_defaults());

        let argv = ["glucoscope", "--input", "r.csv", "--aggregate", "location:bmi:median"];
        assert!(Args::try_parse_from(argv).is_err());
        let argv = ["glucoscope", "--input", "r.csv", "--correlate", "age,weight"];
        assert!(Args::try_parse_from(argv).is_err());
    }

    #[test]
    fn parses_feature_vector() {
        let a = args(&["--predict", "54, 31.2, 180, 1, 0"]);
        assert_eq!(
            a.parse_features(5).unwrap(),
            Some(vec![54.0, 31.2, 180.0, 1.0, 0.0])
        );
        assert!(a.parse_features(4).is_err());
        assert!(args(&["--predict", "54,abc"]).parse_features(2).is_err());
        assert_eq!(args(&[]).parse_features(5).unwrap(), None);
    }
}
