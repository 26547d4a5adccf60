use std::path::Path;

use log::{info, warn};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

use crate::analysis::aggregate::{
    self, AggregationRequest, AggregationResult, GroupSummary, Histogram, NestedAggregation,
    RaceDistribution, ReduceOp,
};
use crate::analysis::correlation::{self, CorrelationMatrix, LinearFit};
use crate::data::filter::{self, FilterCriteria, FilteredView};
use crate::data::model::{Dataset, GroupColumn, NumericColumn};
use crate::error::{AnalysisError, Result};
use crate::predict::{self, ModelArtifact, ModelConfig};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistogramRequest {
    pub metric: NumericColumn,
    pub bins: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryRequest {
    pub group_by: GroupColumn,
    pub metric: NumericColumn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NestedRequest {
    pub outer: GroupColumn,
    pub inner: GroupColumn,
    pub metric: NumericColumn,
    pub op: ReduceOp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FitRequest {
    pub x: NumericColumn,
    pub y: NumericColumn,
}

/// What one pipeline run computes. Defaults reproduce the diabetes dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub model: ModelConfig,
    pub aggregations: Vec<AggregationRequest>,
    pub correlation_columns: Vec<NumericColumn>,
    pub histograms: Vec<HistogramRequest>,
    pub summaries: Vec<SummaryRequest>,
    pub nested: Vec<NestedRequest>,
    pub linear_fits: Vec<FitRequest>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            model: ModelConfig::default(),
            aggregations: AggregationRequest::dashboard_defaults(),
            correlation_columns: NumericColumn::CLINICAL.to_vec(),
            histograms: vec![HistogramRequest {
                metric: NumericColumn::Bmi,
                bins: 20,
            }],
            summaries: vec![SummaryRequest {
                group_by: GroupColumn::Gender,
                metric: NumericColumn::Bmi,
            }],
            nested: vec![NestedRequest {
                outer: GroupColumn::Location,
                inner: GroupColumn::Gender,
                metric: NumericColumn::Bmi,
                op: ReduceOp::Sum,
            }],
            linear_fits: vec![FitRequest {
                x: NumericColumn::Bmi,
                y: NumericColumn::BloodGlucoseLevel,
            }],
        }
    }
}

impl PipelineConfig {
    /// Read a JSON config; absent fields keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let config: PipelineConfig = serde_json::from_reader(std::io::BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.model.validate()?;
        if let Some(h) = self.histograms.iter().find(|h| h.bins == 0) {
            return Err(AnalysisError::InvalidArgument(format!(
                "histogram of {} needs at least one bin",
                h.metric
            )));
        }
        if self.correlation_columns.is_empty() {
            return Err(AnalysisError::InvalidArgument(
                "correlation needs at least one column".into(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Result of a stage that may fail without failing the whole run.
///
/// Serialises as `{"status": "ok", "value": ..}` or
/// `{"status": "error", "kind": .., "message": ..}`.
#[derive(Debug)]
pub struct StageOutcome<T>(pub Result<T>);

impl<T> StageOutcome<T> {
    pub fn ok(&self) -> Option<&T> {
        self.0.as_ref().ok()
    }

    pub fn err(&self) -> Option<&AnalysisError> {
        self.0.as_ref().err()
    }
}

impl<T: Serialize> Serialize for StageOutcome<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match &self.0 {
            Ok(value) => {
                let mut s = serializer.serialize_struct("StageOutcome", 2)?;
                s.serialize_field("status", "ok")?;
                s.serialize_field("value", value)?;
                s.end()
            }
            Err(err) => {
                let mut s = serializer.serialize_struct("StageOutcome", 3)?;
                s.serialize_field("status", "error")?;
                s.serialize_field("kind", err.kind())?;
                s.serialize_field("message", &err.to_string())?;
                s.end()
            }
        }
    }
}

/// Everything one run produced, handed to the rendering side.
#[derive(Debug, Serialize)]
pub struct PipelineOutput<'a> {
    pub criteria: FilterCriteria,
    pub row_count: usize,
    pub records: FilteredView<'a>,
    pub aggregations: Vec<AggregationResult>,
    pub race_distribution: RaceDistribution,
    pub histograms: Vec<Histogram>,
    pub summaries: Vec<GroupSummary>,
    pub nested: Vec<NestedAggregation>,
    pub linear_fits: Vec<StageOutcome<LinearFit>>,
    pub model: StageOutcome<ModelArtifact>,
    pub correlation: StageOutcome<CorrelationMatrix>,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Filter `dataset` with `criteria` and compute every downstream output.
///
/// Invalid criteria or config fail the whole run. Modelling, correlation
/// and regression failures (empty or degenerate views) are reported inside
/// the output so the remaining results stay usable.
pub fn run<'a>(
    dataset: &'a Dataset,
    criteria: &FilterCriteria,
    config: &PipelineConfig,
) -> Result<PipelineOutput<'a>> {
    config.validate()?;
    let view = filter::apply(dataset, criteria)?;
    info!("{} of {} records match the filters", view.len(), dataset.len());

    let aggregations = config
        .aggregations
        .iter()
        .map(|request| aggregate::run_request(&view, request))
        .collect();
    let race_distribution = aggregate::race_distribution(&view, dataset.schema());

    let histograms = config
        .histograms
        .iter()
        .map(|h| aggregate::histogram(&view, h.metric, h.bins))
        .collect::<Result<Vec<_>>>()?;
    let summaries = config
        .summaries
        .iter()
        .map(|s| aggregate::group_summary(&view, s.group_by, s.metric))
        .collect();
    let nested = config
        .nested
        .iter()
        .map(|n| aggregate::nested_group_reduce(&view, n.outer, n.inner, n.metric, n.op))
        .collect();
    let linear_fits = config
        .linear_fits
        .iter()
        .map(|f| StageOutcome(correlation::linear_fit(&view, f.x, f.y)))
        .collect();

    let model = StageOutcome(predict::train_and_evaluate(&view, &config.model));
    if let Some(err) = model.err() {
        warn!("model stage skipped: {err}");
    }
    let correlation = StageOutcome(correlation::correlate(&view, &config.correlation_columns));
    if let Some(err) = correlation.err() {
        warn!("correlation stage skipped: {err}");
    }

    Ok(PipelineOutput {
        criteria: criteria.clone(),
        row_count: view.len(),
        records: view,
        aggregations,
        race_distribution,
        histograms,
        summaries,
        nested,
        linear_fits,
        model,
        correlation,
    })
}
