use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::data::filter::FilteredView;
use crate::data::model::{DatasetSchema, GroupColumn, GroupKey, NumericColumn};
use crate::error::{AnalysisError, Result};

// ---------------------------------------------------------------------------
// Group-reduce
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReduceOp {
    Sum,
    Mean,
    /// Number of rows in the group; the metric values are not inspected.
    Count,
}

impl fmt::Display for ReduceOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReduceOp::Sum => "sum",
            ReduceOp::Mean => "mean",
            ReduceOp::Count => "count",
        })
    }
}

impl FromStr for ReduceOp {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sum" => Ok(ReduceOp::Sum),
            "mean" => Ok(ReduceOp::Mean),
            "count" => Ok(ReduceOp::Count),
            other => Err(AnalysisError::InvalidArgument(format!(
                "'{other}' is not one of sum, mean, count"
            ))),
        }
    }
}

/// One `(group-by column, metric column, op)` triple to compute per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationRequest {
    pub group_by: GroupColumn,
    pub metric: NumericColumn,
    pub op: ReduceOp,
}

impl AggregationRequest {
    pub fn new(group_by: GroupColumn, metric: NumericColumn, op: ReduceOp) -> Self {
        AggregationRequest {
            group_by,
            metric,
            op,
        }
    }

    /// The group-reduce charts of the diabetes dashboard.
    pub fn dashboard_defaults() -> Vec<Self> {
        use GroupColumn as G;
        use NumericColumn as N;
        vec![
            Self::new(G::Location, N::Hypertension, ReduceOp::Sum),
            Self::new(G::Year, N::Bmi, ReduceOp::Mean),
            Self::new(G::Year, N::HeartDisease, ReduceOp::Sum),
            Self::new(G::Gender, N::Bmi, ReduceOp::Mean),
            Self::new(G::Location, N::Diabetes, ReduceOp::Sum),
            Self::new(G::SmokingHistory, N::Age, ReduceOp::Count),
            Self::new(G::Diabetes, N::Age, ReduceOp::Count),
        ]
    }
}

/// Parses `group:metric:op`, e.g. `location:diabetes:sum`.
impl FromStr for AggregationRequest {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(':').map(str::trim).collect();
        let [group_by, metric, op] = parts.as_slice() else {
            return Err(AnalysisError::InvalidArgument(format!(
                "aggregation '{s}' is not of the form group:metric:op"
            )));
        };
        Ok(AggregationRequest::new(group_by.parse()?, metric.parse()?, op.parse()?))
    }
}

/// One scalar per distinct group value present in the view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregationResult {
    pub group_by: GroupColumn,
    pub metric: NumericColumn,
    pub op: ReduceOp,
    pub groups: BTreeMap<GroupKey, f64>,
}

impl AggregationResult {
    pub fn get(&self, key: &GroupKey) -> Option<f64> {
        self.groups.get(key).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Group the view by `group_by` and reduce `metric` within each group.
///
/// Keys are exactly the group values present in the view, in sorted order.
/// Values inside a group are reduced in sorted order, so permuting the view
/// never changes the result.
pub fn group_reduce(
    view: &FilteredView<'_>,
    group_by: GroupColumn,
    metric: NumericColumn,
    op: ReduceOp,
) -> AggregationResult {
    let groups = collect_groups(view, group_by, metric)
        .into_iter()
        .map(|(key, values)| (key, reduce(values, op)))
        .collect();

    AggregationResult {
        group_by,
        metric,
        op,
        groups,
    }
}

pub fn run_request(view: &FilteredView<'_>, request: &AggregationRequest) -> AggregationResult {
    group_reduce(view, request.group_by, request.metric, request.op)
}

fn collect_groups(
    view: &FilteredView<'_>,
    group_by: GroupColumn,
    metric: NumericColumn,
) -> BTreeMap<GroupKey, Vec<f64>> {
    let mut groups: BTreeMap<GroupKey, Vec<f64>> = BTreeMap::new();
    for record in view.iter() {
        groups
            .entry(record.group_key(group_by))
            .or_default()
            .push(record.numeric(metric));
    }
    for values in groups.values_mut() {
        values.sort_by(f64::total_cmp);
    }
    groups
}

fn reduce(values: Vec<f64>, op: ReduceOp) -> f64 {
    let n = values.len() as f64;
    match op {
        ReduceOp::Count => n,
        ReduceOp::Sum => values.iter().sum(),
        ReduceOp::Mean => values.iter().sum::<f64>() / n,
    }
}

// ---------------------------------------------------------------------------
// Race distribution: column-wise sum over the one-hot block
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RaceCount {
    pub race: String,
    pub count: u64,
}

/// Counts per race indicator column, in schema order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RaceDistribution {
    pub counts: Vec<RaceCount>,
}

impl RaceDistribution {
    pub fn total(&self) -> u64 {
        self.counts.iter().map(|c| c.count).sum()
    }

    pub fn get(&self, race: &str) -> Option<u64> {
        self.counts.iter().find(|c| c.race == race).map(|c| c.count)
    }
}

/// Sum every race indicator column across all rows of the view.
pub fn race_distribution(view: &FilteredView<'_>, schema: &DatasetSchema) -> RaceDistribution {
    let mut sums = vec![0u64; schema.race_columns.len()];
    for record in view.iter() {
        for (sum, &flag) in sums.iter_mut().zip(&record.race) {
            *sum += u64::from(flag);
        }
    }

    RaceDistribution {
        counts: schema
            .race_columns
            .iter()
            .zip(sums)
            .map(|(race, count)| RaceCount {
                race: race.clone(),
                count,
            })
            .collect(),
    }
}

// ---------------------------------------------------------------------------
// Histogram
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram {
    pub metric: NumericColumn,
    pub bins: Vec<HistogramBin>,
}

/// Equal-width bins over `[min, max]` of `metric`; the last bin is closed.
pub fn histogram(view: &FilteredView<'_>, metric: NumericColumn, bins: usize) -> Result<Histogram> {
    if bins == 0 {
        return Err(AnalysisError::InvalidArgument(
            "histogram needs at least one bin".into(),
        ));
    }

    let values: Vec<f64> = view.iter().map(|r| r.numeric(metric)).collect();
    let Some((lo, hi)) = min_max(&values) else {
        return Ok(Histogram {
            metric,
            bins: Vec::new(),
        });
    };

    if hi == lo {
        return Ok(Histogram {
            metric,
            bins: vec![HistogramBin {
                lower: lo,
                upper: hi,
                count: values.len() as u64,
            }],
        });
    }

    let width = (hi - lo) / bins as f64;
    let mut counts = vec![0u64; bins];
    for v in &values {
        let idx = (((v - lo) / width) as usize).min(bins - 1);
        counts[idx] += 1;
    }

    Ok(Histogram {
        metric,
        bins: counts
            .into_iter()
            .enumerate()
            .map(|(i, count)| HistogramBin {
                lower: lo + width * i as f64,
                upper: if i + 1 == bins { hi } else { lo + width * (i + 1) as f64 },
                count,
            })
            .collect(),
    })
}

fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    values.iter().fold(None, |acc, &v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

// ---------------------------------------------------------------------------
// Per-group distribution summary (box / violin plots)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionSummary {
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

impl DistributionSummary {
    /// `sorted` must be ascending and non-empty.
    fn from_sorted(sorted: &[f64]) -> Self {
        DistributionSummary {
            count: sorted.len(),
            mean: sorted.iter().sum::<f64>() / sorted.len() as f64,
            min: sorted[0],
            q1: quantile(sorted, 0.25),
            median: quantile(sorted, 0.5),
            q3: quantile(sorted, 0.75),
            max: sorted[sorted.len() - 1],
        }
    }
}

/// Linear-interpolation quantile of an ascending, non-empty slice.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummary {
    pub group_by: GroupColumn,
    pub metric: NumericColumn,
    pub groups: BTreeMap<GroupKey, DistributionSummary>,
}

pub fn group_summary(
    view: &FilteredView<'_>,
    group_by: GroupColumn,
    metric: NumericColumn,
) -> GroupSummary {
    GroupSummary {
        group_by,
        metric,
        groups: collect_groups(view, group_by, metric)
            .into_iter()
            .map(|(key, values)| (key, DistributionSummary::from_sorted(&values)))
            .collect(),
    }
}

// ---------------------------------------------------------------------------
// Two-level group-reduce (treemaps)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NestedAggregation {
    pub outer: GroupColumn,
    pub inner: GroupColumn,
    pub metric: NumericColumn,
    pub op: ReduceOp,
    pub groups: BTreeMap<GroupKey, BTreeMap<GroupKey, f64>>,
}

pub fn nested_group_reduce(
    view: &FilteredView<'_>,
    outer: GroupColumn,
    inner: GroupColumn,
    metric: NumericColumn,
    op: ReduceOp,
) -> NestedAggregation {
    let mut partitions: BTreeMap<GroupKey, Vec<_>> = BTreeMap::new();
    for record in view.iter() {
        partitions
            .entry(record.group_key(outer))
            .or_default()
            .push(record);
    }

    let groups = partitions
        .into_iter()
        .map(|(key, records)| {
            let sub = FilteredView::from_records(records);
            (key, group_reduce(&sub, inner, metric, op).groups)
        })
        .collect();

    NestedAggregation {
        outer,
        inner,
        metric,
        op,
        groups,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::tests::record;
    use crate::data::model::Record;

    fn records() -> Vec<Record> {
        let mut rows = vec![
            record("Texas", "Female", 40.0, 0),
            record("Alabama", "Male", 12.0, 1),
            record("Texas", "Male", 77.0, 0),
            record("Ohio", "Female", 25.5, 0),
            record("Texas", "Female", 18.0, 1),
        ];
        rows[0].hypertension = 1;
        rows[2].hypertension = 1;
        rows[3].hypertension = 1;
        rows[1].bmi = 18.1;
        rows[2].bmi = 33.3;
        rows[1].race = vec![1, 0, 0, 0, 0];
        rows[3].race = vec![0, 0, 0, 1, 0];
        rows[2].year = 2020;
        rows
    }

    fn view(rows: &[Record]) -> FilteredView<'_> {
        FilteredView::from_records(rows.iter().collect())
    }

    fn text(s: &str) -> GroupKey {
        GroupKey::Text(s.to_string())
    }

    #[test]
    fn sums_per_location() {
        let rows = records();
        let result = group_reduce(
            &view(&rows),
            GroupColumn::Location,
            NumericColumn::Hypertension,
            ReduceOp::Sum,
        );
        assert_eq!(result.groups.len(), 3);
        assert_eq!(result.get(&text("Texas")), Some(2.0));
        assert_eq!(result.get(&text("Ohio")), Some(1.0));
        assert_eq!(result.get(&text("Alabama")), Some(0.0));
    }

    #[test]
    fn mean_and_count_per_gender() {
        let rows = records();
        let v = view(&rows);
        let mean = group_reduce(&v, GroupColumn::Gender, NumericColumn::Bmi, ReduceOp::Mean);
        assert!((mean.get(&text("Male")).unwrap() - (18.1 + 33.3) / 2.0).abs() < 1e-12);

        let count = group_reduce(&v, GroupColumn::Gender, NumericColumn::Age, ReduceOp::Count);
        assert_eq!(count.get(&text("Female")), Some(3.0));
        assert_eq!(count.get(&text("Male")), Some(2.0));
    }

    #[test]
    fn only_present_groups_are_returned() {
        let rows = records();
        let result = group_reduce(&view(&rows), GroupColumn::Year, NumericColumn::Bmi, ReduceOp::Mean);
        let keys: Vec<_> = result.groups.keys().cloned().collect();
        assert_eq!(keys, vec![GroupKey::Integer(2019), GroupKey::Integer(2020)]);
    }

    #[test]
    fn permuting_the_view_does_not_change_results() {
        let mut rows = records();
        rows[0].bmi = 0.1;
        rows[3].bmi = 1e16;
        rows[4].bmi = 0.2;
        let forward = view(&rows);
        let backward = FilteredView::from_records(rows.iter().rev().collect());

        for request in AggregationRequest::dashboard_defaults() {
            assert_eq!(run_request(&forward, &request), run_request(&backward, &request));
        }
        assert_eq!(
            group_reduce(&forward, GroupColumn::Gender, NumericColumn::Bmi, ReduceOp::Sum),
            group_reduce(&backward, GroupColumn::Gender, NumericColumn::Bmi, ReduceOp::Sum)
        );
    }

    #[test]
    fn empty_view_gives_empty_result() {
        let result = group_reduce(
            &FilteredView::default(),
            GroupColumn::Location,
            NumericColumn::Diabetes,
            ReduceOp::Sum,
        );
        assert!(result.is_empty());
    }

    #[test]
    fn race_distribution_is_a_column_sum() {
        let rows = records();
        let schema = DatasetSchema::default();
        let dist = race_distribution(&view(&rows), &schema);

        for (i, entry) in dist.counts.iter().enumerate() {
            let independent: u64 = rows.iter().map(|r| u64::from(r.race[i])).sum();
            assert_eq!(entry.count, independent);
            assert_eq!(entry.race, schema.race_columns[i]);
        }
        assert_eq!(dist.total(), rows.len() as u64);
        assert_eq!(dist.get("race:Caucasian"), Some(3));
    }

    #[test]
    fn histogram_counts_cover_every_row() {
        let rows = records();
        let hist = histogram(&view(&rows), NumericColumn::Age, 4).unwrap();
        assert_eq!(hist.bins.len(), 4);
        assert_eq!(hist.bins.iter().map(|b| b.count).sum::<u64>(), rows.len() as u64);
        assert_eq!(hist.bins[0].lower, 12.0);
        assert_eq!(hist.bins[3].upper, 77.0);
        // 77.0 sits on the closed upper edge of the last bin.
        assert!(hist.bins[3].count >= 1);
    }

    #[test]
    fn histogram_rejects_zero_bins() {
        let rows = records();
        assert!(histogram(&view(&rows), NumericColumn::Bmi, 0).is_err());
        assert!(histogram(&FilteredView::default(), NumericColumn::Bmi, 3)
            .unwrap()
            .bins
            .is_empty());
    }

    #[test]
    fn group_summary_quantiles() {
        let rows = records();
        let summary = group_summary(&view(&rows), GroupColumn::Location, NumericColumn::Age);
        let texas = &summary.groups[&text("Texas")];
        assert_eq!(texas.count, 3);
        assert_eq!(texas.min, 18.0);
        assert_eq!(texas.median, 40.0);
        assert_eq!(texas.max, 77.0);
        assert_eq!(texas.q1, 29.0);
        assert_eq!(texas.q3, 58.5);
    }

    #[test]
    fn nested_groups_by_location_then_gender() {
        let rows = records();
        let nested = nested_group_reduce(
            &view(&rows),
            GroupColumn::Location,
            GroupColumn::Gender,
            NumericColumn::Age,
            ReduceOp::Sum,
        );
        let texas = &nested.groups[&text("Texas")];
        assert_eq!(texas[&text("Female")], 58.0);
        assert_eq!(texas[&text("Male")], 77.0);
        assert!(!nested.groups[&text("Ohio")].contains_key(&text("Male")));
    }

    #[test]
    fn aggregation_request_parses_from_text() {
        let request: AggregationRequest = "location:diabetes:sum".parse().unwrap();
        assert_eq!(
            request,
            AggregationRequest::new(GroupColumn::Location, NumericColumn::Diabetes, ReduceOp::Sum)
        );
        let request: AggregationRequest = "smoking_history : age : count".parse().unwrap();
        assert_eq!(request.op, ReduceOp::Count);

        assert!("location:diabetes".parse::<AggregationRequest>().is_err());
        assert!("location:diabetes:median".parse::<AggregationRequest>().is_err());
        assert!("bmi:diabetes:sum".parse::<AggregationRequest>().is_err());
    }
}
