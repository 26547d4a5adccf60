use std::collections::BTreeSet;

use log::debug;
use serde::{Deserialize, Serialize};

use super::model::{Dataset, Record};
use crate::error::{AnalysisError, Result};

// ---------------------------------------------------------------------------
// Filter predicate: accepted categories plus an inclusive age range
// ---------------------------------------------------------------------------

/// Selection constraints supplied by the caller for one pipeline run.
///
/// An empty `locations` or `genders` set selects nothing; there is no
/// implicit "all".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCriteria {
    pub locations: BTreeSet<String>,
    pub genders: BTreeSet<String>,
    pub age_min: f64,
    pub age_max: f64,
}

impl FilterCriteria {
    /// Criteria with every location and gender selected and the age range
    /// widened to whole years around the dataset's ages.
    pub fn all(dataset: &Dataset) -> Self {
        let (age_min, age_max) = dataset
            .age_bounds()
            .map(|(lo, hi)| (lo.floor(), hi.ceil()))
            .unwrap_or((0.0, 0.0));
        FilterCriteria {
            locations: dataset.locations().clone(),
            genders: dataset.genders().clone(),
            age_min,
            age_max,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.age_min.is_finite() || !self.age_max.is_finite() {
            return Err(AnalysisError::InvalidCriteria(
                "age bounds must be finite".into(),
            ));
        }
        if self.age_min > self.age_max {
            return Err(AnalysisError::InvalidCriteria(format!(
                "age_min {} is greater than age_max {}",
                self.age_min, self.age_max
            )));
        }
        Ok(())
    }

    /// The conjunctive four-part test applied to each record.
    pub fn matches(&self, record: &Record) -> bool {
        self.locations.contains(&record.location)
            && self.genders.contains(&record.gender)
            && self.age_min <= record.age
            && record.age <= self.age_max
    }
}

// ---------------------------------------------------------------------------
// FilteredView – records that passed, in dataset order
// ---------------------------------------------------------------------------

/// Ordered subset of a [`Dataset`] borrowed for the duration of one run.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct FilteredView<'a> {
    records: Vec<&'a Record>,
}

impl<'a> FilteredView<'a> {
    pub fn from_records(records: Vec<&'a Record>) -> Self {
        FilteredView { records }
    }

    pub fn records(&self) -> &[&'a Record] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a Record> + '_ {
        self.records.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Fail with [`AnalysisError::EmptyFilterResult`] when nothing passed.
    pub fn require_non_empty(&self) -> Result<()> {
        if self.is_empty() {
            Err(AnalysisError::EmptyFilterResult)
        } else {
            Ok(())
        }
    }
}

/// Return the records that pass `criteria`, preserving dataset order.
///
/// The criteria are validated first; an empty result is not an error here.
pub fn apply<'a>(dataset: &'a Dataset, criteria: &FilterCriteria) -> Result<FilteredView<'a>> {
    criteria.validate()?;

    let records: Vec<&Record> = dataset
        .records()
        .iter()
        .filter(|record| criteria.matches(record))
        .collect();

    debug!(
        "filter kept {} of {} records ({} locations, {} genders, age {}..={})",
        records.len(),
        dataset.len(),
        criteria.locations.len(),
        criteria.genders.len(),
        criteria.age_min,
        criteria.age_max
    );
    Ok(FilteredView { records })
}
