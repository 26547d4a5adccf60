use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};

// ---------------------------------------------------------------------------
// GroupKey – a single cell of a categorical column
// ---------------------------------------------------------------------------

/// The value a record contributes to a grouping column.
///
/// Integers sort before text so `year` and `diabetes` groups come out in
/// numeric order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(untagged)]
pub enum GroupKey {
    Integer(i64),
    Text(String),
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupKey::Integer(i) => write!(f, "{i}"),
            GroupKey::Text(s) => write!(f, "{s}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Column identifiers
// ---------------------------------------------------------------------------

/// Categorical columns a view can be grouped by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupColumn {
    Location,
    Gender,
    Year,
    SmokingHistory,
    Diabetes,
}

impl GroupColumn {
    pub fn name(self) -> &'static str {
        match self {
            GroupColumn::Location => "location",
            GroupColumn::Gender => "gender",
            GroupColumn::Year => "year",
            GroupColumn::SmokingHistory => "smoking_history",
            GroupColumn::Diabetes => "diabetes",
        }
    }
}

impl FromStr for GroupColumn {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "location" => Ok(GroupColumn::Location),
            "gender" => Ok(GroupColumn::Gender),
            "year" => Ok(GroupColumn::Year),
            "smoking_history" => Ok(GroupColumn::SmokingHistory),
            "diabetes" => Ok(GroupColumn::Diabetes),
            other => Err(AnalysisError::InvalidArgument(format!(
                "'{other}' is not a grouping column"
            ))),
        }
    }
}

impl fmt::Display for GroupColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Numeric columns usable as metrics, model features and correlation inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericColumn {
    Age,
    Bmi,
    BloodGlucoseLevel,
    Hypertension,
    HeartDisease,
    Diabetes,
}

impl NumericColumn {
    /// Feature set of the diabetes classifier and default correlation subset.
    pub const CLINICAL: [NumericColumn; 5] = [
        NumericColumn::Age,
        NumericColumn::Bmi,
        NumericColumn::BloodGlucoseLevel,
        NumericColumn::Hypertension,
        NumericColumn::HeartDisease,
    ];

    pub fn name(self) -> &'static str {
        match self {
            NumericColumn::Age => "age",
            NumericColumn::Bmi => "bmi",
            NumericColumn::BloodGlucoseLevel => "blood_glucose_level",
            NumericColumn::Hypertension => "hypertension",
            NumericColumn::HeartDisease => "heart_disease",
            NumericColumn::Diabetes => "diabetes",
        }
    }
}

impl FromStr for NumericColumn {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "age" => Ok(NumericColumn::Age),
            "bmi" => Ok(NumericColumn::Bmi),
            "blood_glucose_level" => Ok(NumericColumn::BloodGlucoseLevel),
            "hypertension" => Ok(NumericColumn::Hypertension),
            "heart_disease" => Ok(NumericColumn::HeartDisease),
            "diabetes" => Ok(NumericColumn::Diabetes),
            other => Err(AnalysisError::InvalidArgument(format!(
                "'{other}' is not a numeric column"
            ))),
        }
    }
}

impl fmt::Display for NumericColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Schema – which named columns make up the table
// ---------------------------------------------------------------------------

/// Named description of the input table.
///
/// Scalar columns are fixed; the one-hot race block is listed explicitly so
/// that loading never depends on column positions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetSchema {
    pub race_columns: Vec<String>,
}

impl DatasetSchema {
    pub const LOCATION: &'static str = "location";
    pub const GENDER: &'static str = "gender";
    pub const AGE: &'static str = "age";
    pub const BMI: &'static str = "bmi";
    pub const BLOOD_GLUCOSE_LEVEL: &'static str = "blood_glucose_level";
    pub const HYPERTENSION: &'static str = "hypertension";
    pub const HEART_DISEASE: &'static str = "heart_disease";
    pub const DIABETES: &'static str = "diabetes";
    pub const YEAR: &'static str = "year";
    pub const SMOKING_HISTORY: &'static str = "smoking_history";

    pub fn new(race_columns: Vec<String>) -> Result<Self> {
        if race_columns.is_empty() {
            return Err(AnalysisError::InvalidArgument(
                "race block needs at least one indicator column".into(),
            ));
        }
        let unique: BTreeSet<&String> = race_columns.iter().collect();
        if unique.len() != race_columns.len() {
            return Err(AnalysisError::InvalidArgument(
                "race block lists a column twice".into(),
            ));
        }
        Ok(DatasetSchema { race_columns })
    }

    /// Every column name the loader must find.
    pub fn required_columns(&self) -> Vec<&str> {
        let mut cols = vec![
            Self::YEAR,
            Self::GENDER,
            Self::AGE,
            Self::LOCATION,
            Self::HYPERTENSION,
            Self::HEART_DISEASE,
            Self::SMOKING_HISTORY,
            Self::BMI,
            Self::BLOOD_GLUCOSE_LEVEL,
            Self::DIABETES,
        ];
        cols.extend(self.race_columns.iter().map(String::as_str));
        cols
    }
}

impl Default for DatasetSchema {
    fn default() -> Self {
        DatasetSchema {
            race_columns: [
                "race:AfricanAmerican",
                "race:Asian",
                "race:Caucasian",
                "race:Hispanic",
                "race:Other",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Record – one row of the table
// ---------------------------------------------------------------------------

/// A single patient record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub location: String,
    pub gender: String,
    pub age: f64,
    pub bmi: f64,
    pub blood_glucose_level: f64,
    pub hypertension: u8,
    pub heart_disease: u8,
    pub diabetes: u8,
    pub year: i64,
    pub smoking_history: String,
    /// One indicator per entry of [`DatasetSchema::race_columns`].
    pub race: Vec<u8>,
}

impl Record {
    pub fn numeric(&self, column: NumericColumn) -> f64 {
        match column {
            NumericColumn::Age => self.age,
            NumericColumn::Bmi => self.bmi,
            NumericColumn::BloodGlucoseLevel => self.blood_glucose_level,
            NumericColumn::Hypertension => f64::from(self.hypertension),
            NumericColumn::HeartDisease => f64::from(self.heart_disease),
            NumericColumn::Diabetes => f64::from(self.diabetes),
        }
    }

    pub fn group_key(&self, column: GroupColumn) -> GroupKey {
        match column {
            GroupColumn::Location => GroupKey::Text(self.location.clone()),
            GroupColumn::Gender => GroupKey::Text(self.gender.clone()),
            GroupColumn::Year => GroupKey::Integer(self.year),
            GroupColumn::SmokingHistory => GroupKey::Text(self.smoking_history.clone()),
            GroupColumn::Diabetes => GroupKey::Integer(i64::from(self.diabetes)),
        }
    }

    /// Check the value-range invariants of a loaded row.
    fn validate(&self, row: usize, schema: &DatasetSchema) -> Result<()> {
        if !self.age.is_finite() || self.age < 0.0 {
            return Err(AnalysisError::bad_cell(DatasetSchema::AGE, row, "must be >= 0"));
        }
        if !self.bmi.is_finite() || self.bmi <= 0.0 {
            return Err(AnalysisError::bad_cell(DatasetSchema::BMI, row, "must be > 0"));
        }
        if !self.blood_glucose_level.is_finite() || self.blood_glucose_level <= 0.0 {
            return Err(AnalysisError::bad_cell(
                DatasetSchema::BLOOD_GLUCOSE_LEVEL,
                row,
                "must be > 0",
            ));
        }
        for (name, value) in [
            (DatasetSchema::HYPERTENSION, self.hypertension),
            (DatasetSchema::HEART_DISEASE, self.heart_disease),
            (DatasetSchema::DIABETES, self.diabetes),
        ] {
            if value > 1 {
                return Err(AnalysisError::bad_cell(name, row, "indicator must be 0 or 1"));
            }
        }
        if self.race.len() != schema.race_columns.len() {
            return Err(AnalysisError::bad_cell(
                &schema.race_columns.join(","),
                row,
                format!(
                    "expected {} race indicators, found {}",
                    schema.race_columns.len(),
                    self.race.len()
                ),
            ));
        }
        for (name, &value) in schema.race_columns.iter().zip(&self.race) {
            if value > 1 {
                return Err(AnalysisError::bad_cell(name, row, "indicator must be 0 or 1"));
            }
        }
        let set = self.race.iter().filter(|&&v| v == 1).count();
        if set != 1 {
            return Err(AnalysisError::bad_cell(
                &schema.race_columns.join(","),
                row,
                format!("exactly one race indicator must be set, found {set}"),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Dataset – the complete loaded table
// ---------------------------------------------------------------------------

/// The full loaded table with pre-computed categorical indices.
///
/// Read-only after construction; share it behind `&` or `Arc` across runs.
#[derive(Debug, Clone)]
pub struct Dataset {
    schema: DatasetSchema,
    records: Vec<Record>,
    locations: BTreeSet<String>,
    genders: BTreeSet<String>,
}

impl Dataset {
    /// Validate every record against `schema` and build the indices.
    pub fn from_records(schema: DatasetSchema, records: Vec<Record>) -> Result<Self> {
        let mut locations = BTreeSet::new();
        let mut genders = BTreeSet::new();

        for (row, record) in records.iter().enumerate() {
            record.validate(row, &schema)?;
            locations.insert(record.location.clone());
            genders.insert(record.gender.clone());
        }

        Ok(Dataset {
            schema,
            records,
            locations,
            genders,
        })
    }

    pub fn schema(&self) -> &DatasetSchema {
        &self.schema
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Sorted distinct locations.
    pub fn locations(&self) -> &BTreeSet<String> {
        &self.locations
    }

    /// Sorted distinct genders.
    pub fn genders(&self) -> &BTreeSet<String> {
        &self.genders
    }

    /// Smallest and largest age, `None` for an empty dataset.
    pub fn age_bounds(&self) -> Option<(f64, f64)> {
        self.records.iter().map(|r| r.age).fold(None, |acc, age| match acc {
            None => Some((age, age)),
            Some((lo, hi)) => Some((lo.min(age), hi.max(age))),
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
