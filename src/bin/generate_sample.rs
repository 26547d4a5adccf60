use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{Field, Schema};
use arrow::record_batch::RecordBatch;
use clap::Parser;
use parquet::arrow::ArrowWriter;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use glucoscope::DatasetSchema;

/// Write a synthetic diabetes dataset (.csv or .parquet)
#[derive(Parser, Debug)]
#[command(about, long_about = None)]
struct Args {
    /// Output file; the extension picks the format
    #[arg(short, long, default_value = "sample_data.csv")]
    output: PathBuf,

    /// Number of records
    #[arg(short, long, default_value = "1000")]
    rows: usize,

    #[arg(long, default_value = "42")]
    seed: u64,
}

const LOCATIONS: [&str; 8] = [
    "Alabama", "Alaska", "Arizona", "Connecticut", "Michigan", "Nevada", "Texas", "Wyoming",
];
const SMOKING: [&str; 6] = ["never", "No Info", "current", "former", "ever", "not current"];

/// Column-oriented rows, laid out like the public diabetes prediction dataset.
#[derive(Default)]
struct Columns {
    year: Vec<i64>,
    gender: Vec<String>,
    age: Vec<f64>,
    location: Vec<String>,
    race: Vec<usize>,
    hypertension: Vec<i64>,
    heart_disease: Vec<i64>,
    smoking_history: Vec<String>,
    bmi: Vec<f64>,
    hba1c_level: Vec<f64>,
    blood_glucose_level: Vec<f64>,
    diabetes: Vec<i64>,
}

/// Normal draw clamped to a plausible clinical range.
struct Clamped {
    dist: Normal<f64>,
    lo: f64,
    hi: f64,
}

impl Clamped {
    fn new(mean: f64, std_dev: f64, lo: f64, hi: f64) -> Result<Self> {
        let dist = Normal::new(mean, std_dev).context("invalid normal distribution")?;
        Ok(Clamped { dist, lo, hi })
    }

    fn sample(&self, rng: &mut StdRng) -> f64 {
        self.dist.sample(rng).clamp(self.lo, self.hi)
    }
}

fn generate(rows: usize, n_races: usize, rng: &mut StdRng) -> Result<Columns> {
    let bmi_dist = Clamped::new(27.3, 6.0, 12.0, 70.0)?;
    let glucose_dist = Clamped::new(125.0, 30.0, 80.0, 300.0)?;
    let hba1c_healthy: Normal<f64> = Normal::new(5.4, 0.6).context("invalid normal distribution")?;
    let hba1c_diabetic: Normal<f64> = Normal::new(6.9, 0.6).context("invalid normal distribution")?;

    let mut c = Columns::default();
    for _ in 0..rows {
        let age = f64::from(rng.gen_range(1..=80u32));
        let bmi = bmi_dist.sample(rng);
        let hypertension = rng.gen_bool(0.02 + age / 600.0);
        let heart_disease = rng.gen_bool(0.01 + age / 1500.0);
        let glucose = glucose_dist.sample(rng).round();

        // Risk rises with glucose, bmi, age and the comorbidities.
        let logit = -11.2
            + 0.045 * glucose
            + 0.06 * bmi
            + 0.04 * age
            + 0.8 * f64::from(u8::from(hypertension))
            + 0.7 * f64::from(u8::from(heart_disease));
        let diabetic = rng.gen_bool(1.0 / (1.0 + (-logit).exp()));
        let hba1c = if diabetic { &hba1c_diabetic } else { &hba1c_healthy };

        c.year.push(rng.gen_range(2015..=2022));
        c.gender.push(pick(rng, &["Female", "Male"]));
        c.age.push(age);
        c.location.push(pick(rng, &LOCATIONS));
        c.race.push(rng.gen_range(0..n_races));
        c.hypertension.push(i64::from(hypertension));
        c.heart_disease.push(i64::from(heart_disease));
        c.smoking_history.push(pick(rng, &SMOKING));
        c.bmi.push((bmi * 100.0).round() / 100.0);
        c.hba1c_level.push((hba1c.sample(rng) * 10.0).round() / 10.0);
        c.blood_glucose_level.push(glucose);
        c.diabetes.push(i64::from(diabetic));
    }
    Ok(c)
}

fn pick(rng: &mut StdRng, items: &[&str]) -> String {
    items.choose(rng).copied().unwrap_or_default().to_string()
}

fn write_csv(path: &Path, schema: &DatasetSchema, c: &Columns) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).context("creating CSV file")?;

    let mut header = vec!["year", "gender", "age", "location"];
    header.extend(schema.race_columns.iter().map(String::as_str));
    header.extend([
        "hypertension",
        "heart_disease",
        "smoking_history",
        "bmi",
        "hbA1c_level",
        "blood_glucose_level",
        "diabetes",
    ]);
    writer.write_record(&header)?;

    for i in 0..c.year.len() {
        let mut row = vec![
            c.year[i].to_string(),
            c.gender[i].clone(),
            c.age[i].to_string(),
            c.location[i].clone(),
        ];
        row.extend((0..schema.race_columns.len()).map(|r| u8::from(r == c.race[i]).to_string()));
        row.extend([
            c.hypertension[i].to_string(),
            c.heart_disease[i].to_string(),
            c.smoking_history[i].clone(),
            c.bmi[i].to_string(),
            c.hba1c_level[i].to_string(),
            c.blood_glucose_level[i].to_string(),
            c.diabetes[i].to_string(),
        ]);
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

fn ints(v: &[i64]) -> ArrayRef {
    Arc::new(Int64Array::from(v.to_vec()))
}

fn floats(v: &[f64]) -> ArrayRef {
    Arc::new(Float64Array::from(v.to_vec()))
}

fn strings(v: &[String]) -> ArrayRef {
    Arc::new(StringArray::from(v.iter().map(String::as_str).collect::<Vec<_>>()))
}

fn write_parquet(path: &Path, schema: &DatasetSchema, c: &Columns) -> Result<()> {
    let mut columns: Vec<(String, ArrayRef)> = vec![
        ("year".to_string(), ints(&c.year)),
        ("gender".to_string(), strings(&c.gender)),
        ("age".to_string(), floats(&c.age)),
        ("location".to_string(), strings(&c.location)),
    ];
    for (r, name) in schema.race_columns.iter().enumerate() {
        let flags: Vec<i64> = c.race.iter().map(|&race| i64::from(race == r)).collect();
        columns.push((name.clone(), ints(&flags)));
    }
    columns.extend([
        ("hypertension".to_string(), ints(&c.hypertension)),
        ("heart_disease".to_string(), ints(&c.heart_disease)),
        ("smoking_history".to_string(), strings(&c.smoking_history)),
        ("bmi".to_string(), floats(&c.bmi)),
        ("hbA1c_level".to_string(), floats(&c.hba1c_level)),
        ("blood_glucose_level".to_string(), floats(&c.blood_glucose_level)),
        ("diabetes".to_string(), ints(&c.diabetes)),
    ]);

    let (fields, arrays): (Vec<Field>, Vec<ArrayRef>) = columns
        .into_iter()
        .map(|(name, array)| (Field::new(name, array.data_type().clone(), false), array))
        .unzip();

    let arrow_schema = Arc::new(Schema::new(fields));
    let batch = RecordBatch::try_new(arrow_schema.clone(), arrays)
        .context("building record batch")?;

    let file = std::fs::File::create(path).context("creating output file")?;
    let mut writer = ArrowWriter::try_new(file, arrow_schema, None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let schema = DatasetSchema::default();
    let mut rng = StdRng::seed_from_u64(args.seed);
    let columns = generate(args.rows, schema.race_columns.len(), &mut rng)?;

    let ext = args
        .output
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match ext.as_str() {
        "csv" => write_csv(&args.output, &schema, &columns)?,
        "parquet" | "pq" => write_parquet(&args.output, &schema, &columns)?,
        other => bail!("Unsupported output extension: .{other}"),
    }

    let diabetic = columns.diabetes.iter().filter(|&&d| d == 1).count();
    println!(
        "Wrote {} records ({} diabetic) to {}",
        args.rows,
        diabetic,
        args.output.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_gives_same_rows() {
        let a = generate(50, 5, &mut StdRng::seed_from_u64(7)).unwrap();
        let b = generate(50, 5, &mut StdRng::seed_from_u64(7)).unwrap();
        assert_eq!(a.location, b.location);
        assert_eq!(a.bmi, b.bmi);
        assert_eq!(a.diabetes, b.diabetes);

        let c = generate(50, 5, &mut StdRng::seed_from_u64(8)).unwrap();
        assert_ne!(a.bmi, c.bmi);
    }

    #[test]
    fn values_stay_in_clinical_ranges() {
        let c = generate(500, 5, &mut StdRng::seed_from_u64(42)).unwrap();
        assert!(c.race.iter().all(|&r| r < 5));
        assert!(c.age.iter().all(|&a| (1.0..=80.0).contains(&a)));
        assert!(c.bmi.iter().all(|&b| (12.0..=70.0).contains(&b)));
        assert!(c.blood_glucose_level.iter().all(|&g| (80.0..=300.0).contains(&g)));
        assert!(c.location.iter().all(|l| LOCATIONS.contains(&l.as_str())));
        assert!(c.diabetes.iter().any(|&d| d == 1));
        assert!(c.diabetes.iter().any(|&d| d == 0));
    }
}
