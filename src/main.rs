use std::io::Write;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use glucoscope::cli::Args;
use glucoscope::{load_file, pipeline, DatasetSchema};

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();

    let dataset = load_file(&args.input, &DatasetSchema::default())
        .with_context(|| format!("loading {}", args.input.display()))?;
    let config = args.pipeline_config().context("building pipeline config")?;
    let features = args.parse_features(config.model.features.len())?;

    let criteria = args.criteria(&dataset);
    let output = pipeline::run(&dataset, &criteria, &config).context("running pipeline")?;

    let mut report = serde_json::to_value(&output).context("serialising report")?;
    if args.summary_only {
        if let Some(obj) = report.as_object_mut() {
            obj.remove("records");
        }
    }

    if let Some(features) = features {
        let artifact = output
            .model
            .ok()
            .context("no trained model for the current filters; cannot score --predict")?;
        let probability = artifact.model.predict_proba(&features)?;
        info!("predicted diabetes probability {probability:.3}");
        if let Some(obj) = report.as_object_mut() {
            obj.insert(
                "prediction".to_string(),
                serde_json::json!({
                    "features": features,
                    "probability": probability,
                    "label": u8::from(probability >= 0.5),
                }),
            );
        }
    }

    let text = serde_json::to_string_pretty(&report)?;
    match &args.output {
        Some(path) => {
            std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
            info!("report written to {}", path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{text}")?;
        }
    }

    Ok(())
}
