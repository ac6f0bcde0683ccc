//! Train the combiner offline.
//!
//! Usage: `train_weights <dataset.json> [out.json] [epochs]`
//!
//! The dataset is a JSON array of `{"scores": [physical, statistical,
//! reputation, corroboration], "target": 0 | 1}`. Output defaults to the
//! configured `model.weights_path`.

use std::{fs, path::PathBuf};

use anyhow::{bail, Context, Result};
use tracing::info;

use flood_report_validator::{
    aggregator::{TrainingSample, WeightModel, WeightedAggregator},
    config::ValidatorConfig,
    evaluation,
    layers::FUSED_LAYERS,
    telemetry,
};

const DEFAULT_EPOCHS: usize = 100;

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    telemetry::init_tracing();

    let mut args = std::env::args().skip(1);
    let Some(dataset_path) = args.next().map(PathBuf::from) else {
        bail!("usage: train_weights <dataset.json> [out.json] [epochs]");
    };

    let cfg = ValidatorConfig::load_default()?;
    let out = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| cfg.model.weights_path.clone());
    let epochs = match args.next() {
        Some(e) => e.parse::<usize>().with_context(|| format!("invalid epochs: {e}"))?,
        None => DEFAULT_EPOCHS,
    };

    let raw = fs::read_to_string(&dataset_path)
        .with_context(|| format!("reading dataset {}", dataset_path.display()))?;
    let dataset: Vec<TrainingSample> =
        serde_json::from_str(&raw).context("parsing training dataset")?;
    info!(samples = dataset.len(), epochs, "training combiner");

    let mut agg = WeightedAggregator::new(
        WeightModel::uniform(FUSED_LAYERS),
        cfg.model.learning_rate,
    );
    let losses = agg.train(&dataset, epochs)?;

    let report = evaluation::evaluate(&agg, &dataset, cfg.decision.threshold)?;
    agg.model().save(&out)?;

    println!("final loss: {:.4}", losses.last().copied().unwrap_or(f64::NAN));
    for (layer, w) in agg.model().get_weights() {
        println!("  {layer:<14} {w:.3}");
    }
    println!(
        "accuracy {:.3}  precision {:.3}  recall {:.3}  f1 {:.3}",
        report.metrics.accuracy, report.metrics.precision, report.metrics.recall, report.metrics.f1
    );
    println!("saved: {}", out.display());
    Ok(())
}
