use std::path::Path;

use anyhow::Context;
use diabetes_predictor::dataset::{self, DATA_FILE};
use diabetes_predictor::train;

const OUT: &str = "model.bin";

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let data_path = Path::new(DATA_FILE);
    let (x, y) = dataset::load_training_data(data_path).context("data load error")?;
    tracing::info!("loaded {} rows from {}", x.nrows(), data_path.display());

    let trained = train::fit(&x, &y).context("training error")?;
    tracing::info!(
        "training complete; holdout accuracy: {:.3}",
        trained.holdout_accuracy
    );

    let out = Path::new(OUT);
    trained.artifact.save_atomic(out).context("save error")?;
    let size = std::fs::metadata(out)?.len();
    tracing::info!("saved model to {} ({} bytes)", OUT, size);
    Ok(())
}
