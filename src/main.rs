use std::path::PathBuf;

use clap::Parser;
use house_price_predictor::{
    download_csv_file, load_csv_file, save_artifacts, train_and_evaluate, DirStore, Estimator,
    Frame, RandomForest, TrainConfig,
};
use tracing::info;

// training script and entry point
// Steps
// 1. Optionally download the CSV file to disk
// 2. Load file
// 3. Derive preprocessing metadata and encode the table
// 4. Train on a split and evaluate on the held-out rows
// 5. Save model and metadata to the artifact directory

#[derive(Parser, Debug)]
#[command(about = "Train the house price model and write its artifacts")]
struct Args {
    /// Labeled training CSV.
    #[arg(long, default_value = "train.csv")]
    data: PathBuf,

    /// Download the training CSV from this URL into `--data` first.
    #[arg(long)]
    url: Option<String>,

    /// Directory receiving the model and preprocessing artifacts.
    #[arg(long, env = "HOUSE_PRICE_ARTIFACTS", default_value = "artifacts")]
    artifacts: PathBuf,

    /// JSON file overriding training settings.
    #[arg(long)]
    config: Option<PathBuf>,

    /// How many of the most important features to print.
    #[arg(long, default_value_t = 10)]
    top: usize,

    /// Fit gradient-boosted trees instead of the random forest.
    #[cfg(feature = "xgboost")]
    #[arg(long)]
    xgboost: bool,
}

fn run<E: Estimator>(
    args: &Args,
    frame: &Frame,
    config: &TrainConfig,
    estimator: &E,
) -> anyhow::Result<()> {
    // 4. Train on a split and evaluate
    let report = train_and_evaluate(frame, config, estimator)?;
    match &report.evaluation {
        Some(eval) => {
            println!("RMSE: {:.2}", eval.rmse);
            match eval.r2 {
                Some(r2) => println!("R² Score: {r2:.4}"),
                None => println!("R² Score: undefined (constant target)"),
            }
        }
        None => println!("No held-out rows; skipped evaluation"),
    }

    if !report.importances.is_empty() {
        println!("Top {} features:", args.top.min(report.importances.len()));
        for (feature, importance) in report.top_features(args.top) {
            println!("  {feature:40} : {importance:.6}");
        }
    }

    // 5. Save model and metadata
    let mut store = DirStore::new(&args.artifacts);
    save_artifacts(&mut store, &report.model, &report.metadata)?;
    info!(dir = %store.root().display(), "training complete");

    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    info!("Starting training script...");

    let config = match &args.config {
        Some(path) => TrainConfig::from_json_file(path)?,
        None => TrainConfig::default(),
    };

    // 1. Download external CSV file to disk
    if let Some(url) = &args.url {
        download_csv_file(url, &args.data)?;
    }

    // 2. load file
    let df = load_csv_file(&args.data)?;

    // 3. Convert into the shared table representation
    let frame = Frame::from_dataframe(&df)?;

    #[cfg(feature = "xgboost")]
    if args.xgboost {
        let xgb = house_price_predictor::estimator::XgbRegressor::default();
        return run(&args, &frame, &config, &xgb);
    }

    run(&args, &frame, &config, &RandomForest::new(config.forest.clone()))
}
