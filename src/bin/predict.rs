//! Score houses with a trained model.
//!
//! ```sh
//! predict single --field GrLivArea=1710 --field Neighborhood=CollgCr
//! predict batch --input test.csv --output predictions.csv
//! predict check
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use house_price_predictor::config::DEFAULT_ID_COLUMN;
use house_price_predictor::store::{METADATA_KEY, MODEL_KEY};
use house_price_predictor::{
    load_csv_file, write_csv_file, ArtifactStore, DirStore, ForestModel, PricePredictor, RawRow,
    Regressor, Value,
};
use tracing::info;

#[derive(Parser, Debug)]
#[command(about = "Predict house sale prices from trained artifacts")]
struct Args {
    /// Directory holding the artifacts written by `train`.
    #[arg(long, global = true, env = "HOUSE_PRICE_ARTIFACTS", default_value = "artifacts")]
    artifacts: PathBuf,

    /// Identifier column kept or synthesized by batch scoring.
    #[arg(long, global = true, default_value = DEFAULT_ID_COLUMN)]
    id_column: String,

    /// Load a gradient-boosted model instead of the random forest.
    #[cfg(feature = "xgboost")]
    #[arg(long, global = true)]
    xgboost: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Predict one house from NAME=VALUE fields; unnamed fields are imputed.
    Single {
        #[arg(long = "field", value_parser = parse_field)]
        fields: Vec<(String, Value)>,
    },
    /// Predict every row of a CSV and write it back with a prediction column.
    Batch {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
    /// Report whether the artifacts exist and load.
    Check {
        /// Also report whether this training CSV is present.
        #[arg(long)]
        data: Option<PathBuf>,
    },
}

fn parse_field(s: &str) -> Result<(String, Value), String> {
    let (name, raw) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got `{s}`"))?;
    let value = match raw.trim() {
        "" | "NA" => Value::Missing,
        text => text
            .parse::<f64>()
            .map(Value::Number)
            .unwrap_or_else(|_| Value::Text(text.to_string())),
    };
    Ok((name.trim().to_string(), value))
}

fn presence(found: bool) -> &'static str {
    if found {
        "found"
    } else {
        "missing"
    }
}

fn data_file_state(path: &Path) -> &'static str {
    presence(path.is_file())
}

fn run<R: Regressor>(command: Command, store: &DirStore, id_column: &str) -> anyhow::Result<()> {
    let predictor = PricePredictor::<R>::load(store)
        .with_context(|| format!("loading artifacts from {}", store.root().display()))?
        .with_id_column(id_column);

    match command {
        Command::Single { fields } => {
            let row: RawRow = fields.into_iter().collect();
            let price = predictor.predict_one(&row)?;
            println!("Predicted sale price: ${price:.2}");
        }
        Command::Batch { input, output } => {
            let df = load_csv_file(&input)?;
            let mut scored = predictor.predict_batch(&df)?;
            write_csv_file(&mut scored, &output)?;
            println!("Predicted {} houses into {}", scored.height(), output.display());
        }
        Command::Check { .. } => {
            let metadata = predictor.metadata();
            println!("Artifacts OK in {}", store.root().display());
            println!("  numeric columns:     {}", metadata.numeric_columns().len());
            println!("  categorical columns: {}", metadata.categorical_columns().len());
            println!("  encoded features:    {}", metadata.width());
        }
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    let store = DirStore::new(&args.artifacts);

    if let Command::Check { data } = &args.command {
        if let Some(path) = data {
            info!(path = %path.display(), state = data_file_state(path), "training data");
        }
        for key in [MODEL_KEY, METADATA_KEY] {
            info!(key, state = presence(store.contains(key)), "artifact");
        }
    }

    #[cfg(feature = "xgboost")]
    if args.xgboost {
        use house_price_predictor::estimator::XgbModel;
        return run::<XgbModel>(args.command, &store, &args.id_column);
    }

    run::<ForestModel>(args.command, &store, &args.id_column)
}
