//! House sale price regression.
//!
//! Training derives a [`PreprocessingMetadata`] record from a labeled table
//! and fits an [`Estimator`] on the encoded features. Inference reloads both
//! artifacts and runs every input through [`align`], which rebuilds the exact
//! training-time feature layout from arbitrary, possibly incomplete rows.

pub mod align;
pub mod config;
pub mod data;
pub mod derive;
pub mod error;
pub mod estimator;
pub mod frame;
pub mod matrix;
pub mod metadata;
pub mod metrics;
pub mod predict;
pub mod store;
pub mod train;

pub use align::{align, align_rows};
pub use config::TrainConfig;
pub use data::{download_csv_file, load_csv_file, train_test_split, write_csv_file};
pub use derive::{derive, derive_and_fit, derive_metadata, Derivation};
pub use error::{Error, Result};
pub use estimator::{Estimator, ForestModel, ForestParams, RandomForest, Regressor};
pub use frame::{Column, Frame, RawRow, Value};
pub use matrix::FeatureMatrix;
pub use metadata::{PreprocessingMetadata, NONE_CATEGORY, UNKNOWN_CATEGORY};
pub use predict::{PricePredictor, PREDICTION_COLUMN};
pub use store::{load_artifacts, save_artifacts, ArtifactStore, DirStore, MemoryStore};
pub use train::{train_and_evaluate, Evaluation, TrainingReport};
