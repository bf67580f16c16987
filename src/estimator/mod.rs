//! The two-operation contract the rest of the crate relies on.
//!
//! Deriver and aligner only ever see [`Estimator::fit`] and
//! [`Regressor::predict`]; any model implementing both can be swapped in.

mod forest;
#[cfg(feature = "xgboost")]
mod xgb;

pub use forest::{ForestModel, ForestParams, RandomForest};
#[cfg(feature = "xgboost")]
pub use xgb::{XgbModel, XgbRegressor};

use crate::error::Result;
use crate::matrix::FeatureMatrix;

/// Untrained model configuration.
pub trait Estimator {
    type Fitted: Regressor;

    fn fit(&self, features: &FeatureMatrix, target: &[f64]) -> Result<Self::Fitted>;
}

/// Trained model state.
pub trait Regressor: Sized {
    /// One prediction per row, in row order.
    fn predict(&self, features: &FeatureMatrix) -> Result<Vec<f64>>;

    /// Relative importance per feature column, if the model tracks it.
    fn feature_importances(&self) -> Option<Vec<f64>> {
        None
    }

    fn to_bytes(&self) -> Result<Vec<u8>>;

    fn from_bytes(bytes: &[u8]) -> Result<Self>;
}
