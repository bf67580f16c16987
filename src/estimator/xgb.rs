use std::time::{SystemTime, UNIX_EPOCH};

use xgboost::{parameters, Booster, DMatrix};

use super::{Estimator, Regressor};
use crate::error::{Error, Result};
use crate::matrix::FeatureMatrix;

fn xgb_error(e: impl std::fmt::Display) -> Error {
    Error::Estimator(format!("xgboost: {e}"))
}

fn dmatrix(features: &FeatureMatrix) -> Result<DMatrix> {
    DMatrix::from_dense(&features.to_dense_f32(), features.nrows()).map_err(xgb_error)
}

/// Gradient-boosted trees through the native xgboost library.
#[derive(Debug, Clone)]
pub struct XgbRegressor {
    pub boost_rounds: u32,
}

impl Default for XgbRegressor {
    fn default() -> Self {
        Self { boost_rounds: 100 }
    }
}

pub struct XgbModel {
    booster: Booster,
}

impl Estimator for XgbRegressor {
    type Fitted = XgbModel;

    fn fit(&self, features: &FeatureMatrix, target: &[f64]) -> Result<XgbModel> {
        let mut dtrain = dmatrix(features)?;
        let labels: Vec<f32> = target.iter().map(|&y| y as f32).collect();
        dtrain.set_labels(&labels).map_err(xgb_error)?;

        let training_params = parameters::TrainingParametersBuilder::default()
            .dtrain(&dtrain)
            .boost_rounds(self.boost_rounds)
            .build()
            .map_err(xgb_error)?;
        let booster = Booster::train(&training_params).map_err(xgb_error)?;
        Ok(XgbModel { booster })
    }
}

impl Regressor for XgbModel {
    fn predict(&self, features: &FeatureMatrix) -> Result<Vec<f64>> {
        if features.nrows() == 0 {
            return Ok(Vec::new());
        }
        let preds = self
            .booster
            .predict(&dmatrix(features)?)
            .map_err(xgb_error)?;
        Ok(preds.into_iter().map(f64::from).collect())
    }

    // The booster only writes its format to a path.
    fn to_bytes(&self) -> Result<Vec<u8>> {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        let path = std::env::temp_dir().join(format!(
            "house-price-xgb-{}-{nanos}.bin",
            std::process::id()
        ));
        self.booster.save(&path).map_err(xgb_error)?;
        let bytes = std::fs::read(&path);
        let _ = std::fs::remove_file(&path);
        Ok(bytes?)
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let booster = Booster::load_buffer(bytes).map_err(xgb_error)?;
        Ok(Self { booster })
    }
}
