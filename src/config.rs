use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::estimator::ForestParams;

pub const DEFAULT_TARGET_COLUMN: &str = "SalePrice";
pub const DEFAULT_ID_COLUMN: &str = "Id";

/// Categorical columns where a missing value means the feature is absent
/// (no pool, no alley access, no garage, ...), not that it is unknown.
pub const DEFAULT_NULL_MEANS_ABSENT: [&str; 15] = [
    "PoolQC",
    "MiscFeature",
    "Alley",
    "Fence",
    "FireplaceQu",
    "GarageType",
    "GarageFinish",
    "GarageQual",
    "GarageCond",
    "BsmtQual",
    "BsmtCond",
    "BsmtExposure",
    "BsmtFinType1",
    "BsmtFinType2",
    "MasVnrType",
];

/// Training run settings. Every field has a default, so a JSON override
/// file only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    pub target_column: String,
    pub id_column: String,
    pub null_means_absent: Vec<String>,
    /// Fraction of rows held out for evaluation.
    pub test_size: f64,
    pub split_seed: u64,
    pub forest: ForestParams,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            target_column: DEFAULT_TARGET_COLUMN.to_string(),
            id_column: DEFAULT_ID_COLUMN.to_string(),
            null_means_absent: DEFAULT_NULL_MEANS_ABSENT
                .iter()
                .map(|s| s.to_string())
                .collect(),
            test_size: 0.2,
            split_seed: 42,
            forest: ForestParams::default(),
        }
    }
}

impl TrainConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}
