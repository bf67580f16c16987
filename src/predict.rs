//! Online scoring for single rows and whole tables.

use polars::prelude::*;
use tracing::info;

use crate::align::align;
use crate::config::DEFAULT_ID_COLUMN;
use crate::error::{Error, Result};
use crate::estimator::Regressor;
use crate::frame::{Frame, RawRow};
use crate::metadata::PreprocessingMetadata;
use crate::store::{load_artifacts, ArtifactStore};

pub const PREDICTION_COLUMN: &str = "PredictedSalePrice";

/// A fitted model with its preprocessing record, both read-only once
/// constructed. Share one instance across requests.
#[derive(Debug, Clone)]
pub struct PricePredictor<R> {
    model: R,
    metadata: PreprocessingMetadata,
    id_column: String,
}

impl<R: Regressor> PricePredictor<R> {
    pub fn new(model: R, metadata: PreprocessingMetadata) -> Result<Self> {
        metadata.validate()?;
        Ok(Self {
            model,
            metadata,
            id_column: DEFAULT_ID_COLUMN.to_string(),
        })
    }

    pub fn load(store: &impl ArtifactStore) -> Result<Self> {
        let (model, metadata) = load_artifacts(store)?;
        info!(features = metadata.width(), "loaded model artifacts");
        Ok(Self {
            model,
            metadata,
            id_column: DEFAULT_ID_COLUMN.to_string(),
        })
    }

    /// Names the identifier column that batch scoring keeps or synthesizes.
    /// Match [`crate::TrainConfig::id_column`] when training used another name.
    pub fn with_id_column(mut self, name: impl Into<String>) -> Self {
        self.id_column = name.into();
        self
    }

    pub fn id_column(&self) -> &str {
        &self.id_column
    }

    pub fn metadata(&self) -> &PreprocessingMetadata {
        &self.metadata
    }

    pub fn model(&self) -> &R {
        &self.model
    }

    /// One prediction per frame row, in row order.
    pub fn predict_frame(&self, frame: &Frame) -> Result<Vec<f64>> {
        let features = align(frame, &self.metadata)?;
        let predictions = self.model.predict(&features)?;
        if predictions.len() != frame.height() {
            return Err(Error::Estimator(format!(
                "{} predictions for {} rows",
                predictions.len(),
                frame.height()
            )));
        }
        Ok(predictions)
    }

    pub fn predict_one(&self, row: &RawRow) -> Result<f64> {
        let frame = Frame::from_rows(std::slice::from_ref(row))?;
        Ok(self.predict_frame(&frame)?[0])
    }

    /// Scores every row of `df` and returns a copy with the id column
    /// (1-based, only if absent) and a [`PREDICTION_COLUMN`] appended.
    pub fn predict_batch(&self, df: &DataFrame) -> Result<DataFrame> {
        let frame = Frame::from_dataframe(df)?;
        let predictions = self.predict_frame(&frame)?;

        let mut out = df.clone();
        if !df.get_column_names().contains(&self.id_column.as_str()) {
            let ids: Vec<i64> = (1..=df.height() as i64).collect();
            out.with_column(Series::new(&self.id_column, ids))?;
        }
        out.with_column(Series::new(PREDICTION_COLUMN, predictions))?;

        info!(rows = out.height(), "scored batch");
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use polars::prelude::*;

    use super::*;
    use crate::config::TrainConfig;
    use crate::derive::derive_and_fit;
    use crate::estimator::{ForestModel, ForestParams, RandomForest};
    use crate::frame::{Column, Value};
    use crate::store::{save_artifacts, MemoryStore};

    fn predictor() -> PricePredictor<ForestModel> {
        let n = 30;
        let frame = Frame::new(n)
            .with_column(
                "GrLivArea",
                Column::Numeric((0..n).map(|i| Some(800.0 + 50.0 * i as f64)).collect()),
            )
            .unwrap()
            .with_column(
                "KitchenQual",
                Column::Text(
                    (0..n)
                        .map(|i| Some(["TA", "Gd", "Ex"][i % 3].to_string()))
                        .collect(),
                ),
            )
            .unwrap()
            .with_column(
                "SalePrice",
                Column::Numeric((0..n).map(|i| Some(100_000.0 + 5_000.0 * i as f64)).collect()),
            )
            .unwrap();
        let forest = RandomForest::new(ForestParams {
            n_estimators: 5,
            ..ForestParams::default()
        });
        let (model, metadata) = derive_and_fit(&frame, &TrainConfig::default(), &forest).unwrap();
        PricePredictor::new(model, metadata).unwrap()
    }

    #[test]
    fn single_row_matches_one_row_batch() {
        let predictor = predictor();
        let row: RawRow = [
            ("GrLivArea".to_string(), Value::from(1710.0)),
            ("KitchenQual".to_string(), Value::from("Gd")),
        ]
        .into_iter()
        .collect();
        let single = predictor.predict_one(&row).unwrap();

        let df = df!("GrLivArea" => &[1710.0], "KitchenQual" => &["Gd"]).unwrap();
        let batch = predictor.predict_batch(&df).unwrap();
        let scored = batch.column(PREDICTION_COLUMN).unwrap().f64().unwrap().get(0);
        assert_eq!(scored, Some(single));
    }

    #[test]
    fn batch_adds_id_only_when_absent() {
        let predictor = predictor();
        let df = df!("GrLivArea" => &[900.0, 2000.0]).unwrap();
        let out = predictor.predict_batch(&df).unwrap();
        assert_eq!(
            out.get_column_names(),
            vec!["GrLivArea", DEFAULT_ID_COLUMN, PREDICTION_COLUMN]
        );
        let ids: Vec<Option<i64>> = out.column("Id").unwrap().i64().unwrap().into_iter().collect();
        assert_eq!(ids, vec![Some(1), Some(2)]);

        let df = df!("Id" => &[7i64], "GrLivArea" => &[900.0]).unwrap();
        let out = predictor.predict_batch(&df).unwrap();
        assert_eq!(out.width(), 3);
        assert_eq!(out.column("Id").unwrap().i64().unwrap().get(0), Some(7));
    }

    #[test]
    fn batch_uses_the_configured_id_column() {
        let predictor = predictor().with_id_column("PID");
        let df = df!("GrLivArea" => &[900.0, 2000.0]).unwrap();
        let out = predictor.predict_batch(&df).unwrap();
        assert_eq!(
            out.get_column_names(),
            vec!["GrLivArea", "PID", PREDICTION_COLUMN]
        );

        let df = df!("PID" => &[526301100i64], "GrLivArea" => &[900.0]).unwrap();
        let out = predictor.predict_batch(&df).unwrap();
        assert_eq!(out.get_column_names(), vec!["PID", "GrLivArea", PREDICTION_COLUMN]);
    }

    #[test]
    fn bad_cell_fails_the_whole_batch() {
        let predictor = predictor();
        let df = df!("GrLivArea" => &["900", "huge"]).unwrap();
        assert!(matches!(
            predictor.predict_batch(&df),
            Err(Error::InputFormat { row: 1, .. })
        ));
    }

    #[test]
    fn loads_from_store() {
        let predictor = predictor();
        let mut store = MemoryStore::default();
        save_artifacts(&mut store, predictor.model(), predictor.metadata()).unwrap();
        let loaded = PricePredictor::<ForestModel>::load(&store).unwrap();
        let row = RawRow::new();
        assert_eq!(
            loaded.predict_one(&row).unwrap(),
            predictor.predict_one(&row).unwrap()
        );
    }
}
