//! The offline training run: derive, split, fit, evaluate.

use tracing::info;

use crate::config::TrainConfig;
use crate::data::train_test_split;
use crate::derive::{derive, Derivation};
use crate::error::Result;
use crate::estimator::{Estimator, Regressor};
use crate::frame::Frame;
use crate::metadata::PreprocessingMetadata;
use crate::metrics::{r2_score, rmse};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub rmse: f64,
    pub r2: Option<f64>,
}

pub struct TrainingReport<R> {
    pub model: R,
    pub metadata: PreprocessingMetadata,
    pub train_rows: usize,
    pub test_rows: usize,
    /// Held-out scores; `None` when the split left no test rows.
    pub evaluation: Option<Evaluation>,
    /// Feature names with their importance, most important first.
    pub importances: Vec<(String, f64)>,
}

impl<R> TrainingReport<R> {
    pub fn top_features(&self, n: usize) -> &[(String, f64)] {
        &self.importances[..n.min(self.importances.len())]
    }
}

/// Derives metadata from the whole table, fits on the training share of the
/// rows and scores the held-out share.
///
/// Metadata comes from every row so the held-out rows encode exactly as they
/// would at inference.
pub fn train_and_evaluate<E: Estimator>(
    frame: &Frame,
    config: &TrainConfig,
    estimator: &E,
) -> Result<TrainingReport<E::Fitted>> {
    let Derivation {
        metadata,
        features,
        target,
    } = derive(frame, config)?;
    info!(
        rows = features.nrows(),
        features = features.ncols(),
        "encoded training table"
    );

    let (train, test) = train_test_split(features.nrows(), config.test_size, config.split_seed);
    info!(train = train.len(), test = test.len(), "split rows");

    let pick = |rows: &[usize]| rows.iter().map(|&i| target[i]).collect::<Vec<f64>>();
    let model = estimator.fit(&features.select_rows(&train), &pick(&train))?;

    let evaluation = if test.is_empty() {
        None
    } else {
        let actual = pick(&test);
        let predicted = model.predict(&features.select_rows(&test))?;
        rmse(&actual, &predicted).map(|rmse| Evaluation {
            rmse,
            r2: r2_score(&actual, &predicted),
        })
    };
    if let Some(eval) = &evaluation {
        info!(rmse = eval.rmse, r2 = ?eval.r2, "evaluated on held-out rows");
    }

    let mut importances: Vec<(String, f64)> = model
        .feature_importances()
        .map(|scores| {
            features
                .columns()
                .iter()
                .cloned()
                .zip(scores)
                .collect()
        })
        .unwrap_or_default();
    importances.sort_by(|a, b| b.1.total_cmp(&a.1));

    Ok(TrainingReport {
        model,
        metadata,
        train_rows: train.len(),
        test_rows: test.len(),
        evaluation,
        importances,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimator::{ForestParams, RandomForest};
    use crate::frame::Column;

    fn frame(n: usize) -> Frame {
        let area: Vec<Option<f64>> = (0..n).map(|i| Some(1000.0 + 10.0 * i as f64)).collect();
        let price: Vec<Option<f64>> = (0..n).map(|i| Some(50_000.0 + 1000.0 * i as f64)).collect();
        let street: Vec<Option<String>> = (0..n)
            .map(|i| Some(if i % 2 == 0 { "Pave" } else { "Grvl" }.to_string()))
            .collect();
        Frame::new(n)
            .with_column("LotArea", Column::Numeric(area))
            .unwrap()
            .with_column("Street", Column::Text(street))
            .unwrap()
            .with_column("SalePrice", Column::Numeric(price))
            .unwrap()
    }

    fn forest() -> RandomForest {
        RandomForest::new(ForestParams {
            n_estimators: 5,
            ..ForestParams::default()
        })
    }

    #[test]
    fn reports_split_and_scores() {
        let report = train_and_evaluate(&frame(50), &TrainConfig::default(), &forest()).unwrap();
        assert_eq!((report.train_rows, report.test_rows), (40, 10));
        let eval = report.evaluation.unwrap();
        assert!(eval.rmse.is_finite());
        assert_eq!(report.importances.len(), 3);
        assert_eq!(report.top_features(1)[0].0, "LotArea");
        assert_eq!(report.top_features(10).len(), 3);
    }

    #[test]
    fn no_test_rows_means_no_scores() {
        let config = TrainConfig {
            test_size: 0.0,
            ..TrainConfig::default()
        };
        let report = train_and_evaluate(&frame(10), &config, &forest()).unwrap();
        assert_eq!(report.test_rows, 0);
        assert!(report.evaluation.is_none());
    }
}
