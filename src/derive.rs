//! Training-side derivation of the preprocessing record.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::{debug, info};

use crate::align::align;
use crate::config::TrainConfig;
use crate::error::{Error, Result};
use crate::estimator::Estimator;
use crate::frame::{Column, Frame};
use crate::matrix::FeatureMatrix;
use crate::metadata::{indicator_name, PreprocessingMetadata, NONE_CATEGORY, UNKNOWN_CATEGORY};

/// Median of the observed values; the mean of the middle pair for even counts.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    Some(if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    })
}

/// Most frequent observed label. Ties go to the label seen first.
pub fn mode(values: &[Option<String>]) -> Option<String> {
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (seen, value) in values.iter().flatten().enumerate() {
        counts.entry(value.as_str()).or_insert((0, seen)).0 += 1;
    }
    counts
        .into_iter()
        .max_by(|(_, (ca, fa)), (_, (cb, fb))| ca.cmp(cb).then(fb.cmp(fa)))
        .map(|(label, _)| label.to_string())
}

/// The training target, which must be present and fully numeric.
pub fn target_values(frame: &Frame, config: &TrainConfig) -> Result<Vec<f64>> {
    let name = &config.target_column;
    let column = frame
        .column(name)
        .ok_or_else(|| Error::schema(format!("target column `{name}` is missing")))?;
    (0..column.len())
        .map(|row| match column.number(row) {
            Ok(Some(y)) => Ok(y),
            Ok(None) => Err(Error::schema(format!(
                "target column `{name}` has a missing value at row {row}"
            ))),
            Err(text) => Err(Error::schema(format!(
                "target column `{name}` has non-numeric value `{text}` at row {row}"
            ))),
        })
        .collect()
}

/// Derives the imputation and encoding rules from a labeled table.
///
/// Column roles follow the table's column order. Indicator columns follow the
/// numeric columns, grouped by categorical column in that same order, with
/// categories sorted lexicographically within a group.
pub fn derive_metadata(frame: &Frame, config: &TrainConfig) -> Result<PreprocessingMetadata> {
    if frame.column(&config.target_column).is_none() {
        return Err(Error::schema(format!(
            "target column `{}` is missing",
            config.target_column
        )));
    }

    let mut numeric_columns = Vec::new();
    let mut categorical_columns = Vec::new();
    let mut null_means_absent_columns = Vec::new();
    let mut numeric_fill_values = BTreeMap::new();
    let mut categorical_fill_values = BTreeMap::new();
    let mut indicators = Vec::new();

    for (name, column) in frame.iter() {
        if name == config.target_column || name == config.id_column {
            continue;
        }
        let absent_means_none = config.null_means_absent.iter().any(|c| c == name);

        match column {
            Column::Numeric(values) if !absent_means_none => {
                if column.null_count() > 0 {
                    let observed: Vec<f64> = values.iter().flatten().copied().collect();
                    match median(&observed) {
                        Some(fill) => {
                            numeric_fill_values.insert(name.to_string(), fill);
                        }
                        None => debug!(column = name, "no observed values; filling with 0"),
                    }
                }
                numeric_columns.push(name.to_string());
            }
            _ => {
                let mut labels = column.labels();
                if absent_means_none {
                    labels
                        .iter_mut()
                        .filter(|l| l.is_none())
                        .for_each(|l| *l = Some(NONE_CATEGORY.to_string()));
                    null_means_absent_columns.push(name.to_string());
                } else if column.null_count() > 0 {
                    let fill = mode(&labels).unwrap_or_else(|| UNKNOWN_CATEGORY.to_string());
                    labels
                        .iter_mut()
                        .filter(|l| l.is_none())
                        .for_each(|l| *l = Some(fill.clone()));
                    categorical_fill_values.insert(name.to_string(), fill);
                }
                let categories: BTreeSet<String> = labels.into_iter().flatten().collect();
                indicators.extend(categories.iter().map(|c| indicator_name(name, c)));
                categorical_columns.push(name.to_string());
            }
        }
    }

    let mut encoded_feature_columns = numeric_columns.clone();
    encoded_feature_columns.extend(indicators);

    info!(
        numeric = numeric_columns.len(),
        categorical = categorical_columns.len(),
        median_fills = numeric_fill_values.len(),
        mode_fills = categorical_fill_values.len(),
        features = encoded_feature_columns.len(),
        "derived preprocessing metadata"
    );

    PreprocessingMetadata::new(
        numeric_columns,
        categorical_columns,
        null_means_absent_columns,
        numeric_fill_values,
        categorical_fill_values,
        encoded_feature_columns,
    )
}

/// Everything training needs: the record, the encoded table and its target.
#[derive(Debug, Clone)]
pub struct Derivation {
    pub metadata: PreprocessingMetadata,
    pub features: FeatureMatrix,
    pub target: Vec<f64>,
}

/// Derives the metadata, then encodes the training table with the same
/// aligner inference uses, so both sides share one code path.
pub fn derive(frame: &Frame, config: &TrainConfig) -> Result<Derivation> {
    let target = target_values(frame, config)?;
    let metadata = derive_metadata(frame, config)?;
    let features = align(frame, &metadata)?;
    Ok(Derivation {
        metadata,
        features,
        target,
    })
}

/// Derives the metadata and fits `estimator` on the whole table.
pub fn derive_and_fit<E: Estimator>(
    frame: &Frame,
    config: &TrainConfig,
    estimator: &E,
) -> Result<(E::Fitted, PreprocessingMetadata)> {
    let Derivation {
        metadata,
        features,
        target,
    } = derive(frame, config)?;
    let model = estimator.fit(&features, &target)?;
    Ok((model, metadata))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> TrainConfig {
        TrainConfig {
            null_means_absent: vec!["Alley".into()],
            ..TrainConfig::default()
        }
    }

    fn table() -> Frame {
        Frame::new(5)
            .with_column("Id", Column::Numeric((1..=5).map(|i| Some(i as f64)).collect()))
            .unwrap()
            .with_column(
                "LotFrontage",
                Column::Numeric(vec![Some(1.0), Some(3.0), Some(3.0), None, Some(7.0)]),
            )
            .unwrap()
            .with_column(
                "KitchenQual",
                Column::Text(vec![
                    Some("TA".into()),
                    Some("Gd".into()),
                    Some("TA".into()),
                    None,
                    Some("Ex".into()),
                ]),
            )
            .unwrap()
            .with_column(
                "Alley",
                Column::Text(vec![None, Some("Pave".into()), None, Some("Grvl".into()), None]),
            )
            .unwrap()
            .with_column(
                "SalePrice",
                Column::Numeric(vec![Some(1e5), Some(2e5), Some(1.5e5), Some(1.2e5), Some(3e5)]),
            )
            .unwrap()
    }

    fn labels(xs: &[Option<&str>]) -> Vec<Option<String>> {
        xs.iter().map(|x| x.map(String::from)).collect()
    }

    #[test]
    fn median_of_observed() {
        assert_eq!(median(&[1.0, 3.0, 3.0, 7.0]), Some(3.0));
        assert_eq!(median(&[4.0, 1.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn mode_of_observed() {
        assert_eq!(
            mode(&labels(&[Some("A"), Some("B"), Some("A"), None])),
            Some("A".into())
        );
        assert_eq!(mode(&labels(&[None, None])), None);
    }

    #[test]
    fn mode_tie_goes_to_first_seen() {
        assert_eq!(
            mode(&labels(&[Some("B"), Some("A"), None, Some("A"), Some("B")])),
            Some("B".into())
        );
    }

    #[test]
    fn derives_fill_values_and_layout() {
        let meta = derive_metadata(&table(), &config()).unwrap();
        assert_eq!(meta.numeric_columns(), &["LotFrontage".to_string()]);
        assert_eq!(
            meta.categorical_columns(),
            &["KitchenQual".to_string(), "Alley".to_string()]
        );
        assert_eq!(meta.null_means_absent_columns(), &["Alley".to_string()]);
        assert_eq!(meta.numeric_fill_values().get("LotFrontage"), Some(&3.0));
        assert_eq!(
            meta.categorical_fill_values().get("KitchenQual"),
            Some(&"TA".to_string())
        );
        assert!(!meta.categorical_fill_values().contains_key("Alley"));
        assert_eq!(
            meta.encoded_feature_columns(),
            &[
                "LotFrontage",
                "KitchenQual_Ex",
                "KitchenQual_Gd",
                "KitchenQual_TA",
                "Alley_Grvl",
                "Alley_None",
                "Alley_Pave",
            ]
            .map(String::from)
        );
    }

    #[test]
    fn encoded_training_rows_use_fills() {
        let derivation = derive(&table(), &config()).unwrap();
        let x = &derivation.features;
        assert_eq!(x.get(3, "LotFrontage"), Some(3.0));
        assert_eq!(x.get(3, "KitchenQual_TA"), Some(1.0));
        assert_eq!(x.get(0, "Alley_None"), Some(1.0));
        assert_eq!(x.get(0, "Alley_Grvl"), Some(0.0));
        assert_eq!(derivation.target.len(), 5);
    }

    #[test]
    fn missing_target_is_schema_error() {
        let frame = Frame::new(1)
            .with_column("LotArea", Column::Numeric(vec![Some(1.0)]))
            .unwrap();
        assert!(matches!(
            derive_metadata(&frame, &config()),
            Err(Error::Schema(_))
        ));
        assert!(matches!(derive(&frame, &config()), Err(Error::Schema(_))));
    }

    #[test]
    fn incomplete_target_is_schema_error() {
        let frame = Frame::new(2)
            .with_column("SalePrice", Column::Numeric(vec![Some(1.0), None]))
            .unwrap();
        assert!(matches!(
            target_values(&frame, &config()),
            Err(Error::Schema(_))
        ));
    }

    #[test]
    fn all_missing_columns_fall_back() {
        let frame = Frame::new(2)
            .with_column("Empty", Column::Numeric(vec![None, None]))
            .unwrap()
            .with_column("Blank", Column::Text(vec![None, None]))
            .unwrap()
            .with_column("SalePrice", Column::Numeric(vec![Some(1.0), Some(2.0)]))
            .unwrap();
        let derivation = derive(&frame, &config()).unwrap();
        let meta = &derivation.metadata;
        assert!(meta.numeric_fill_values().is_empty());
        assert_eq!(
            meta.categorical_fill_values().get("Blank"),
            Some(&UNKNOWN_CATEGORY.to_string())
        );
        assert_eq!(
            meta.encoded_feature_columns(),
            &["Empty".to_string(), "Blank_Unknown".to_string()]
        );
        assert_eq!(derivation.features.row(0).to_vec(), vec![0.0, 1.0]);
    }

    #[test]
    fn input_frame_is_untouched() {
        let frame = table();
        let before = frame.clone();
        derive(&frame, &config()).unwrap();
        assert_eq!(frame, before);
    }
}
