//! Inference-side feature alignment.
//!
//! [`align`] turns any [`Frame`] into a matrix whose columns are exactly
//! `encoded_feature_columns`, in order. Missing columns and cells are filled
//! from the metadata; categories never seen in training fall on no indicator
//! and leave the row's indicators for that column at zero.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{Error, Result};
use crate::frame::{Frame, RawRow};
use crate::matrix::FeatureMatrix;
use crate::metadata::{indicator_name, PreprocessingMetadata};

/// Aligns every row of `frame` to the persisted feature layout.
///
/// 1. Columns the metadata expects but the frame lacks are synthesized from
///    the fill policy.
/// 2. Null cells of present columns get the same fill, row by row.
/// 3. Only `numeric_columns ++ categorical_columns` are read, in that order;
///    any other input column is ignored.
/// 4. Each categorical cell maps to its `<column>_<label>` indicator.
/// 5. Indicators absent from `encoded_feature_columns` are dropped, and
///    expected indicators never hit stay zero.
/// 6. The result has exactly `encoded_feature_columns` as its columns.
///
/// A numeric cell holding text that is not a number aborts the whole call
/// with [`Error::InputFormat`]; `row` is the zero-based row index.
pub fn align(frame: &Frame, metadata: &PreprocessingMetadata) -> Result<FeatureMatrix> {
    metadata.validate()?;

    let encoded = metadata.encoded_feature_columns();
    let n_numeric = metadata.numeric_columns().len();
    let height = frame.height();
    let indicators: HashMap<&str, usize> = encoded
        .iter()
        .enumerate()
        .skip(n_numeric)
        .map(|(j, name)| (name.as_str(), j))
        .collect();

    let mut matrix = FeatureMatrix::zeros(encoded.to_vec(), height);

    for (j, column) in metadata.numeric_columns().iter().enumerate() {
        let fill = metadata.numeric_fill(column);
        let Some(values) = frame.column(column) else {
            debug!(column = %column, fill, "synthesizing numeric column");
            (0..height).for_each(|row| matrix.set(row, j, fill));
            continue;
        };
        for row in 0..height {
            let value = values.number(row).map_err(|text| Error::InputFormat {
                row,
                column: column.clone(),
                message: format!("`{text}` is not a number"),
            })?;
            matrix.set(row, j, value.unwrap_or(fill));
        }
    }

    for column in metadata.categorical_columns() {
        let fill = metadata.categorical_fill(column);
        let values = frame.column(column);
        if values.is_none() {
            debug!(column = %column, fill, "synthesizing categorical column");
        }
        let mut resolved: HashMap<Option<String>, Option<usize>> = HashMap::new();
        for row in 0..height {
            let label = values.and_then(|v| v.label(row));
            let slot = *resolved.entry(label).or_insert_with_key(|label| {
                let label = label.as_deref().unwrap_or(fill);
                indicators
                    .get(indicator_name(column, label).as_str())
                    .copied()
            });
            if let Some(j) = slot {
                matrix.set(row, j, 1.0);
            }
        }
    }

    Ok(matrix)
}

/// [`align`] over hand-built rows.
pub fn align_rows(rows: &[RawRow], metadata: &PreprocessingMetadata) -> Result<FeatureMatrix> {
    align(&Frame::from_rows(rows)?, metadata)
}
