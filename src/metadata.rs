//! The preprocessing record persisted next to the fitted model.
//!
//! A [`PreprocessingMetadata`] is produced once by [`crate::derive`] and only
//! read afterwards. Everything the aligner needs to rebuild the training-time
//! feature layout lives here.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Category written in place of a missing value that means "not present".
pub const NONE_CATEGORY: &str = "None";

/// Category used when no training-time mode exists for a column.
pub const UNKNOWN_CATEGORY: &str = "Unknown";

/// Name of the one-hot indicator for `category` of `column`.
pub fn indicator_name(column: &str, category: &str) -> String {
    format!("{column}_{category}")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessingMetadata {
    numeric_columns: Vec<String>,
    categorical_columns: Vec<String>,
    null_means_absent_columns: Vec<String>,
    numeric_fill_values: BTreeMap<String, f64>,
    categorical_fill_values: BTreeMap<String, String>,
    encoded_feature_columns: Vec<String>,
}

impl PreprocessingMetadata {
    /// Assembles and validates a record.
    pub fn new(
        numeric_columns: Vec<String>,
        categorical_columns: Vec<String>,
        null_means_absent_columns: Vec<String>,
        numeric_fill_values: BTreeMap<String, f64>,
        categorical_fill_values: BTreeMap<String, String>,
        encoded_feature_columns: Vec<String>,
    ) -> Result<Self> {
        let metadata = Self {
            numeric_columns,
            categorical_columns,
            null_means_absent_columns,
            numeric_fill_values,
            categorical_fill_values,
            encoded_feature_columns,
        };
        metadata.validate()?;
        Ok(metadata)
    }

    pub fn numeric_columns(&self) -> &[String] {
        &self.numeric_columns
    }

    pub fn categorical_columns(&self) -> &[String] {
        &self.categorical_columns
    }

    pub fn null_means_absent_columns(&self) -> &[String] {
        &self.null_means_absent_columns
    }

    pub fn numeric_fill_values(&self) -> &BTreeMap<String, f64> {
        &self.numeric_fill_values
    }

    pub fn categorical_fill_values(&self) -> &BTreeMap<String, String> {
        &self.categorical_fill_values
    }

    pub fn encoded_feature_columns(&self) -> &[String] {
        &self.encoded_feature_columns
    }

    pub fn width(&self) -> usize {
        self.encoded_feature_columns.len()
    }

    pub fn is_null_means_absent(&self, column: &str) -> bool {
        self.null_means_absent_columns.iter().any(|c| c == column)
    }

    /// Replacement for a missing numeric entry: the training median, else `0`.
    pub fn numeric_fill(&self, column: &str) -> f64 {
        self.numeric_fill_values.get(column).copied().unwrap_or(0.0)
    }

    /// Replacement for a missing categorical entry.
    ///
    /// The recorded mode wins; otherwise null-means-absent columns get
    /// [`NONE_CATEGORY`] and everything else [`UNKNOWN_CATEGORY`].
    pub fn categorical_fill(&self, column: &str) -> &str {
        match self.categorical_fill_values.get(column) {
            Some(mode) => mode.as_str(),
            None if self.is_null_means_absent(column) => NONE_CATEGORY,
            None => UNKNOWN_CATEGORY,
        }
    }

    /// Parses and validates a persisted record. Any structural problem,
    /// including a missing field, is a [`Error::Schema`].
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let metadata: Self = serde_json::from_slice(bytes)
            .map_err(|e| Error::schema(format!("malformed preprocessing metadata: {e}")))?;
        metadata.validate()?;
        Ok(metadata)
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        unique("numeric_columns", &self.numeric_columns)?;
        unique("categorical_columns", &self.categorical_columns)?;
        unique("encoded_feature_columns", &self.encoded_feature_columns)?;

        let numeric: HashSet<&str> = self.numeric_columns.iter().map(String::as_str).collect();
        let categorical: HashSet<&str> =
            self.categorical_columns.iter().map(String::as_str).collect();

        if let Some(c) = self.numeric_columns.iter().find(|c| categorical.contains(c.as_str())) {
            return Err(Error::schema(format!(
                "column `{c}` is both numeric and categorical"
            )));
        }
        if let Some(c) = self
            .null_means_absent_columns
            .iter()
            .find(|c| !categorical.contains(c.as_str()))
        {
            return Err(Error::schema(format!(
                "null-means-absent column `{c}` is not categorical"
            )));
        }
        for (c, fill) in &self.numeric_fill_values {
            if !numeric.contains(c.as_str()) {
                return Err(Error::schema(format!(
                    "numeric fill value for unknown column `{c}`"
                )));
            }
            if !fill.is_finite() {
                return Err(Error::schema(format!(
                    "numeric fill value for `{c}` is not finite"
                )));
            }
        }
        if let Some(c) = self
            .categorical_fill_values
            .keys()
            .find(|c| !categorical.contains(c.as_str()))
        {
            return Err(Error::schema(format!(
                "categorical fill value for unknown column `{c}`"
            )));
        }

        let n = self.numeric_columns.len();
        if self.encoded_feature_columns.len() < n
            || self.encoded_feature_columns[..n] != self.numeric_columns[..]
        {
            return Err(Error::schema(
                "encoded feature columns must start with the numeric columns in order",
            ));
        }
        if let Some(c) = self.encoded_feature_columns[n..].iter().find(|name| {
            !self
                .categorical_columns
                .iter()
                .any(|cat| name.len() > cat.len() + 1 && name.starts_with(&format!("{cat}_")))
        }) {
            return Err(Error::schema(format!(
                "encoded column `{c}` does not belong to any categorical column"
            )));
        }
        Ok(())
    }
}

fn unique(field: &str, names: &[String]) -> Result<()> {
    let mut seen = HashSet::new();
    match names.iter().find(|n| !seen.insert(*n)) {
        Some(dup) => Err(Error::schema(format!("duplicate `{dup}` in {field}"))),
        None => Ok(()),
    }
}
