//! Column-oriented table shared by the training and inference paths.
//!
//! Both a polars [`DataFrame`] read from CSV and a set of hand-built
//! [`RawRow`]s collapse into the same [`Frame`], so the aligner sees one
//! representation no matter where the rows came from.

use std::collections::BTreeMap;

use polars::prelude::*;

use crate::error::{Error, Result};

/// A single raw cell: a number, a category label, or nothing.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Text(String),
    Missing,
}

impl Value {
    /// Null, NaN and blank text all count as missing.
    pub fn is_missing(&self) -> bool {
        match self {
            Value::Number(x) => !x.is_finite(),
            Value::Text(s) => s.trim().is_empty(),
            Value::Missing => true,
        }
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Number(x)
    }
}

impl From<i64> for Value {
    fn from(x: i64) -> Self {
        Value::Number(x as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Missing)
    }
}

/// One property's attributes keyed by column name.
///
/// A `BTreeMap` keeps column discovery in [`Frame::from_rows`] deterministic.
pub type RawRow = BTreeMap<String, Value>;

/// Canonical text label for a number used as a category.
///
/// Integral values print without a fractional part so that `20` and `20.0`
/// land on the same indicator column.
pub fn category_label(x: f64) -> String {
    if x.fract() == 0.0 && x.abs() < 1e15 {
        format!("{}", x as i64)
    } else {
        format!("{x}")
    }
}

fn clean_text(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Numeric(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Numeric(v) => v.len(),
            Column::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn null_count(&self) -> usize {
        match self {
            Column::Numeric(v) => v.iter().filter(|x| x.is_none()).count(),
            Column::Text(v) => v.iter().filter(|x| x.is_none()).count(),
        }
    }

    /// Cell `row` as a category label, numbers going through [`category_label`].
    pub fn label(&self, row: usize) -> Option<String> {
        match self {
            Column::Numeric(v) => v[row].map(category_label),
            Column::Text(v) => v[row].clone(),
        }
    }

    /// Cell `row` as a number; text that does not parse is `Err` carrying the text.
    pub fn number(&self, row: usize) -> std::result::Result<Option<f64>, String> {
        match self {
            Column::Numeric(v) => Ok(v[row]),
            Column::Text(v) => match &v[row] {
                None => Ok(None),
                Some(s) => match s.parse::<f64>() {
                    Ok(x) if x.is_finite() => Ok(Some(x)),
                    Ok(_) => Ok(None),
                    Err(_) => Err(s.clone()),
                },
            },
        }
    }

    /// All cells as category labels.
    pub fn labels(&self) -> Vec<Option<String>> {
        (0..self.len()).map(|row| self.label(row)).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    names: Vec<String>,
    columns: Vec<Column>,
    height: usize,
}

impl Frame {
    pub fn new(height: usize) -> Self {
        Self {
            names: Vec::new(),
            columns: Vec::new(),
            height,
        }
    }

    pub fn push(&mut self, name: impl Into<String>, column: Column) -> Result<()> {
        let name = name.into();
        if column.len() != self.height {
            return Err(Error::schema(format!(
                "column `{name}` has {} rows, expected {}",
                column.len(),
                self.height
            )));
        }
        if self.names.contains(&name) {
            return Err(Error::schema(format!("duplicate column `{name}`")));
        }
        self.names.push(name);
        self.columns.push(column);
        Ok(())
    }

    pub fn with_column(mut self, name: impl Into<String>, column: Column) -> Result<Self> {
        self.push(name, column)?;
        Ok(self)
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| &self.columns[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.columns.iter())
    }

    /// Converts a polars frame, keeping its column order.
    ///
    /// Numeric dtypes become [`Column::Numeric`]; everything else is cast to
    /// strings. NaN and blank strings become nulls.
    pub fn from_dataframe(df: &DataFrame) -> Result<Self> {
        let mut frame = Frame::new(df.height());
        for series in df.get_columns() {
            let column = if series.dtype().is_numeric() {
                let values = series.cast(&DataType::Float64)?;
                Column::Numeric(
                    values
                        .f64()?
                        .into_iter()
                        .map(|v| v.filter(|x| x.is_finite()))
                        .collect(),
                )
            } else {
                let values = series.cast(&DataType::String)?;
                Column::Text(
                    values
                        .str()?
                        .into_iter()
                        .map(|v| v.and_then(clean_text))
                        .collect(),
                )
            };
            frame.push(series.name(), column)?;
        }
        Ok(frame)
    }

    /// Builds a frame from loosely typed rows.
    ///
    /// Columns are the union of all keys in sorted order; a key absent from a
    /// row is a null in that row. A column whose present values are all
    /// numbers is numeric, otherwise it is text with numbers labelled by
    /// [`category_label`].
    pub fn from_rows(rows: &[RawRow]) -> Result<Self> {
        let mut names: Vec<&String> = rows.iter().flat_map(|row| row.keys()).collect();
        names.sort();
        names.dedup();

        let mut frame = Frame::new(rows.len());
        for name in names {
            let cells: Vec<&Value> = rows
                .iter()
                .map(|row| row.get(name).unwrap_or(&Value::Missing))
                .collect();
            let mut present = cells.iter().filter(|v| !v.is_missing()).peekable();
            let numeric =
                present.peek().is_some() && present.all(|v| matches!(v, Value::Number(_)));
            let column = if numeric {
                Column::Numeric(
                    cells
                        .iter()
                        .map(|v| match v {
                            Value::Number(x) if x.is_finite() => Some(*x),
                            _ => None,
                        })
                        .collect(),
                )
            } else {
                Column::Text(
                    cells
                        .iter()
                        .map(|v| match v {
                            Value::Number(x) if x.is_finite() => Some(category_label(*x)),
                            Value::Text(s) => clean_text(s),
                            _ => None,
                        })
                        .collect(),
                )
            };
            frame.push(name.clone(), column)?;
        }
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use polars::prelude::*;

    use super::*;

    fn row(cells: &[(&str, Value)]) -> RawRow {
        cells
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn integral_labels_drop_fraction() {
        assert_eq!(category_label(20.0), "20");
        assert_eq!(category_label(-3.0), "-3");
        assert_eq!(category_label(2.5), "2.5");
    }

    #[test]
    fn blank_text_is_missing() {
        assert!(Value::from("  ").is_missing());
        assert!(Value::Number(f64::NAN).is_missing());
        assert!(!Value::from("Gd").is_missing());
        assert!(Value::from(None::<f64>).is_missing());
    }

    #[test]
    fn rows_union_keys_in_sorted_order() {
        let rows = vec![
            row(&[("b", Value::from(1.0))]),
            row(&[("a", Value::from("x")), ("b", Value::Missing)]),
        ];
        let frame = Frame::from_rows(&rows).unwrap();
        assert_eq!(frame.names(), &["a".to_string(), "b".to_string()]);
        assert_eq!(
            frame.column("a"),
            Some(&Column::Text(vec![None, Some("x".into())]))
        );
        assert_eq!(
            frame.column("b"),
            Some(&Column::Numeric(vec![Some(1.0), None]))
        );
    }

    #[test]
    fn mixed_rows_become_text() {
        let rows = vec![
            row(&[("MSSubClass", Value::from(60i64))]),
            row(&[("MSSubClass", Value::from("A"))]),
        ];
        let frame = Frame::from_rows(&rows).unwrap();
        assert_eq!(
            frame.column("MSSubClass"),
            Some(&Column::Text(vec![Some("60".into()), Some("A".into())]))
        );
    }

    #[test]
    fn text_numbers_parse_or_report() {
        let column = Column::Text(vec![Some("12.5".into()), Some("abc".into()), None]);
        assert_eq!(column.number(0), Ok(Some(12.5)));
        assert_eq!(column.number(1), Err("abc".to_string()));
        assert_eq!(column.number(2), Ok(None));
    }

    #[test]
    fn dataframe_conversion_keeps_order_and_nulls() {
        let df = df!(
            "LotArea" => &[Some(8450i64), None, Some(9600)],
            "Alley" => &[None, Some("Grvl"), Some(" ")],
        )
        .unwrap();
        let frame = Frame::from_dataframe(&df).unwrap();
        assert_eq!(frame.names(), &["LotArea".to_string(), "Alley".to_string()]);
        assert_eq!(
            frame.column("LotArea"),
            Some(&Column::Numeric(vec![Some(8450.0), None, Some(9600.0)]))
        );
        assert_eq!(
            frame.column("Alley"),
            Some(&Column::Text(vec![None, Some("Grvl".into()), None]))
        );
    }

    #[test]
    fn rejects_ragged_columns() {
        let mut frame = Frame::new(2);
        assert!(frame.push("x", Column::Numeric(vec![Some(1.0)])).is_err());
        frame.push("x", Column::Numeric(vec![None, None])).unwrap();
        assert!(frame.push("x", Column::Numeric(vec![None, None])).is_err());
    }
}
