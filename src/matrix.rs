//! Dense feature matrix handed to the classifier

use crate::error::{Result, StressError};
use crate::table::RecordTable;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

/// Row-major `f64` matrix with named columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureMatrix {
    columns: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl FeatureMatrix {
    /// Build from raw rows; every row must match the column count
    pub fn new(columns: Vec<String>, rows: Vec<Vec<f64>>) -> Result<Self> {
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != columns.len()) {
            return Err(StressError::Model(format!(
                "row {} has {} values, expected {}",
                i,
                row.len(),
                columns.len()
            )));
        }
        Ok(Self { columns, rows })
    }

    /// Select `feature_cols` from `table` in that order, filling gaps with the
    /// column median computed over this table.
    pub fn from_table(table: &RecordTable, feature_cols: &[String]) -> Result<Self> {
        let missing: Vec<String> = feature_cols
            .iter()
            .filter(|c| !table.has_column(c))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(StressError::MissingColumns {
                missing,
                available: table.column_names(),
            });
        }

        let mut filled: Vec<Vec<f64>> = Vec::with_capacity(feature_cols.len());
        for name in feature_cols {
            let values = table.numeric(name).unwrap_or_default();
            let fill = match median(&values) {
                Some(m) => m,
                None => {
                    warn!(column = %name, "no values to impute from, filling with 0");
                    0.0
                }
            };
            filled.push(values.into_iter().map(|v| v.unwrap_or(fill)).collect());
        }

        let rows = (0..table.n_rows())
            .map(|r| filled.iter().map(|col| col[r]).collect())
            .collect();

        Ok(Self {
            columns: feature_cols.to_vec(),
            rows,
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&[f64]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    /// One row as a feature name -> value map
    pub fn row_map(&self, index: usize) -> HashMap<String, f64> {
        match self.rows.get(index) {
            Some(row) => self.columns.iter().cloned().zip(row.iter().copied()).collect(),
            None => HashMap::new(),
        }
    }

    /// Matrix restricted to the given row indices, in that order
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        Self {
            columns: self.columns.clone(),
            rows: indices
                .iter()
                .filter_map(|i| self.rows.get(*i).cloned())
                .collect(),
        }
    }
}

/// Median of the present values
pub fn median(values: &[Option<f64>]) -> Option<f64> {
    let mut present: Vec<f64> = values.iter().flatten().copied().collect();
    if present.is_empty() {
        return None;
    }
    present.sort_by(|a, b| a.total_cmp(b));
    let mid = present.len() / 2;
    if present.len() % 2 == 0 {
        Some((present[mid - 1] + present[mid]) / 2.0)
    } else {
        Some(present[mid])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Column;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_median() {
        assert_eq!(median(&[Some(3.0), None, Some(1.0), Some(2.0)]), Some(2.0));
        assert_eq!(median(&[Some(4.0), Some(1.0), Some(3.0), Some(2.0)]), Some(2.5));
        assert_eq!(median(&[None, None]), None);
    }

    #[test]
    fn test_from_table_orders_and_imputes() {
        let table = RecordTable::from_columns(vec![
            Column::numeric("A", vec![Some(1.0), None, Some(5.0)]),
            Column::numeric("B", vec![Some(10.0), Some(20.0), Some(30.0)]),
            Column::numeric("C", vec![None, None, None]),
        ])
        .unwrap();

        let cols = vec!["B".to_string(), "A".to_string(), "C".to_string()];
        let matrix = FeatureMatrix::from_table(&table, &cols).unwrap();

        assert_eq!(matrix.columns(), &cols[..]);
        assert_eq!(
            matrix.rows(),
            &[
                vec![10.0, 1.0, 0.0],
                vec![20.0, 3.0, 0.0],
                vec![30.0, 5.0, 0.0]
            ]
        );
        assert_eq!(matrix.row_map(1).get("A"), Some(&3.0));
    }

    #[test]
    fn test_missing_feature_column() {
        let table =
            RecordTable::from_columns(vec![Column::numeric("A", vec![Some(1.0)])]).unwrap();
        let err = FeatureMatrix::from_table(&table, &["A".to_string(), "A_delta".to_string()])
            .unwrap_err();
        assert!(matches!(err, StressError::MissingColumns { .. }));
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let result = FeatureMatrix::new(vec!["a".into(), "b".into()], vec![vec![1.0]]);
        assert!(result.is_err());
    }
}
