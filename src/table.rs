//! Column-oriented record table
//!
//! Rows are read once per run and never edited in place; stages derive new
//! tables (renamed, filtered, or with appended columns) from old ones.

use crate::error::{Result, StressError};
use std::collections::HashSet;

/// A single table cell
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Number(f64),
    Text(String),
    Missing,
}

impl Cell {
    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Number(v) => Some(*v),
            _ => None,
        }
    }

    /// Text key used to group rows (e.g. by participant).
    /// `1.0` renders as `1` so numeric and textual identifiers agree.
    pub fn key(&self) -> Option<String> {
        match self {
            Cell::Number(v) => Some(format!("{}", v)),
            Cell::Text(s) => Some(s.clone()),
            Cell::Missing => None,
        }
    }
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        Cell::Number(v)
    }
}

impl From<Option<f64>> for Cell {
    fn from(v: Option<f64>) -> Self {
        v.map(Cell::Number).unwrap_or(Cell::Missing)
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

/// A named column of cells
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub cells: Vec<Cell>,
}

impl Column {
    pub fn new(name: impl Into<String>, cells: Vec<Cell>) -> Self {
        Self {
            name: name.into(),
            cells,
        }
    }

    /// Column built from optional numbers
    pub fn numeric(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self::new(name, values.into_iter().map(Cell::from).collect())
    }

    /// Every present cell is a number and at least one cell is present
    pub fn is_numeric(&self) -> bool {
        let mut seen = false;
        for cell in &self.cells {
            match cell {
                Cell::Number(_) => seen = true,
                Cell::Text(_) => return false,
                Cell::Missing => {}
            }
        }
        seen
    }

    pub fn is_all_missing(&self) -> bool {
        self.cells.iter().all(Cell::is_missing)
    }

    pub fn values(&self) -> Vec<Option<f64>> {
        self.cells.iter().map(Cell::as_f64).collect()
    }
}

/// Ordered rows over uniquely named columns
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecordTable {
    columns: Vec<Column>,
    n_rows: usize,
}

impl RecordTable {
    /// Build a table, checking that names are unique and lengths agree
    pub fn from_columns(columns: Vec<Column>) -> Result<Self> {
        let n_rows = columns.first().map(|c| c.cells.len()).unwrap_or(0);
        let mut names = HashSet::new();
        for column in &columns {
            if !names.insert(column.name.as_str()) {
                return Err(StressError::Format(format!(
                    "duplicate column name '{}'",
                    column.name
                )));
            }
            if column.cells.len() != n_rows {
                return Err(StressError::Format(format!(
                    "column '{}' has {} rows, expected {}",
                    column.name,
                    column.cells.len(),
                    n_rows
                )));
            }
        }
        Ok(Self { columns, n_rows })
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Numeric view of a column; non-numeric cells read as missing
    pub fn numeric(&self, name: &str) -> Option<Vec<Option<f64>>> {
        self.column(name).map(Column::values)
    }

    pub fn cell(&self, row: usize, name: &str) -> Option<&Cell> {
        self.column(name).and_then(|c| c.cells.get(row))
    }

    /// One row as (column name, cell) pairs in column order
    pub fn row(&self, index: usize) -> Vec<(&str, &Cell)> {
        self.columns
            .iter()
            .filter_map(|c| c.cells.get(index).map(|cell| (c.name.as_str(), cell)))
            .collect()
    }

    /// Return a copy with `column` appended
    pub fn with_column(&self, column: Column) -> Result<Self> {
        let mut columns = self.columns.clone();
        columns.push(column);
        Self::from_columns(columns)
    }

    /// Return a copy with columns renamed by `(from, to)` pairs applied together
    pub fn renamed(&self, renames: &[(String, String)]) -> Result<Self> {
        let columns = self
            .columns
            .iter()
            .map(|c| {
                let name = renames
                    .iter()
                    .find(|(from, _)| *from == c.name)
                    .map(|(_, to)| to.clone())
                    .unwrap_or_else(|| c.name.clone());
                Column::new(name, c.cells.clone())
            })
            .collect();
        Self::from_columns(columns)
    }

    /// Return a copy keeping only the columns accepted by `keep`
    pub fn retain_columns<F>(&self, mut keep: F) -> Self
    where
        F: FnMut(&Column) -> bool,
    {
        Self {
            columns: self.columns.iter().filter(|c| keep(c)).cloned().collect(),
            n_rows: self.n_rows,
        }
    }

    /// Return a copy with the rows where `mask` is true, re-indexed from 0
    pub fn filter_rows(&self, mask: &[bool]) -> Self {
        let columns: Vec<Column> = self
            .columns
            .iter()
            .map(|c| {
                let cells = c
                    .cells
                    .iter()
                    .zip(mask)
                    .filter(|(_, keep)| **keep)
                    .map(|(cell, _)| cell.clone())
                    .collect();
                Column::new(c.name.clone(), cells)
            })
            .collect();
        let n_rows = mask.iter().take(self.n_rows).filter(|k| **k).count();
        Self { columns, n_rows }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RecordTable {
        RecordTable::from_columns(vec![
            Column::new("PP", vec![Cell::from("p1"), Cell::from("p2"), Cell::Missing]),
            Column::numeric("HR", vec![Some(70.0), None, Some(80.0)]),
        ])
        .unwrap()
    }

    #[test]
    fn test_numeric_detection() {
        let table = sample();
        assert!(!table.column("PP").unwrap().is_numeric());
        assert!(table.column("HR").unwrap().is_numeric());
        assert!(!Column::numeric("empty", vec![None, None]).is_numeric());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let result = RecordTable::from_columns(vec![
            Column::numeric("HR", vec![Some(1.0)]),
            Column::numeric("HR", vec![Some(2.0)]),
        ]);
        assert!(matches!(result, Err(StressError::Format(_))));
    }

    #[test]
    fn test_filter_rows_reindexes() {
        let table = sample().filter_rows(&[false, true, true]);
        assert_eq!(table.n_rows(), 2);
        assert_eq!(table.cell(0, "PP"), Some(&Cell::from("p2")));
        assert_eq!(table.cell(1, "HR"), Some(&Cell::Number(80.0)));
    }

    #[test]
    fn test_with_column_does_not_touch_original() {
        let table = sample();
        let extended = table
            .with_column(Column::numeric("HR_delta", vec![Some(0.0); 3]))
            .unwrap();
        assert_eq!(table.n_cols(), 2);
        assert_eq!(extended.n_cols(), 3);
        assert!(extended.with_column(Column::numeric("HR", vec![None; 3])).is_err());
    }

    #[test]
    fn test_keys_render_integers_plainly() {
        assert_eq!(Cell::Number(3.0).key(), Some("3".to_string()));
        assert_eq!(Cell::Number(2.5).key(), Some("2.5".to_string()));
        assert_eq!(Cell::from("A").key(), Some("A".to_string()));
        assert_eq!(Cell::Missing.key(), None);
    }
}
