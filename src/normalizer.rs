//! Schema normalization
//!
//! This module turns raw physiology exports into a clean record table:
//! - Delimiter fallback (`,` first, `;` when the file collapses to one column)
//! - Instrument sentinel (999) and common NA tokens read as missing
//! - Trailing-delimiter placeholder columns and all-empty columns dropped
//! - Participant/condition columns renamed to canonical names

use crate::config::Config;
use crate::error::{Result, StressError};
use crate::table::{Cell, Column, RecordTable};
use csv::{ReaderBuilder, Trim};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Delimiter tried first
pub const PRIMARY_DELIMITER: u8 = b',';

/// Delimiter tried when the primary one yields a single column
pub const ALTERNATE_DELIMITER: u8 = b';';

/// Header prefix given to unnamed columns (trailing delimiters)
pub const PLACEHOLDER_PREFIX: &str = "Unnamed";

/// Participant aliases tried after the configured raw name
pub const PARTICIPANT_FALLBACKS: &[&str] = &["PP", "P", "subject"];

const MISSING_TOKENS: &[&str] = &["", "NA", "N/A", "NaN", "nan", "null", "NULL", "#N/A"];

/// Ordered alias candidates for one canonical column; first present wins
#[derive(Debug, Clone, PartialEq)]
pub struct AliasRule {
    pub target: String,
    pub candidates: Vec<String>,
}

impl AliasRule {
    fn resolve(&self, names: &[&str]) -> Option<(String, String)> {
        if names.contains(&self.target.as_str()) {
            return None;
        }
        self.candidates
            .iter()
            .find(|c| names.contains(&c.as_str()))
            .map(|c| (c.clone(), self.target.clone()))
    }
}

/// Condition column resolution, including the code-vs-label conflict
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionRule {
    /// Canonical numeric condition column
    pub target: String,
    /// Raw condition code column
    pub code_alias: String,
    /// Where a displaced textual label goes
    pub text_target: String,
}

/// Column name plus whether its values are numeric
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnShape {
    pub name: String,
    pub numeric: bool,
}

impl ColumnShape {
    pub fn of(table: &RecordTable) -> Vec<ColumnShape> {
        table
            .columns()
            .iter()
            .map(|c| ColumnShape {
                name: c.name.clone(),
                numeric: c.is_numeric(),
            })
            .collect()
    }
}

/// Compute the renames that bring a column set to the canonical schema.
///
/// Returns `(from, to)` pairs meant to be applied together. An already
/// canonical column set yields no renames.
pub fn resolve_renames(
    columns: &[ColumnShape],
    participant: &AliasRule,
    condition: &ConditionRule,
) -> Vec<(String, String)> {
    let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
    let numeric = |name: &str| columns.iter().any(|c| c.name == name && c.numeric);

    let mut renames = Vec::new();
    if let Some(rename) = participant.resolve(&names) {
        renames.push(rename);
    }

    let has_code = condition.code_alias != condition.target
        && names.contains(&condition.code_alias.as_str());
    let has_target = names.contains(&condition.target.as_str());

    match (has_code, has_target) {
        (true, true) => {
            // Numeric code wins the canonical name; the other one is kept aside
            if numeric(&condition.target) && !numeric(&condition.code_alias) {
                renames.push((condition.code_alias.clone(), condition.text_target.clone()));
            } else {
                renames.push((condition.target.clone(), condition.text_target.clone()));
                renames.push((condition.code_alias.clone(), condition.target.clone()));
            }
        }
        (true, false) => {
            renames.push((condition.code_alias.clone(), condition.target.clone()));
        }
        _ => {}
    }

    renames
}

/// Drop rows missing any required value, failing if a required column is absent.
///
/// Rows are only removed for gaps in `required`; gaps elsewhere are kept.
pub fn drop_missing(table: &RecordTable, required: &[String]) -> Result<RecordTable> {
    let missing: Vec<String> = required
        .iter()
        .filter(|name| !table.has_column(name))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(StressError::MissingColumns {
            missing,
            available: table.column_names(),
        });
    }

    let mask: Vec<bool> = (0..table.n_rows())
        .map(|row| {
            required
                .iter()
                .all(|name| table.cell(row, name).is_some_and(|c| !c.is_missing()))
        })
        .collect();

    let kept = mask.iter().filter(|k| **k).count();
    if kept < table.n_rows() {
        debug!(
            dropped = table.n_rows() - kept,
            kept, "dropped rows missing required values"
        );
    }

    Ok(table.filter_rows(&mask))
}

/// Normalizer for raw physiology exports
#[derive(Debug, Clone)]
pub struct SchemaNormalizer {
    sentinel: f64,
    participant: AliasRule,
    condition: ConditionRule,
}

impl SchemaNormalizer {
    pub fn new(config: &Config) -> Self {
        let mut candidates = vec![config.raw_participant_col.clone()];
        for fallback in PARTICIPANT_FALLBACKS {
            if !candidates.iter().any(|c| c == fallback) {
                candidates.push((*fallback).to_string());
            }
        }

        Self {
            sentinel: config.missing_sentinel,
            participant: AliasRule {
                target: config.participant_col.clone(),
                candidates,
            },
            condition: ConditionRule {
                target: config.condition_col.clone(),
                code_alias: config.raw_condition_col.clone(),
                text_target: config.condition_text_col.clone(),
            },
        }
    }

    /// Load and normalize a table from disk
    pub fn normalize_path(&self, path: &Path) -> Result<RecordTable> {
        if !path.exists() {
            return Err(StressError::data_not_found(path));
        }
        let raw = fs::read_to_string(path)?;
        let table = self.normalize_str(&raw)?;
        info!(
            path = %path.display(),
            rows = table.n_rows(),
            columns = table.n_cols(),
            "loaded table"
        );
        Ok(table)
    }

    /// Normalize a table held in memory
    pub fn normalize_str(&self, raw: &str) -> Result<RecordTable> {
        let table = self.load(raw)?;
        self.standardize(&table)
    }

    /// Parse and prune without renaming
    pub fn load(&self, raw: &str) -> Result<RecordTable> {
        let mut table = parse_delimited(raw, PRIMARY_DELIMITER, self.sentinel)?;
        if table.n_cols() == 1 {
            debug!("single column with ',' delimiter, retrying with ';'");
            table = parse_delimited(raw, ALTERNATE_DELIMITER, self.sentinel)?;
        }

        let pruned = table.retain_columns(|c| {
            let keep = !is_placeholder(&c.name) && !c.is_all_missing();
            if !keep {
                debug!(column = %c.name, "pruned column");
            }
            keep
        });

        if pruned.n_cols() == 0 {
            return Err(StressError::Format(
                "no usable columns with ',' or ';' delimiter".to_string(),
            ));
        }
        Ok(pruned)
    }

    /// Rename identifier and condition columns to their canonical names
    pub fn standardize(&self, table: &RecordTable) -> Result<RecordTable> {
        let renames = resolve_renames(&ColumnShape::of(table), &self.participant, &self.condition);
        if renames.is_empty() {
            return Ok(table.clone());
        }
        for (from, to) in &renames {
            debug!(from = %from, to = %to, "renamed column");
        }
        table.renamed(&renames)
    }
}

fn parse_delimited(raw: &str, delimiter: u8, sentinel: f64) -> Result<RecordTable> {
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(raw.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| StressError::Format(e.to_string()))?
        .iter()
        .enumerate()
        .map(|(i, h)| {
            let h = h.trim_start_matches('\u{feff}');
            if h.is_empty() {
                format!("{}: {}", PLACEHOLDER_PREFIX, i)
            } else {
                h.to_string()
            }
        })
        .collect();

    if headers.is_empty() {
        return Err(StressError::Format("empty input".to_string()));
    }

    let headers = dedupe_headers(headers);
    let mut cells: Vec<Vec<Cell>> = vec![Vec::new(); headers.len()];

    for record in reader.records() {
        let record = record.map_err(|e| StressError::Format(e.to_string()))?;
        for (i, column) in cells.iter_mut().enumerate() {
            column.push(record.get(i).map_or(Cell::Missing, |v| parse_cell(v, sentinel)));
        }
    }

    RecordTable::from_columns(
        headers
            .into_iter()
            .zip(cells)
            .map(|(name, cells)| Column::new(name, cells))
            .collect(),
    )
}

/// Suffix repeated header names with `.1`, `.2`, ...
fn dedupe_headers(headers: Vec<String>) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut out = Vec::with_capacity(headers.len());
    for header in headers {
        let seen = counts.entry(header.clone()).or_insert(0);
        if *seen == 0 {
            out.push(header);
        } else {
            out.push(format!("{}.{}", header, seen));
        }
        *seen += 1;
    }
    out
}

fn parse_cell(raw: &str, sentinel: f64) -> Cell {
    let value = raw.trim();
    if MISSING_TOKENS.contains(&value) {
        return Cell::Missing;
    }
    match value.parse::<f64>() {
        Ok(v) if v == sentinel => Cell::Missing,
        Ok(v) if v.is_nan() => Cell::Missing,
        Ok(v) => Cell::Number(v),
        Err(_) => Cell::Text(value.to_string()),
    }
}

fn is_placeholder(name: &str) -> bool {
    name.trim().is_empty() || name.starts_with(PLACEHOLDER_PREFIX)
}
