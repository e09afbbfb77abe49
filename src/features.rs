//! Feature selection and delta derivation
//!
//! This module picks the numeric base features of a table and derives one
//! delta feature per base feature: the row value minus the participant's
//! neutral baseline for that feature.

use crate::baseline::ParticipantBaseline;
use crate::config::{DeltaFill, DEFAULT_DELTA_SUFFIX};
use crate::error::{Result, StressError};
use crate::table::{Column, RecordTable};
use tracing::debug;

/// Numeric columns in table order, minus the excluded identifier/label columns
pub fn numeric_feature_columns(table: &RecordTable, exclude: &[String]) -> Vec<String> {
    table
        .columns()
        .iter()
        .filter(|c| c.is_numeric() && !exclude.contains(&c.name))
        .map(|c| c.name.clone())
        .collect()
}

/// Derives delta features from a precomputed baseline
#[derive(Debug, Clone)]
pub struct DeltaBuilder {
    suffix: String,
    fill: DeltaFill,
}

impl Default for DeltaBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_DELTA_SUFFIX, DeltaFill::Zero)
    }
}

impl DeltaBuilder {
    pub fn new(suffix: impl Into<String>, fill: DeltaFill) -> Self {
        Self {
            suffix: suffix.into(),
            fill,
        }
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    pub fn delta_name(&self, feature: &str) -> String {
        format!("{}{}", feature, self.suffix)
    }

    /// Base features followed by their delta names, in the same order
    pub fn feature_columns(&self, base: &[String]) -> Vec<String> {
        base.iter()
            .cloned()
            .chain(base.iter().map(|f| self.delta_name(f)))
            .collect()
    }

    /// Return a copy of `table` with one delta column appended per feature.
    ///
    /// The join is on the participant key: every row of a participant is
    /// offset by the same baseline vector. Rows whose participant (or
    /// feature) has no baseline, or whose raw value is missing, get an
    /// undefined delta, materialized according to the fill policy.
    pub fn add_deltas(
        &self,
        table: &RecordTable,
        baseline: &ParticipantBaseline,
        participant_col: &str,
        feature_names: &[String],
    ) -> Result<RecordTable> {
        let participants = table.column(participant_col).ok_or_else(|| {
            StressError::MissingColumns {
                missing: vec![participant_col.to_string()],
                available: table.column_names(),
            }
        })?;
        let keys: Vec<Option<String>> = participants.cells.iter().map(|c| c.key()).collect();

        if let Some(taken) = feature_names
            .iter()
            .map(|f| self.delta_name(f))
            .find(|name| table.has_column(name))
        {
            return Err(StressError::InvalidParameter(format!(
                "column '{}' already exists; choose a delta suffix other than '{}'",
                taken, self.suffix
            )));
        }

        let mut out = table.clone();
        let mut undefined = 0usize;

        for feature in feature_names {
            let values = table.numeric(feature).ok_or_else(|| StressError::MissingColumns {
                missing: vec![feature.clone()],
                available: table.column_names(),
            })?;

            let deltas: Vec<Option<f64>> = values
                .iter()
                .zip(&keys)
                .map(|(value, key)| {
                    let base = key.as_deref().and_then(|k| baseline.get(k, feature));
                    let delta = match (value, base) {
                        (Some(v), Some(b)) => Some(v - b),
                        _ => None,
                    };
                    if delta.is_none() {
                        undefined += 1;
                    }
                    match (delta, self.fill) {
                        (None, DeltaFill::Zero) => Some(0.0),
                        (delta, _) => delta,
                    }
                })
                .collect();

            out = out.with_column(Column::numeric(self.delta_name(feature), deltas))?;
        }

        debug!(
            features = feature_names.len(),
            undefined,
            fill = ?self.fill,
            "added delta features"
        );

        Ok(out)
    }
}
