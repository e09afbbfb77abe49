//! Personal baselines
//!
//! This module computes per-participant feature means over neutral-condition
//! rows. Baselines remove individual variance so that later stages can work
//! with each participant's deviation rather than raw values.

use crate::error::{Result, StressError};
use crate::table::RecordTable;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Per-participant feature means taken from neutral rows.
///
/// A participant without neutral rows has no entry, and a feature that was
/// missing in every neutral row of a participant has no entry either. Lookup
/// misses mean "no baseline", never zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParticipantBaseline {
    means: BTreeMap<String, BTreeMap<String, f64>>,
}

impl ParticipantBaseline {
    pub fn is_empty(&self) -> bool {
        self.means.is_empty()
    }

    /// Number of participants with at least one baseline entry
    pub fn len(&self) -> usize {
        self.means.len()
    }

    /// Baseline mean of `feature` for `participant`
    pub fn get(&self, participant: &str, feature: &str) -> Option<f64> {
        self.means.get(participant)?.get(feature).copied()
    }

    pub fn participant(&self, participant: &str) -> Option<&BTreeMap<String, f64>> {
        self.means.get(participant)
    }

    pub fn participants(&self) -> impl Iterator<Item = &str> {
        self.means.keys().map(String::as_str)
    }

    /// Load baselines from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize baselines to JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Running sum for a mean that skips missing values
#[derive(Debug, Default, Clone, Copy)]
struct MeanAccumulator {
    sum: f64,
    count: usize,
}

impl MeanAccumulator {
    fn push(&mut self, value: Option<f64>) {
        if let Some(v) = value {
            self.sum += v;
            self.count += 1;
        }
    }

    fn mean(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum / self.count as f64)
        }
    }
}

/// Compute baselines from rows whose condition equals `neutral_code`.
///
/// Returns an empty baseline, not an error, when there are no neutral rows.
pub fn compute_baseline(
    table: &RecordTable,
    participant_col: &str,
    condition_col: &str,
    neutral_code: f64,
    feature_names: &[String],
) -> Result<ParticipantBaseline> {
    let mut missing: Vec<String> = [participant_col, condition_col]
        .iter()
        .map(|s| s.to_string())
        .chain(feature_names.iter().cloned())
        .filter(|name| !table.has_column(name))
        .collect();
    missing.dedup();
    if !missing.is_empty() {
        return Err(StressError::MissingColumns {
            missing,
            available: table.column_names(),
        });
    }

    let conditions = table.numeric(condition_col).unwrap_or_default();
    let neutral_rows: Vec<usize> = conditions
        .iter()
        .enumerate()
        .filter(|(_, c)| **c == Some(neutral_code))
        .map(|(i, _)| i)
        .collect();

    if neutral_rows.is_empty() {
        warn!(neutral_code, "no neutral rows, baseline is empty");
        return Ok(ParticipantBaseline::default());
    }

    let features: Vec<(&str, Vec<Option<f64>>)> = feature_names
        .iter()
        .map(|name| (name.as_str(), table.numeric(name).unwrap_or_default()))
        .collect();

    let mut accumulators: BTreeMap<String, Vec<MeanAccumulator>> = BTreeMap::new();
    for &row in &neutral_rows {
        let Some(participant) = table.cell(row, participant_col).and_then(|c| c.key()) else {
            continue;
        };
        let acc = accumulators
            .entry(participant)
            .or_insert_with(|| vec![MeanAccumulator::default(); features.len()]);
        for (slot, (_, values)) in acc.iter_mut().zip(&features) {
            slot.push(values.get(row).copied().flatten());
        }
    }

    let means: BTreeMap<String, BTreeMap<String, f64>> = accumulators
        .into_iter()
        .map(|(participant, acc)| {
            let entries = features
                .iter()
                .zip(acc)
                .filter_map(|((name, _), a)| a.mean().map(|m| (name.to_string(), m)))
                .collect();
            (participant, entries)
        })
        .collect();

    debug!(
        participants = means.len(),
        neutral_rows = neutral_rows.len(),
        features = feature_names.len(),
        "computed baselines"
    );

    Ok(ParticipantBaseline { means })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{Cell, Column};

    fn features(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn table() -> RecordTable {
        RecordTable::from_columns(vec![
            Column::new(
                "Participant",
                vec![
                    Cell::from("p1"),
                    Cell::from("p1"),
                    Cell::from("p1"),
                    Cell::from("p1"),
                    Cell::from("p2"),
                    Cell::from("p2"),
                ],
            ),
            Column::numeric(
                "Condition",
                vec![Some(1.0), Some(1.0), Some(1.0), Some(2.0), Some(2.0), Some(1.0)],
            ),
            Column::numeric(
                "F",
                vec![Some(10.0), Some(12.0), Some(14.0), Some(40.0), Some(5.0), Some(7.0)],
            ),
            Column::numeric("G", vec![Some(1.0), None, Some(3.0), Some(9.0), None, None]),
        ])
        .unwrap()
    }

    #[test]
    fn test_mean_over_neutral_rows() {
        let baseline =
            compute_baseline(&table(), "Participant", "Condition", 1.0, &features(&["F", "G"]))
                .unwrap();

        assert_eq!(baseline.get("p1", "F"), Some(12.0));
        // missing values are skipped, not counted as zero
        assert_eq!(baseline.get("p1", "G"), Some(2.0));
        assert_eq!(baseline.get("p2", "F"), Some(7.0));
    }

    #[test]
    fn test_all_missing_feature_has_no_entry() {
        let baseline =
            compute_baseline(&table(), "Participant", "Condition", 1.0, &features(&["F", "G"]))
                .unwrap();
        assert_eq!(baseline.get("p2", "G"), None);
        assert!(baseline.participant("p2").is_some());
        assert_eq!(baseline.get("p3", "F"), None);
    }

    #[test]
    fn test_no_neutral_rows_is_empty() {
        let baseline =
            compute_baseline(&table(), "Participant", "Condition", 7.0, &features(&["F"])).unwrap();
        assert!(baseline.is_empty());
    }

    #[test]
    fn test_missing_columns() {
        let err = compute_baseline(&table(), "Participant", "Condition", 1.0, &features(&["HR"]))
            .unwrap_err();
        assert!(matches!(err, StressError::MissingColumns { .. }));
    }

    #[test]
    fn test_numeric_participant_ids_group() {
        let table = RecordTable::from_columns(vec![
            Column::numeric("Participant", vec![Some(1.0), Some(1.0), Some(2.0)]),
            Column::numeric("Condition", vec![Some(1.0), Some(1.0), Some(1.0)]),
            Column::numeric("F", vec![Some(2.0), Some(4.0), Some(8.0)]),
        ])
        .unwrap();
        let baseline =
            compute_baseline(&table, "Participant", "Condition", 1.0, &features(&["F"])).unwrap();

        assert_eq!(baseline.get("1", "F"), Some(3.0));
        assert_eq!(baseline.get("2", "F"), Some(8.0));
        assert_eq!(baseline.participants().collect::<Vec<_>>(), vec!["1", "2"]);
    }

    #[test]
    fn test_serialization() {
        let baseline =
            compute_baseline(&table(), "Participant", "Condition", 1.0, &features(&["F"])).unwrap();
        let json = baseline.to_json().unwrap();
        let loaded = ParticipantBaseline::from_json(&json).unwrap();
        assert_eq!(baseline, loaded);
    }
}
