//! Condition code labeling
//!
//! The classifier works on a binary split: the neutral condition against
//! everything else. The configured stress codes act as an allow-list that is
//! reported on, and only enforced under [`LabelPolicy::Strict`].

use crate::config::LabelPolicy;
use crate::error::{Result, StressError};
use crate::table::{Cell, RecordTable};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tracing::warn;

/// Binary stress label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Neutral = 0,
    Stressed = 1,
}

impl Label {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Label::Neutral),
            1 => Some(Label::Stressed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Neutral => "neutral",
            Label::Stressed => "stressed",
        }
    }

    pub fn is_stressed(self) -> bool {
        self == Label::Stressed
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Label a condition code: neutral iff it equals `neutral_code`.
///
/// `stress_codes` does not gate the stressed branch; a code outside the set
/// is still stressed.
pub fn label(condition_code: i64, neutral_code: i64, _stress_codes: &[i64]) -> Label {
    if condition_code == neutral_code {
        Label::Neutral
    } else {
        Label::Stressed
    }
}

/// Label a condition code under an explicit policy
pub fn label_with_policy(
    condition_code: i64,
    neutral_code: i64,
    stress_codes: &[i64],
    policy: LabelPolicy,
) -> Result<Label> {
    match policy {
        LabelPolicy::CatchAll => Ok(label(condition_code, neutral_code, stress_codes)),
        LabelPolicy::Strict => {
            if condition_code == neutral_code {
                Ok(Label::Neutral)
            } else if stress_codes.contains(&condition_code) {
                Ok(Label::Stressed)
            } else {
                Err(StressError::InvalidParameter(format!(
                    "condition code {} is neither neutral ({}) nor a stress code {:?}",
                    condition_code, neutral_code, stress_codes
                )))
            }
        }
    }
}

/// Codes present in the column that are neither neutral nor listed as stress
pub fn out_of_set_codes(codes: &[i64], neutral_code: i64, stress_codes: &[i64]) -> BTreeSet<i64> {
    codes
        .iter()
        .copied()
        .filter(|c| *c != neutral_code && !stress_codes.contains(c))
        .collect()
}

/// Label every row of `table` from its condition column
pub fn make_labels(
    table: &RecordTable,
    condition_col: &str,
    neutral_code: i64,
    stress_codes: &[i64],
    policy: LabelPolicy,
) -> Result<Vec<Label>> {
    let column = table
        .column(condition_col)
        .ok_or_else(|| StressError::MissingColumns {
            missing: vec![condition_col.to_string()],
            available: table.column_names(),
        })?;

    let codes = column
        .cells
        .iter()
        .enumerate()
        .map(|(row, cell)| condition_code(cell, row, condition_col))
        .collect::<Result<Vec<i64>>>()?;

    let unknown = out_of_set_codes(&codes, neutral_code, stress_codes);
    if !unknown.is_empty() && policy == LabelPolicy::CatchAll {
        warn!(codes = ?unknown, "condition codes outside the stress set labeled stressed");
    }

    codes
        .into_iter()
        .map(|code| label_with_policy(code, neutral_code, stress_codes, policy))
        .collect()
}

fn condition_code(cell: &Cell, row: usize, column: &str) -> Result<i64> {
    match cell {
        Cell::Number(v) if v.fract() == 0.0 => Ok(*v as i64),
        Cell::Number(v) => Err(StressError::Format(format!(
            "row {}: condition code {} in '{}' is not an integer",
            row, v, column
        ))),
        Cell::Text(s) => Err(StressError::Format(format!(
            "row {}: condition '{}' in '{}' is not a numeric code",
            row, s, column
        ))),
        Cell::Missing => Err(StressError::Format(format!(
            "row {}: condition missing in '{}'",
            row, column
        ))),
    }
}
