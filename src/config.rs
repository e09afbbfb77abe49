//! Pipeline configuration
//!
//! Every option has a default matching the SWELL-KW physiology export the
//! pipeline was built around. Values can be overridden from a partial JSON
//! file and then from command-line flags.

use crate::error::{Result, StressError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default location of the physiology features export
pub const DEFAULT_DATA_PATH: &str = "data/D - Physiology features (HR_HRV_SCL - final).csv";

/// Default suffix appended to base feature names for delta features
pub const DEFAULT_DELTA_SUFFIX: &str = "_delta";

/// Instrument export value that stands for "no reading"
pub const DEFAULT_MISSING_SENTINEL: f64 = 999.0;

/// How undefined deltas (no baseline for the participant) are materialized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeltaFill {
    /// Undefined deltas become 0.0 ("no baseline" read as "no deviation")
    #[default]
    Zero,
    /// Undefined deltas stay missing and are imputed with the matrix median
    Deferred,
}

/// How condition codes map onto the binary label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LabelPolicy {
    /// Neutral code is 0, every other code is 1
    #[default]
    CatchAll,
    /// Neutral code is 0, stress-set members are 1, anything else is rejected
    Strict,
}

/// Runtime configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data_path: PathBuf,

    /// Canonical participant identifier column
    pub participant_col: String,
    /// Participant column name as it appears in the raw export
    pub raw_participant_col: String,

    /// Canonical numeric condition column
    pub condition_col: String,
    /// Condition code column name as it appears in the raw export
    pub raw_condition_col: String,
    /// Name given to a textual condition label displaced by the numeric code
    pub condition_text_col: String,

    pub neutral_code: i64,
    pub stress_codes: Vec<i64>,
    pub label_policy: LabelPolicy,

    /// Consecutive stressed predictions required before warning
    pub consecutive_threshold: i64,

    pub random_state: u64,
    /// Number of trees in the forest
    pub n_estimators: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,

    pub missing_sentinel: f64,
    pub delta_suffix: String,
    pub delta_fill: DeltaFill,

    /// Number of reasons rendered per row
    pub top_k: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from(DEFAULT_DATA_PATH),
            participant_col: "Participant".to_string(),
            raw_participant_col: "PP".to_string(),
            condition_col: "Condition".to_string(),
            raw_condition_col: "C".to_string(),
            condition_text_col: "Condition_text".to_string(),
            neutral_code: 1,
            stress_codes: vec![2, 3],
            label_policy: LabelPolicy::CatchAll,
            consecutive_threshold: 3,
            random_state: 42,
            n_estimators: 300,
            max_depth: 12,
            min_samples_split: 2,
            missing_sentinel: DEFAULT_MISSING_SENTINEL,
            delta_suffix: DEFAULT_DELTA_SUFFIX.to_string(),
            delta_fill: DeltaFill::Zero,
            top_k: 3,
        }
    }
}

impl Config {
    /// Load a configuration file; keys absent from the file keep their defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(StressError::data_not_found(path));
        }
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject option combinations the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.consecutive_threshold <= 0 {
            return Err(StressError::InvalidParameter(format!(
                "consecutive_threshold must be positive, got {}",
                self.consecutive_threshold
            )));
        }
        if self.n_estimators == 0 {
            return Err(StressError::InvalidParameter(
                "n_estimators must be at least 1".to_string(),
            ));
        }
        if self.max_depth == 0 {
            return Err(StressError::InvalidParameter(
                "max_depth must be at least 1".to_string(),
            ));
        }
        if self.top_k == 0 {
            return Err(StressError::InvalidParameter(
                "top_k must be at least 1".to_string(),
            ));
        }
        if self.delta_suffix.is_empty() {
            return Err(StressError::InvalidParameter(
                "delta_suffix must not be empty".to_string(),
            ));
        }
        if self.participant_col == self.condition_col {
            return Err(StressError::InvalidParameter(format!(
                "participant and condition columns must differ, both are '{}'",
                self.participant_col
            )));
        }
        if self.stress_codes.contains(&self.neutral_code) {
            return Err(StressError::InvalidParameter(format!(
                "neutral code {} is also listed as a stress code",
                self.neutral_code
            )));
        }
        Ok(())
    }
}
