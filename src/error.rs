//! Error types for Synheart Stress

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, StressError>;

/// Errors that can occur while preparing data, training, or predicting
#[derive(Debug, Error)]
pub enum StressError {
    /// The source table could not be parsed into usable columns
    #[error("Unparseable table: {0}")]
    Format(String),

    /// Required columns are absent after normalization
    #[error("Missing required columns: {missing:?}. Available columns: {available:?}")]
    MissingColumns {
        missing: Vec<String>,
        available: Vec<String>,
    },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// A data file or model artifact does not exist
    #[error("{}", artifact_message(.path, .hint))]
    ArtifactNotFound {
        path: PathBuf,
        hint: Option<String>,
    },

    #[error("Model error: {0}")]
    Model(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl StressError {
    /// Data file is missing
    pub fn data_not_found(path: impl Into<PathBuf>) -> Self {
        StressError::ArtifactNotFound {
            path: path.into(),
            hint: None,
        }
    }

    /// Model artifact is missing; points the user at the training command
    pub fn model_not_found(path: impl Into<PathBuf>) -> Self {
        StressError::ArtifactNotFound {
            path: path.into(),
            hint: Some("Train first (stress train --data <csv>)".to_string()),
        }
    }
}

fn artifact_message(path: &Path, hint: &Option<String>) -> String {
    match hint {
        Some(hint) => format!("Not found: {}. {}", path.display(), hint),
        None => format!("Not found: {}", path.display()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_columns_lists_both_sides() {
        let err = StressError::MissingColumns {
            missing: vec!["Condition".to_string()],
            available: vec!["Participant".to_string(), "HR".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("\"Condition\""));
        assert!(msg.contains("\"Participant\""));
        assert!(msg.contains("\"HR\""));
    }

    #[test]
    fn test_model_not_found_hints_at_training() {
        let msg = StressError::model_not_found("outputs/models/stress_model.json").to_string();
        assert!(msg.contains("outputs/models/stress_model.json"));
        assert!(msg.contains("stress train"));

        let msg = StressError::data_not_found("data/x.csv").to_string();
        assert_eq!(msg, "Not found: data/x.csv");
    }
}
