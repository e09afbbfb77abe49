//! Model artifact persistence
//!
//! The trained forest is stored as JSON together with the metadata the
//! prediction path relies on, most importantly the ordered feature columns
//! used at training time.

use crate::classifier::RandomForest;
use crate::error::{Result, StressError};
use crate::{PRODUCER_NAME, STRESS_VERSION};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;
use uuid::Uuid;

/// Default artifact location under the output directory
pub const MODEL_FILE: &str = "models/stress_model.json";

/// Metadata stored alongside the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ModelMetadata {
    /// File name of the training table
    pub trained_on: String,
    /// Feature columns in training order
    pub feature_cols: Vec<String>,
    /// Hold-out accuracy
    pub accuracy: f64,
    pub model_id: Option<Uuid>,
    pub trained_at: Option<DateTime<Utc>>,
    pub producer: Option<String>,
    pub version: Option<String>,
}

impl ModelMetadata {
    pub fn new(trained_on: impl Into<String>, feature_cols: Vec<String>, accuracy: f64) -> Self {
        Self {
            trained_on: trained_on.into(),
            feature_cols,
            accuracy,
            model_id: Some(Uuid::new_v4()),
            trained_at: Some(Utc::now()),
            producer: Some(PRODUCER_NAME.to_string()),
            version: Some(STRESS_VERSION.to_string()),
        }
    }
}

/// Trained classifier plus metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub model: RandomForest,
    #[serde(default)]
    pub metadata: ModelMetadata,
}

impl ModelArtifact {
    pub fn new(model: RandomForest, metadata: ModelMetadata) -> Self {
        Self { model, metadata }
    }

    /// Write the artifact, creating parent directories as needed
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_json()?)?;
        info!(path = %path.display(), "saved model");
        Ok(())
    }

    /// Read an artifact; a missing file points the user at training
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(StressError::model_not_found(path));
        }
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Classifier;
    use crate::labels::Label;
    use crate::matrix::FeatureMatrix;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn fitted() -> RandomForest {
        let x = FeatureMatrix::new(
            vec!["HR".into()],
            vec![vec![60.0], vec![62.0], vec![90.0], vec![95.0]],
        )
        .unwrap();
        let y = vec![Label::Neutral, Label::Neutral, Label::Stressed, Label::Stressed];
        let mut forest = RandomForest::new(3, 42);
        forest.fit(&x, &y).unwrap();
        forest
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(MODEL_FILE);
        let metadata = ModelMetadata::new("export.csv", vec!["HR".into()], 1.0);
        ModelArtifact::new(fitted(), metadata.clone()).save(&path).unwrap();

        let loaded = ModelArtifact::load(&path).unwrap();
        assert_eq!(loaded.metadata, metadata);
        assert_eq!(loaded.model.n_features(), 1);
    }

    #[test]
    fn test_missing_artifact_hints_at_training() {
        let err = ModelArtifact::load(Path::new("/nonexistent/stress_model.json")).unwrap_err();
        match err {
            StressError::ArtifactNotFound { path, hint } => {
                assert_eq!(path, Path::new("/nonexistent/stress_model.json"));
                assert!(hint.unwrap().contains("train"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_metadata_is_optional() {
        let json = format!(r#"{{"model": {}}}"#, serde_json::to_string(&fitted()).unwrap());
        let artifact = ModelArtifact::from_json(&json).unwrap();
        assert!(artifact.metadata.feature_cols.is_empty());
        assert_eq!(artifact.metadata.trained_on, "");
    }
}
