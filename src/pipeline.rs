//! Pipeline orchestration
//!
//! This module provides the public API for Synheart Stress. It wires the
//! stages together for training and for prediction:
//!
//! 1. SchemaNormalizer - Parse the export and resolve canonical columns
//! 2. drop_missing - Remove rows without the required identifiers
//! 3. compute_baseline - Per-participant neutral means
//! 4. DeltaBuilder - Deviation of every base feature from its baseline
//! 5. FeatureMatrix - Ordered, median-imputed classifier input
//! 6. Classifier - Per-row labels and feature importances
//! 7. detect / ExplanationRanker - Early warnings and reasons per row

use crate::artifact::{ModelArtifact, ModelMetadata, MODEL_FILE};
use crate::baseline::{compute_baseline, ParticipantBaseline};
use crate::classifier::{Classifier, RandomForest};
use crate::config::Config;
use crate::error::{Result, StressError};
use crate::evaluate::{train_test_split, Metrics};
use crate::explain::ExplanationRanker;
use crate::features::{numeric_feature_columns, DeltaBuilder};
use crate::labels::{make_labels, Label};
use crate::matrix::FeatureMatrix;
use crate::normalizer::{drop_missing, SchemaNormalizer};
use crate::report::ReportRow;
use crate::table::{Cell, RecordTable};
use crate::warning::detect;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Metrics file under the output directory
pub const METRICS_FILE: &str = "reports/metrics.json";

/// Table after baseline correction, with the features it was built from
#[derive(Debug, Clone)]
pub struct PreparedTable {
    pub table: RecordTable,
    pub base_features: Vec<String>,
    pub baseline: ParticipantBaseline,
}

impl PreparedTable {
    /// Base features followed by their delta features
    pub fn feature_columns(&self, deltas: &DeltaBuilder) -> Vec<String> {
        deltas.feature_columns(&self.base_features)
    }
}

/// Run the baseline and delta stages on a normalized table.
///
/// Rows missing a `required` value are dropped first. The baseline is only
/// computed when the condition column is present; otherwise it is empty and
/// every delta takes the fill value.
pub fn prepare(table: &RecordTable, config: &Config, required: &[String]) -> Result<PreparedTable> {
    let table = drop_missing(table, required)?;

    let exclude: Vec<String> = [&config.participant_col, &config.condition_col]
        .into_iter()
        .filter(|c| table.has_column(c))
        .cloned()
        .collect();
    let base_features = numeric_feature_columns(&table, &exclude);

    let baseline = if table.has_column(&config.condition_col) {
        compute_baseline(
            &table,
            &config.participant_col,
            &config.condition_col,
            config.neutral_code as f64,
            &base_features,
        )?
    } else {
        warn!(
            column = %config.condition_col,
            "condition column absent, no baseline correction"
        );
        ParticipantBaseline::default()
    };

    let deltas = DeltaBuilder::new(config.delta_suffix.clone(), config.delta_fill);
    let table = deltas.add_deltas(&table, &baseline, &config.participant_col, &base_features)?;

    Ok(PreparedTable {
        table,
        base_features,
        baseline,
    })
}

/// Outcome of a training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub metrics: Metrics,
    pub model_path: PathBuf,
    pub metrics_path: PathBuf,
    pub rows: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    pub feature_cols: Vec<String>,
}

/// Train a forest on `config.data_path` and write model and metrics under `out_dir`
pub fn train(config: &Config, out_dir: &Path) -> Result<TrainingReport> {
    config.validate()?;
    if !config.data_path.exists() {
        return Err(StressError::data_not_found(&config.data_path));
    }

    let normalizer = SchemaNormalizer::new(config);
    let table = normalizer.normalize_path(&config.data_path)?;

    let required = vec![config.participant_col.clone(), config.condition_col.clone()];
    let prepared = prepare(&table, config, &required)?;
    let deltas = DeltaBuilder::new(config.delta_suffix.clone(), config.delta_fill);
    let feature_cols = prepared.feature_columns(&deltas);

    let matrix = FeatureMatrix::from_table(&prepared.table, &feature_cols)?;
    let labels = make_labels(
        &prepared.table,
        &config.condition_col,
        config.neutral_code,
        &config.stress_codes,
        config.label_policy,
    )?;

    let split = train_test_split(&labels, config.random_state)?;
    let y_train: Vec<Label> = split.train.iter().map(|i| labels[*i]).collect();
    let y_test: Vec<Label> = split.test.iter().map(|i| labels[*i]).collect();

    let mut model = RandomForest::new(config.n_estimators, config.random_state)
        .with_max_depth(config.max_depth)
        .with_min_samples_split(config.min_samples_split);
    model.fit(&matrix.select_rows(&split.train), &y_train)?;

    let predicted = model.predict(&matrix.select_rows(&split.test))?;
    let metrics = Metrics::from_labels(&y_test, &predicted);

    let trained_on = config
        .data_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let metadata = ModelMetadata::new(trained_on, feature_cols.clone(), metrics.accuracy);

    let model_path = out_dir.join(MODEL_FILE);
    ModelArtifact::new(model, metadata).save(&model_path)?;

    let metrics_path = out_dir.join(METRICS_FILE);
    if let Some(parent) = metrics_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&metrics_path, serde_json::to_string_pretty(&metrics)?)?;

    info!(
        accuracy = metrics.accuracy,
        train_rows = split.train.len(),
        test_rows = split.test.len(),
        stratified = split.stratified,
        "training complete"
    );

    Ok(TrainingReport {
        metrics,
        model_path,
        metrics_path,
        rows: labels.len(),
        train_rows: split.train.len(),
        test_rows: split.test.len(),
        feature_cols,
    })
}

/// Predict with the model at `model_path` on the table at `data_path`.
///
/// `threshold` overrides the configured early-warning threshold.
pub fn predict(
    config: &Config,
    model_path: &Path,
    data_path: &Path,
    threshold: Option<i64>,
) -> Result<Vec<ReportRow>> {
    let processor = StressProcessor::from_path(model_path, config.clone())?;
    processor.predict_path(data_path, threshold)
}

/// Stateful processor holding a loaded model for repeated predictions
pub struct StressProcessor {
    artifact: ModelArtifact,
    config: Config,
    normalizer: SchemaNormalizer,
    deltas: DeltaBuilder,
    ranker: ExplanationRanker,
}

impl StressProcessor {
    pub fn new(artifact: ModelArtifact, config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            normalizer: SchemaNormalizer::new(&config),
            deltas: DeltaBuilder::new(config.delta_suffix.clone(), config.delta_fill),
            ranker: ExplanationRanker::new(config.delta_suffix.clone(), config.top_k),
            artifact,
            config,
        })
    }

    /// Load the artifact at `model_path`
    pub fn from_path(model_path: &Path, config: Config) -> Result<Self> {
        let artifact = ModelArtifact::load(model_path)?;
        Self::new(artifact, config)
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.artifact.metadata
    }

    pub fn predict_path(&self, data_path: &Path, threshold: Option<i64>) -> Result<Vec<ReportRow>> {
        if !data_path.exists() {
            return Err(StressError::data_not_found(data_path));
        }
        let table = self.normalizer.normalize_path(data_path)?;
        self.predict_table(&table, threshold)
    }

    pub fn predict_str(&self, raw: &str, threshold: Option<i64>) -> Result<Vec<ReportRow>> {
        let table = self.normalizer.normalize_str(raw)?;
        self.predict_table(&table, threshold)
    }

    /// Predict, warn, and explain every row of a normalized table
    pub fn predict_table(
        &self,
        table: &RecordTable,
        threshold: Option<i64>,
    ) -> Result<Vec<ReportRow>> {
        let threshold = threshold.unwrap_or(self.config.consecutive_threshold);

        let required = vec![self.config.participant_col.clone()];
        let prepared = prepare(table, &self.config, &required)?;

        let feature_cols = if self.artifact.metadata.feature_cols.is_empty() {
            warn!("model metadata has no feature columns, recomputing from table");
            prepared.feature_columns(&self.deltas)
        } else {
            self.artifact.metadata.feature_cols.clone()
        };

        let matrix = FeatureMatrix::from_table(&prepared.table, &feature_cols)?;
        let predictions = self.artifact.model.predict(&matrix)?;

        let weights = self.artifact.model.feature_importances().unwrap_or_else(|| {
            warn!("model exposes no feature importances, ranking with zeros");
            vec![0.0; feature_cols.len()]
        });
        let importances: Vec<(String, f64)> =
            feature_cols.iter().cloned().zip(weights).collect();

        let warnings: BTreeSet<usize> = detect(&predictions, threshold)?;

        let suffix = self.deltas.suffix();
        let delta_cols: Vec<&String> =
            feature_cols.iter().filter(|c| c.ends_with(suffix)).collect();
        let rows = predictions
            .iter()
            .enumerate()
            .map(|(i, prediction)| {
                let row = delta_row(&prepared.table, &delta_cols, i);
                let reasons = self.ranker.explain(&row, &importances);
                ReportRow::new(i, *prediction, warnings.contains(&i), &reasons)
            })
            .collect::<Vec<_>>();

        info!(
            rows = rows.len(),
            stressed = predictions.iter().filter(|p| p.is_stressed()).count(),
            warnings = warnings.len(),
            "prediction complete"
        );

        Ok(rows)
    }
}

/// Defined deltas of one row, read before imputation.
///
/// An undefined delta (no baseline under `DeltaFill::Deferred`) is left out
/// so it can never be reported as a deviation.
fn delta_row(table: &RecordTable, delta_cols: &[&String], index: usize) -> HashMap<String, f64> {
    delta_cols
        .iter()
        .filter_map(|name| {
            table
                .cell(index, name)
                .and_then(Cell::as_f64)
                .map(|v| ((*name).clone(), v))
        })
        .collect()
}

/// Shape of a normalized table, for inspection before training
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaSummary {
    pub rows: usize,
    pub columns: Vec<String>,
    pub base_features: Vec<String>,
    pub participants: usize,
    pub participants_with_baseline: usize,
    pub neutral_rows: usize,
}

/// Normalize and prepare `data_path` without training
pub fn inspect(config: &Config, data_path: &Path) -> Result<SchemaSummary> {
    let table = SchemaNormalizer::new(config).normalize_path(data_path)?;
    let required = vec![config.participant_col.clone()];
    let prepared = prepare(&table, config, &required)?;

    let participants: BTreeSet<String> = prepared
        .table
        .column(&config.participant_col)
        .map(|c| c.cells.iter().filter_map(|cell| cell.key()).collect())
        .unwrap_or_default();
    let neutral_rows = prepared
        .table
        .numeric(&config.condition_col)
        .map(|codes| {
            codes
                .iter()
                .filter(|c| **c == Some(config.neutral_code as f64))
                .count()
        })
        .unwrap_or(0);

    Ok(SchemaSummary {
        rows: prepared.table.n_rows(),
        columns: table.column_names(),
        base_features: prepared.base_features,
        participants: participants.len(),
        participants_with_baseline: prepared.baseline.len(),
        neutral_rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SCENARIO: &str = "PP,C,F\np1,1,10\np1,1,12\np1,2,20\np1,2,22\n";

    #[test]
    fn test_prepare_scenario() {
        let config = Config::default();
        let table = SchemaNormalizer::new(&config).normalize_str(SCENARIO).unwrap();
        let required = vec!["Participant".to_string(), "Condition".to_string()];
        let prepared = prepare(&table, &config, &required).unwrap();

        assert_eq!(prepared.base_features, vec!["F"]);
        assert_eq!(prepared.baseline.get("p1", "F"), Some(11.0));
        assert_eq!(
            prepared.table.numeric("F_delta").unwrap(),
            vec![Some(-1.0), Some(1.0), Some(9.0), Some(11.0)]
        );
    }

    #[test]
    fn test_prepare_without_condition_column() {
        let config = Config::default();
        let table = SchemaNormalizer::new(&config)
            .normalize_str("PP,F\np1,10\np1,12\n")
            .unwrap();
        let prepared = prepare(&table, &config, &["Participant".to_string()]).unwrap();

        assert!(prepared.baseline.is_empty());
        assert_eq!(prepared.table.numeric("F_delta").unwrap(), vec![Some(0.0); 2]);
    }

    #[test]
    fn test_prepare_rejects_precomputed_delta_column() {
        let config = Config::default();
        let table = SchemaNormalizer::new(&config)
            .normalize_str("PP,C,HR,HR_delta\np1,1,60,0\np1,2,90,30\n")
            .unwrap();
        let required = vec!["Participant".to_string(), "Condition".to_string()];
        let err = prepare(&table, &config, &required).unwrap_err();

        assert!(matches!(err, StressError::InvalidParameter(_)));
        assert!(!err.to_string().contains("Unparseable"));
    }

    #[test]
    fn test_train_missing_data_file() {
        let config = Config {
            data_path: PathBuf::from("/nonexistent/export.csv"),
            ..Config::default()
        };
        let err = train(&config, Path::new("/tmp")).unwrap_err();
        assert!(matches!(err, StressError::ArtifactNotFound { .. }));
    }

    #[test]
    fn test_predict_missing_model() {
        let err = predict(
            &Config::default(),
            Path::new("/nonexistent/model.json"),
            Path::new("/nonexistent/export.csv"),
            None,
        )
        .unwrap_err();
        assert!(err.to_string().contains("stress train"));
    }
}
