//! Synheart Stress - Personal-baseline stress classification
//!
//! Stress turns physiology feature exports (HR, HRV, skin conductance per
//! participant and experimental condition) into per-row stress predictions
//! through a deterministic pipeline: schema normalization → personal
//! baseline → delta features → classification → early warning →
//! explanation.
//!
//! ## Modules
//!
//! - **Preparation**: `normalizer`, `baseline`, `features`, `labels`
//! - **Model**: `matrix`, `classifier`, `evaluate`, `artifact`
//! - **Signals**: `warning`, `explain`, `report`
//! - **Orchestration**: `pipeline`

pub mod artifact;
pub mod baseline;
pub mod classifier;
pub mod config;
pub mod error;
pub mod evaluate;
pub mod explain;
pub mod features;
pub mod labels;
pub mod matrix;
pub mod normalizer;
pub mod pipeline;
pub mod report;
pub mod table;
pub mod warning;

pub use baseline::{compute_baseline, ParticipantBaseline};
pub use classifier::{Classifier, RandomForest};
pub use config::{Config, DeltaFill, LabelPolicy};
pub use error::{Result, StressError};
pub use explain::{explain, ExplanationRanker, Reason};
pub use features::DeltaBuilder;
pub use labels::{label, Label};
pub use normalizer::{drop_missing, SchemaNormalizer};
pub use pipeline::{predict, train, StressProcessor};
pub use report::ReportRow;
pub use table::{Cell, Column, RecordTable};
pub use warning::{detect, EarlyWarning};

/// Version recorded in model artifacts
pub const STRESS_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name recorded in model artifacts
pub const PRODUCER_NAME: &str = "synheart-stress";
