//! Early-warning detection
//!
//! A warning fires at every position where the run of consecutive stressed
//! predictions has reached the threshold. The signal latches: it keeps
//! firing while the run continues and resets on the first neutral
//! prediction.

use crate::error::{Result, StressError};
use crate::labels::Label;
use std::collections::BTreeSet;

/// Streaming streak counter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EarlyWarning {
    threshold: u32,
    streak: u32,
}

impl EarlyWarning {
    /// Create a detector; `threshold` must be positive
    pub fn new(threshold: i64) -> Result<Self> {
        if threshold <= 0 {
            return Err(StressError::InvalidParameter(format!(
                "early-warning threshold must be positive, got {}",
                threshold
            )));
        }
        let threshold = u32::try_from(threshold).map_err(|_| {
            StressError::InvalidParameter(format!(
                "early-warning threshold {} is too large",
                threshold
            ))
        })?;
        Ok(Self {
            threshold,
            streak: 0,
        })
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Current run length of stressed predictions
    pub fn streak(&self) -> u32 {
        self.streak
    }

    /// Feed the next prediction; returns true if this position warns
    pub fn push(&mut self, prediction: Label) -> bool {
        if prediction.is_stressed() {
            self.streak = self.streak.saturating_add(1);
        } else {
            self.streak = 0;
        }
        self.streak >= self.threshold
    }

    pub fn reset(&mut self) {
        self.streak = 0;
    }
}

/// Positions in `predictions` that carry an early warning
pub fn detect(predictions: &[Label], threshold: i64) -> Result<BTreeSet<usize>> {
    let mut detector = EarlyWarning::new(threshold)?;
    Ok(predictions
        .iter()
        .enumerate()
        .filter(|(_, p)| detector.push(**p))
        .map(|(i, _)| i)
        .collect())
}
