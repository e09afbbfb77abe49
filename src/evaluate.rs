//! Train/test splitting and evaluation metrics

use crate::error::{Result, StressError};
use crate::labels::Label;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// Row indices of a train/test partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
    pub stratified: bool,
}

/// Fraction of rows held out for testing
pub fn test_fraction(n_rows: usize) -> f64 {
    if n_rows >= 10 {
        0.2
    } else {
        0.5
    }
}

/// Seeded train/test split.
///
/// Holds out 20% of rows (50% below ten rows). Stratifies by label when
/// both classes have at least two rows.
pub fn train_test_split(labels: &[Label], seed: u64) -> Result<Split> {
    let n = labels.len();
    if n < 2 {
        return Err(StressError::Model(format!(
            "need at least 2 labeled rows to split, got {}",
            n
        )));
    }

    let fraction = test_fraction(n);
    let mut rng = StdRng::seed_from_u64(seed);

    let classes: Vec<Vec<usize>> = [Label::Neutral, Label::Stressed]
        .iter()
        .map(|class| (0..n).filter(|i| labels[*i] == *class).collect())
        .collect();
    let stratified = classes.iter().all(|c| c.len() >= 2);

    let n_test = ((n as f64 * fraction).ceil() as usize).clamp(1, n - 1);
    let mut train = Vec::new();
    let mut test = Vec::new();

    if stratified {
        // proportional share per class, remainder to the largest fractions
        let shares: Vec<f64> = classes
            .iter()
            .map(|c| c.len() as f64 * n_test as f64 / n as f64)
            .collect();
        let mut counts: Vec<usize> = shares.iter().map(|s| s.floor() as usize).collect();
        let mut remainder = n_test - counts.iter().sum::<usize>();
        let mut by_fraction: Vec<usize> = (0..classes.len()).collect();
        by_fraction.sort_by(|a, b| (shares[*b].fract()).total_cmp(&shares[*a].fract()));
        for class in by_fraction {
            if remainder == 0 {
                break;
            }
            counts[class] += 1;
            remainder -= 1;
        }

        for (mut members, count) in classes.into_iter().zip(counts) {
            members.shuffle(&mut rng);
            let count = count.clamp(1, members.len() - 1);
            test.extend_from_slice(&members[..count]);
            train.extend_from_slice(&members[count..]);
        }
    } else {
        let mut all: Vec<usize> = (0..n).collect();
        all.shuffle(&mut rng);
        test.extend_from_slice(&all[..n_test]);
        train.extend_from_slice(&all[n_test..]);
    }

    train.sort_unstable();
    test.sort_unstable();
    Ok(Split {
        train,
        test,
        stratified,
    })
}

/// Share of positions where prediction equals truth
pub fn accuracy(truth: &[Label], predicted: &[Label]) -> f64 {
    if truth.is_empty() {
        return 0.0;
    }
    let correct = truth
        .iter()
        .zip(predicted)
        .filter(|(t, p)| t == p)
        .count();
    correct as f64 / truth.len() as f64
}

/// 2x2 confusion matrix; rows are truth, columns prediction, neutral first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ConfusionMatrix(pub [[usize; 2]; 2]);

impl ConfusionMatrix {
    pub fn from_labels(truth: &[Label], predicted: &[Label]) -> Self {
        let mut counts = [[0usize; 2]; 2];
        for (t, p) in truth.iter().zip(predicted) {
            counts[t.as_u8() as usize][p.as_u8() as usize] += 1;
        }
        ConfusionMatrix(counts)
    }

    pub fn to_vec(&self) -> Vec<Vec<usize>> {
        self.0.iter().map(|r| r.to_vec()).collect()
    }
}

/// Metrics written after training
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub accuracy: f64,
    pub confusion_matrix: Vec<Vec<usize>>,
}

impl Metrics {
    pub fn from_labels(truth: &[Label], predicted: &[Label]) -> Self {
        Self {
            accuracy: accuracy(truth, predicted),
            confusion_matrix: ConfusionMatrix::from_labels(truth, predicted).to_vec(),
        }
    }
}
