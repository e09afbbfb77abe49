//! Explanation ranking
//!
//! Turns one row's deviations from baseline and the classifier's feature
//! importances into a short list of human-readable reasons, e.g.
//! `"HR increased vs baseline"`.

use crate::config::DEFAULT_DELTA_SUFFIX;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Direction of a deviation from the participant's baseline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Increased,
    Decreased,
    Unchanged,
}

impl Direction {
    pub fn of(value: f64) -> Self {
        if value > 0.0 {
            Direction::Increased
        } else if value < 0.0 {
            Direction::Decreased
        } else {
            Direction::Unchanged
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Increased => "increased",
            Direction::Decreased => "decreased",
            Direction::Unchanged => "unchanged",
        }
    }
}

/// A ranked contributing factor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reason {
    pub feature: String,
    pub display_name: String,
    pub direction: Direction,
    pub importance: f64,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} vs baseline", self.display_name, self.direction.as_str())
    }
}

/// Display form of a feature: delta suffix removed, underscores as spaces
pub fn display_name(feature: &str, suffix: &str) -> String {
    let stripped = if suffix.is_empty() {
        feature.to_string()
    } else {
        feature.replace(suffix, "")
    };
    stripped.replace('_', " ")
}

/// Ranks features of a row by importance
#[derive(Debug, Clone)]
pub struct ExplanationRanker {
    suffix: String,
    top_k: usize,
}

impl Default for ExplanationRanker {
    fn default() -> Self {
        Self::new(DEFAULT_DELTA_SUFFIX, 3)
    }
}

impl ExplanationRanker {
    pub fn new(suffix: impl Into<String>, top_k: usize) -> Self {
        Self {
            suffix: suffix.into(),
            top_k,
        }
    }

    /// Up to `top_k` reasons, most important first.
    ///
    /// Candidates are the features present in both `row` and `importances`.
    /// Equal weights keep their order in `importances`. Of several features
    /// sharing a display name only the most important one is kept.
    pub fn rank_reasons(
        &self,
        row: &HashMap<String, f64>,
        importances: &[(String, f64)],
    ) -> Vec<Reason> {
        let mut candidates: Vec<Reason> = importances
            .iter()
            .filter_map(|(feature, weight)| {
                row.get(feature).map(|value| Reason {
                    feature: feature.clone(),
                    display_name: display_name(feature, &self.suffix),
                    direction: Direction::of(*value),
                    importance: *weight,
                })
            })
            .collect();

        candidates.sort_by(|a, b| b.importance.total_cmp(&a.importance));

        let mut seen = HashSet::new();
        candidates
            .into_iter()
            .filter(|r| seen.insert(r.display_name.clone()))
            .take(self.top_k)
            .collect()
    }

    /// Rendered reasons, e.g. `"SCL decreased vs baseline"`
    pub fn explain(
        &self,
        row: &HashMap<String, f64>,
        importances: &[(String, f64)],
    ) -> Vec<String> {
        self.rank_reasons(row, importances)
            .iter()
            .map(Reason::to_string)
            .collect()
    }
}

/// Rank with the default suffix and an explicit `top_k`
pub fn explain(
    row: &HashMap<String, f64>,
    importances: &[(String, f64)],
    top_k: usize,
) -> Vec<String> {
    ExplanationRanker::new(DEFAULT_DELTA_SUFFIX, top_k).explain(row, importances)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn row(values: &[(&str, f64)]) -> HashMap<String, f64> {
        values.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn weights(values: &[(&str, f64)]) -> Vec<(String, f64)> {
        values.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_directions_and_order() {
        let row = row(&[("HR_delta", 4.0), ("SCL_delta", -0.5), ("RMSSD_delta", 0.0)]);
        let importances = weights(&[("HR_delta", 0.2), ("SCL_delta", 0.5), ("RMSSD_delta", 0.3)]);

        assert_eq!(
            explain(&row, &importances, 3),
            vec![
                "SCL decreased vs baseline",
                "RMSSD unchanged vs baseline",
                "HR increased vs baseline",
            ]
        );
    }

    #[test]
    fn test_top_k_limits_output() {
        let row = row(&[("a_delta", 1.0), ("b_delta", 1.0), ("c_delta", 1.0)]);
        let importances = weights(&[("a_delta", 0.1), ("b_delta", 0.3), ("c_delta", 0.2)]);
        assert_eq!(
            explain(&row, &importances, 2),
            vec!["b increased vs baseline", "c increased vs baseline"]
        );
    }

    #[test]
    fn test_duplicate_display_names_collapse() {
        // base feature and its delta share the display name "HR"
        let row = row(&[("HR", 80.0), ("HR_delta", -3.0), ("SCL_delta", 1.0)]);
        let importances = weights(&[("HR", 0.1), ("HR_delta", 0.6), ("SCL_delta", 0.3)]);

        assert_eq!(
            explain(&row, &importances, 3),
            vec!["HR decreased vs baseline", "SCL increased vs baseline"]
        );
    }

    #[test]
    fn test_ties_keep_importance_order() {
        let row = row(&[("x_delta", 1.0), ("y_delta", -1.0), ("z_delta", 0.0)]);
        let importances = weights(&[("y_delta", 0.5), ("x_delta", 0.5), ("z_delta", 0.5)]);

        let first = explain(&row, &importances, 3);
        assert_eq!(
            first,
            vec![
                "y decreased vs baseline",
                "x increased vs baseline",
                "z unchanged vs baseline",
            ]
        );
        assert_eq!(first, explain(&row, &importances, 3));
    }

    #[test]
    fn test_nan_importance_ranks_deterministically() {
        let row = row(&[("x_delta", 1.0), ("y_delta", -1.0), ("z_delta", 2.0)]);
        let importances = weights(&[("x_delta", 0.2), ("y_delta", f64::NAN), ("z_delta", 0.5)]);

        let first = explain(&row, &importances, 3);
        assert_eq!(first.len(), 3);
        assert_eq!(first, explain(&row, &importances, 3));

        let z = first.iter().position(|r| r.starts_with("z ")).unwrap();
        let x = first.iter().position(|r| r.starts_with("x ")).unwrap();
        assert!(z < x);
    }

    #[test]
    fn test_features_missing_from_row_are_skipped() {
        let row = row(&[("HR_delta", 2.0)]);
        let importances = weights(&[("SCL_delta", 0.9), ("HR_delta", 0.1)]);
        assert_eq!(explain(&row, &importances, 3), vec!["HR increased vs baseline"]);
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name("heart_rate_delta", "_delta"), "heart rate");
        assert_eq!(display_name("hr_delta_raw", "_delta"), "hr raw");
        assert_eq!(display_name("SCL", "_delta"), "SCL");
    }

    #[test]
    fn test_structured_reasons() {
        let ranker = ExplanationRanker::new("_dev", 1);
        let reasons = ranker.rank_reasons(
            &row(&[("HR_dev", 2.0)]),
            &weights(&[("HR_dev", 0.4)]),
        );
        assert_eq!(reasons.len(), 1);
        assert_eq!(reasons[0].display_name, "HR");
        assert_eq!(reasons[0].direction, Direction::Increased);
        assert_eq!(reasons[0].to_string(), "HR increased vs baseline");
    }
}
