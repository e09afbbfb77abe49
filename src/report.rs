//! Per-row prediction report

use crate::error::Result;
use crate::labels::Label;
use serde::{Deserialize, Serialize};

/// Separator used when joining a row's reasons
pub const REASON_SEPARATOR: &str = "; ";

/// One report row per input record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    pub index: usize,
    pub prediction: Label,
    pub early_warning: bool,
    pub reasons: String,
}

impl ReportRow {
    pub fn new(index: usize, prediction: Label, early_warning: bool, reasons: &[String]) -> Self {
        Self {
            index,
            prediction,
            early_warning,
            reasons: reasons.join(REASON_SEPARATOR),
        }
    }

    /// Reasons split back into their parts
    pub fn reason_list(&self) -> Vec<&str> {
        if self.reasons.is_empty() {
            Vec::new()
        } else {
            self.reasons.split(REASON_SEPARATOR).collect()
        }
    }
}

/// Serialize rows as CSV with a header line
pub fn to_csv(rows: &[ReportRow]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    if rows.is_empty() {
        writer.write_record(["index", "prediction", "early_warning", "reasons"])?;
    }
    for row in rows {
        writer.serialize(row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// One JSON object per line
pub fn to_ndjson(rows: &[ReportRow]) -> Result<String> {
    let mut lines = Vec::with_capacity(rows.len());
    for row in rows {
        lines.push(serde_json::to_string(row)?);
    }
    Ok(lines.join("\n") + "\n")
}

pub fn to_json(rows: &[ReportRow]) -> Result<String> {
    Ok(serde_json::to_string_pretty(rows)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn rows() -> Vec<ReportRow> {
        vec![
            ReportRow::new(0, Label::Neutral, false, &[]),
            ReportRow::new(
                1,
                Label::Stressed,
                true,
                &["HR increased vs baseline".to_string(), "SCL increased vs baseline".to_string()],
            ),
        ]
    }

    #[test]
    fn test_csv() {
        let csv = to_csv(&rows()).unwrap();
        assert_eq!(
            csv,
            "index,prediction,early_warning,reasons\n\
             0,neutral,false,\n\
             1,stressed,true,HR increased vs baseline; SCL increased vs baseline\n"
        );
    }

    #[test]
    fn test_ndjson() {
        let out = to_ndjson(&rows()).unwrap();
        let first: serde_json::Value = serde_json::from_str(out.lines().next().unwrap()).unwrap();
        assert_eq!(first["prediction"], "neutral");
        assert_eq!(first["early_warning"], false);
        assert_eq!(out.lines().count(), 2);
    }

    #[test]
    fn test_reason_list() {
        let rows = rows();
        assert!(rows[0].reason_list().is_empty());
        assert_eq!(
            rows[1].reason_list(),
            vec!["HR increased vs baseline", "SCL increased vs baseline"]
        );
    }
}
