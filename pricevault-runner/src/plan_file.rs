//! Download plan file: a `symbol,last_date` CSV snapshot of watermarks.
//!
//! Written by the `plan` command, optionally consumed by `sync --plan`. A
//! blank `last_date` means the symbol was never ingested.

use pricevault_core::data::SymbolWatermark;
use pricevault_core::parse_watermark;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlanFileError {
    #[error("plan file not found: {0}")]
    NotFound(String),

    #[error("plan file {path} has no 'symbol' column")]
    MissingSymbolColumn { path: String },

    #[error("plan CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("plan I/O: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Serialize, Deserialize)]
struct PlanRecord {
    symbol: String,
    #[serde(default)]
    last_date: Option<String>,
}

pub fn write_plan(path: &Path, marks: &[SymbolWatermark]) -> Result<(), PlanFileError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    for mark in marks {
        writer.serialize(PlanRecord {
            symbol: mark.symbol.clone(),
            last_date: mark.last_date.map(|d| d.format("%Y-%m-%d").to_string()),
        })?;
    }
    writer.flush()?;
    Ok(())
}

pub fn read_plan(path: &Path) -> Result<Vec<SymbolWatermark>, PlanFileError> {
    if !path.exists() {
        return Err(PlanFileError::NotFound(path.display().to_string()));
    }
    let mut reader = csv::Reader::from_path(path)?;
    if !reader.headers()?.iter().any(|h| h.trim() == "symbol") {
        return Err(PlanFileError::MissingSymbolColumn {
            path: path.display().to_string(),
        });
    }

    let mut marks = Vec::new();
    for record in reader.deserialize::<PlanRecord>() {
        let record = record?;
        let symbol = record.symbol.trim();
        if symbol.is_empty() {
            continue;
        }
        marks.push(SymbolWatermark {
            symbol: symbol.to_string(),
            last_date: record.last_date.as_deref().and_then(parse_watermark),
        });
    }
    Ok(marks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::io::Write;

    #[test]
    fn written_plan_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/download_plan.csv");
        let marks = vec![
            SymbolWatermark {
                symbol: "BTC-USD".into(),
                last_date: NaiveDate::from_ymd_opt(2024, 5, 30),
            },
            SymbolWatermark {
                symbol: "ETH-USD".into(),
                last_date: None,
            },
        ];
        write_plan(&path, &marks).unwrap();
        assert_eq!(read_plan(&path).unwrap(), marks);
    }

    #[test]
    fn null_markers_and_missing_column_mean_never_ingested() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "symbol,last_date").unwrap();
        writeln!(file, "BTC-USD,<NA>").unwrap();
        writeln!(file, "ETH-USD,2024-05-30 00:00:00").unwrap();
        writeln!(file, "SOL-USD,").unwrap();
        let marks = read_plan(file.path()).unwrap();
        assert_eq!(marks[0].last_date, None);
        assert_eq!(marks[1].last_date, NaiveDate::from_ymd_opt(2024, 5, 30));
        assert_eq!(marks[2].last_date, None);

        let mut bare = tempfile::NamedTempFile::new().unwrap();
        writeln!(bare, "symbol").unwrap();
        writeln!(bare, "BTC-USD").unwrap();
        let marks = read_plan(bare.path()).unwrap();
        assert_eq!(marks.len(), 1);
        assert_eq!(marks[0].last_date, None);
    }

    #[test]
    fn missing_plan_is_an_error() {
        assert!(matches!(
            read_plan(Path::new("/nonexistent/plan.csv")),
            Err(PlanFileError::NotFound(_))
        ));
    }
}
