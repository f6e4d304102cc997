//! Two-column `Date,Time` transfer format.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;

use crate::dates::normalize_log_key;
use crate::error::TrackerError;
use crate::logging::{self, v_str, Domain};
use crate::puzzle::{PuzzleLog, PuzzleRecord};
use crate::service::StoreHandle;
use crate::stats::time_to_seconds;

pub const HEADER: &str = "Date,Time";

/// Render the log in insertion order. A missing time is written as `null`.
pub fn export_csv(log: &PuzzleLog) -> String {
    let mut out = String::from(HEADER);
    out.push('\n');
    for r in log.records() {
        out.push_str(&r.date);
        out.push(',');
        out.push_str(r.time.as_deref().unwrap_or("null"));
        out.push('\n');
    }
    out
}

pub fn write_csv(log: &PuzzleLog, path: &Path) -> Result<()> {
    fs::write(path, export_csv(log)).with_context(|| format!("writing {}", path.display()))
}

#[derive(Debug, Default)]
pub struct ParsedCsv {
    pub records: Vec<PuzzleRecord>,
    pub rejected: Vec<TrackerError>,
}

/// Parse CSV text. The first non-blank line is the header and is skipped;
/// rows without a readable date, or with a time that is neither empty, `null`
/// nor `M:SS`, are collected in `rejected`.
pub fn parse_csv(text: &str) -> ParsedCsv {
    let mut parsed = ParsedCsv::default();
    let rows = text
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty())
        .skip(1);

    for (line_no, line) in rows {
        match parse_row(line_no, line) {
            Ok(record) => parsed.records.push(record),
            Err(e) => parsed.rejected.push(e),
        }
    }
    parsed
}

fn parse_row(line: usize, row: &str) -> Result<PuzzleRecord, TrackerError> {
    let (date, time) = row.split_once(',').ok_or_else(|| TrackerError::Csv {
        line,
        reason: "missing comma".to_string(),
    })?;
    let date = normalize_log_key(date.trim()).map_err(|e| TrackerError::Csv {
        line,
        reason: e.to_string(),
    })?;
    let time = match time.trim() {
        "" | "null" => None,
        t if time_to_seconds(t).is_some() => Some(t.to_string()),
        t => {
            return Err(TrackerError::Csv {
                line,
                reason: format!("unreadable time `{}`", t),
            })
        }
    };
    Ok(PuzzleRecord::new(date, time))
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub rows: usize,
    pub rejected: usize,
}

/// Merge CSV rows into the stored log in file order; the last row for a date wins.
pub async fn import_csv(store: &StoreHandle, text: &str) -> Result<ImportReport> {
    let parsed = parse_csv(text);
    for e in &parsed.rejected {
        logging::warn(Domain::Csv, "row_rejected", &[("error", v_str(&e.to_string()))]);
    }
    let report = ImportReport {
        rows: parsed.records.len(),
        rejected: parsed.rejected.len(),
    };
    store.merge(parsed.records).await?;
    logging::info(
        Domain::Csv,
        "import_done",
        &[("rows", Value::from(report.rows)), ("rejected", Value::from(report.rejected))],
    );
    Ok(report)
}

pub async fn import_file(store: &StoreHandle, path: &Path) -> Result<ImportReport> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    import_csv(store, &text).await
}
