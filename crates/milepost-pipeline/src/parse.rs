//! CSV extraction shared by the bronze and silver stages.
//!
//! Extraction is tolerant at row level: a row whose cells cannot be coerced
//! to the declared column types is skipped, counted and reported, never
//! fatal. Columns are recognized by header name, so column order and extra
//! columns in an extract do not matter.

use csv::ReaderBuilder;
use milepost_core::record::{AccidentRecord, ColumnMap};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ExtractError {
  #[error("csv error: {0}")]
  Csv(#[from] csv::Error),
  #[error("{0}")]
  Header(#[from] milepost_core::Error),
}

/// Per-object cap on queued row diagnostics; the count carries the rest.
const MAX_ROW_DIAGNOSTICS: usize = 20;

/// Outcome of extracting one CSV object.
pub struct Extraction {
  pub records: Vec<AccidentRecord>,
  /// Rows skipped as unreadable or unparseable.
  pub skipped: u64,
  /// One `object line N: cause` line per skipped row (capped), ready for
  /// the notification queue.
  pub diagnostics: Vec<String>,
}

/// Parses one whole CSV object. Fails only when the content has no usable
/// header row.
pub fn extract_records(
  object: &str,
  bytes: &[u8],
) -> Result<Extraction, ExtractError> {
  let mut reader = ReaderBuilder::new().flexible(true).from_reader(bytes);
  let headers = reader.headers()?.clone();
  let map = ColumnMap::from_headers(headers.iter())?;
  debug!(object, columns = map.matched_columns(), "header row mapped");

  let mut records = Vec::new();
  let mut skipped = 0u64;
  let mut diagnostics = Vec::new();
  for (i, row) in reader.records().enumerate() {
    // Line numbers are 1-based and the header occupies the first line.
    let line = i + 2;
    let row = match row {
      Ok(row) => row,
      Err(e) => {
        skipped += 1;
        debug!(object, line, error = %e, "unreadable row skipped");
        if diagnostics.len() < MAX_ROW_DIAGNOSTICS {
          diagnostics.push(format!("{object} line {line}: {e}"));
        }
        continue;
      }
    };
    match AccidentRecord::parse(&map, |i| row.get(i)) {
      Ok(record) => records.push(record),
      Err(e) => {
        skipped += 1;
        debug!(object, line, error = %e, "bad row skipped");
        if diagnostics.len() < MAX_ROW_DIAGNOSTICS {
          diagnostics.push(format!("{object} line {line}: {e}"));
        }
      }
    }
  }
  if skipped as usize > diagnostics.len() {
    let more = skipped as usize - diagnostics.len();
    diagnostics.push(format!("{object}: {more} more row(s) skipped"));
  }
  if skipped > 0 {
    warn!(object, skipped, "rows skipped during extraction");
  }
  Ok(Extraction { records, skipped, diagnostics })
}

// ─── Tests ───────────────────────────────────────────────────────────────────
