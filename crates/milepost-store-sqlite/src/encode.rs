//! Conversions between domain values and their stored SQLite forms.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use milepost_core::{
  dimension::{DimensionRow, DimensionStatus},
  record::FieldValue,
  runlog::{RunLogEntry, RunStatus, TIMESTAMP_FORMAT, TriggerKind},
};

use crate::error::{Error, Result};

const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn encode_date(date: NaiveDate) -> String {
  date.format(DATE_FORMAT).to_string()
}

pub fn decode_date(raw: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(raw, DATE_FORMAT)
    .map_err(|e| Error::DateParse(format!("{raw:?}: {e}")))
}

pub fn encode_ts(ts: DateTime<Utc>) -> String {
  ts.format(TIMESTAMP_FORMAT).to_string()
}

pub fn decode_ts(raw: &str) -> Result<DateTime<Utc>> {
  NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
    .map(|naive| naive.and_utc())
    .map_err(|e| Error::DateParse(format!("{raw:?}: {e}")))
}

pub fn encode_status(status: DimensionStatus) -> i64 {
  match status {
    DimensionStatus::Active => 1,
    DimensionStatus::Superseded => 0,
  }
}

pub fn decode_status(raw: i64) -> Result<DimensionStatus> {
  match raw {
    1 => Ok(DimensionStatus::Active),
    0 => Ok(DimensionStatus::Superseded),
    other => Err(Error::Decode(format!("unknown dimension status {other}"))),
  }
}

pub fn decode_run_status(raw: &str) -> Result<RunStatus> {
  match raw {
    "Success" => Ok(RunStatus::Success),
    "Failed" => Ok(RunStatus::Failed),
    other => Err(Error::Decode(format!("unknown run status {other:?}"))),
  }
}

pub fn decode_trigger(raw: &str) -> Result<TriggerKind> {
  match raw {
    "schedule" => Ok(TriggerKind::Schedule),
    "blob-arrival" => Ok(TriggerKind::BlobArrival),
    "manual" => Ok(TriggerKind::Manual),
    other => Err(Error::Decode(format!("unknown trigger kind {other:?}"))),
  }
}

/// Owned SQLite value for a record field, ready to move into a
/// `conn.call` closure.
pub fn bind_value(value: FieldValue<'_>) -> rusqlite::types::Value {
  use rusqlite::types::Value;
  match value {
    FieldValue::Null => Value::Null,
    FieldValue::Text(s) => Value::Text(s.to_owned()),
    FieldValue::Real(r) => Value::Real(r),
    FieldValue::Integer(i) => Value::Integer(i),
  }
}

// ─── Row Decoding ────────────────────────────────────────────────────────────

/// Dimension row as read back from SQLite, before date/status decoding.
pub struct RawDimensionRow {
  pub dim_key:     i64,
  pub code:        i64,
  pub description: Option<String>,
  pub start_date:  String,
  pub end_date:    Option<String>,
  pub status:      i64,
}

impl RawDimensionRow {
  pub fn into_dimension_row(self) -> Result<DimensionRow> {
    Ok(DimensionRow {
      dim_key:     self.dim_key,
      code:        self.code,
      description: self.description,
      start_date:  decode_date(&self.start_date)?,
      end_date:    self.end_date.as_deref().map(decode_date).transpose()?,
      status:      decode_status(self.status)?,
    })
  }
}

/// Run-log row as read back from SQLite.
pub struct RawRunLogEntry {
  pub function_name: String,
  pub status:        String,
  pub triggered_by:  String,
  pub record_count:  i64,
  pub timestamp:     String,
  pub message:       String,
}

impl RawRunLogEntry {
  pub fn into_entry(self) -> Result<RunLogEntry> {
    let record_count = u64::try_from(self.record_count)
      .map_err(|_| Error::Decode(format!(
        "negative record count {}", self.record_count
      )))?;
    Ok(RunLogEntry {
      function_name: self.function_name,
      status:        decode_run_status(&self.status)?,
      triggered_by:  decode_trigger(&self.triggered_by)?,
      record_count,
      timestamp:     decode_ts(&self.timestamp)?,
      message:       self.message,
    })
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
