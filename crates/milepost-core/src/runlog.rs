//! Run-log types — the audit contract every stage reports through.
//!
//! Each stage invocation appends exactly one entry, on success and on
//! failure alike. Entries are never mutated or deleted; operators observe
//! pipeline outcomes solely through this table and optional notifications.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Wire format for run-log timestamps.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ─── Outcome ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
  Success,
  Failed,
}

impl RunStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Success => "Success",
      Self::Failed => "Failed",
    }
  }

  pub fn is_success(&self) -> bool { matches!(self, Self::Success) }
}

/// What caused a stage invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TriggerKind {
  /// Cron-style time schedule (bronze, gold).
  Schedule,
  /// A new object arriving in the source container (silver).
  BlobArrival,
  /// Ad-hoc operator invocation.
  Manual,
}

impl TriggerKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Schedule => "schedule",
      Self::BlobArrival => "blob-arrival",
      Self::Manual => "manual",
    }
  }
}

// ─── Entry ───────────────────────────────────────────────────────────────────

/// One audit record:
/// `(function_name, status, triggered_by, record_count, timestamp, message)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunLogEntry {
  pub function_name: String,
  pub status:        RunStatus,
  pub triggered_by:  TriggerKind,
  /// Rows actually processed — on failure this is the true partial count,
  /// possibly zero, never a placeholder.
  pub record_count:  u64,
  pub timestamp:     DateTime<Utc>,
  pub message:       String,
}

impl RunLogEntry {
  pub fn success(
    function_name: &str,
    triggered_by: TriggerKind,
    record_count: u64,
    message: impl Into<String>,
  ) -> Self {
    Self {
      function_name: function_name.to_string(),
      status: RunStatus::Success,
      triggered_by,
      record_count,
      timestamp: Utc::now(),
      message: message.into(),
    }
  }

  pub fn failed(
    function_name: &str,
    triggered_by: TriggerKind,
    record_count: u64,
    message: impl Into<String>,
  ) -> Self {
    Self {
      function_name: function_name.to_string(),
      status: RunStatus::Failed,
      triggered_by,
      record_count,
      timestamp: Utc::now(),
      message: message.into(),
    }
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn timestamp_wire_format() {
    let ts = DateTime::parse_from_rfc3339("2019-02-21T07:05:09Z")
      .unwrap()
      .with_timezone(&Utc);
    assert_eq!(
      ts.format(TIMESTAMP_FORMAT).to_string(),
      "2019-02-21 07:05:09"
    );
  }

  #[test]
  fn constructors_set_status() {
    let ok = RunLogEntry::success("gold_refresh", TriggerKind::Schedule, 7, "");
    assert!(ok.status.is_success());
    let bad = RunLogEntry::failed("gold_refresh", TriggerKind::Manual, 0, "x");
    assert_eq!(bad.status, RunStatus::Failed);
    assert_eq!(bad.triggered_by.as_str(), "manual");
  }
}
