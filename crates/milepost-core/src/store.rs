//! The `Warehouse` trait.
//!
//! The trait is implemented by storage backends (e.g.
//! `milepost-store-sqlite`). The stage drivers in `milepost-pipeline` depend
//! on this abstraction, not on any concrete backend.
//!
//! Table ownership is part of the contract: bronze owns the per-file raw
//! tables, silver owns the consolidated clean table, the dimension refresh
//! engine owns the dimension tables, the fact rebuild owns the fact table,
//! and the run log is append-only for everyone.

use std::future::Future;

use chrono::NaiveDate;

use crate::{
  dimension::{DimensionRow, DimensionSpec, NewDimensionRow},
  fact::FactRow,
  record::AccidentRecord,
  runlog::RunLogEntry,
};

/// Abstraction over the relational store behind all three layers.
///
/// All methods return `Send` futures so the trait can be used from a
/// multi-threaded tokio runtime.
pub trait Warehouse: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Bronze ────────────────────────────────────────────────────────────

  /// Drop-and-recreate the raw table `table`, then bulk-load `rows` into it
  /// in one transaction. Returns the number of rows loaded.
  ///
  /// `table` must be a bare identifier (letters, digits, underscores).
  fn replace_raw_table(
    &self,
    table: String,
    rows: Vec<AccidentRecord>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  // ── Silver ────────────────────────────────────────────────────────────

  /// Bulk-append cleaned rows to the consolidated clean table in one
  /// transaction. Returns the number of rows appended.
  fn append_clean_rows(
    &self,
    rows: Vec<AccidentRecord>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Total rows currently in the consolidated clean table.
  fn clean_row_count(
    &self,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  // ── Gold: dimensions ──────────────────────────────────────────────────

  /// Distinct non-null codes present in the clean table for `dim`'s
  /// attribute.
  fn distinct_codes(
    &self,
    dim: &'static DimensionSpec,
  ) -> impl Future<Output = Result<Vec<i64>, Self::Error>> + Send + '_;

  /// Whether an active row with this exact (code, description) combination
  /// already exists in `dim`'s table.
  fn active_row_matches(
    &self,
    dim: &'static DimensionSpec,
    code: i64,
    description: Option<&'static str>,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Close out every active row for `code` in `dim`'s table: set
  /// `end_date` and flip status to superseded. Returns the number of rows
  /// closed (0 when the code was never seen before).
  fn supersede_code(
    &self,
    dim: &'static DimensionSpec,
    code: i64,
    end_date: NaiveDate,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Bulk-insert new active dimension rows in one transaction. Returns the
  /// number inserted.
  fn insert_dimension_rows(
    &self,
    dim: &'static DimensionSpec,
    rows: Vec<NewDimensionRow>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// All rows of `dim`'s table, active and superseded, oldest first.
  fn dimension_rows(
    &self,
    dim: &'static DimensionSpec,
  ) -> impl Future<Output = Result<Vec<DimensionRow>, Self::Error>> + Send + '_;

  // ── Gold: fact ────────────────────────────────────────────────────────

  /// Atomically truncate the fact table and repopulate it by joining the
  /// clean table against the active version of every tracked dimension.
  /// On error nothing is committed: the previous content stays visible.
  /// Returns the number of rows inserted.
  fn rebuild_fact(
    &self,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// All current fact rows.
  fn fact_rows(
    &self,
  ) -> impl Future<Output = Result<Vec<FactRow>, Self::Error>> + Send + '_;

  // ── Run log ───────────────────────────────────────────────────────────

  /// Append one audit entry. Stages call this exactly once per invocation.
  fn append_run_log(
    &self,
    entry: RunLogEntry,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// The most recent `limit` entries, newest first.
  fn recent_run_log(
    &self,
    limit: u32,
  ) -> impl Future<Output = Result<Vec<RunLogEntry>, Self::Error>> + Send + '_;
}
