//! Gold stage: versioned dimension refresh plus fact rebuild.
//!
//! One generic reconciliation routine serves all tracked attributes, driven
//! by the [`TRACKED_DIMENSIONS`] descriptor table. A code whose active row
//! already matches is left alone; a changed description closes the active
//! row and inserts a fresh version; a new code just gets its first row.
//! Dimension history is append-only throughout.
//!
//! The fact rebuild afterwards is a single truncate-and-rejoin against the
//! active dimension rows, atomic inside the store.

use chrono::{NaiveDate, Utc};
use milepost_core::{
  dimension::{DimensionSpec, NewDimensionRow, TRACKED_DIMENSIONS},
  runlog::{RunLogEntry, TriggerKind},
  store::Warehouse,
};
use tracing::{error, info};

use crate::notify::{NotificationQueue, Notify};

pub const STAGE: &str = "gold_refresh";

/// What one dimension refresh did.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RefreshCounts {
  pub inserted:   u64,
  pub superseded: u64,
}

/// Reconciles one tracked dimension against the distinct codes currently in
/// the clean table. `today` becomes the start date of inserted rows and the
/// end date of superseded ones.
pub async fn refresh_dimension<W: Warehouse>(
  warehouse: &W,
  dim: &'static DimensionSpec,
  today: NaiveDate,
) -> Result<RefreshCounts, W::Error> {
  let codes = warehouse.distinct_codes(dim).await?;
  let mut fresh = Vec::new();
  let mut superseded: u64 = 0;

  for code in codes {
    let description = dim.describe(code);
    if warehouse.active_row_matches(dim, code, description).await? {
      continue;
    }
    superseded += warehouse.supersede_code(dim, code, today).await?;
    fresh.push(NewDimensionRow::new(code, description, today));
  }

  let inserted = warehouse.insert_dimension_rows(dim, fresh).await?;
  Ok(RefreshCounts { inserted, superseded })
}

/// Refreshes all tracked dimensions, then rebuilds the fact table.
///
/// A failing attribute is reported and skipped, but any such failure
/// forfeits the rebuild: facts are never joined against a half-refreshed
/// dimension set. Always writes (and returns) one run-log entry; the `Err`
/// path means that entry itself could not be written. `record_count` is the
/// rebuilt fact row count on success and the dimension rows inserted before
/// the failure otherwise.
pub async fn run<W, N>(
  warehouse: &W,
  notifier: &N,
  trigger: TriggerKind,
) -> Result<RunLogEntry, W::Error>
where
  W: Warehouse,
  N: Notify,
{
  let today = Utc::now().date_naive();
  let mut queue = NotificationQueue::new("milepost gold refresh");
  let mut dimension_rows: u64 = 0;
  let mut failures: Vec<String> = Vec::new();

  for dim in &TRACKED_DIMENSIONS {
    match refresh_dimension(warehouse, dim, today).await {
      Ok(counts) => {
        dimension_rows += counts.inserted;
        if counts.inserted > 0 || counts.superseded > 0 {
          info!(
            attribute = dim.attribute,
            inserted = counts.inserted,
            superseded = counts.superseded,
            "dimension refreshed"
          );
        }
      }
      Err(e) => {
        error!(attribute = dim.attribute, error = %e, "dimension refresh failed");
        let line = format!("dimension {}: {e}", dim.attribute);
        queue.push(line.clone());
        failures.push(line);
      }
    }
  }

  let entry = if failures.is_empty() {
    match warehouse.rebuild_fact().await {
      Ok(facts) => {
        info!(dimension_rows, facts, "fact table rebuilt");
        RunLogEntry::success(
          STAGE,
          trigger,
          facts,
          format!(
            "{dimension_rows} dimension row(s) added, {facts} fact row(s) \
             rebuilt"
          ),
        )
      }
      Err(e) => {
        error!(error = %e, "fact rebuild failed");
        queue.push(format!("fact rebuild: {e}"));
        RunLogEntry::failed(
          STAGE,
          trigger,
          dimension_rows,
          format!("fact rebuild failed: {e}"),
        )
      }
    }
  } else {
    RunLogEntry::failed(
      STAGE,
      trigger,
      dimension_rows,
      format!("dimension refresh incomplete: {}", failures.join("; ")),
    )
  };
  warehouse.append_run_log(entry.clone()).await?;
  queue.flush(notifier).await;
  Ok(entry)
}
