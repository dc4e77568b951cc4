//! Bronze stage: raw CSV objects into per-file raw tables.
//!
//! Every source object is loaded into its own `raw_*` table, recreated from
//! scratch on each ingest. Objects already carrying the processed marker are
//! skipped, which makes the stage safe to re-run on a schedule. One failing
//! object never stops the others.

use chrono::Utc;
use milepost_core::{
  blob::Container,
  runlog::{RunLogEntry, TIMESTAMP_FORMAT, TriggerKind},
  store::Warehouse,
};
use tracing::{debug, error, info};

use crate::{
  UnitError,
  notify::{NotificationQueue, Notify},
  parse,
};

pub const STAGE: &str = "bronze_ingest";

/// Metadata key marking an object as ingested; the value is the UTC load
/// timestamp.
pub const PROCESSED_MARKER: &str = "Processed";

/// Table name for one source object: `raw_` plus the lowercased file stem,
/// with anything outside `[a-z0-9]` folded to `_`.
pub fn raw_table_name(object: &str) -> String {
  let stem = object.rsplit_once('.').map_or(object, |(stem, _)| stem);
  let sanitized: String = stem
    .chars()
    .map(|c| {
      if c.is_ascii_alphanumeric() {
        c.to_ascii_lowercase()
      } else {
        '_'
      }
    })
    .collect();
  format!("raw_{sanitized}")
}

/// Ingests every object that does not yet carry the processed marker.
///
/// Always writes (and returns) one run-log entry; the `Err` path means that
/// entry itself could not be written. `record_count` is the number of rows
/// loaded, also on failure.
pub async fn run<W, C, N>(
  warehouse: &W,
  container: &C,
  notifier: &N,
  trigger: TriggerKind,
) -> Result<RunLogEntry, W::Error>
where
  W: Warehouse,
  C: Container,
  N: Notify,
{
  let mut queue = NotificationQueue::new("milepost bronze ingest");
  let mut loaded: u64 = 0;
  let mut objects_ingested: u64 = 0;
  let mut failures: Vec<String> = Vec::new();

  match container.list_objects().await {
    Ok(objects) => {
      for object in objects {
        match ingest_object(warehouse, container, &object, &mut queue).await {
          Ok(Some(rows)) => {
            loaded += rows;
            objects_ingested += 1;
          }
          Ok(None) => {}
          Err(e) => {
            error!(object, error = %e, "object ingest failed");
            let line = format!("{object}: {e}");
            queue.push(line.clone());
            failures.push(line);
          }
        }
      }
    }
    Err(e) => {
      error!(error = %e, "listing source container failed");
      let line = format!("listing source container failed: {e}");
      queue.push(line.clone());
      failures.push(line);
    }
  }

  let entry = if failures.is_empty() {
    RunLogEntry::success(
      STAGE,
      trigger,
      loaded,
      format!("ingested {objects_ingested} object(s)"),
    )
  } else {
    // Failure lines carry the error text: the run log is the durable
    // record, the email only best-effort.
    RunLogEntry::failed(
      STAGE,
      trigger,
      loaded,
      format!("{} object(s) failed: {}", failures.len(), failures.join("; ")),
    )
  };
  warehouse.append_run_log(entry.clone()).await?;
  queue.flush(notifier).await;
  Ok(entry)
}

/// Loads one object. `None` means it was already processed. Row-level
/// diagnostics land on the queue; they do not fail the object.
async fn ingest_object<W: Warehouse, C: Container>(
  warehouse: &W,
  container: &C,
  object: &str,
  queue: &mut NotificationQueue,
) -> Result<Option<u64>, UnitError> {
  let metadata = container.object_metadata(object.to_string()).await?;
  if metadata.contains_key(PROCESSED_MARKER) {
    debug!(object, "already processed, skipping");
    return Ok(None);
  }

  let bytes = container.read_object(object.to_string()).await?;
  let parse::Extraction { records, skipped, diagnostics } =
    parse::extract_records(object, &bytes)?;
  for line in diagnostics {
    queue.push(line);
  }
  let table = raw_table_name(object);
  let rows = warehouse.replace_raw_table(table.clone(), records).await?;

  let stamp = Utc::now().format(TIMESTAMP_FORMAT).to_string();
  container
    .set_object_metadata(
      object.to_string(),
      PROCESSED_MARKER.to_string(),
      stamp,
    )
    .await?;
  info!(object, table, rows, skipped, "object ingested");
  Ok(Some(rows))
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn table_names_come_from_sanitized_stems() {
    assert_eq!(raw_table_name("Accidents_2019.csv"), "raw_accidents_2019");
    assert_eq!(raw_table_name("accidents 2020 (rev).csv"), "raw_accidents_2020__rev_");
    assert_eq!(raw_table_name("no-extension"), "raw_no_extension");
    assert_eq!(raw_table_name("dots.in.name.csv"), "raw_dots_in_name");
  }
}
