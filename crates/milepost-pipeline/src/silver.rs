//! Silver stage: source objects into the consolidated clean table.
//!
//! Cleaning normalizes dates to ISO, computes the two missing-data flags,
//! and drops rows with no usable location at all. Cleaned rows are appended
//! to `accident_clean`; the cleaned marker keeps scheduled re-runs from
//! appending the same object twice. Naming an object explicitly bypasses
//! the marker, for replays.

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

pub const STAGE: &str = "silver_clean";

/// Metadata key marking an object as cleaned; the value is the UTC clean
/// timestamp.
pub const CLEANED_MARKER: &str = "Cleaned";

struct CleanOutcome {
  appended: u64,
  dropped:  u64,
}

/// Cleans every object that does not yet carry the cleaned marker, or just
/// `only_object` (marker ignored) when one is named.
///
/// Always writes (and returns) one run-log entry; the `Err` path means that
/// entry itself could not be written. `record_count` is the number of rows
/// appended, also on failure.
pub async fn run<W, C, N>(
  warehouse: &W,
  container: &C,
  notifier: &N,
  trigger: TriggerKind,
  only_object: Option<&str>,
) -> Result<RunLogEntry, W::Error>
where
  W: Warehouse,
  C: Container,
  N: Notify,
{
  let mut queue = NotificationQueue::new("milepost silver clean");
  let mut appended: u64 = 0;
  let mut dropped: u64 = 0;
  let mut objects_cleaned: u64 = 0;
  let mut failures: Vec<String> = Vec::new();

  let force = only_object.is_some();
  let objects = match only_object {
    Some(name) => Ok(vec![name.to_string()]),
    None => container.list_objects().await,
  };

  match objects {
    Ok(objects) => {
      for object in objects {
        match clean_object(warehouse, container, &object, force, &mut queue)
          .await
        {
          Ok(Some(outcome)) => {
            appended += outcome.appended;
            dropped += outcome.dropped;
            objects_cleaned += 1;
          }
          Ok(None) => {}
          Err(e) => {
            error!(object, error = %e, "object clean failed");
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
      appended,
      format!(
        "cleaned {objects_cleaned} object(s), dropped {dropped} unlocated \
         row(s)"
      ),
    )
  } else {
    RunLogEntry::failed(
      STAGE,
      trigger,
      appended,
      format!("{} object(s) failed: {}", failures.len(), failures.join("; ")),
    )
  };
  warehouse.append_run_log(entry.clone()).await?;
  queue.flush(notifier).await;
  Ok(entry)
}

/// Cleans one object. `None` means it was already cleaned and not forced.
/// Row-level diagnostics land on the queue; they do not fail the object.
async fn clean_object<W: Warehouse, C: Container>(
  warehouse: &W,
  container: &C,
  object: &str,
  force: bool,
  queue: &mut NotificationQueue,
) -> Result<Option<CleanOutcome>, UnitError> {
  let metadata = container.object_metadata(object.to_string()).await?;
  if metadata.contains_key(CLEANED_MARKER) && !force {
    debug!(object, "already cleaned, skipping");
    return Ok(None);
  }

  let bytes = container.read_object(object.to_string()).await?;
  let parse::Extraction { records, skipped, diagnostics } =
    parse::extract_records(object, &bytes)?;
  for line in diagnostics {
    queue.push(line);
  }

  let total = records.len() as u64;
  let cleaned: Vec<_> = records
    .into_iter()
    .filter_map(milepost_core::record::AccidentRecord::clean)
    .collect();
  let dropped = total - cleaned.len() as u64;

  let appended = warehouse.append_clean_rows(cleaned).await?;

  let stamp = Utc::now().format(TIMESTAMP_FORMAT).to_string();
  container
    .set_object_metadata(object.to_string(), CLEANED_MARKER.to_string(), stamp)
    .await?;
  info!(object, appended, dropped, skipped, "object cleaned");
  Ok(Some(CleanOutcome { appended, dropped }))
}
