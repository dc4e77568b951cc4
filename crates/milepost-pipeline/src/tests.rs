use std::sync::Mutex;

use chrono::NaiveDate;
use milepost_blob_fs::FsContainer;
use milepost_core::{
  blob::Container,
  dimension::{NewDimensionRow, TRACKED_DIMENSIONS},
  record::AccidentRecord,
  runlog::{RunStatus, TriggerKind},
  store::Warehouse,
};
use milepost_store_sqlite::SqliteWarehouse;
use tempfile::TempDir;

use crate::{
  bronze,
  gold::{self, RefreshCounts},
  notify::Notify,
  silver,
};

// ─── Doubles & fixtures ──────────────────────────────────────────────────────

#[derive(Default)]
struct RecordingNotifier {
  sent: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
  fn messages(&self) -> Vec<(String, String)> {
    self.sent.lock().unwrap().clone()
  }
}

impl Notify for RecordingNotifier {
  type Error = std::convert::Infallible;

  async fn send(
    &self,
    subject: String,
    body: String,
  ) -> Result<(), Self::Error> {
    self.sent.lock().unwrap().push((subject, body));
    Ok(())
  }
}

#[derive(Debug, thiserror::Error)]
#[error("smtp unreachable")]
struct SendRefused;

struct FailingNotifier;

impl Notify for FailingNotifier {
  type Error = SendRefused;

  async fn send(&self, _: String, _: String) -> Result<(), SendRefused> {
    Err(SendRefused)
  }
}

async fn pipeline() -> (TempDir, SqliteWarehouse, FsContainer, RecordingNotifier)
{
  let dir = TempDir::new().unwrap();
  let warehouse = SqliteWarehouse::open_in_memory().await.unwrap();
  let container = FsContainer::open(dir.path()).await.unwrap();
  (dir, warehouse, container, RecordingNotifier::default())
}

fn write_object(dir: &TempDir, name: &str, content: &str) {
  std::fs::write(dir.path().join(name), content).unwrap();
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
  NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Already-cleaned row with every tracked attribute coded; light conditions
/// vary per test.
fn clean_row(index: &str, light: i64) -> AccidentRecord {
  AccidentRecord {
    accident_index: index.to_string(),
    location_easting_osgr: Some(530_500.0),
    location_northing_osgr: Some(179_600.0),
    longitude: Some(-0.1195),
    latitude: Some(51.5033),
    accident_severity: Some(3),
    number_of_vehicles: Some(2),
    number_of_casualties: Some(1),
    date: "2019-06-14".to_string(),
    day_of_week: Some(6),
    time: "17:30".to_string(),
    local_authority_highway: "E09000022".to_string(),
    road_type: Some(6),
    speed_limit: Some(30),
    light_conditions: Some(light),
    weather_conditions: Some(1),
    road_surface_conditions: Some(1),
    urban_or_rural_area: Some(1),
    lsoa: "E01004762".to_string(),
    ..Default::default()
  }
}

/// Three rows; the third has no location data at all and must not survive
/// cleaning.
const EXTRACT_2019: &str = "\
Accident_Index,Location_Easting_OSGR,Location_Northing_OSGR,Longitude,Latitude,Accident_Severity,Day_of_Week,Road_Type,Light_Conditions,Weather_Conditions,Road_Surface_Conditions,Urban_or_Rural_Area,Date,Time,Number_of_Vehicles,Number_of_Casualties,Speed_limit,LSOA_of_Accident_Location
2019A1,530500,179600,-0.1195,51.5033,3,6,6,1,1,1,1,14/06/2019,17:30,2,1,30,E01004762
2019A2,530600,179700,-0.1201,51.5041,2,6,6,4,1,1,1,14/06/2019,23:05,1,1,30,E01004763
2019A3,,,,,3,6,6,1,1,1,1,15/06/2019,08:00,2,3,40,E01004764
";

const EXTRACT_2020: &str = "\
Accident_Index,Location_Easting_OSGR,Location_Northing_OSGR,Longitude,Latitude,Accident_Severity,Day_of_Week,Road_Type,Light_Conditions,Weather_Conditions,Road_Surface_Conditions,Urban_or_Rural_Area,Date,Time,Number_of_Vehicles,Number_of_Casualties,Speed_limit,LSOA_of_Accident_Location
2020B1,531000,180000,-0.1180,51.5100,1,3,1,4,2,2,1,03/02/2020,19:45,3,2,40,E01004800
2020B2,531100,180100,-0.1170,51.5200,3,3,6,1,1,1,2,04/02/2020,09:15,1,1,60,
";

// ─── Bronze ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn bronze_ingest_is_idempotent() {
  let (dir, w, c, n) = pipeline().await;
  write_object(&dir, "Accidents_2019.csv", EXTRACT_2019);

  let entry = bronze::run(&w, &c, &n, TriggerKind::Schedule).await.unwrap();
  assert_eq!(entry.status, RunStatus::Success);
  assert_eq!(entry.record_count, 3);
  assert_eq!(entry.triggered_by, TriggerKind::Schedule);

  let metadata = c
    .object_metadata("Accidents_2019.csv".to_string())
    .await
    .unwrap();
  assert!(metadata.contains_key(bronze::PROCESSED_MARKER));

  // The second scheduled run finds nothing to do but still logs.
  let again = bronze::run(&w, &c, &n, TriggerKind::Schedule).await.unwrap();
  assert_eq!(again.status, RunStatus::Success);
  assert_eq!(again.record_count, 0);

  let log = w.recent_run_log(10).await.unwrap();
  assert_eq!(log.len(), 2);
  assert!(log.iter().all(|e| e.function_name == bronze::STAGE));
  assert!(n.messages().is_empty());
}

#[tokio::test]
async fn bronze_isolates_failing_objects() {
  let (dir, w, c, n) = pipeline().await;
  write_object(&dir, "Accidents_2019.csv", EXTRACT_2019);
  write_object(&dir, "broken.csv", "foo,bar\n1,2\n");

  let entry = bronze::run(&w, &c, &n, TriggerKind::Manual).await.unwrap();
  assert_eq!(entry.status, RunStatus::Failed);
  // The healthy object loaded in full.
  assert_eq!(entry.record_count, 3);
  assert!(entry.message.contains("broken.csv"));
  assert!(entry.message.contains("none of the expected source columns"));

  let good = c
    .object_metadata("Accidents_2019.csv".to_string())
    .await
    .unwrap();
  assert!(good.contains_key(bronze::PROCESSED_MARKER));
  let bad = c.object_metadata("broken.csv".to_string()).await.unwrap();
  assert!(!bad.contains_key(bronze::PROCESSED_MARKER));

  let messages = n.messages();
  assert_eq!(messages.len(), 1);
  assert!(messages[0].1.contains("broken.csv"));

  let log = w.recent_run_log(1).await.unwrap();
  assert_eq!(log[0].status, RunStatus::Failed);
  assert_eq!(log[0].record_count, 3);
  // The persisted entry keeps the reason even if no email ever lands.
  assert!(log[0].message.contains("none of the expected source columns"));
}

#[tokio::test]
async fn bad_rows_are_reported_without_failing_the_run() {
  let (dir, w, c, n) = pipeline().await;
  let csv = "\
Accident_Index,Accident_Severity,Longitude,Latitude
A1,3,-0.12,51.50
A2,everything-on-fire,-0.13,51.51
A3,2,-0.14,51.52
";
  write_object(&dir, "Accidents_2021.csv", csv);

  let entry = bronze::run(&w, &c, &n, TriggerKind::Schedule).await.unwrap();
  // A skipped row degrades the load, it does not fail it.
  assert_eq!(entry.status, RunStatus::Success);
  assert_eq!(entry.record_count, 2);

  let metadata = c
    .object_metadata("Accidents_2021.csv".to_string())
    .await
    .unwrap();
  assert!(metadata.contains_key(bronze::PROCESSED_MARKER));

  let messages = n.messages();
  assert_eq!(messages.len(), 1);
  assert!(messages[0].1.contains("Accidents_2021.csv line 3:"));
  assert!(messages[0].1.contains("everything-on-fire"));
}

#[tokio::test]
async fn notification_failure_never_changes_the_outcome() {
  let (dir, w, c, _n) = pipeline().await;
  write_object(&dir, "broken.csv", "foo,bar\n1,2\n");

  let entry = bronze::run(&w, &c, &FailingNotifier, TriggerKind::Schedule)
    .await
    .unwrap();
  assert_eq!(entry.status, RunStatus::Failed);
  assert_eq!(w.recent_run_log(5).await.unwrap().len(), 1);
}

// ─── Silver ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn silver_drops_unlocated_rows_and_marks_objects() {
  let (dir, w, c, n) = pipeline().await;
  write_object(&dir, "Accidents_2019.csv", EXTRACT_2019);

  let entry = silver::run(&w, &c, &n, TriggerKind::BlobArrival, None)
    .await
    .unwrap();
  assert_eq!(entry.status, RunStatus::Success);
  assert_eq!(entry.record_count, 2);
  assert!(entry.message.contains("dropped 1"));
  assert_eq!(w.clean_row_count().await.unwrap(), 2);

  let metadata = c
    .object_metadata("Accidents_2019.csv".to_string())
    .await
    .unwrap();
  assert!(metadata.contains_key(silver::CLEANED_MARKER));

  // A scheduled re-run appends nothing.
  let again = silver::run(&w, &c, &n, TriggerKind::Schedule, None)
    .await
    .unwrap();
  assert_eq!(again.record_count, 0);
  assert_eq!(w.clean_row_count().await.unwrap(), 2);

  // Naming the object replays it despite the marker.
  let forced = silver::run(
    &w,
    &c,
    &n,
    TriggerKind::Manual,
    Some("Accidents_2019.csv"),
  )
  .await
  .unwrap();
  assert_eq!(forced.record_count, 2);
  assert_eq!(w.clean_row_count().await.unwrap(), 4);
}

#[tokio::test]
async fn silver_reports_missing_named_objects() {
  let (_dir, w, c, n) = pipeline().await;
  let entry = silver::run(&w, &c, &n, TriggerKind::Manual, Some("ghost.csv"))
    .await
    .unwrap();
  assert_eq!(entry.status, RunStatus::Failed);
  assert_eq!(entry.record_count, 0);
  assert!(entry.message.contains("ghost.csv"));
  assert!(entry.message.contains("no such object"));
}

// ─── Gold ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn gold_keeps_one_active_row_per_code() {
  let (_dir, w, _c, n) = pipeline().await;
  w.append_clean_rows(vec![
    clean_row("A1", 1),
    clean_row("A2", 1),
    clean_row("A3", 4),
  ])
  .await
  .unwrap();

  let entry = gold::run(&w, &n, TriggerKind::Schedule).await.unwrap();
  assert_eq!(entry.status, RunStatus::Success);
  assert_eq!(entry.record_count, 3);

  let light = &TRACKED_DIMENSIONS[3];
  let rows = w.dimension_rows(light).await.unwrap();
  assert_eq!(rows.len(), 2);
  assert!(rows.iter().all(|r| r.status.is_active()));
  let mut described: Vec<_> = rows
    .iter()
    .map(|r| (r.code, r.description.as_deref()))
    .collect();
  described.sort();
  assert_eq!(described, vec![
    (1, Some("Daylights")),
    (4, Some("Darkness with street lighting")),
  ]);

  // Facts reference only active dimension keys.
  let facts = w.fact_rows().await.unwrap();
  assert_eq!(facts.len(), 3);
  let active_keys: Vec<i64> = rows.iter().map(|r| r.dim_key).collect();
  assert!(
    facts
      .iter()
      .all(|f| active_keys.contains(&f.light_conditions_key))
  );

  // A second refresh over unchanged data versions nothing.
  let again = gold::run(&w, &n, TriggerKind::Schedule).await.unwrap();
  assert_eq!(again.status, RunStatus::Success);
  assert_eq!(again.record_count, 3);
  for dim in &TRACKED_DIMENSIONS {
    let rows = w.dimension_rows(dim).await.unwrap();
    assert!(rows.iter().all(|r| r.status.is_active()), "{}", dim.attribute);
  }
  assert!(n.messages().is_empty());
}

#[tokio::test]
async fn changed_descriptions_supersede_the_active_row() {
  let (_dir, w, _c, _n) = pipeline().await;
  let surface = &TRACKED_DIMENSIONS[5];
  // Active row predating a coding revision: code 5 under an older label.
  w.insert_dimension_rows(surface, vec![NewDimensionRow::new(
    5,
    Some("Flood"),
    date(2020, 1, 1),
  )])
  .await
  .unwrap();

  let mut row = clean_row("A1", 1);
  row.road_surface_conditions = Some(5);
  w.append_clean_rows(vec![row]).await.unwrap();

  let counts = gold::refresh_dimension(&w, surface, date(2023, 5, 1))
    .await
    .unwrap();
  assert_eq!(counts, RefreshCounts { inserted: 1, superseded: 1 });

  let rows = w.dimension_rows(surface).await.unwrap();
  assert_eq!(rows.len(), 2);
  let old = rows.iter().find(|r| !r.status.is_active()).unwrap();
  assert_eq!(old.description.as_deref(), Some("Flood"));
  assert_eq!(old.end_date, Some(date(2023, 5, 1)));
  let current = rows.iter().find(|r| r.status.is_active()).unwrap();
  assert_eq!(current.code, 5);
  assert_eq!(current.description.as_deref(), Some("Flood over 3cm. deep"));
  assert_eq!(current.start_date, date(2023, 5, 1));
  assert!(current.end_date.is_none());
}

#[tokio::test]
async fn unknown_codes_get_stable_null_descriptions() {
  let (_dir, w, _c, _n) = pipeline().await;
  let weather = &TRACKED_DIMENSIONS[4];
  let coded = clean_row("A1", 1);
  let mut unknown = clean_row("A2", 1);
  unknown.weather_conditions = Some(99);
  w.append_clean_rows(vec![coded, unknown]).await.unwrap();

  let first = gold::refresh_dimension(&w, weather, date(2023, 5, 1))
    .await
    .unwrap();
  assert_eq!(first, RefreshCounts { inserted: 2, superseded: 0 });

  // The null description must match itself on the next pass.
  let second = gold::refresh_dimension(&w, weather, date(2023, 5, 2))
    .await
    .unwrap();
  assert_eq!(second, RefreshCounts::default());

  let rows = w.dimension_rows(weather).await.unwrap();
  let uncoded = rows.iter().find(|r| r.code == 99).unwrap();
  assert!(uncoded.description.is_none());
  assert!(uncoded.status.is_active());
}

#[tokio::test]
async fn rows_without_a_dimension_match_stay_out_of_facts() {
  let (_dir, w, _c, n) = pipeline().await;
  let coded = clean_row("A1", 1);
  let mut uncoded = clean_row("A2", 1);
  uncoded.road_type = None;
  w.append_clean_rows(vec![coded, uncoded]).await.unwrap();

  let entry = gold::run(&w, &n, TriggerKind::Schedule).await.unwrap();
  assert_eq!(entry.status, RunStatus::Success);
  // The NULL-coded row has no active road-type row to join against.
  assert_eq!(entry.record_count, 1);
  let facts = w.fact_rows().await.unwrap();
  assert_eq!(facts.len(), 1);
  assert_eq!(facts[0].accident_index, "A1");
}

// ─── End to end ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn two_yearly_extracts_flow_through_to_facts() {
  let (dir, w, c, n) = pipeline().await;
  write_object(&dir, "Accidents_2019.csv", EXTRACT_2019);
  write_object(&dir, "Accidents_2020.csv", EXTRACT_2020);

  let bronze_entry =
    bronze::run(&w, &c, &n, TriggerKind::Schedule).await.unwrap();
  assert_eq!(bronze_entry.record_count, 5);

  let silver_entry = silver::run(&w, &c, &n, TriggerKind::BlobArrival, None)
    .await
    .unwrap();
  assert_eq!(silver_entry.record_count, 4);

  let gold_entry = gold::run(&w, &n, TriggerKind::Schedule).await.unwrap();
  assert_eq!(gold_entry.status, RunStatus::Success);
  assert_eq!(gold_entry.record_count, 4);

  let facts = w.fact_rows().await.unwrap();
  assert_eq!(facts.len(), 4);
  // Dates arrive normalized regardless of the source format.
  assert!(facts.iter().all(|f| f.date.starts_with("2019-") || f.date.starts_with("2020-")));

  // Severity saw codes 1, 2 and 3 across the two years.
  let severity = &TRACKED_DIMENSIONS[0];
  let codes: Vec<i64> = w
    .dimension_rows(severity)
    .await
    .unwrap()
    .iter()
    .map(|r| r.code)
    .collect();
  assert_eq!(codes.len(), 3);

  let log = w.recent_run_log(10).await.unwrap();
  assert_eq!(log.len(), 3);
  assert_eq!(log[0].function_name, gold::STAGE);
  assert_eq!(log[1].function_name, silver::STAGE);
  assert_eq!(log[1].triggered_by, TriggerKind::BlobArrival);
  assert_eq!(log[2].function_name, bronze::STAGE);
  assert!(log.iter().all(|e| e.status.is_success()));
  assert!(n.messages().is_empty());
}
