//! SQL text for the milepost store.
//!
//! The run log is plain static DDL. Everything shaped by the source column
//! list or the tracked-dimension descriptors — raw/clean table DDL, bulk
//! insert statements, the dimension statements, the fact rebuild join — is
//! generated from those descriptors, so `milepost-core` stays the single
//! source of truth for names and types.

use milepost_core::{
  dimension::{DimensionSpec, DimensionStatus, TRACKED_DIMENSIONS},
  record::{CLEAN_FLAG_COLUMNS, ColumnKind, SOURCE_COLUMNS},
};

use crate::encode::encode_status;

pub const CLEAN_TABLE: &str = "accident_clean";
pub const FACT_TABLE: &str = "fact_accident";

/// Fact-table measures copied straight through from the clean table:
/// `(fact column, clean column, SQL type)`.
const PASSTHROUGH: [(&str, &str, &str); 9] = [
  ("longitude", "Longitude", "REAL"),
  ("latitude", "Latitude", "REAL"),
  ("local_authority_district", "Local_Authority_(District)", "INTEGER"),
  ("local_authority_highway", "Local_Authority_(Highway)", "TEXT"),
  ("date", "Date", "TEXT"),
  ("time", "Time", "TEXT"),
  ("number_of_vehicles", "Number_of_Vehicles", "INTEGER"),
  ("number_of_casualties", "Number_of_Casualties", "INTEGER"),
  ("speed_limit", "Speed_limit", "INTEGER"),
];

const PRELUDE: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;
";

const RUN_LOG_DDL: &str = "
-- The audit sink. Strictly append-only; one row per stage invocation.
CREATE TABLE IF NOT EXISTS run_log (
    function_name TEXT NOT NULL,
    status        TEXT NOT NULL,     -- 'Success' | 'Failed'
    triggered_by  TEXT NOT NULL,     -- 'schedule' | 'blob-arrival' | 'manual'
    record_count  INTEGER NOT NULL,
    timestamp     TEXT NOT NULL,     -- 'YYYY-MM-DD HH:MM:SS' UTC
    message       TEXT NOT NULL
);
";

fn sql_type(kind: ColumnKind) -> &'static str {
  match kind {
    ColumnKind::Text => "TEXT",
    ColumnKind::Real => "REAL",
    ColumnKind::Integer => "INTEGER",
  }
}

/// Source column names contain parentheses and hyphens, so every generated
/// statement double-quotes them.
fn quote(name: &str) -> String { format!("\"{name}\"") }

fn placeholders(n: usize) -> String {
  (1..=n)
    .map(|i| format!("?{i}"))
    .collect::<Vec<_>>()
    .join(", ")
}

// ─── Schema ──────────────────────────────────────────────────────────────────

fn create_clean_table_sql() -> String {
  let mut defs: Vec<String> = SOURCE_COLUMNS
    .iter()
    .map(|c| format!("    {} {}", quote(c.name), sql_type(c.kind)))
    .collect();
  for c in &CLEAN_FLAG_COLUMNS {
    defs.push(format!("    {} {} NOT NULL", quote(c.name), sql_type(c.kind)));
  }
  format!(
    "CREATE TABLE IF NOT EXISTS {CLEAN_TABLE} (\n{}\n);\n",
    defs.join(",\n")
  )
}

fn create_dimension_sql(dim: &DimensionSpec) -> String {
  format!(
    "CREATE TABLE IF NOT EXISTS {table} (
    dim_key     INTEGER PRIMARY KEY,
    code        INTEGER NOT NULL,
    description TEXT,
    start_date  TEXT NOT NULL,
    end_date    TEXT,
    status      INTEGER NOT NULL     -- 1 active | 0 superseded
);
CREATE INDEX IF NOT EXISTS {table}_code_idx ON {table}(code, status);\n",
    table = dim.table
  )
}

fn create_fact_sql() -> String {
  let mut defs = vec!["    accident_index TEXT NOT NULL".to_string()];
  for dim in &TRACKED_DIMENSIONS {
    defs.push(format!(
      "    {} INTEGER NOT NULL REFERENCES {}(dim_key)",
      dim.fact_key, dim.table
    ));
  }
  for (fact_col, _, ty) in PASSTHROUGH {
    defs.push(format!("    {fact_col} {ty}"));
  }
  format!(
    "CREATE TABLE IF NOT EXISTS {FACT_TABLE} (\n{}\n);\n",
    defs.join(",\n")
  )
}

/// The whole schema batch; idempotent thanks to `CREATE TABLE IF NOT
/// EXISTS`. Future migrations will be gated on `PRAGMA user_version`.
pub fn full_schema() -> String {
  let mut sql = String::from(PRELUDE);
  sql.push_str(&create_clean_table_sql());
  for dim in &TRACKED_DIMENSIONS {
    sql.push_str(&create_dimension_sql(dim));
  }
  sql.push_str(&create_fact_sql());
  sql.push_str(RUN_LOG_DDL);
  sql.push_str("\nPRAGMA user_version = 1;\n");
  sql
}

// ─── Bronze ──────────────────────────────────────────────────────────────────

/// Raw tables are recreated wholesale on every ingest of their file.
pub fn recreate_raw_table_sql(table: &str) -> String {
  let defs: Vec<String> = SOURCE_COLUMNS
    .iter()
    .map(|c| format!("    {} {}", quote(c.name), sql_type(c.kind)))
    .collect();
  format!(
    "DROP TABLE IF EXISTS {table};\nCREATE TABLE {table} (\n{}\n);",
    defs.join(",\n")
  )
}

pub fn insert_raw_sql(table: &str) -> String {
  let cols: Vec<String> =
    SOURCE_COLUMNS.iter().map(|c| quote(c.name)).collect();
  format!(
    "INSERT INTO {table} ({}) VALUES ({})",
    cols.join(", "),
    placeholders(cols.len())
  )
}

// ─── Silver ──────────────────────────────────────────────────────────────────

pub fn insert_clean_sql() -> String {
  let cols: Vec<String> = SOURCE_COLUMNS
    .iter()
    .chain(&CLEAN_FLAG_COLUMNS)
    .map(|c| quote(c.name))
    .collect();
  format!(
    "INSERT INTO {CLEAN_TABLE} ({}) VALUES ({})",
    cols.join(", "),
    placeholders(cols.len())
  )
}

// ─── Gold: dimensions ────────────────────────────────────────────────────────

pub fn distinct_codes_sql(dim: &DimensionSpec) -> String {
  let col = quote(dim.attribute);
  format!(
    "SELECT DISTINCT {col} FROM {CLEAN_TABLE} \
     WHERE {col} IS NOT NULL ORDER BY {col}"
  )
}

/// `IS` instead of `=` so a NULL description matches a NULL parameter.
pub fn active_match_sql(dim: &DimensionSpec) -> String {
  let active = encode_status(DimensionStatus::Active);
  format!(
    "SELECT 1 FROM {} WHERE code = ?1 AND status = {active} \
     AND description IS ?2",
    dim.table
  )
}

pub fn supersede_sql(dim: &DimensionSpec) -> String {
  let active = encode_status(DimensionStatus::Active);
  let superseded = encode_status(DimensionStatus::Superseded);
  format!(
    "UPDATE {} SET end_date = ?2, status = {superseded} \
     WHERE code = ?1 AND status = {active}",
    dim.table
  )
}

pub fn insert_dimension_sql(dim: &DimensionSpec) -> String {
  let active = encode_status(DimensionStatus::Active);
  format!(
    "INSERT INTO {} (code, description, start_date, end_date, status) \
     VALUES (?1, ?2, ?3, NULL, {active})",
    dim.table
  )
}

pub fn dimension_rows_sql(dim: &DimensionSpec) -> String {
  format!(
    "SELECT dim_key, code, description, start_date, end_date, status \
     FROM {} ORDER BY dim_key",
    dim.table
  )
}

// ─── Gold: fact ──────────────────────────────────────────────────────────────

/// The single set-based rebuild statement: the clean table inner-joined to
/// the active version of every tracked dimension. A clean row missing a
/// current match on any attribute simply drops out of the join.
pub fn rebuild_fact_insert_sql() -> String {
  let active = encode_status(DimensionStatus::Active);
  let mut insert_cols = vec!["accident_index".to_string()];
  let mut select_cols = vec![format!("c.{}", quote("Accident_Index"))];
  let mut joins = String::new();

  for (i, dim) in TRACKED_DIMENSIONS.iter().enumerate() {
    insert_cols.push(dim.fact_key.to_string());
    select_cols.push(format!("d{i}.dim_key"));
    joins.push_str(&format!(
      "\n  JOIN {table} d{i} ON d{i}.code = c.{attr} \
       AND d{i}.status = {active}",
      table = dim.table,
      attr = quote(dim.attribute),
    ));
  }
  for (fact_col, clean_col, _) in PASSTHROUGH {
    insert_cols.push(fact_col.to_string());
    select_cols.push(format!("c.{}", quote(clean_col)));
  }

  format!(
    "INSERT INTO {FACT_TABLE} ({})\nSELECT {}\nFROM {CLEAN_TABLE} c{}",
    insert_cols.join(", "),
    select_cols.join(", "),
    joins
  )
}

pub fn fact_rows_sql() -> String {
  let mut cols = vec!["accident_index".to_string()];
  for dim in &TRACKED_DIMENSIONS {
    cols.push(dim.fact_key.to_string());
  }
  for (fact_col, _, _) in PASSTHROUGH {
    cols.push(fact_col.to_string());
  }
  format!(
    "SELECT {} FROM {FACT_TABLE} ORDER BY rowid",
    cols.join(", ")
  )
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn schema_covers_every_table() {
    let sql = full_schema();
    assert!(sql.contains("CREATE TABLE IF NOT EXISTS accident_clean"));
    assert!(sql.contains("CREATE TABLE IF NOT EXISTS fact_accident"));
    assert!(sql.contains("CREATE TABLE IF NOT EXISTS run_log"));
    for dim in &TRACKED_DIMENSIONS {
      assert!(sql.contains(&format!("CREATE TABLE IF NOT EXISTS {}", dim.table)));
    }
    assert!(sql.contains("\"Pedestrian_Crossing-Human_Control\" INTEGER"));
    assert!(sql.contains("\"Local_Authority_(District)\" INTEGER"));
    assert!(sql.contains("location_data_missing\" INTEGER NOT NULL"));
  }

  #[test]
  fn raw_insert_binds_all_source_columns() {
    let sql = insert_raw_sql("raw_accidents_2019");
    assert!(sql.contains("?32"));
    assert!(!sql.contains("?33"));
  }

  #[test]
  fn clean_insert_binds_flags_too() {
    let sql = insert_clean_sql();
    assert!(sql.contains("?34"));
    assert!(sql.ends_with(")"));
  }

  #[test]
  fn dimension_statements_pin_status_values() {
    let dim = &TRACKED_DIMENSIONS[0];
    assert!(active_match_sql(dim).contains("status = 1"));
    let supersede = supersede_sql(dim);
    assert!(supersede.contains("status = 0"));
    assert!(supersede.contains("status = 1"));
    assert!(insert_dimension_sql(dim).contains("NULL, 1)"));
  }

  #[test]
  fn rebuild_joins_every_dimension_on_active_rows() {
    let sql = rebuild_fact_insert_sql();
    assert_eq!(sql.matches("JOIN").count(), 7);
    assert_eq!(sql.matches("status = 1").count(), 7);
    for dim in &TRACKED_DIMENSIONS {
      assert!(sql.contains(dim.table));
      assert!(sql.contains(dim.fact_key));
    }
    assert!(sql.contains("c.\"Speed_limit\""));
  }
}
