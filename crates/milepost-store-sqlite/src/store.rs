//! [`SqliteWarehouse`], the SQLite-backed [`Warehouse`] implementation.

use std::{path::Path, time::Duration};

use chrono::NaiveDate;
use milepost_core::{
  dimension::{DimensionRow, DimensionSpec, NewDimensionRow},
  fact::FactRow,
  record::{AccidentRecord, CLEAN_FLAG_COLUMNS, SOURCE_COLUMNS},
  runlog::RunLogEntry,
  store::Warehouse,
};
use rusqlite::OptionalExtension;
use tokio_rusqlite::Connection;

use crate::{
  encode::{RawDimensionRow, RawRunLogEntry, bind_value, encode_date, encode_ts},
  error::{Error, Result},
  schema,
};

/// Loads can back up behind a long rebuild, so give writers a generous
/// window before surfacing `SQLITE_BUSY`.
const BUSY_TIMEOUT: Duration = Duration::from_secs(300);

/// SQLite-backed warehouse.
///
/// Cloning is cheap; all clones share one serialized connection.
#[derive(Clone)]
pub struct SqliteWarehouse {
  pub(crate) conn: Connection,
}

impl SqliteWarehouse {
  /// Opens (creating if needed) the database at `path` and applies the
  /// schema.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = Connection::open(path.as_ref().to_owned()).await?;
    let warehouse = Self { conn };
    warehouse.init_schema().await?;
    Ok(warehouse)
  }

  /// Opens an in-memory database; used by tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory().await?;
    let warehouse = Self { conn };
    warehouse.init_schema().await?;
    Ok(warehouse)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(&schema::full_schema())?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

/// Raw table names come from blob names, so they are validated before being
/// spliced into DDL.
fn check_table_name(table: &str) -> Result<()> {
  let valid = !table.is_empty()
    && table
      .chars()
      .all(|c| c.is_ascii_alphanumeric() || c == '_');
  if valid {
    Ok(())
  } else {
    Err(Error::InvalidIdentifier(table.to_string()))
  }
}

fn encode_source_row(record: &AccidentRecord) -> Vec<rusqlite::types::Value> {
  SOURCE_COLUMNS
    .iter()
    .map(|col| bind_value((col.get)(record)))
    .collect()
}

fn encode_clean_row(record: &AccidentRecord) -> Vec<rusqlite::types::Value> {
  SOURCE_COLUMNS
    .iter()
    .chain(&CLEAN_FLAG_COLUMNS)
    .map(|col| bind_value((col.get)(record)))
    .collect()
}

impl Warehouse for SqliteWarehouse {
  type Error = Error;

  async fn replace_raw_table(
    &self,
    table: String,
    rows: Vec<AccidentRecord>,
  ) -> Result<u64> {
    check_table_name(&table)?;
    let recreate = schema::recreate_raw_table_sql(&table);
    let insert = schema::insert_raw_sql(&table);
    let encoded: Vec<Vec<rusqlite::types::Value>> =
      rows.iter().map(encode_source_row).collect();

    Ok(
      self
        .conn
        .call(move |conn| {
          let tx = conn.transaction()?;
          tx.execute_batch(&recreate)?;
          {
            let mut stmt = tx.prepare(&insert)?;
            for row in &encoded {
              stmt.execute(rusqlite::params_from_iter(row.iter()))?;
            }
          }
          tx.commit()?;
          Ok(encoded.len() as u64)
        })
        .await?,
    )
  }

  async fn append_clean_rows(&self, rows: Vec<AccidentRecord>) -> Result<u64> {
    let insert = schema::insert_clean_sql();
    let encoded: Vec<Vec<rusqlite::types::Value>> =
      rows.iter().map(encode_clean_row).collect();

    Ok(
      self
        .conn
        .call(move |conn| {
          let tx = conn.transaction()?;
          {
            let mut stmt = tx.prepare(&insert)?;
            for row in &encoded {
              stmt.execute(rusqlite::params_from_iter(row.iter()))?;
            }
          }
          tx.commit()?;
          Ok(encoded.len() as u64)
        })
        .await?,
    )
  }

  async fn clean_row_count(&self) -> Result<u64> {
    let sql = format!("SELECT COUNT(*) FROM {}", schema::CLEAN_TABLE);
    Ok(
      self
        .conn
        .call(move |conn| {
          let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
          Ok(count as u64)
        })
        .await?,
    )
  }

  async fn distinct_codes(
    &self,
    dim: &'static DimensionSpec,
  ) -> Result<Vec<i64>> {
    let sql = schema::distinct_codes_sql(dim);
    Ok(
      self
        .conn
        .call(move |conn| {
          let mut stmt = conn.prepare(&sql)?;
          let codes = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<i64>>>()?;
          Ok(codes)
        })
        .await?,
    )
  }

  async fn active_row_matches(
    &self,
    dim: &'static DimensionSpec,
    code: i64,
    description: Option<&'static str>,
  ) -> Result<bool> {
    let sql = schema::active_match_sql(dim);
    Ok(
      self
        .conn
        .call(move |conn| {
          let hit = conn
            .query_row(&sql, rusqlite::params![code, description], |row| {
              row.get::<_, i64>(0)
            })
            .optional()?;
          Ok(hit.is_some())
        })
        .await?,
    )
  }

  async fn supersede_code(
    &self,
    dim: &'static DimensionSpec,
    code: i64,
    end_date: NaiveDate,
  ) -> Result<u64> {
    let sql = schema::supersede_sql(dim);
    let end = encode_date(end_date);
    Ok(
      self
        .conn
        .call(move |conn| {
          let closed = conn.execute(&sql, rusqlite::params![code, end])?;
          Ok(closed as u64)
        })
        .await?,
    )
  }

  async fn insert_dimension_rows(
    &self,
    dim: &'static DimensionSpec,
    rows: Vec<NewDimensionRow>,
  ) -> Result<u64> {
    let sql = schema::insert_dimension_sql(dim);
    let encoded: Vec<(i64, Option<String>, String)> = rows
      .into_iter()
      .map(|row| (row.code, row.description, encode_date(row.start_date)))
      .collect();

    Ok(
      self
        .conn
        .call(move |conn| {
          let tx = conn.transaction()?;
          {
            let mut stmt = tx.prepare(&sql)?;
            for (code, description, start_date) in &encoded {
              stmt.execute(rusqlite::params![code, description, start_date])?;
            }
          }
          tx.commit()?;
          Ok(encoded.len() as u64)
        })
        .await?,
    )
  }

  async fn dimension_rows(
    &self,
    dim: &'static DimensionSpec,
  ) -> Result<Vec<DimensionRow>> {
    let sql = schema::dimension_rows_sql(dim);
    let raw = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map([], |row| {
            Ok(RawDimensionRow {
              dim_key:     row.get(0)?,
              code:        row.get(1)?,
              description: row.get(2)?,
              start_date:  row.get(3)?,
              end_date:    row.get(4)?,
              status:      row.get(5)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raw
      .into_iter()
      .map(RawDimensionRow::into_dimension_row)
      .collect()
  }

  async fn rebuild_fact(&self) -> Result<u64> {
    let truncate = format!("DELETE FROM {}", schema::FACT_TABLE);
    let insert = schema::rebuild_fact_insert_sql();
    Ok(
      self
        .conn
        .call(move |conn| {
          let tx = conn.transaction()?;
          tx.execute(&truncate, [])?;
          let inserted = tx.execute(&insert, [])?;
          tx.commit()?;
          Ok(inserted as u64)
        })
        .await?,
    )
  }

  async fn fact_rows(&self) -> Result<Vec<FactRow>> {
    let sql = schema::fact_rows_sql();
    Ok(
      self
        .conn
        .call(move |conn| {
          let mut stmt = conn.prepare(&sql)?;
          let rows = stmt
            .query_map([], |row| {
              Ok(FactRow {
                accident_index:           row.get(0)?,
                accident_severity_key:    row.get(1)?,
                day_of_week_key:          row.get(2)?,
                road_type_key:            row.get(3)?,
                light_conditions_key:     row.get(4)?,
                weather_conditions_key:   row.get(5)?,
                road_surface_key:         row.get(6)?,
                urban_rural_key:          row.get(7)?,
                longitude:                row.get(8)?,
                latitude:                 row.get(9)?,
                local_authority_district: row.get(10)?,
                local_authority_highway:  row.get(11)?,
                date:                     row.get(12)?,
                time:                     row.get(13)?,
                number_of_vehicles:       row.get(14)?,
                number_of_casualties:     row.get(15)?,
                speed_limit:              row.get(16)?,
              })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          Ok(rows)
        })
        .await?,
    )
  }

  async fn append_run_log(&self, entry: RunLogEntry) -> Result<()> {
    let ts = encode_ts(entry.timestamp);
    let record_count = entry.record_count as i64;
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO run_log \
           (function_name, status, triggered_by, record_count, timestamp, \
            message) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![
            entry.function_name,
            entry.status.as_str(),
            entry.triggered_by.as_str(),
            record_count,
            ts,
            entry.message,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn recent_run_log(&self, limit: u32) -> Result<Vec<RunLogEntry>> {
    let raw = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT function_name, status, triggered_by, record_count, \
           timestamp, message FROM run_log ORDER BY rowid DESC LIMIT ?1",
        )?;
        let rows = stmt
          .query_map([limit], |row| {
            Ok(RawRunLogEntry {
              function_name: row.get(0)?,
              status:        row.get(1)?,
              triggered_by:  row.get(2)?,
              record_count:  row.get(3)?,
              timestamp:     row.get(4)?,
              message:       row.get(5)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raw.into_iter().map(RawRunLogEntry::into_entry).collect()
  }
}
