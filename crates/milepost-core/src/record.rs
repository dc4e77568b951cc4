//! The tabular record model for yearly accident extracts.
//!
//! One [`AccidentRecord`] is one CSV row. The source schema is declared once,
//! as the ordered [`SOURCE_COLUMNS`] list; table DDL and bulk-load column
//! binding are both driven by that list rather than by runtime introspection.
//! Header-to-field mapping is by column *name* (via [`ColumnMap`]), so column
//! order in the file does not matter and unknown columns are ignored.

use chrono::NaiveDate;

use crate::error::{Error, Result};

// ─── Column schema ───────────────────────────────────────────────────────────

/// Semantic type of a source column. Backends map this onto their own
/// storage types; the model itself stays storage-agnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
  /// Raw string, kept verbatim (identifiers, dates, times, free text).
  Text,
  /// Nullable floating-point measure (geo-coordinates).
  Real,
  /// Nullable integer (counts and coded attributes).
  Integer,
}

/// A single bound value, produced by a [`ColumnSpec`] accessor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
  Null,
  Text(&'a str),
  Real(f64),
  Integer(i64),
}

/// One column of the source schema: its header name, semantic type, and an
/// accessor that reads the corresponding field out of a record.
pub struct ColumnSpec {
  pub name: &'static str,
  pub kind: ColumnKind,
  pub get:  fn(&AccidentRecord) -> FieldValue<'_>,
}

/// The 32 columns of a yearly accident extract, in file order.
pub const SOURCE_COLUMNS: [ColumnSpec; 32] = [
  ColumnSpec {
    name: "Accident_Index",
    kind: ColumnKind::Text,
    get:  |r| FieldValue::Text(&r.accident_index),
  },
  ColumnSpec {
    name: "Location_Easting_OSGR",
    kind: ColumnKind::Real,
    get:  |r| real(r.location_easting_osgr),
  },
  ColumnSpec {
    name: "Location_Northing_OSGR",
    kind: ColumnKind::Real,
    get:  |r| real(r.location_northing_osgr),
  },
  ColumnSpec {
    name: "Longitude",
    kind: ColumnKind::Real,
    get:  |r| real(r.longitude),
  },
  ColumnSpec {
    name: "Latitude",
    kind: ColumnKind::Real,
    get:  |r| real(r.latitude),
  },
  ColumnSpec {
    name: "Police_Force",
    kind: ColumnKind::Integer,
    get:  |r| integer(r.police_force),
  },
  ColumnSpec {
    name: "Accident_Severity",
    kind: ColumnKind::Integer,
    get:  |r| integer(r.accident_severity),
  },
  ColumnSpec {
    name: "Number_of_Vehicles",
    kind: ColumnKind::Integer,
    get:  |r| integer(r.number_of_vehicles),
  },
  ColumnSpec {
    name: "Number_of_Casualties",
    kind: ColumnKind::Integer,
    get:  |r| integer(r.number_of_casualties),
  },
  ColumnSpec {
    name: "Date",
    kind: ColumnKind::Text,
    get:  |r| FieldValue::Text(&r.date),
  },
  ColumnSpec {
    name: "Day_of_Week",
    kind: ColumnKind::Integer,
    get:  |r| integer(r.day_of_week),
  },
  ColumnSpec {
    name: "Time",
    kind: ColumnKind::Text,
    get:  |r| FieldValue::Text(&r.time),
  },
  ColumnSpec {
    name: "Local_Authority_(District)",
    kind: ColumnKind::Integer,
    get:  |r| integer(r.local_authority_district),
  },
  ColumnSpec {
    name: "Local_Authority_(Highway)",
    kind: ColumnKind::Text,
    get:  |r| FieldValue::Text(&r.local_authority_highway),
  },
  ColumnSpec {
    name: "1st_Road_Class",
    kind: ColumnKind::Integer,
    get:  |r| integer(r.first_road_class),
  },
  ColumnSpec {
    name: "1st_Road_Number",
    kind: ColumnKind::Integer,
    get:  |r| integer(r.first_road_number),
  },
  ColumnSpec {
    name: "Road_Type",
    kind: ColumnKind::Integer,
    get:  |r| integer(r.road_type),
  },
  ColumnSpec {
    name: "Speed_limit",
    kind: ColumnKind::Integer,
    get:  |r| integer(r.speed_limit),
  },
  ColumnSpec {
    name: "Junction_Detail",
    kind: ColumnKind::Integer,
    get:  |r| integer(r.junction_detail),
  },
  ColumnSpec {
    name: "Junction_Control",
    kind: ColumnKind::Integer,
    get:  |r| integer(r.junction_control),
  },
  ColumnSpec {
    name: "2nd_Road_Class",
    kind: ColumnKind::Integer,
    get:  |r| integer(r.second_road_class),
  },
  ColumnSpec {
    name: "2nd_Road_Number",
    kind: ColumnKind::Integer,
    get:  |r| integer(r.second_road_number),
  },
  ColumnSpec {
    name: "Pedestrian_Crossing-Human_Control",
    kind: ColumnKind::Integer,
    get:  |r| integer(r.ped_crossing_human_control),
  },
  ColumnSpec {
    name: "Pedestrian_Crossing-Physical_Facilities",
    kind: ColumnKind::Integer,
    get:  |r| integer(r.ped_crossing_physical_facilities),
  },
  ColumnSpec {
    name: "Light_Conditions",
    kind: ColumnKind::Integer,
    get:  |r| integer(r.light_conditions),
  },
  ColumnSpec {
    name: "Weather_Conditions",
    kind: ColumnKind::Integer,
    get:  |r| integer(r.weather_conditions),
  },
  ColumnSpec {
    name: "Road_Surface_Conditions",
    kind: ColumnKind::Integer,
    get:  |r| integer(r.road_surface_conditions),
  },
  ColumnSpec {
    name: "Special_Conditions_at_Site",
    kind: ColumnKind::Integer,
    get:  |r| integer(r.special_conditions_at_site),
  },
  ColumnSpec {
    name: "Carriageway_Hazards",
    kind: ColumnKind::Integer,
    get:  |r| integer(r.carriageway_hazards),
  },
  ColumnSpec {
    name: "Urban_or_Rural_Area",
    kind: ColumnKind::Integer,
    get:  |r| integer(r.urban_or_rural_area),
  },
  ColumnSpec {
    name: "Did_Police_Officer_Attend_Scene_of_Accident",
    kind: ColumnKind::Integer,
    get:  |r| integer(r.police_attended),
  },
  ColumnSpec {
    name: "LSOA_of_Accident_Location",
    kind: ColumnKind::Text,
    get:  |r| FieldValue::Text(&r.lsoa),
  },
];

/// The two flag columns derived during cleaning. They extend
/// [`SOURCE_COLUMNS`] for the consolidated clean table; booleans bind as
/// integers 0/1.
pub const CLEAN_FLAG_COLUMNS: [ColumnSpec; 2] = [
  ColumnSpec {
    name: "location_data_missing",
    kind: ColumnKind::Integer,
    get:  |r| FieldValue::Integer(r.location_data_missing as i64),
  },
  ColumnSpec {
    name: "lsoa_missing",
    kind: ColumnKind::Integer,
    get:  |r| FieldValue::Integer(r.lsoa_missing as i64),
  },
];

fn real(v: Option<f64>) -> FieldValue<'static> {
  v.map_or(FieldValue::Null, FieldValue::Real)
}

fn integer(v: Option<i64>) -> FieldValue<'static> {
  v.map_or(FieldValue::Null, FieldValue::Integer)
}

// ─── Header mapping ──────────────────────────────────────────────────────────

/// Maps each source column to its position in one particular file's header
/// row. Built once per file; header comparison is case-insensitive and
/// tolerates a UTF-8 BOM on the first cell.
#[derive(Debug, Clone)]
pub struct ColumnMap {
  /// File position of each column, in [`SOURCE_COLUMNS`] order. `None` when
  /// the file lacks the column entirely.
  positions: [Option<usize>; SOURCE_COLUMNS.len()],
}

impl ColumnMap {
  /// Build the map from a header row. Headers that match no source column
  /// are ignored; on duplicates the first occurrence wins. Errors only when
  /// *no* expected column is present — the file is not an accident extract.
  pub fn from_headers<'a>(
    headers: impl IntoIterator<Item = &'a str>,
  ) -> Result<Self> {
    let mut positions = [None; SOURCE_COLUMNS.len()];
    for (pos, raw) in headers.into_iter().enumerate() {
      let name = raw.trim_start_matches('\u{feff}').trim();
      if let Some(i) = SOURCE_COLUMNS
        .iter()
        .position(|c| c.name.eq_ignore_ascii_case(name))
        && positions[i].is_none()
      {
        positions[i] = Some(pos);
      }
    }
    if positions.iter().all(Option::is_none) {
      return Err(Error::NoRecognizedColumns);
    }
    Ok(Self { positions })
  }

  /// Number of source columns found in the header row.
  pub fn matched_columns(&self) -> usize {
    self.positions.iter().filter(|p| p.is_some()).count()
  }
}

// ─── Record ──────────────────────────────────────────────────────────────────

/// One accident row. Field order follows [`SOURCE_COLUMNS`]; the two trailing
/// flags exist only after cleaning.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccidentRecord {
  pub accident_index: String,
  pub location_easting_osgr: Option<f64>,
  pub location_northing_osgr: Option<f64>,
  pub longitude: Option<f64>,
  pub latitude: Option<f64>,
  pub police_force: Option<i64>,
  pub accident_severity: Option<i64>,
  pub number_of_vehicles: Option<i64>,
  pub number_of_casualties: Option<i64>,
  pub date: String,
  pub day_of_week: Option<i64>,
  pub time: String,
  pub local_authority_district: Option<i64>,
  pub local_authority_highway: String,
  pub first_road_class: Option<i64>,
  pub first_road_number: Option<i64>,
  pub road_type: Option<i64>,
  pub speed_limit: Option<i64>,
  pub junction_detail: Option<i64>,
  pub junction_control: Option<i64>,
  pub second_road_class: Option<i64>,
  pub second_road_number: Option<i64>,
  pub ped_crossing_human_control: Option<i64>,
  pub ped_crossing_physical_facilities: Option<i64>,
  pub light_conditions: Option<i64>,
  pub weather_conditions: Option<i64>,
  pub road_surface_conditions: Option<i64>,
  pub special_conditions_at_site: Option<i64>,
  pub carriageway_hazards: Option<i64>,
  pub urban_or_rural_area: Option<i64>,
  pub police_attended: Option<i64>,
  pub lsoa: String,

  /// True when the row lacks any of the four spatial coordinates. Computed
  /// by [`AccidentRecord::clean`].
  pub location_data_missing: bool,
  /// True when `LSOA_of_Accident_Location` is empty. Computed by
  /// [`AccidentRecord::clean`].
  pub lsoa_missing: bool,
}

impl AccidentRecord {
  /// Parse one data row. `field` yields the raw cell at a file position
  /// (e.g. `|i| csv_record.get(i)`); cells are resolved through `map`.
  ///
  /// Missing columns and empty/`NULL` cells become `None` or the empty
  /// string; a cell that is present but not parseable as its column's
  /// numeric type fails the whole row.
  pub fn parse<'a>(
    map: &ColumnMap,
    field: impl Fn(usize) -> Option<&'a str>,
  ) -> Result<Self> {
    // Cell accessors, indexed in SOURCE_COLUMNS order.
    let v = |i: usize| map.positions[i].and_then(&field);

    Ok(Self {
      accident_index: text(v(0)),
      location_easting_osgr: parse_real("Location_Easting_OSGR", v(1))?,
      location_northing_osgr: parse_real("Location_Northing_OSGR", v(2))?,
      longitude: parse_real("Longitude", v(3))?,
      latitude: parse_real("Latitude", v(4))?,
      police_force: parse_integer("Police_Force", v(5))?,
      accident_severity: parse_integer("Accident_Severity", v(6))?,
      number_of_vehicles: parse_integer("Number_of_Vehicles", v(7))?,
      number_of_casualties: parse_integer("Number_of_Casualties", v(8))?,
      date: text(v(9)),
      day_of_week: parse_integer("Day_of_Week", v(10))?,
      time: text(v(11)),
      local_authority_district: parse_integer(
        "Local_Authority_(District)",
        v(12),
      )?,
      local_authority_highway: text(v(13)),
      first_road_class: parse_integer("1st_Road_Class", v(14))?,
      first_road_number: parse_integer("1st_Road_Number", v(15))?,
      road_type: parse_integer("Road_Type", v(16))?,
      speed_limit: parse_integer("Speed_limit", v(17))?,
      junction_detail: parse_integer("Junction_Detail", v(18))?,
      junction_control: parse_integer("Junction_Control", v(19))?,
      second_road_class: parse_integer("2nd_Road_Class", v(20))?,
      second_road_number: parse_integer("2nd_Road_Number", v(21))?,
      ped_crossing_human_control: parse_integer(
        "Pedestrian_Crossing-Human_Control",
        v(22),
      )?,
      ped_crossing_physical_facilities: parse_integer(
        "Pedestrian_Crossing-Physical_Facilities",
        v(23),
      )?,
      light_conditions: parse_integer("Light_Conditions", v(24))?,
      weather_conditions: parse_integer("Weather_Conditions", v(25))?,
      road_surface_conditions: parse_integer(
        "Road_Surface_Conditions",
        v(26),
      )?,
      special_conditions_at_site: parse_integer(
        "Special_Conditions_at_Site",
        v(27),
      )?,
      carriageway_hazards: parse_integer("Carriageway_Hazards", v(28))?,
      urban_or_rural_area: parse_integer("Urban_or_Rural_Area", v(29))?,
      police_attended: parse_integer(
        "Did_Police_Officer_Attend_Scene_of_Accident",
        v(30),
      )?,
      lsoa: text(v(31)),
      location_data_missing: false,
      lsoa_missing: false,
    })
  }

  /// The silver row-wise transform: canonicalize the date, compute the two
  /// missing-data flags, and decide retention. Returns `None` for rows with
  /// all four spatial coordinates absent — they carry no usable signal and
  /// are dropped from the clean table.
  pub fn clean(mut self) -> Option<Self> {
    let absent = [
      self.location_easting_osgr.is_none(),
      self.location_northing_osgr.is_none(),
      self.longitude.is_none(),
      self.latitude.is_none(),
    ];
    if absent.iter().all(|a| *a) {
      return None;
    }
    self.location_data_missing = absent.iter().any(|a| *a);
    self.lsoa_missing = self.lsoa.trim().is_empty();
    self.date = canonical_date(&self.date);
    Some(self)
  }
}

// ─── Cell parsing helpers ────────────────────────────────────────────────────

fn text(v: Option<&str>) -> String { v.unwrap_or_default().trim().to_string() }

/// Empty cells and the literal `NULL` are missing data, not errors.
fn is_missing(s: &str) -> bool { s.is_empty() || s.eq_ignore_ascii_case("NULL") }

fn parse_real(column: &'static str, v: Option<&str>) -> Result<Option<f64>> {
  let Some(s) = v.map(str::trim).filter(|s| !is_missing(s)) else {
    return Ok(None);
  };
  s.parse::<f64>().map(Some).map_err(|_| Error::InvalidField {
    column,
    value: s.to_string(),
    expected: "a real number",
  })
}

fn parse_integer(column: &'static str, v: Option<&str>) -> Result<Option<i64>> {
  let Some(s) = v.map(str::trim).filter(|s| !is_missing(s)) else {
    return Ok(None);
  };
  s.parse::<i64>().map(Some).map_err(|_| Error::InvalidField {
    column,
    value: s.to_string(),
    expected: "an integer",
  })
}

/// Reformat `DD/MM/YYYY` dates to `YYYY-MM-DD`. Already-canonical values
/// pass through; anything else is left unchanged rather than erroring.
pub fn canonical_date(raw: &str) -> String {
  let s = raw.trim();
  for fmt in ["%d/%m/%Y", "%Y-%m-%d"] {
    if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
      return d.format("%Y-%m-%d").to_string();
    }
  }
  raw.to_string()
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  const HEADERS: [&str; 32] = {
    let mut names = [""; 32];
    let mut i = 0;
    while i < 32 {
      names[i] = SOURCE_COLUMNS[i].name;
      i += 1;
    }
    names
  };

  fn full_row() -> Vec<String> {
    SOURCE_COLUMNS
      .iter()
      .enumerate()
      .map(|(i, c)| match c.kind {
        ColumnKind::Text => format!("cell{i}"),
        ColumnKind::Real => format!("{}.5", i),
        ColumnKind::Integer => format!("{}", i),
      })
      .collect()
  }

  fn parse_row(map: &ColumnMap, row: &[String]) -> Result<AccidentRecord> {
    AccidentRecord::parse(map, |i| row.get(i).map(String::as_str))
  }

  // ── Header mapping ─────────────────────────────────────────────────────

  #[test]
  fn headers_map_in_any_order_and_case() {
    let mut headers: Vec<&str> = HEADERS.to_vec();
    headers.reverse();
    let lowered: Vec<String> =
      headers.iter().map(|h| h.to_lowercase()).collect();
    let map =
      ColumnMap::from_headers(lowered.iter().map(String::as_str)).unwrap();
    assert_eq!(map.matched_columns(), 32);
  }

  #[test]
  fn unknown_headers_are_ignored() {
    let map =
      ColumnMap::from_headers(["Bogus", "Accident_Index", "Extra"]).unwrap();
    assert_eq!(map.matched_columns(), 1);
  }

  #[test]
  fn bom_on_first_header_is_tolerated() {
    let map = ColumnMap::from_headers(["\u{feff}Accident_Index"]).unwrap();
    assert_eq!(map.matched_columns(), 1);
  }

  #[test]
  fn no_recognized_columns_is_an_error() {
    let r = ColumnMap::from_headers(["a", "b", "c"]);
    assert!(matches!(r, Err(Error::NoRecognizedColumns)));
  }

  // ── Row parsing ────────────────────────────────────────────────────────

  #[test]
  fn full_row_populates_every_column() {
    let map = ColumnMap::from_headers(HEADERS).unwrap();
    let rec = parse_row(&map, &full_row()).unwrap();
    assert_eq!(rec.accident_index, "cell0");
    assert_eq!(rec.longitude, Some(3.5));
    assert_eq!(rec.accident_severity, Some(6));
    assert_eq!(rec.light_conditions, Some(24));
    assert_eq!(rec.lsoa, "cell31");
    for c in SOURCE_COLUMNS.iter().chain(&CLEAN_FLAG_COLUMNS) {
      assert_ne!(
        (c.get)(&rec),
        FieldValue::Null,
        "column {} should be bound",
        c.name
      );
    }
  }

  #[test]
  fn empty_and_null_cells_become_none() {
    let map = ColumnMap::from_headers(HEADERS).unwrap();
    let mut row = full_row();
    row[3] = String::new(); // Longitude
    row[6] = "NULL".to_string(); // Accident_Severity
    row[24] = "null".to_string(); // Light_Conditions
    let rec = parse_row(&map, &row).unwrap();
    assert_eq!(rec.longitude, None);
    assert_eq!(rec.accident_severity, None);
    assert_eq!(rec.light_conditions, None);
  }

  #[test]
  fn missing_column_yields_none_for_every_row() {
    let headers: Vec<&str> =
      HEADERS.iter().copied().filter(|h| *h != "Longitude").collect();
    let map = ColumnMap::from_headers(headers.iter().copied()).unwrap();
    let mut row = full_row();
    row.remove(3); // drop the Longitude cell so positions match the headers
    let rec = parse_row(&map, &row).unwrap();
    assert_eq!(rec.longitude, None);
  }

  #[test]
  fn garbage_numeric_cell_fails_the_row() {
    let map = ColumnMap::from_headers(HEADERS).unwrap();
    let mut row = full_row();
    row[7] = "three".to_string(); // Number_of_Vehicles
    let err = parse_row(&map, &row).unwrap_err();
    assert!(matches!(
      err,
      Error::InvalidField {
        column: "Number_of_Vehicles",
        ..
      }
    ));
  }

  // ── Cleaning ───────────────────────────────────────────────────────────

  #[test]
  fn date_canonicalization() {
    assert_eq!(canonical_date("21/02/2019"), "2019-02-21");
    assert_eq!(canonical_date("2019-02-21"), "2019-02-21");
    assert_eq!(canonical_date(" 1/1/2005 "), "2005-01-01");
    assert_eq!(canonical_date("not a date"), "not a date");
    assert_eq!(canonical_date(""), "");
  }

  #[test]
  fn fully_unlocated_row_is_dropped() {
    let rec = AccidentRecord::default();
    assert!(rec.clean().is_none());
  }

  #[test]
  fn partially_located_row_keeps_missing_flag() {
    let rec = AccidentRecord {
      longitude: Some(-1.9),
      ..AccidentRecord::default()
    };
    let cleaned = rec.clean().unwrap();
    assert!(cleaned.location_data_missing);
  }

  #[test]
  fn fully_located_row_clears_missing_flag() {
    let rec = AccidentRecord {
      location_easting_osgr: Some(406380.0),
      location_northing_osgr: Some(307355.0),
      longitude: Some(-1.9),
      latitude: Some(52.6),
      lsoa: "E01025476".to_string(),
      date: "21/02/2019".to_string(),
      ..AccidentRecord::default()
    };
    let cleaned = rec.clean().unwrap();
    assert!(!cleaned.location_data_missing);
    assert!(!cleaned.lsoa_missing);
    assert_eq!(cleaned.date, "2019-02-21");
  }

  #[test]
  fn empty_lsoa_sets_flag() {
    let rec = AccidentRecord {
      longitude: Some(-1.9),
      lsoa: "  ".to_string(),
      ..AccidentRecord::default()
    };
    assert!(rec.clean().unwrap().lsoa_missing);
  }
}
