//! Dimension types for the gold layer.
//!
//! Dimension rows are versioned, never updated in place: when an observed
//! (code, description) combination differs from the active row, the active
//! row is closed out (`status` 0, `end_date` set) and a fresh active row is
//! inserted. Historical versions survive indefinitely. Which attributes are
//! tracked, and how codes map to descriptions, is declared once in the
//! static [`TRACKED_DIMENSIONS`] descriptor table; the refresh engine is one
//! generic routine driven by it.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ─── Status ──────────────────────────────────────────────────────────────────

/// Whether a dimension row is the current version for its code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DimensionStatus {
  /// The row facts join against. At most one per (attribute, code).
  Active,
  /// A closed-out historical version.
  Superseded,
}

impl DimensionStatus {
  pub fn is_active(&self) -> bool { matches!(self, Self::Active) }
}

// ─── Rows ────────────────────────────────────────────────────────────────────

/// One persisted, versioned dimension value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimensionRow {
  /// Surrogate key referenced by the fact table.
  pub dim_key:     i64,
  pub code:        i64,
  pub description: Option<String>,
  pub start_date:  NaiveDate,
  /// `None` while the row is active.
  pub end_date:    Option<NaiveDate>,
  pub status:      DimensionStatus,
}

/// Input for a dimension row about to be inserted as the new active version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDimensionRow {
  pub code:        i64,
  pub description: Option<String>,
  pub start_date:  NaiveDate,
}

impl NewDimensionRow {
  pub fn new(
    code: i64,
    description: Option<&str>,
    start_date: NaiveDate,
  ) -> Self {
    Self {
      code,
      description: description.map(str::to_string),
      start_date,
    }
  }
}

// ─── Descriptors ─────────────────────────────────────────────────────────────

/// Everything the refresh engine needs to know about one tracked attribute:
/// which silver column it reads, which dimension table it owns, which fact
/// column carries its key, and how codes map to descriptions.
pub struct DimensionSpec {
  /// Column name in the consolidated clean table.
  pub attribute: &'static str,
  /// Destination dimension table.
  pub table:     &'static str,
  /// Key column in the fact table.
  pub fact_key:  &'static str,
  /// Code → description pairs. Codes absent from the list get a null
  /// description rather than an error.
  pub lookup:    &'static [(i64, &'static str)],
}

impl DimensionSpec {
  /// Description for `code`, when the coding scheme defines one.
  pub fn describe(&self, code: i64) -> Option<&'static str> {
    self
      .lookup
      .iter()
      .find(|(c, _)| *c == code)
      .map(|(_, d)| *d)
  }
}

// ─── The seven tracked attributes ────────────────────────────────────────────

const ACCIDENT_SEVERITY: &[(i64, &str)] =
  &[(1, "Fatal"), (2, "Serious"), (3, "Slight")];

const DAY_OF_WEEK: &[(i64, &str)] = &[
  (1, "Sunday"),
  (2, "Monday"),
  (3, "Tuesday"),
  (4, "Wednesday"),
  (5, "Thursday"),
  (6, "Friday"),
  (7, "Saturday"),
];

const ROAD_TYPE: &[(i64, &str)] = &[
  (1, "Roundabout"),
  (2, "One way street"),
  (3, "Dual carriageway"),
  (6, "Single carriageway"),
  (7, "Slip road"),
  (9, "Unknown"),
  (12, "One way street/Slip road"),
];

const LIGHT_CONDITIONS: &[(i64, &str)] = &[
  (1, "Daylights"),
  (4, "Darkness with street lighting"),
  (5, "Darkness without street lighting"),
  (6, "Darkness with no lighting"),
  (7, "Darkness lighting unknown"),
];

const WEATHER_CONDITIONS: &[(i64, &str)] = &[
  (1, "Fine no high winds"),
  (2, "Raining no high winds"),
  (3, "Snowing no high winds"),
  (4, "Fine + high winds"),
  (5, "Raining + high winds"),
  (6, "Snowing + high winds"),
  (7, "Fog or mist"),
  (8, "Other"),
  (9, "Unknown"),
];

const ROAD_SURFACE: &[(i64, &str)] = &[
  (1, "Dry"),
  (2, "Wet or damp"),
  (3, "Snow"),
  (4, "Frost or ice"),
  (5, "Flood over 3cm. deep"),
  (6, "Oil or diesel"),
  (7, "Mud"),
];

const URBAN_RURAL: &[(i64, &str)] =
  &[(1, "Urban"), (2, "Rural"), (3, "Unallocated")];

/// The attributes the gold layer tracks, in fact-table column order.
pub static TRACKED_DIMENSIONS: [DimensionSpec; 7] = [
  DimensionSpec {
    attribute: "Accident_Severity",
    table:     "dim_accident_severity",
    fact_key:  "accident_severity_key",
    lookup:    ACCIDENT_SEVERITY,
  },
  DimensionSpec {
    attribute: "Day_of_Week",
    table:     "dim_day_of_week",
    fact_key:  "day_of_week_key",
    lookup:    DAY_OF_WEEK,
  },
  DimensionSpec {
    attribute: "Road_Type",
    table:     "dim_road_type",
    fact_key:  "road_type_key",
    lookup:    ROAD_TYPE,
  },
  DimensionSpec {
    attribute: "Light_Conditions",
    table:     "dim_light_conditions",
    fact_key:  "light_conditions_key",
    lookup:    LIGHT_CONDITIONS,
  },
  DimensionSpec {
    attribute: "Weather_Conditions",
    table:     "dim_weather_conditions",
    fact_key:  "weather_conditions_key",
    lookup:    WEATHER_CONDITIONS,
  },
  DimensionSpec {
    attribute: "Road_Surface_Conditions",
    table:     "dim_road_surface",
    fact_key:  "road_surface_key",
    lookup:    ROAD_SURFACE,
  },
  DimensionSpec {
    attribute: "Urban_or_Rural_Area",
    table:     "dim_urban_rural",
    fact_key:  "urban_rural_key",
    lookup:    URBAN_RURAL,
  },
];

// ─── Tests ───────────────────────────────────────────────────────────────────
