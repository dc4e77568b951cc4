//! The fact read model.
//!
//! The fact table itself is rebuilt set-wise inside the store (truncate plus
//! one multi-way join insert); this type only materializes rows back out for
//! reporting and verification.

use serde::{Deserialize, Serialize};

/// One accident event joined to the active version of all seven tracked
/// dimensions, plus untransformed pass-through measures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactRow {
  pub accident_index: String,
  pub accident_severity_key: i64,
  pub day_of_week_key: i64,
  pub road_type_key: i64,
  pub light_conditions_key: i64,
  pub weather_conditions_key: i64,
  pub road_surface_key: i64,
  pub urban_rural_key: i64,
  pub longitude: Option<f64>,
  pub latitude: Option<f64>,
  pub local_authority_district: Option<i64>,
  pub local_authority_highway: String,
  pub date: String,
  pub time: String,
  pub number_of_vehicles: Option<i64>,
  pub number_of_casualties: Option<i64>,
  pub speed_limit: Option<i64>,
}

impl FactRow {
  /// The seven dimension keys, in [`TRACKED_DIMENSIONS`] order.
  ///
  /// [`TRACKED_DIMENSIONS`]: crate::dimension::TRACKED_DIMENSIONS
  pub fn dimension_keys(&self) -> [i64; 7] {
    [
      self.accident_severity_key,
      self.day_of_week_key,
      self.road_type_key,
      self.light_conditions_key,
      self.weather_conditions_key,
      self.road_surface_key,
      self.urban_rural_key,
    ]
  }
}
