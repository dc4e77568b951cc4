//! Pipeline configuration.
//!
//! Every field deserializes with a default so loading never fails on a
//! missing key; [`PipelineConfig::validate`] then reports all missing
//! required values at once, by name, before any stage touches a
//! collaborator.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("missing required configuration: {}", missing.join(", "))]
pub struct ConfigError {
  pub missing: Vec<&'static str>,
}

/// Runtime configuration for all stages.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
  /// Path of the SQLite warehouse database. Required.
  pub database_path:    String,
  /// Directory holding the blob containers. Required.
  pub storage_root:     String,
  /// Container the yearly extracts arrive in. Required.
  pub source_container: String,
  /// API key for the notification service. Required.
  pub notify_api_key:   String,
  /// Notification service endpoint.
  pub notify_endpoint:  String,
  /// Sender address on notification mail.
  pub notify_from:      String,
  /// Recipient address for operator notifications.
  pub notify_to:        String,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self {
      database_path:    String::new(),
      storage_root:     String::new(),
      source_container: String::new(),
      notify_api_key:   String::new(),
      notify_endpoint:  "https://api.sendgrid.com/v3/mail/send".to_string(),
      notify_from:      "milepost@localhost".to_string(),
      notify_to:        "ops@localhost".to_string(),
    }
  }
}

impl PipelineConfig {
  /// Checks the required fields, reporting every missing one.
  pub fn validate(&self) -> Result<(), ConfigError> {
    let mut missing = Vec::new();
    if self.database_path.is_empty() {
      missing.push("database_path");
    }
    if self.storage_root.is_empty() {
      missing.push("storage_root");
    }
    if self.source_container.is_empty() {
      missing.push("source_container");
    }
    if self.notify_api_key.is_empty() {
      missing.push("notify_api_key");
    }
    if missing.is_empty() {
      Ok(())
    } else {
      Err(ConfigError { missing })
    }
  }

  /// Directory of the source container under the storage root.
  pub fn source_container_path(&self) -> PathBuf {
    Path::new(&self.storage_root).join(&self.source_container)
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  fn complete() -> PipelineConfig {
    PipelineConfig {
      database_path:    "/var/lib/milepost/warehouse.db".to_string(),
      storage_root:     "/var/lib/milepost/storage".to_string(),
      source_container: "accident-extracts".to_string(),
      notify_api_key:   "SG.test".to_string(),
      ..Default::default()
    }
  }

  #[test]
  fn complete_config_validates() {
    assert!(complete().validate().is_ok());
  }

  #[test]
  fn every_missing_field_is_reported_at_once() {
    let err = PipelineConfig::default().validate().unwrap_err();
    assert_eq!(err.missing, vec![
      "database_path",
      "storage_root",
      "source_container",
      "notify_api_key",
    ]);

    let mut partial = complete();
    partial.storage_root.clear();
    partial.notify_api_key.clear();
    let err = partial.validate().unwrap_err();
    assert_eq!(err.missing, vec!["storage_root", "notify_api_key"]);
    assert!(err.to_string().contains("storage_root, notify_api_key"));
  }

  #[test]
  fn optional_fields_have_working_defaults() {
    let config = complete();
    assert!(config.notify_endpoint.starts_with("https://"));
    assert!(!config.notify_from.is_empty());
    assert!(!config.notify_to.is_empty());
    assert_eq!(
      config.source_container_path(),
      Path::new("/var/lib/milepost/storage/accident-extracts")
    );
  }
}
