//! The `Container` trait — the blob/file storage collaborator.
//!
//! A container holds the yearly extract objects plus per-object string
//! metadata. The pipeline uses metadata for its idempotency markers
//! (`Processed=<UTC timestamp>` after bronze, `Cleaned=<UTC timestamp>`
//! after silver); the storage layer itself attaches no meaning to keys.

use std::{collections::HashMap, future::Future};

/// Per-object metadata: free-form string pairs.
pub type ObjectMetadata = HashMap<String, String>;

/// Abstraction over one container of source objects.
pub trait Container: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Names of all objects in the container, in stable (sorted) order.
  fn list_objects(
    &self,
  ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + '_;

  /// Full content of one object.
  fn read_object(
    &self,
    name: String,
  ) -> impl Future<Output = Result<Vec<u8>, Self::Error>> + Send + '_;

  /// Metadata of one object; empty map when none has been set.
  fn object_metadata(
    &self,
    name: String,
  ) -> impl Future<Output = Result<ObjectMetadata, Self::Error>> + Send + '_;

  /// Set (or overwrite) one metadata pair on an object.
  fn set_object_metadata(
    &self,
    name: String,
    key: String,
    value: String,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}
