//! Filesystem-backed [`Container`] implementation.
//!
//! Objects are plain files directly under the container root. Per-object
//! metadata lives in JSON sidecars under a `.meta/` subdirectory so the
//! pipeline's idempotency markers survive across processes without touching
//! the object bytes. Dotfiles and subdirectories are invisible to listing.
//!
//! [`Container`]: milepost_core::blob::Container

mod container;
pub mod error;

pub use container::FsContainer;
pub use error::{Error, Result};
