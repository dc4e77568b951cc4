//! SQLite backend for the milepost warehouse.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! pool without blocking the async runtime. All three layers (raw tables,
//! the consolidated clean table, the dimensional gold tables) plus the run
//! log live in one database file.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteWarehouse;
