//! Core types and trait definitions for the milepost accident warehouse.
//!
//! This crate is deliberately free of SQL, filesystem, and HTTP dependencies.
//! All other crates depend on it; it depends on nothing proprietary.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod blob;
pub mod dimension;
pub mod error;
pub mod fact;
pub mod record;
pub mod runlog;
pub mod store;

pub use error::{Error, Result};
