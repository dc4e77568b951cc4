//! Stage drivers for the milepost pipeline.
//!
//! Three stages move yearly accident extracts through the warehouse:
//! [`bronze`] ingests raw CSV objects into per-file raw tables, [`silver`]
//! normalizes them into the consolidated clean table, [`gold`] refreshes the
//! versioned dimensions and rebuilds the fact table. Every stage invocation
//! writes exactly one run-log entry, success or failure, and queues operator
//! notifications that are delivered only after that entry has landed.

pub mod bronze;
pub mod config;
pub mod gold;
pub mod notify;
pub mod parse;
pub mod silver;

#[cfg(test)]
mod tests;

/// Failure of one unit of stage work (one object, one attribute). Stages
/// isolate these: the unit is reported and the stage moves on.
pub(crate) type UnitError = Box<dyn std::error::Error + Send + Sync>;
