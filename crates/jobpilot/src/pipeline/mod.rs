//! Staged application pipeline: discover, enrich, prepare, apply.
//!
//! Each stage is independently invokable and idempotent; the tracker is
//! the only shared state between stages.

pub mod error;
pub mod runner;

pub use error::PipelineError;
pub use runner::{BatchItem, DiscoverySummary, Pipeline};
