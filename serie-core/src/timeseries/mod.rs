//! Time-series utilities shared by stores and the orchestrator.
//!
//! Modules include:
//! - `gaps`: report holes in a stored series
//! - `merge`: merge fetched pages, prepare append batches, count revisions
/// Gap detection over loaded series.
pub mod gaps;
/// Merge utilities for joining paginated fetch results.
pub mod merge;
