//! serie-core
//!
//! Core types, traits, and utilities shared across the serie workspace.
//!
//! - `types`: common data structures (candles, series keys, windows, reports).
//! - `connector`: the `CandleSource` trait every exchange adapter implements.
//! - `store`: the `SeriesStore` trait every persistence backend implements.
//! - `middleware`: the `Middleware` trait implemented by source wrappers.
//! - `timeseries`: helpers to merge pages and inspect stored series.
#![warn(missing_docs)]

/// The remote candle source contract.
pub mod connector;
/// Middleware trait implemented by source wrappers.
pub mod middleware;
/// The series store contract.
pub mod store;
/// Time-series utilities for merging pages and finding gaps.
pub mod timeseries;
pub mod types;

pub use connector::CandleSource;
pub use middleware::Middleware;
pub use store::SeriesStore;
pub use timeseries::gaps::find_gaps;
pub use timeseries::merge::{
    count_revisions, first_disorder, is_strictly_increasing, merge_pages, merge_pages_within,
    retain_newer,
};
pub use types::*;
