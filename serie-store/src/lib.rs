//! serie-store
//!
//! Implementations of [`serie_core::SeriesStore`]:
//! - [`CsvStore`]: one CSV file per series under a root directory.
//! - [`MemoryStore`]: process-local maps, for tests and demos.
#![warn(missing_docs)]

mod csv_store;
/// On-disk layout of [`CsvStore`] files.
pub mod layout;
mod memory;

pub use csv_store::CsvStore;
pub use memory::MemoryStore;
