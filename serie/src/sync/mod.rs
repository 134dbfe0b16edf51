//! Gap detection, window scheduling and per-series orchestration.

pub mod builder;
pub mod gap;
mod orchestrator;
pub mod scheduler;
pub mod util;
pub mod window;
