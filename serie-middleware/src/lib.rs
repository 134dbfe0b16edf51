//! serie-middleware
//!
//! Wrappers around [`CandleSource`](serie_core::CandleSource) implementations:
//! - [`RateLimitedSource`]: token bucket shared by every caller of one exchange.
//! - [`CooldownSource`]: pauses all calls after the exchange signals throttling.
//! - [`TimeoutSource`]: bounds each remote call.
//! - [`SourceBuilder`]: composes layers in a fixed onion order.
#![warn(missing_docs)]

mod builder;
mod cooldown;
mod rate_limit;
mod timeout;

pub use crate::builder::SourceBuilder;
pub use crate::cooldown::{CooldownMiddleware, CooldownSource, DEFAULT_COOLDOWN};
pub use crate::rate_limit::{RateLimitMiddleware, RateLimitedSource, RateLimiter};
pub use crate::timeout::{TimeoutMiddleware, TimeoutSource};
