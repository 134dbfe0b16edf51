//! Builder for composing candle sources with middleware layers.
//!
//! # Middleware Ordering Convention
//!
//! Layers form an "onion" around the raw source:
//!
//! ```text
//! Fetch Scheduler
//!     ↓
//! Outermost Middleware (e.g., Cooldown - waits first, observes errors last)
//!     ↓
//! Inner Middleware (e.g., RateLimit - takes a token per call)
//!     ↓
//! Timeout (always innermost, bounds only the remote call)
//!     ↓
//! Raw Source (the exchange adapter)
//! ```
//!
//! The `layers` vector stores middleware **outermost-first** (last added =
//! outermost) and applies it in reverse during [`SourceBuilder::build`]:
//!
//! ```text
//! builder.with_timeout(..).with_rate_limit(..).with_cooldown(..)
//!
//! Storage: [Cooldown, RateLimit], timeout kept apart
//! Applied:  Raw -> Timeout -> RateLimit -> Cooldown
//! Result:   Cooldown(RateLimit(Timeout(Raw)))
//! ```
//!
//! This matches [`MiddlewareStack`](serie_core::MiddlewareStack), where
//! `layers[0]` is the outermost layer.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use serie_core::{CandleSource, Middleware, MiddlewareLayer, MiddlewareStack, RateLimitConfig};

use crate::cooldown::CooldownMiddleware;
use crate::rate_limit::RateLimitMiddleware;
use crate::timeout::TimeoutMiddleware;

const RATE_LIMIT: &str = "RateLimitedSource";
const COOLDOWN: &str = "CooldownSource";

/// Composes a raw source with layered wrappers.
///
/// See [module-level documentation](self) for the ordering rules.
pub struct SourceBuilder {
    raw: Arc<dyn CandleSource>,
    /// Layers in outermost-first order.
    layers: Vec<Box<dyn Middleware>>,
    timeout: Option<Duration>,
}

impl SourceBuilder {
    /// Start from a raw, unwrapped source.
    #[must_use]
    pub fn new(raw: Arc<dyn CandleSource>) -> Self {
        Self {
            raw,
            layers: Vec::new(),
            timeout: None,
        }
    }

    /// Add or replace the rate limit, as the outermost layer.
    #[must_use]
    pub fn with_rate_limit(mut self, cfg: &RateLimitConfig) -> Self {
        self.layers.retain(|m| m.name() != RATE_LIMIT);
        self.layers
            .insert(0, Box::new(RateLimitMiddleware::new(cfg.clone())));
        self
    }

    /// Add or replace the throttling cooldown, as the outermost layer.
    #[must_use]
    pub fn with_cooldown(mut self, default_cooldown: Duration) -> Self {
        self.layers.retain(|m| m.name() != COOLDOWN);
        self.layers
            .insert(0, Box::new(CooldownMiddleware::new(default_cooldown)));
        self
    }

    /// Bound every call to the raw source. Replaces any earlier timeout.
    ///
    /// The timeout always wraps the raw source directly, whatever the order of
    /// the builder calls, so waiting for a token or a cooldown never expires it.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Snapshot of the configured stack, outermost first, raw source last.
    #[must_use]
    pub fn describe(&self) -> MiddlewareStack {
        let mut stack = MiddlewareStack::default();
        for layer in &self.layers {
            stack.push_inner(MiddlewareLayer::new(layer.name(), layer.config_json()));
        }
        if let Some(timeout) = self.timeout {
            let layer = TimeoutMiddleware::new(timeout);
            stack.push_inner(MiddlewareLayer::new(layer.name(), layer.config_json()));
        }
        stack.push_inner(MiddlewareLayer::new(
            "RawSource",
            json!({ "name": self.raw.name() }),
        ));
        stack
    }

    /// Apply the layers innermost first and return the wrapped source.
    #[must_use]
    pub fn build(self) -> Arc<dyn CandleSource> {
        let mut acc: Arc<dyn CandleSource> = Arc::clone(&self.raw);
        if let Some(timeout) = self.timeout {
            acc = Box::new(TimeoutMiddleware::new(timeout)).apply(acc);
        }
        for m in self.layers.into_iter().rev() {
            acc = m.apply(acc);
        }
        acc
    }
}
