use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use serie_core::{Candle, CandleSource, Interval, SerieError};

use crate::MockExchange;

/// Instruction for how a call should behave.
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Serve synthetic data from the underlying [`MockExchange`].
    Generate,
    /// Return these candles (those at or after `since`, up to `limit`).
    Return(Vec<Candle>),
    /// Fail immediately with the provided error.
    Fail(SerieError),
    /// Fail the next `n` matching calls, then behave like [`Generate`](Self::Generate).
    FailTimes(u32, SerieError),
    /// Sleep, then behave like [`Generate`](Self::Generate).
    Delay(Duration),
    /// Hang indefinitely (simulate a stalled connection).
    Hang,
}

/// One recorded `fetch_candles` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchCall {
    /// Requested symbol.
    pub symbol: String,
    /// Requested interval.
    pub interval: Interval,
    /// Requested start (ms).
    pub since: i64,
    /// Requested candle count.
    pub limit: usize,
}

#[derive(Default)]
struct InternalState {
    symbol_rules: HashMap<String, MockBehavior>,
    window_rules: HashMap<(String, i64), MockBehavior>,
    calls: Vec<FetchCall>,
}

impl InternalState {
    /// Resolve the behavior for a call, consuming one failure of a `FailTimes` rule.
    fn next_behavior(&mut self, symbol: &str, since: i64) -> MockBehavior {
        let window_key = (symbol.to_string(), since);
        let rule = match self.window_rules.get_mut(&window_key) {
            Some(rule) => Some(rule),
            None => self.symbol_rules.get_mut(symbol),
        };
        match rule {
            Some(MockBehavior::FailTimes(remaining, err)) => {
                if *remaining == 0 {
                    MockBehavior::Generate
                } else {
                    *remaining -= 1;
                    MockBehavior::Fail(err.clone())
                }
            }
            Some(other) => other.clone(),
            None => MockBehavior::Generate,
        }
    }
}

/// Controller handle used by tests to drive the dynamic mock from the outside.
pub struct DynamicMockController {
    state: Arc<Mutex<InternalState>>,
}

impl DynamicMockController {
    /// Set the behavior for every call on `symbol` without a window rule.
    pub async fn set_symbol_behavior(&self, symbol: impl Into<String>, behavior: MockBehavior) {
        let mut guard = self.state.lock().await;
        guard.symbol_rules.insert(symbol.into(), behavior);
    }

    /// Set the behavior for calls on `symbol` starting exactly at `since`.
    ///
    /// Window rules take precedence over symbol rules.
    pub async fn set_window_behavior(
        &self,
        symbol: impl Into<String>,
        since: i64,
        behavior: MockBehavior,
    ) {
        let mut guard = self.state.lock().await;
        guard.window_rules.insert((symbol.into(), since), behavior);
    }

    /// Copy of every call received so far, in arrival order.
    pub async fn calls(&self) -> Vec<FetchCall> {
        let guard = self.state.lock().await;
        guard.calls.clone()
    }

    /// Calls received for `symbol`.
    pub async fn calls_for(&self, symbol: &str) -> Vec<FetchCall> {
        let guard = self.state.lock().await;
        guard
            .calls
            .iter()
            .filter(|c| c.symbol == symbol)
            .cloned()
            .collect()
    }

    /// Forget the call log.
    pub async fn clear_calls(&self) {
        let mut guard = self.state.lock().await;
        guard.calls.clear();
    }

    /// Clear all configured behaviors and the call log.
    pub async fn clear_all_behaviors(&self) {
        let mut guard = self.state.lock().await;
        guard.symbol_rules.clear();
        guard.window_rules.clear();
        guard.calls.clear();
    }
}

/// A source that serves [`MockExchange`] data unless a controller rule says otherwise.
pub struct DynamicMockSource {
    base: MockExchange,
    state: Arc<Mutex<InternalState>>,
}

impl DynamicMockSource {
    /// Create a dynamic source over `base` and its controller.
    #[must_use]
    pub fn new_with_controller(base: MockExchange) -> (Arc<dyn CandleSource>, DynamicMockController) {
        let state = Arc::new(Mutex::new(InternalState::default()));
        let controller = DynamicMockController {
            state: Arc::clone(&state),
        };
        let me = Arc::new(Self { base, state });
        (me as Arc<dyn CandleSource>, controller)
    }
}

#[async_trait]
impl CandleSource for DynamicMockSource {
    fn name(&self) -> &'static str {
        self.base.name()
    }

    fn page_limit(&self) -> usize {
        self.base.page_limit()
    }

    fn supported_intervals(&self) -> &'static [Interval] {
        self.base.supported_intervals()
    }

    async fn fetch_candles(
        &self,
        symbol: &str,
        interval: Interval,
        since: i64,
        limit: usize,
    ) -> Result<Vec<Candle>, SerieError> {
        // Record and resolve without holding the lock across await points
        let behavior = {
            let mut guard = self.state.lock().await;
            guard.calls.push(FetchCall {
                symbol: symbol.to_string(),
                interval,
                since,
                limit,
            });
            guard.next_behavior(symbol, since)
        };
        match behavior {
            MockBehavior::Generate | MockBehavior::FailTimes(..) => {
                self.base.fetch_candles(symbol, interval, since, limit).await
            }
            MockBehavior::Return(candles) => Ok(candles
                .into_iter()
                .filter(|c| c.ts >= since)
                .take(limit)
                .collect()),
            MockBehavior::Fail(err) => Err(err),
            MockBehavior::Delay(d) => {
                tokio::time::sleep(d).await;
                self.base.fetch_candles(symbol, interval, since, limit).await
            }
            MockBehavior::Hang => std::future::pending().await,
        }
    }
}
