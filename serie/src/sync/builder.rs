use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serie_core::{Interval, SerieError, SyncResult};

use crate::core::Serie;

/// Builder for one sync run over several symbols and intervals of an exchange.
pub struct SyncBuilder<'a> {
    pub(crate) serie: &'a Serie,
    pub(crate) exchange: &'a str,
    pub(crate) symbols: Vec<String>,
    pub(crate) intervals: Vec<Interval>,
    pub(crate) start: Option<DateTime<Utc>>,
    pub(crate) end: Option<DateTime<Utc>>,
}

impl<'a> SyncBuilder<'a> {
    /// Create a new builder bound to a `Serie` instance.
    ///
    /// Behavior:
    /// - Starts with no symbols and no intervals.
    /// - `start` defaults to `SyncConfig::default_start`, `end` to the time of `run()`.
    #[must_use]
    pub const fn new(serie: &'a Serie, exchange: &'a str) -> Self {
        Self {
            serie,
            exchange,
            symbols: Vec::new(),
            intervals: Vec::new(),
            start: None,
            end: None,
        }
    }

    /// Replace the symbols list.
    ///
    /// # Errors
    /// Returns an error if the list contains the same symbol twice.
    pub fn symbols<S: AsRef<str>>(mut self, symbols: &[S]) -> Result<Self, SerieError> {
        let mut seen = HashSet::new();
        for s in symbols {
            let symbol = s.as_ref();
            if !seen.insert(symbol) {
                return Err(SerieError::InvalidArg(format!(
                    "duplicate symbol '{symbol}' in symbols list"
                )));
            }
        }
        self.symbols = symbols.iter().map(|s| s.as_ref().to_string()).collect();
        Ok(self)
    }

    /// Add a single symbol.
    ///
    /// # Errors
    /// Returns an error if the symbol is already in the list.
    pub fn add_symbol(mut self, symbol: impl Into<String>) -> Result<Self, SerieError> {
        let symbol = symbol.into();
        if self.symbols.contains(&symbol) {
            return Err(SerieError::InvalidArg(format!(
                "duplicate symbol '{symbol}' already exists in symbols list"
            )));
        }
        self.symbols.push(symbol);
        Ok(self)
    }

    /// Replace the intervals list from interval names.
    ///
    /// # Errors
    /// Returns `UnknownInterval` for names outside the catalog and
    /// `InvalidArg` for duplicates.
    pub fn intervals<I: AsRef<str>>(mut self, names: &[I]) -> Result<Self, SerieError> {
        let mut parsed = Vec::with_capacity(names.len());
        for name in names {
            let iv = Interval::parse(name.as_ref())?;
            if parsed.contains(&iv) {
                return Err(SerieError::InvalidArg(format!(
                    "duplicate interval '{iv}' in intervals list"
                )));
            }
            parsed.push(iv);
        }
        self.intervals = parsed;
        Ok(self)
    }

    /// Add a single interval; duplicates are ignored.
    #[must_use]
    pub fn interval(mut self, interval: Interval) -> Self {
        if !self.intervals.contains(&interval) {
            self.intervals.push(interval);
        }
        self
    }

    /// Backfill start for series without records.
    #[must_use]
    pub const fn start(mut self, start: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self
    }

    /// Exclusive target end.
    #[must_use]
    pub const fn end(mut self, end: DateTime<Utc>) -> Self {
        self.end = Some(end);
        self
    }

    /// Execute the run. See [`Serie::sync`].
    ///
    /// # Errors
    /// Same configuration errors as [`Serie::sync`].
    pub async fn run(self) -> Result<Vec<SyncResult>, SerieError> {
        let start = self.start.unwrap_or(self.serie.cfg.default_start);
        let end = self.end.unwrap_or_else(Utc::now);
        self.serie
            .sync_series(self.exchange, &self.symbols, &self.intervals, start, end)
            .await
    }
}
