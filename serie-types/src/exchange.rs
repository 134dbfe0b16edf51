use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::SerieError;

/// Page size used for exchanges that are not in the catalog.
pub const DEFAULT_PAGE_LIMIT: usize = 1000;

/// Exchanges with known pagination limits.
///
/// Sources for other venues can still be registered; they fall back to
/// [`DEFAULT_PAGE_LIMIT`] unless they override `page_limit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Exchange {
    /// Binance spot.
    Binance,
    /// Binance USDⓈ-M futures.
    BinanceUsdm,
    /// KuCoin spot.
    Kucoin,
    /// HitBTC.
    Hitbtc,
    /// Bitfinex.
    Bitfinex,
    /// Bitget.
    Bitget,
}

impl Exchange {
    /// All catalogued exchanges.
    pub const ALL: &'static [Self] = &[
        Self::Binance,
        Self::BinanceUsdm,
        Self::Kucoin,
        Self::Hitbtc,
        Self::Bitfinex,
        Self::Bitget,
    ];

    /// Lowercase exchange identifier, also used as the store directory name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Binance => "binance",
            Self::BinanceUsdm => "binanceusdm",
            Self::Kucoin => "kucoin",
            Self::Hitbtc => "hitbtc",
            Self::Bitfinex => "bitfinex",
            Self::Bitget => "bitget",
        }
    }

    /// Maximum number of candles the exchange returns per request.
    #[must_use]
    pub const fn page_limit(self) -> usize {
        match self {
            Self::Kucoin => 1500,
            Self::Bitfinex => 10_000,
            Self::Binance | Self::BinanceUsdm | Self::Hitbtc | Self::Bitget => 1000,
        }
    }

    /// Page limit for an arbitrary exchange identifier.
    #[must_use]
    pub fn page_limit_for(name: &str) -> usize {
        name.parse::<Self>()
            .map_or(DEFAULT_PAGE_LIMIT, Self::page_limit)
    }
}

impl FromStr for Exchange {
    type Err = SerieError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|e| e.as_str() == lower)
            .ok_or_else(|| SerieError::unknown_exchange(s))
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
