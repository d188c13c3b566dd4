use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use analysis_core::{
    BarTime, MarketDataProvider, MarketDataResult, MarketStatus, OhlcBar, ProviderConfig,
    Timeframe,
};
use async_trait::async_trait;
use chrono::{Datelike, Duration, Utc, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Symbols the simulated provider knows how to generate, with their
/// anchor prices.
const SUPPORTED_SYMBOLS: [(&str, f64); 6] = [
    ("DJI", 38_000.0),
    ("SPX", 5_000.0),
    ("NDX", 17_500.0),
    ("BTCUSD", 65_000.0),
    ("EURUSD", 1.08),
    ("GOLD", 2_300.0),
];

/// Always-available fallback provider generating synthetic OHLC data.
///
/// Runs at the end of the provider chain (priority 999, unlimited rate)
/// so acquisition can never fail for a supported symbol. The random walk
/// is seeded from the symbol, so repeated calls produce the same price
/// path for a given symbol and timeframe.
pub struct SimulatedProvider {
    config: ProviderConfig,
}

impl Default for SimulatedProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedProvider {
    pub fn new() -> Self {
        Self {
            config: ProviderConfig {
                name: "simulated".to_string(),
                priority: 999,
                rate_limit_per_hour: f64::INFINITY,
                requires_api_key: false,
                api_key: None,
            },
        }
    }

    fn base_price(symbol: &str) -> Option<f64> {
        SUPPORTED_SYMBOLS
            .iter()
            .find(|(s, _)| *s == symbol)
            .map(|(_, p)| *p)
    }

    fn seeded_rng(symbol: &str, timeframe: Timeframe) -> StdRng {
        let mut hasher = DefaultHasher::new();
        symbol.hash(&mut hasher);
        timeframe.as_str().hash(&mut hasher);
        StdRng::seed_from_u64(hasher.finish())
    }

    /// Bar times for `periods` bars ending now. Daily bars skip
    /// weekends, which leaves fewer bars than requested.
    fn bar_times(timeframe: Timeframe, periods: usize) -> Vec<BarTime> {
        let now = Utc::now();

        if timeframe.is_intraday() {
            let step = timeframe.bar_seconds();
            let end = now.timestamp() - now.timestamp() % step;
            return (0..periods)
                .map(|i| BarTime::Timestamp(end - (periods - 1 - i) as i64 * step))
                .collect();
        }

        let step_days = match timeframe {
            Timeframe::W1 => 7,
            Timeframe::Mo1 => 30,
            _ => 1,
        };

        (0..periods)
            .map(|i| now - Duration::days((periods - 1 - i) as i64 * step_days))
            .filter(|date| {
                timeframe != Timeframe::D1
                    || !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
            })
            .map(|date| BarTime::Date(date.format("%Y-%m-%d").to_string()))
            .collect()
    }

    fn generate_bars(symbol: &str, timeframe: Timeframe, periods: usize) -> Vec<OhlcBar> {
        let base = Self::base_price(symbol).unwrap_or(100.0);
        let mut rng = Self::seeded_rng(symbol, timeframe);
        let volatility = base * 0.008;

        let times = Self::bar_times(timeframe, periods);
        let mut close = base;

        times
            .into_iter()
            .map(|time| {
                let open = close;
                let drift: f64 = rng.gen_range(-1.0..1.0) * volatility;
                close = (open + drift).max(base * 0.1);

                let wick_up: f64 = rng.gen_range(0.0..0.5) * volatility;
                let wick_down: f64 = rng.gen_range(0.0..0.5) * volatility;
                let high = open.max(close) + wick_up;
                let low = (open.min(close) - wick_down).max(base * 0.05);

                let volume = rng.gen_range(1_000_000.0..5_000_000.0);

                OhlcBar {
                    time,
                    open,
                    high,
                    low,
                    close,
                    volume: Some(volume),
                }
            })
            .collect()
    }
}

#[async_trait]
impl MarketDataProvider for SimulatedProvider {
    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    async fn fetch_ohlc(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        periods: usize,
    ) -> MarketDataResult {
        if Self::base_price(symbol).is_none() {
            return MarketDataResult::from_error(format!("Unknown symbol: {symbol}"));
        }

        let bars = Self::generate_bars(symbol, timeframe, periods);
        MarketDataResult::from_success(bars, MarketStatus::simulated(), "simulated")
    }

    async fn is_available(&self) -> bool {
        true
    }
}
