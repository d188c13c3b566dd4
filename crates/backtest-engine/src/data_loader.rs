use std::collections::HashMap;
use std::sync::Arc;

use analysis_core::{AnalysisError, OhlcBar, PersistenceStore, Timeframe};
use chrono::{DateTime, Utc};
use market_data::MarketDataService;
use tokio::sync::Mutex;
use tracing::debug;

const MAX_FETCH_PERIODS: usize = 1_000;

/// Loads and caches historical data for backtesting.
///
/// Full series are cached per `symbol:timeframe`; callers get date-range
/// slices. Sources are tried in order: cache, persistence, market data
/// service.
pub struct DataLoader {
    persistence: Option<Arc<dyn PersistenceStore>>,
    market_service: Option<Arc<MarketDataService>>,
    cache: Mutex<HashMap<String, Vec<OhlcBar>>>,
}

impl DataLoader {
    pub fn new(
        persistence: Option<Arc<dyn PersistenceStore>>,
        market_service: Option<Arc<MarketDataService>>,
    ) -> Self {
        Self {
            persistence,
            market_service,
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn cache_key(symbol: &str, timeframe: Timeframe) -> String {
        format!("{symbol}:{timeframe}")
    }

    /// Load bars for `[start_date, end_date]`, ascending by time.
    pub async fn load_data(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
    ) -> Result<Vec<OhlcBar>, AnalysisError> {
        let key = Self::cache_key(symbol, timeframe);

        if let Some(bars) = self.cache.lock().await.get(&key) {
            return Ok(filter_bars_by_range(bars, start_date, end_date));
        }

        if let Some(store) = &self.persistence {
            match store
                .get_bars(symbol, timeframe, Some(start_date), Some(end_date), None)
                .await
            {
                Ok(bars) if !bars.is_empty() => {
                    debug!(%symbol, %timeframe, count = bars.len(), "loaded from persistence");
                    self.cache.lock().await.insert(key, bars.clone());
                    return Ok(filter_bars_by_range(&bars, start_date, end_date));
                }
                Ok(_) => {}
                Err(_) => {
                    // Fall through to the market service
                }
            }
        }

        if let Some(service) = &self.market_service {
            let periods = estimate_periods(timeframe, start_date, end_date);
            let result = service.get_ohlc(symbol, timeframe, periods, false).await;
            if result.success && !result.data.is_empty() {
                debug!(%symbol, %timeframe, count = result.data.len(), "loaded from market service");
                self.cache.lock().await.insert(key, result.data.clone());
                return Ok(filter_bars_by_range(&result.data, start_date, end_date));
            }
        }

        Err(AnalysisError::InvalidArgument(format!(
            "No data source available for {symbol} {timeframe}"
        )))
    }

    /// Number of bars in the range.
    pub async fn get_bar_count(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
    ) -> Result<usize, AnalysisError> {
        Ok(self
            .load_data(symbol, timeframe, start_date, end_date)
            .await?
            .len())
    }

    /// Seed the cache directly, bypassing all sources.
    pub async fn preload(&self, symbol: &str, timeframe: Timeframe, bars: Vec<OhlcBar>) {
        self.cache
            .lock()
            .await
            .insert(Self::cache_key(symbol, timeframe), bars);
    }

    pub async fn clear_cache(&self) {
        self.cache.lock().await.clear();
    }
}

/// Approximate request size for a date range, capped at 1000 bars.
fn estimate_periods(
    timeframe: Timeframe,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
) -> usize {
    let days = (end_date - start_date).num_days().max(0) as usize;
    let periods = match timeframe {
        Timeframe::Mo1 => days / 30 + 12,
        Timeframe::W1 => days / 7 + 10,
        Timeframe::D1 => days + 10,
        Timeframe::H4 => days * 6 + 10,
        Timeframe::H1 => days * 24 + 10,
        _ => days * 24 * 4 + 10,
    };
    periods.min(MAX_FETCH_PERIODS)
}

/// Bars whose time parses inside `[start, end]`, sorted ascending.
pub fn filter_bars_by_range(
    bars: &[OhlcBar],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Vec<OhlcBar> {
    let mut filtered: Vec<OhlcBar> = bars
        .iter()
        .filter(|bar| {
            bar.time
                .as_datetime()
                .is_some_and(|t| t >= start && t <= end)
        })
        .cloned()
        .collect();
    filtered.sort_by_key(|bar| bar.time.as_timestamp().unwrap_or(i64::MIN));
    filtered
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::BarTime;
    use chrono::TimeZone;

    fn day_bar(day: u32) -> OhlcBar {
        OhlcBar {
            time: BarTime::Date(format!("2024-01-{day:02}")),
            open: 100.0,
            high: 101.0,
            low: 99.0,
            close: 100.5,
            volume: None,
        }
    }

    fn date(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()
    }

    #[test]
    fn range_filter_keeps_inclusive_bounds_sorted() {
        let bars = vec![day_bar(5), day_bar(1), day_bar(3), day_bar(10)];
        let filtered = filter_bars_by_range(&bars, date(1), date(5));

        let days: Vec<String> = filtered
            .iter()
            .map(|b| match &b.time {
                BarTime::Date(s) => s.clone(),
                BarTime::Timestamp(t) => t.to_string(),
            })
            .collect();
        assert_eq!(days, vec!["2024-01-01", "2024-01-03", "2024-01-05"]);
    }

    #[test]
    fn period_estimates_scale_with_timeframe_and_cap() {
        let start = date(1);
        let end = date(31);
        assert_eq!(estimate_periods(Timeframe::D1, start, end), 40);
        assert_eq!(estimate_periods(Timeframe::H4, start, end), 190);
        assert_eq!(estimate_periods(Timeframe::M5, start, end), 1_000);
    }

    #[tokio::test]
    async fn preloaded_data_is_served_and_filtered() {
        let loader = DataLoader::new(None, None);
        loader
            .preload("DJI", Timeframe::D1, vec![day_bar(1), day_bar(15), day_bar(30)])
            .await;

        let bars = loader
            .load_data("DJI", Timeframe::D1, date(10), date(20))
            .await
            .unwrap();

        assert_eq!(bars.len(), 1);
    }

    #[tokio::test]
    async fn no_source_is_an_invalid_argument() {
        let loader = DataLoader::new(None, None);
        let err = loader
            .load_data("DJI", Timeframe::D1, date(1), date(10))
            .await
            .unwrap_err();

        assert!(matches!(err, AnalysisError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn market_service_backfills_when_persistence_is_absent() {
        use market_data::{MarketDataConfig, SimulatedProvider};

        let service = Arc::new(MarketDataService::with_providers(
            MarketDataConfig::default(),
            vec![Arc::new(SimulatedProvider::new())],
        ));
        let loader = DataLoader::new(None, Some(service));

        // Simulated intraday data ends now, so query a recent window
        let end = Utc::now();
        let start = end - chrono::Duration::days(2);
        let bars = loader
            .load_data("DJI", Timeframe::H1, start, end)
            .await
            .unwrap();

        assert!(!bars.is_empty());
    }
}
