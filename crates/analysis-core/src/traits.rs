use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    AnalysisError, IngestionStatus, MarketDataResult, OhlcBar, ProviderConfig, Timeframe,
};

/// Contract for pluggable market data sources.
///
/// Success semantics: `data` non-empty, ascending chronological order,
/// every bar internally valid. Any other outcome is a failure result the
/// service recovers from by falling through to the next provider.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    fn config(&self) -> &ProviderConfig;

    fn name(&self) -> &str {
        &self.config().name
    }

    fn priority(&self) -> u32 {
        self.config().priority
    }

    async fn fetch_ohlc(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        periods: usize,
    ) -> MarketDataResult;

    async fn is_available(&self) -> bool;
}

/// Contract for the optional persistence backend.
///
/// Implementations live outside the core. Upsert semantics: uniqueness by
/// `(symbol, timeframe, bar_time)`; on conflict the OHLCV fields and
/// provider are overwritten.
#[async_trait]
pub trait PersistenceStore: Send + Sync {
    async fn get_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        limit: Option<usize>,
    ) -> Result<Vec<OhlcBar>, AnalysisError>;

    async fn store_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        bars: &[OhlcBar],
        provider: &str,
    ) -> Result<(), AnalysisError>;

    async fn get_available_symbols(&self) -> Result<Vec<String>, AnalysisError>;

    async fn get_available_timeframes(
        &self,
        symbol: &str,
    ) -> Result<Vec<Timeframe>, AnalysisError>;

    async fn get_time_range(
        &self,
        symbol: &str,
        timeframe: Timeframe,
    ) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>, AnalysisError>;

    async fn get_ingestion_status(
        &self,
        symbol: &str,
        timeframe: Timeframe,
    ) -> Result<IngestionStatus, AnalysisError>;
}
