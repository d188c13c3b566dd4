use std::sync::Arc;

use analysis_core::{
    MarketDataProvider, MarketDataResult, PersistenceStore, ProviderStatus, Timeframe,
};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cache::MarketDataCache;
use crate::config::MarketDataConfig;
use crate::providers::{SimulatedProvider, YahooProvider};
use crate::rate_limiter::RateLimiter;

/// Orchestrates market data fetching with caching, rate limiting, and
/// provider fallback.
///
/// Data sources are consulted in order: in-memory cache, the persistence
/// backend (when enabled), then providers by ascending priority. The
/// simulated provider at the end of the chain means acquisition cannot
/// fail for supported symbols.
pub struct MarketDataService {
    cache: Mutex<MarketDataCache>,
    rate_limiter: Mutex<RateLimiter>,
    providers: Vec<Arc<dyn MarketDataProvider>>,
    persistence: Option<Arc<dyn PersistenceStore>>,
    use_db: bool,
    config: MarketDataConfig,
}

impl MarketDataService {
    /// Service with the default provider chain (yahoo, then simulated).
    pub fn new(config: MarketDataConfig) -> Self {
        Self::with_providers(
            config,
            vec![
                Arc::new(YahooProvider::new()),
                Arc::new(SimulatedProvider::new()),
            ],
        )
    }

    pub fn with_providers(
        config: MarketDataConfig,
        mut providers: Vec<Arc<dyn MarketDataProvider>>,
    ) -> Self {
        providers.sort_by_key(|p| p.priority());
        Self {
            cache: Mutex::new(MarketDataCache::new()),
            rate_limiter: Mutex::new(RateLimiter::new()),
            providers,
            persistence: None,
            use_db: false,
            config,
        }
    }

    /// Enable the persistence backend as a read-through/write-back tier.
    pub fn with_persistence(mut self, store: Arc<dyn PersistenceStore>, use_db: bool) -> Self {
        self.use_db = use_db;
        self.persistence = Some(store);
        self
    }

    pub fn providers(&self) -> &[Arc<dyn MarketDataProvider>] {
        &self.providers
    }

    /// Fetch OHLC data. Equivalent to [`Self::get_ohlc_cancellable`] with
    /// a token that never fires.
    pub async fn get_ohlc(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        periods: usize,
        force_refresh: bool,
    ) -> MarketDataResult {
        self.get_ohlc_cancellable(
            symbol,
            timeframe,
            periods,
            force_refresh,
            &CancellationToken::new(),
        )
        .await
    }

    /// Fetch OHLC data, checking `cancel` at each I/O boundary.
    pub async fn get_ohlc_cancellable(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        periods: usize,
        force_refresh: bool,
        cancel: &CancellationToken,
    ) -> MarketDataResult {
        let symbol = self.config.resolve_symbol(symbol).to_string();

        if cancel.is_cancelled() {
            return MarketDataResult::from_error("Operation cancelled");
        }

        // 1. Cache (unless force refresh)
        if !force_refresh {
            if let Some(hit) = self.cache.lock().await.get(&symbol, timeframe) {
                debug!(%symbol, %timeframe, "cache hit");
                return hit;
            }
        }

        // 2. Persistence (unless force refresh)
        if self.use_db && !force_refresh {
            if let Some(result) = self.read_from_db(&symbol, timeframe, periods).await {
                self.cache
                    .lock()
                    .await
                    .set(&symbol, timeframe, result.clone());
                return result;
            }
        }

        // 3. Provider chain
        for provider in &self.providers {
            if cancel.is_cancelled() {
                return MarketDataResult::from_error("Operation cancelled");
            }

            let limit = provider.config().rate_limit_per_hour;
            if !self
                .rate_limiter
                .lock()
                .await
                .can_request(provider.name(), limit)
            {
                debug!(provider = provider.name(), "rate limited, skipping");
                continue;
            }

            let fetched = tokio::select! {
                _ = cancel.cancelled() => return MarketDataResult::from_error("Operation cancelled"),
                result = provider.fetch_ohlc(&symbol, timeframe, periods) => result,
            };

            if !fetched.success {
                debug!(
                    provider = provider.name(),
                    error = fetched.error.as_deref().unwrap_or("unknown"),
                    "provider failed, falling through"
                );
                continue;
            }

            let mut result = fetched;
            {
                let mut limiter = self.rate_limiter.lock().await;
                limiter.record_request(provider.name());
                let remaining = limiter.get_remaining(provider.name(), limit);
                result.rate_limit_remaining = if remaining.is_infinite() {
                    None
                } else {
                    Some(remaining as u32)
                };
            }

            // Write-back happens even on force refresh
            if self.use_db {
                self.write_to_db(&symbol, timeframe, &result, provider.name())
                    .await;
            }

            self.cache
                .lock()
                .await
                .set(&symbol, timeframe, result.clone());

            return result;
        }

        // Unreachable when the simulated provider is configured
        warn!(%symbol, %timeframe, "all providers failed");
        MarketDataResult::from_error("All providers failed")
    }

    async fn read_from_db(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        periods: usize,
    ) -> Option<MarketDataResult> {
        let store = self.persistence.as_ref()?;

        match store
            .get_bars(symbol, timeframe, None, None, Some(periods))
            .await
        {
            Ok(bars) if bars.len() * 2 >= periods && !bars.is_empty() => {
                Some(MarketDataResult::from_success(
                    bars,
                    analysis_core::MarketStatus::unknown(),
                    "database",
                ))
            }
            Ok(_) => None,
            Err(e) => {
                // Reads fall through to providers on DB trouble
                warn!(%symbol, %timeframe, "persistence read failed: {e}");
                None
            }
        }
    }

    async fn write_to_db(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        result: &MarketDataResult,
        provider: &str,
    ) {
        let Some(store) = self.persistence.as_ref() else {
            return;
        };
        // Best-effort: storage failures never fail the request
        if let Err(e) = store
            .store_bars(symbol, timeframe, &result.data, provider)
            .await
        {
            warn!(%symbol, %timeframe, "persistence write failed: {e}");
        }
    }

    /// Status row per provider in priority order.
    pub async fn provider_status(&self) -> Vec<ProviderStatus> {
        let limiter = self.rate_limiter.lock().await;

        self.providers
            .iter()
            .map(|provider| {
                let limit = provider.config().rate_limit_per_hour;
                let remaining = limiter.get_remaining(provider.name(), limit);
                ProviderStatus {
                    name: provider.name().to_string(),
                    priority: provider.priority(),
                    rate_limit: (!limit.is_infinite()).then_some(limit),
                    requests_made: limiter.get_request_count(provider.name()),
                    remaining: (!remaining.is_infinite()).then_some(remaining),
                    is_rate_limited: limiter.is_rate_limited(provider.name(), limit),
                }
            })
            .collect()
    }

    pub async fn invalidate_symbol(&self, symbol: &str) {
        self.cache.lock().await.invalidate_symbol(symbol);
    }

    pub async fn clear_cache(&self) {
        self.cache.lock().await.clear();
    }

    pub async fn cache_size(&self) -> usize {
        self.cache.lock().await.size()
    }
}
