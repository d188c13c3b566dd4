use std::collections::HashMap;

use analysis_core::{MarketDataResult, Timeframe};
use chrono::{DateTime, Duration, Utc};

/// A cached market data entry with its expiration.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub result: MarketDataResult,
    pub expires_at: DateTime<Utc>,
    pub timeframe: Timeframe,
}

/// In-memory TTL cache for market data, keyed by `symbol:timeframe`.
///
/// Each entry expires after the timeframe's configured TTL. The structure
/// is not internally synchronized; the owning service wraps it in a
/// single mutex.
#[derive(Debug, Default)]
pub struct MarketDataCache {
    entries: HashMap<String, CacheEntry>,
}

fn cache_key(symbol: &str, timeframe: Timeframe) -> String {
    format!("{symbol}:{timeframe}")
}

impl MarketDataCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached data if present and not expired. Expired entries are
    /// removed on access. Hits come back with `cached = true` and the
    /// entry's expiration attached.
    pub fn get(&mut self, symbol: &str, timeframe: Timeframe) -> Option<MarketDataResult> {
        let key = cache_key(symbol, timeframe);
        let entry = self.entries.get(&key)?;

        if Utc::now() >= entry.expires_at {
            self.entries.remove(&key);
            return None;
        }

        let mut result = entry.result.clone();
        result.cached = true;
        result.cache_expires_at = Some(entry.expires_at);
        Some(result)
    }

    /// Store a result with the timeframe's TTL.
    pub fn set(&mut self, symbol: &str, timeframe: Timeframe, result: MarketDataResult) {
        let expires_at = Utc::now() + Duration::seconds(timeframe.cache_ttl_secs());
        self.entries.insert(
            cache_key(symbol, timeframe),
            CacheEntry {
                result,
                expires_at,
                timeframe,
            },
        );
    }

    /// True when the entry is missing or expired.
    pub fn is_expired(&self, symbol: &str, timeframe: Timeframe) -> bool {
        match self.entries.get(&cache_key(symbol, timeframe)) {
            None => true,
            Some(entry) => Utc::now() >= entry.expires_at,
        }
    }

    pub fn invalidate(&mut self, symbol: &str, timeframe: Timeframe) {
        self.entries.remove(&cache_key(symbol, timeframe));
    }

    /// Remove every entry whose key starts with `symbol:`.
    pub fn invalidate_symbol(&mut self, symbol: &str) {
        let prefix = format!("{symbol}:");
        self.entries.retain(|key, _| !key.starts_with(&prefix));
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    /// Whether an entry exists, expired or not.
    pub fn contains(&self, symbol: &str, timeframe: Timeframe) -> bool {
        self.entries.contains_key(&cache_key(symbol, timeframe))
    }

    pub fn expiration_time(&self, symbol: &str, timeframe: Timeframe) -> Option<DateTime<Utc>> {
        self.entries
            .get(&cache_key(symbol, timeframe))
            .map(|e| e.expires_at)
    }

    /// Force an entry to be expired (test hook).
    #[cfg(test)]
    pub(crate) fn expire_entry(&mut self, symbol: &str, timeframe: Timeframe) {
        if let Some(entry) = self.entries.get_mut(&cache_key(symbol, timeframe)) {
            entry.expires_at = Utc::now() - Duration::seconds(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::{BarTime, MarketStatus, OhlcBar};

    fn sample_result() -> MarketDataResult {
        MarketDataResult::from_success(
            vec![OhlcBar {
                time: BarTime::Date("2024-01-02".to_string()),
                open: 100.0,
                high: 105.0,
                low: 99.0,
                close: 104.0,
                volume: Some(1_000.0),
            }],
            MarketStatus::simulated(),
            "simulated",
        )
    }

    #[test]
    fn get_after_set_returns_cached_copy() {
        let mut cache = MarketDataCache::new();
        cache.set("DJI", Timeframe::D1, sample_result());

        let hit = cache.get("DJI", Timeframe::D1).unwrap();
        assert!(hit.cached);
        assert!(hit.cache_expires_at.unwrap() > Utc::now());
        assert_eq!(hit.data, sample_result().data);
    }

    #[test]
    fn expired_entries_miss_and_are_removed() {
        let mut cache = MarketDataCache::new();
        cache.set("DJI", Timeframe::D1, sample_result());
        cache.expire_entry("DJI", Timeframe::D1);

        assert!(cache.get("DJI", Timeframe::D1).is_none());
        assert!(!cache.contains("DJI", Timeframe::D1));
    }

    #[test]
    fn missing_entries_miss() {
        let mut cache = MarketDataCache::new();
        assert!(cache.get("SPX", Timeframe::H1).is_none());
        assert!(cache.is_expired("SPX", Timeframe::H1));
    }

    #[test]
    fn invalidate_symbol_is_prefix_scoped() {
        let mut cache = MarketDataCache::new();
        cache.set("DJI", Timeframe::D1, sample_result());
        cache.set("DJI", Timeframe::H4, sample_result());
        cache.set("SPX", Timeframe::D1, sample_result());

        cache.invalidate_symbol("DJI");

        assert!(!cache.contains("DJI", Timeframe::D1));
        assert!(!cache.contains("DJI", Timeframe::H4));
        assert!(cache.contains("SPX", Timeframe::D1));
    }

    #[test]
    fn clear_and_size() {
        let mut cache = MarketDataCache::new();
        cache.set("DJI", Timeframe::D1, sample_result());
        cache.set("SPX", Timeframe::D1, sample_result());
        assert_eq!(cache.size(), 2);

        cache.clear();
        assert_eq!(cache.size(), 0);
    }

    #[test]
    fn ttl_follows_timeframe_table() {
        assert_eq!(Timeframe::M1.cache_ttl_secs(), 30);
        assert_eq!(Timeframe::M5.cache_ttl_secs(), 45);
        assert_eq!(Timeframe::D1.cache_ttl_secs(), 900);
        assert_eq!(Timeframe::Mo1.cache_ttl_secs(), 3_600);
    }
}
