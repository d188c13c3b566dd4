use std::time::Duration;

use analysis_core::{
    BarTime, MarketDataProvider, MarketDataResult, MarketStatus, OhlcBar, ProviderConfig,
    Timeframe,
};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

const BASE_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

/// Request symbols mapped to Yahoo ticker notation.
pub const SYMBOL_MAP: [(&str, &str); 6] = [
    ("DJI", "^DJI"),
    ("SPX", "^GSPC"),
    ("NDX", "^NDX"),
    ("BTCUSD", "BTC-USD"),
    ("EURUSD", "EURUSD=X"),
    ("GOLD", "GC=F"),
];

/// Primary provider backed by the public Yahoo Finance chart API.
///
/// Priority 1 with a conservative 360 requests/hour budget. Timeframes
/// Yahoo has no native interval for (3m, 4H) report failure so the chain
/// falls through to the simulated provider.
pub struct YahooProvider {
    config: ProviderConfig,
    client: reqwest::Client,
}

impl Default for YahooProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl YahooProvider {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            config: ProviderConfig {
                name: "yahoo".to_string(),
                priority: 1,
                rate_limit_per_hour: 360.0,
                requires_api_key: false,
                api_key: None,
            },
            client,
        }
    }

    fn map_symbol(symbol: &str) -> Option<&'static str> {
        SYMBOL_MAP
            .iter()
            .find(|(s, _)| *s == symbol)
            .map(|(_, ticker)| *ticker)
    }

    fn interval(timeframe: Timeframe) -> Option<&'static str> {
        match timeframe {
            Timeframe::M1 => Some("1m"),
            Timeframe::M5 => Some("5m"),
            Timeframe::M15 => Some("15m"),
            Timeframe::H1 => Some("1h"),
            Timeframe::D1 => Some("1d"),
            Timeframe::W1 => Some("1wk"),
            Timeframe::Mo1 => Some("1mo"),
            Timeframe::M3 | Timeframe::H4 => None,
        }
    }

    /// Epoch-second window wide enough to cover `periods` bars. Intraday
    /// history is limited server-side, so those windows are clamped.
    fn fetch_window(timeframe: Timeframe, periods: usize) -> (i64, i64) {
        let now = chrono::Utc::now().timestamp();
        let mut span = timeframe.bar_seconds() * periods as i64 + 86_400;
        span = match timeframe {
            Timeframe::M1 | Timeframe::M5 | Timeframe::M15 => span.min(7 * 86_400),
            Timeframe::H1 => span.min(730 * 86_400),
            _ => span.min(3_650 * 86_400),
        };
        (now - span, now)
    }

    fn parse_chart(
        body: ChartResponse,
        timeframe: Timeframe,
        periods: usize,
    ) -> Result<Vec<OhlcBar>, String> {
        let result = body
            .chart
            .result
            .and_then(|mut r| if r.is_empty() { None } else { Some(r.remove(0)) })
            .ok_or_else(|| {
                body.chart
                    .error
                    .map(|e| e.description)
                    .unwrap_or_else(|| "No data returned".to_string())
            })?;

        let quote = result
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| "No quote data".to_string())?;

        let mut bars = Vec::with_capacity(result.timestamp.len());
        for (i, ts) in result.timestamp.iter().enumerate() {
            let (open, high, low, close) = match (
                quote.open.get(i).copied().flatten(),
                quote.high.get(i).copied().flatten(),
                quote.low.get(i).copied().flatten(),
                quote.close.get(i).copied().flatten(),
            ) {
                (Some(o), Some(h), Some(l), Some(c)) => (o, h, l, c),
                _ => continue,
            };

            let time = if timeframe.is_intraday() {
                BarTime::Timestamp(*ts)
            } else {
                let date = chrono::DateTime::from_timestamp(*ts, 0)
                    .map(|dt| dt.format("%Y-%m-%d").to_string())
                    .ok_or_else(|| format!("Invalid timestamp {ts}"))?;
                BarTime::Date(date)
            };

            bars.push(OhlcBar {
                time,
                open,
                high,
                low,
                close,
                volume: quote.volume.get(i).copied().flatten(),
            });
        }

        if bars.is_empty() {
            return Err("No data in response".to_string());
        }

        // Keep only the most recent `periods` bars
        if bars.len() > periods {
            bars.drain(..bars.len() - periods);
        }
        Ok(bars)
    }
}

#[async_trait]
impl MarketDataProvider for YahooProvider {
    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    async fn fetch_ohlc(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        periods: usize,
    ) -> MarketDataResult {
        let Some(ticker) = Self::map_symbol(symbol) else {
            return MarketDataResult::from_error(format!("Unknown symbol: {symbol}"));
        };
        let Some(interval) = Self::interval(timeframe) else {
            return MarketDataResult::from_error(format!(
                "Unsupported timeframe for yahoo: {timeframe}"
            ));
        };

        let url = format!("{BASE_URL}/{ticker}");
        let (period1, period2) = Self::fetch_window(timeframe, periods);
        let response = match self
            .client
            .get(&url)
            .query(&[
                ("interval", interval.to_string()),
                ("period1", period1.to_string()),
                ("period2", period2.to_string()),
            ])
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                debug!("yahoo request failed for {symbol}: {e}");
                return MarketDataResult::from_error(format!("Request failed: {e}"));
            }
        };

        if !response.status().is_success() {
            return MarketDataResult::from_error(format!("HTTP {}", response.status()));
        }

        let body: ChartResponse = match response.json().await {
            Ok(b) => b,
            Err(e) => return MarketDataResult::from_error(format!("Parse error: {e}")),
        };

        match Self::parse_chart(body, timeframe, periods) {
            Ok(bars) => MarketDataResult::from_success(
                bars,
                MarketStatus {
                    state: "LIVE".to_string(),
                    session: None,
                },
                "yahoo",
            ),
            Err(e) => MarketDataResult::from_error(e),
        }
    }

    async fn is_available(&self) -> bool {
        true
    }
}

// --- Yahoo chart API wire format ---

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<Quote>,
}

#[derive(Debug, Deserialize)]
struct Quote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_map_covers_supported_markets() {
        assert_eq!(YahooProvider::map_symbol("DJI"), Some("^DJI"));
        assert_eq!(YahooProvider::map_symbol("SPX"), Some("^GSPC"));
        assert_eq!(YahooProvider::map_symbol("BTCUSD"), Some("BTC-USD"));
        assert_eq!(YahooProvider::map_symbol("EURUSD"), Some("EURUSD=X"));
        assert_eq!(YahooProvider::map_symbol("GOLD"), Some("GC=F"));
        assert_eq!(YahooProvider::map_symbol("NOPE"), None);
    }

    #[test]
    fn provider_config_is_primary() {
        let provider = YahooProvider::new();
        assert_eq!(provider.name(), "yahoo");
        assert_eq!(provider.priority(), 1);
        assert_eq!(provider.config().rate_limit_per_hour, 360.0);
        assert!(!provider.config().requires_api_key);
    }

    #[test]
    fn unsupported_intervals_are_rejected() {
        assert_eq!(YahooProvider::interval(Timeframe::D1), Some("1d"));
        assert_eq!(YahooProvider::interval(Timeframe::H1), Some("1h"));
        assert_eq!(YahooProvider::interval(Timeframe::H4), None);
        assert_eq!(YahooProvider::interval(Timeframe::M3), None);
    }

    #[test]
    fn fetch_window_clamps_intraday_history() {
        let (p1, p2) = YahooProvider::fetch_window(Timeframe::M5, 10_000);
        assert!(p2 > p1);
        assert!(p2 - p1 <= 7 * 86_400);

        let (d1, d2) = YahooProvider::fetch_window(Timeframe::D1, 100);
        assert!(d2 - d1 >= 100 * 86_400);
    }

    #[tokio::test]
    async fn unknown_symbol_errors_without_network() {
        let provider = YahooProvider::new();
        let result = provider.fetch_ohlc("UNKNOWN", Timeframe::D1, 10).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("Unknown symbol"));
    }

    #[test]
    fn parse_chart_maps_quotes_to_bars() {
        let body = ChartResponse {
            chart: Chart {
                result: Some(vec![ChartResult {
                    timestamp: vec![1_700_000_000, 1_700_086_400],
                    indicators: Indicators {
                        quote: vec![Quote {
                            open: vec![Some(100.0), Some(101.0)],
                            high: vec![Some(105.0), Some(106.0)],
                            low: vec![Some(99.0), Some(100.0)],
                            close: vec![Some(104.0), Some(105.0)],
                            volume: vec![Some(1_000.0), None],
                        }],
                    },
                }]),
                error: None,
            },
        };

        let bars = YahooProvider::parse_chart(body, Timeframe::D1, 10).unwrap();
        assert_eq!(bars.len(), 2);
        assert!(matches!(bars[0].time, BarTime::Date(_)));
        assert_eq!(bars[1].close, 105.0);
        assert_eq!(bars[1].volume, None);
    }

    #[test]
    fn parse_chart_empty_result_is_an_error() {
        let body = ChartResponse {
            chart: Chart {
                result: None,
                error: Some(ChartError {
                    description: "Not found".to_string(),
                }),
            },
        };

        let err = YahooProvider::parse_chart(body, Timeframe::D1, 10).unwrap_err();
        assert!(err.contains("Not found"));
    }
}
