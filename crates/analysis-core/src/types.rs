use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Bar timestamp in its external encoding: Unix seconds for intraday
/// bars, ISO date string (YYYY-MM-DD) for daily-or-coarser bars.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BarTime {
    Timestamp(i64),
    Date(String),
}

impl BarTime {
    /// Parse into a UTC datetime. Date strings are taken as midnight UTC.
    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            BarTime::Timestamp(secs) => DateTime::from_timestamp(*secs, 0),
            BarTime::Date(s) => {
                if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                    return Some(dt.with_timezone(&Utc));
                }
                NaiveDate::parse_from_str(s, "%Y-%m-%d")
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
                    .map(|ndt| ndt.and_utc())
            }
        }
    }

    /// Unix seconds, if the time parses.
    pub fn as_timestamp(&self) -> Option<i64> {
        self.as_datetime().map(|dt| dt.timestamp())
    }
}

/// Single OHLC price bar with optional volume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OhlcBar {
    pub time: BarTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
}

impl OhlcBar {
    /// Check internal consistency: low <= open,close <= high and
    /// non-negative volume when present.
    pub fn is_valid(&self) -> bool {
        self.low <= self.open
            && self.open <= self.high
            && self.low <= self.close
            && self.close <= self.high
            && self.volume.map_or(true, |v| v >= 0.0)
    }
}

/// Supported chart timeframes, finest to coarsest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "3m")]
    M3,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "1H")]
    H1,
    #[serde(rename = "4H")]
    H4,
    #[serde(rename = "1D")]
    D1,
    #[serde(rename = "1W")]
    W1,
    #[serde(rename = "1M")]
    Mo1,
}

/// Cascade analysis walks timeframes from coarsest to finest.
pub const TIMEFRAME_HIERARCHY: [Timeframe; 9] = [
    Timeframe::Mo1,
    Timeframe::W1,
    Timeframe::D1,
    Timeframe::H4,
    Timeframe::H1,
    Timeframe::M15,
    Timeframe::M5,
    Timeframe::M3,
    Timeframe::M1,
];

impl Timeframe {
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M3 => "3m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::H1 => "1H",
            Timeframe::H4 => "4H",
            Timeframe::D1 => "1D",
            Timeframe::W1 => "1W",
            Timeframe::Mo1 => "1M",
        }
    }

    pub fn parse(s: &str) -> Option<Timeframe> {
        match s {
            "1m" => Some(Timeframe::M1),
            "3m" => Some(Timeframe::M3),
            "5m" => Some(Timeframe::M5),
            "15m" => Some(Timeframe::M15),
            "1H" => Some(Timeframe::H1),
            "4H" => Some(Timeframe::H4),
            "1D" => Some(Timeframe::D1),
            "1W" => Some(Timeframe::W1),
            "1M" => Some(Timeframe::Mo1),
            _ => None,
        }
    }

    /// Intraday timeframes encode bar times as Unix seconds; daily and
    /// coarser use ISO date strings.
    pub fn is_intraday(&self) -> bool {
        matches!(
            self,
            Timeframe::M1
                | Timeframe::M3
                | Timeframe::M5
                | Timeframe::M15
                | Timeframe::H1
                | Timeframe::H4
        )
    }

    /// Seconds represented by one bar.
    pub fn bar_seconds(&self) -> i64 {
        match self {
            Timeframe::M1 => 60,
            Timeframe::M3 => 180,
            Timeframe::M5 => 300,
            Timeframe::M15 => 900,
            Timeframe::H1 => 3_600,
            Timeframe::H4 => 14_400,
            Timeframe::D1 => 86_400,
            Timeframe::W1 => 604_800,
            Timeframe::Mo1 => 2_592_000,
        }
    }

    /// Cache TTL in seconds for this timeframe.
    pub fn cache_ttl_secs(&self) -> i64 {
        match self {
            Timeframe::M1 | Timeframe::M3 => 30,
            Timeframe::M5 => 45,
            Timeframe::M15 => 60,
            Timeframe::H1 => 120,
            Timeframe::H4 => 300,
            Timeframe::D1 => 900,
            Timeframe::W1 | Timeframe::Mo1 => 3_600,
        }
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Market session state reported by a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketStatus {
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
}

impl MarketStatus {
    pub fn unknown() -> Self {
        Self {
            state: "UNKNOWN".to_string(),
            session: None,
        }
    }

    pub fn simulated() -> Self {
        Self {
            state: "SIMULATED".to_string(),
            session: None,
        }
    }
}

/// Result of a market data fetch, from any source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketDataResult {
    pub success: bool,
    pub data: Vec<OhlcBar>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default)]
    pub cached: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit_remaining: Option<u32>,
    pub market_status: MarketStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MarketDataResult {
    pub fn from_success(
        data: Vec<OhlcBar>,
        market_status: MarketStatus,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            success: true,
            data,
            provider: Some(provider.into()),
            cached: false,
            cache_expires_at: None,
            rate_limit_remaining: None,
            market_status,
            error: None,
        }
    }

    pub fn from_error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: Vec::new(),
            provider: None,
            cached: false,
            cache_expires_at: None,
            rate_limit_remaining: None,
            market_status: MarketStatus::unknown(),
            error: Some(message.into()),
        }
    }
}

/// Static configuration describing a market data provider.
///
/// Lower priority value means higher precedence in the fallback chain.
/// `rate_limit_per_hour` may be `f64::INFINITY` for unlimited providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    pub priority: u32,
    pub rate_limit_per_hour: f64,
    pub requires_api_key: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl ProviderConfig {
    pub fn is_unlimited(&self) -> bool {
        self.rate_limit_per_hour.is_infinite()
    }
}

/// One row of `MarketDataService::provider_status()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderStatus {
    pub name: String,
    pub priority: u32,
    /// None means unlimited.
    pub rate_limit: Option<f64>,
    pub requests_made: u32,
    /// None means unlimited.
    pub remaining: Option<f64>,
    pub is_rate_limited: bool,
}

/// Ingestion bookkeeping reported by the persistence layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionStatus {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub bar_count: u64,
    pub first_bar_time: Option<DateTime<Utc>>,
    pub last_bar_time: Option<DateTime<Utc>>,
}
