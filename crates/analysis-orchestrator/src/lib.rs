//! Single-request analysis pipeline: fetch market data, detect pivots,
//! derive Fibonacci levels, and flag signal bars in one pass.

use std::collections::BTreeMap;
use std::sync::Arc;

use analysis_core::{OhlcBar, Timeframe};
use market_data::MarketDataService;
use serde::{Deserialize, Serialize};
use technical_analysis::{
    detect_pivots, detect_signal, extension_levels, retracement_levels, FibDirection,
    LevelSignal, PivotPoint,
};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Tunables for one analysis request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub pivot_lookback: usize,
    pub pivot_count: isize,
    pub fib_direction: FibDirection,
    pub detect_signals: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            pivot_lookback: 5,
            pivot_count: 10,
            fib_direction: FibDirection::Buy,
            detect_signals: true,
        }
    }
}

/// Full analysis request for a symbol/timeframe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub symbol: String,
    pub timeframe: Timeframe,
    #[serde(default = "default_periods")]
    pub periods: usize,
    #[serde(default)]
    pub config: AnalysisConfig,
}

fn default_periods() -> usize {
    100
}

/// Market data section of the response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketDataSection {
    pub data: Vec<OhlcBar>,
    pub provider: String,
    pub cached: bool,
}

/// Pivot section of the response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PivotSection {
    pub all_pivots: Vec<PivotPoint>,
    pub recent_pivots: Vec<PivotPoint>,
    pub swing_high: Option<PivotPoint>,
    pub swing_low: Option<PivotPoint>,
}

/// Fibonacci level sets keyed by the string ratio form ("382", "618", ...).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FibonacciSection {
    pub retracement: BTreeMap<String, f64>,
    pub extension: BTreeMap<String, f64>,
}

/// Complete analysis response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FullAnalysisResponse {
    pub success: bool,
    pub market_data: Option<MarketDataSection>,
    pub pivots: PivotSection,
    pub fibonacci: FibonacciSection,
    pub signals: Vec<LevelSignal>,
    pub error: Option<String>,
}

impl FullAnalysisResponse {
    pub fn from_error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            market_data: None,
            pivots: PivotSection::default(),
            fibonacci: FibonacciSection::default(),
            signals: Vec::new(),
            error: Some(message.into()),
        }
    }
}

/// Coordinates the fetch → pivots → fibonacci → signals pipeline.
pub struct AnalysisOrchestrator {
    market_data: Arc<MarketDataService>,
}

impl AnalysisOrchestrator {
    pub fn new(market_data: Arc<MarketDataService>) -> Self {
        Self { market_data }
    }

    pub async fn analyze(&self, request: &AnalysisRequest) -> FullAnalysisResponse {
        self.analyze_cancellable(request, &CancellationToken::new())
            .await
    }

    pub async fn analyze_cancellable(
        &self,
        request: &AnalysisRequest,
        cancel: &CancellationToken,
    ) -> FullAnalysisResponse {
        let market = self
            .market_data
            .get_ohlc_cancellable(
                &request.symbol,
                request.timeframe,
                request.periods,
                false,
                cancel,
            )
            .await;

        if !market.success {
            return FullAnalysisResponse::from_error(
                market
                    .error
                    .unwrap_or_else(|| "Failed to fetch market data".to_string()),
            );
        }

        let market_section = MarketDataSection {
            data: market.data.clone(),
            provider: market.provider.clone().unwrap_or_else(|| "unknown".to_string()),
            cached: market.cached,
        };

        let detection = detect_pivots(
            &market.data,
            request.config.pivot_lookback,
            request.config.pivot_count,
        );
        debug!(
            symbol = %request.symbol,
            pivots = detection.pivots.len(),
            "pivot detection complete"
        );

        let fibonacci = match (&detection.swing_high, &detection.swing_low) {
            (Some(high), Some(low)) => FibonacciSection {
                retracement: retracement_levels(
                    high.price,
                    low.price,
                    request.config.fib_direction,
                ),
                extension: extension_levels(high.price, low.price, request.config.fib_direction),
            },
            _ => FibonacciSection::default(),
        };

        let signals = if request.config.detect_signals && !market.data.is_empty() {
            detect_level_signals(&market.data, &fibonacci.retracement)
        } else {
            Vec::new()
        };

        FullAnalysisResponse {
            success: true,
            market_data: Some(market_section),
            pivots: PivotSection {
                all_pivots: detection.pivots,
                recent_pivots: detection.recent_pivots,
                swing_high: detection.swing_high,
                swing_low: detection.swing_low,
            },
            fibonacci,
            signals,
            error: None,
        }
    }
}

/// Run single-bar signal detection on the latest bar against each level.
fn detect_level_signals(bars: &[OhlcBar], levels: &BTreeMap<String, f64>) -> Vec<LevelSignal> {
    let Some(latest) = bars.last() else {
        return Vec::new();
    };

    levels
        .values()
        .filter_map(|&price| detect_signal(latest, price))
        .collect()
}
