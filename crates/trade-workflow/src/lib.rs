//! Guided trading workflow: trend assessment, multi-timeframe alignment,
//! Fibonacci level identification, indicator confirmation, confluence
//! scoring, position sizing, trade validation, opportunity scanning, and
//! cascade-stage detection.

pub mod alignment;
pub mod cascade;
pub mod confirm;
pub mod confluence;
pub mod levels;
pub mod scanner;
pub mod sizing;
pub mod trend;
pub mod types;
pub mod validation;

pub use alignment::*;
pub use cascade::*;
pub use confirm::*;
pub use confluence::*;
pub use levels::*;
pub use scanner::*;
pub use sizing::*;
pub use trend::*;
pub use types::*;
pub use validation::*;

use std::sync::Arc;

use analysis_core::Timeframe;
use market_data::MarketDataService;
use technical_analysis::FibDirection;
use tokio_util::sync::CancellationToken;

/// Facade over the workflow operations, consumed one-to-one by the HTTP
/// layer.
pub struct Workflow {
    market_data: Arc<MarketDataService>,
}

impl Workflow {
    pub fn new(market_data: Arc<MarketDataService>) -> Self {
        Self { market_data }
    }

    pub async fn assess_trend(&self, symbol: &str, timeframe: Timeframe) -> TrendAssessment {
        trend::assess_trend(symbol, timeframe, &self.market_data).await
    }

    pub async fn check_timeframe_alignment(
        &self,
        symbol: &str,
        timeframes: &[Timeframe],
    ) -> AlignmentResult {
        alignment::check_timeframe_alignment(symbol, timeframes, &self.market_data).await
    }

    pub async fn identify_fibonacci_levels(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        direction: FibDirection,
    ) -> LevelsResult {
        levels::identify_fibonacci_levels(symbol, timeframe, direction, &self.market_data).await
    }

    pub async fn confirm_with_indicators(
        &self,
        symbol: &str,
        timeframe: Timeframe,
    ) -> IndicatorConfirmation {
        confirm::confirm_with_indicators(symbol, timeframe, &self.market_data).await
    }

    pub fn categorize_trade(
        &self,
        higher_trend: TrendDirection,
        lower_trend: TrendDirection,
        direction: TradeDirection,
        confluence: u32,
    ) -> TradeCategory {
        alignment::categorize_trade(higher_trend, lower_trend, direction, confluence)
    }

    pub async fn scan_opportunities(
        &self,
        symbols: &[String],
        timeframe_pairs: &[(Timeframe, Timeframe)],
        include_potential: bool,
    ) -> OpportunityScanResult {
        scanner::scan_opportunities(
            symbols,
            timeframe_pairs,
            include_potential,
            &self.market_data,
            &CancellationToken::new(),
        )
        .await
    }

    pub async fn validate_trade(
        &self,
        request: &ValidationRequest,
    ) -> ValidationResult {
        validation::validate_trade(request, &self.market_data).await
    }

    pub async fn detect_cascade(
        &self,
        symbol: &str,
        timeframes: &[Timeframe],
    ) -> CascadeAnalysis {
        cascade::detect_cascade(symbol, timeframes, &self.market_data).await
    }
}
