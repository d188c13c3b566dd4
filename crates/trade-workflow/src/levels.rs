use analysis_core::Timeframe;
use market_data::MarketDataService;
use technical_analysis::{
    detect_pivots, extension_price, retracement_price, FibDirection, EXTENSION_RATIOS,
    RETRACEMENT_RATIOS,
};

use crate::types::{LevelZone, LevelsResult};

/// Identify Fibonacci entry and target zones for a symbol/timeframe.
///
/// Retracements become entry zones, extensions become targets. Empty when
/// data or a full swing (high and low) is unavailable.
pub async fn identify_fibonacci_levels(
    symbol: &str,
    timeframe: Timeframe,
    direction: FibDirection,
    market_service: &MarketDataService,
) -> LevelsResult {
    let market = market_service.get_ohlc(symbol, timeframe, 50, false).await;

    if !market.success || market.data.is_empty() {
        return LevelsResult::default();
    }

    let detection = detect_pivots(&market.data, 5, 4);

    let (Some(high), Some(low)) = (detection.swing_high, detection.swing_low) else {
        return LevelsResult::default();
    };

    build_levels(high.price, low.price, direction)
}

/// Build the zone lists from a swing high/low pair.
pub fn build_levels(high: f64, low: f64, direction: FibDirection) -> LevelsResult {
    let range = high - low;

    let entry_zones = RETRACEMENT_RATIOS
        .iter()
        .map(|&ratio| LevelZone {
            label: format!("R{}%", (ratio * 100.0) as i64),
            price: retracement_price(high, low, ratio, direction),
            heat: 50,
            formula: format!("{high} - ({range:.0} x {ratio})"),
        })
        .collect();

    let target_zones = EXTENSION_RATIOS
        .iter()
        .map(|&ratio| LevelZone {
            label: format!("E{}%", (ratio * 100.0) as i64),
            price: extension_price(high, low, ratio, direction),
            heat: 50,
            formula: format!("{low} + ({range:.0} x {ratio})"),
        })
        .collect();

    LevelsResult {
        entry_zones,
        target_zones,
    }
}
