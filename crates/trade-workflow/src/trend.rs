use analysis_core::Timeframe;
use market_data::MarketDataService;
use technical_analysis::{classify_swings, detect_pivots, PivotKind, PivotPoint, SwingType};

use crate::types::{TrendAssessment, TrendDirection, TrendPhase};

const ASSESS_PERIODS: usize = 50;
const RANGING_THRESHOLD_PERCENT: f64 = 2.0;

/// Assess trend direction for a symbol/timeframe from swing structure.
///
/// Counts bullish (HH + HL) against bearish (LH + LL) markers over the
/// last four swings. Base confidence is 75 for a directional trend and
/// 50 for neutral, reduced by 20 when the market is ranging.
pub async fn assess_trend(
    symbol: &str,
    timeframe: Timeframe,
    market_service: &MarketDataService,
) -> TrendAssessment {
    let market = market_service
        .get_ohlc(symbol, timeframe, ASSESS_PERIODS, false)
        .await;

    if !market.success || market.data.is_empty() {
        return TrendAssessment {
            trend: TrendDirection::Neutral,
            phase: TrendPhase::Correction,
            swing_type: SwingType::HL,
            explanation: "Unable to fetch market data".to_string(),
            confidence: 0,
            is_ranging: false,
            ranging_warning: None,
        };
    }

    let detection = detect_pivots(&market.data, 5, 4);

    if detection.recent_pivots.is_empty() {
        return TrendAssessment {
            trend: TrendDirection::Neutral,
            phase: TrendPhase::Correction,
            swing_type: SwingType::HL,
            explanation: "Insufficient pivot data".to_string(),
            confidence: 30,
            is_ranging: false,
            ranging_warning: None,
        };
    }

    let markers = classify_swings(&detection.pivots);
    let trend = trend_from_markers(&markers);
    let swing_type = markers
        .last()
        .map(|m| m.swing_type)
        .unwrap_or(SwingType::HL);
    let explanation = swing_explanation(swing_type).to_string();

    let current_price = market.data.last().map(|b| b.close).unwrap_or_default();
    let phase = detect_trend_phase(&detection.recent_pivots, current_price, trend);

    let (is_ranging, ranging_warning) = detect_ranging(&detection.recent_pivots);

    let base_confidence = if trend != TrendDirection::Neutral { 75 } else { 50 };
    let confidence = if is_ranging {
        base_confidence - 20
    } else {
        base_confidence
    };

    TrendAssessment {
        trend,
        phase,
        swing_type,
        explanation,
        confidence,
        is_ranging,
        ranging_warning,
    }
}

/// Majority vote over the last four swing markers.
pub fn trend_from_markers(markers: &[technical_analysis::SwingMarker]) -> TrendDirection {
    if markers.len() < 2 {
        return TrendDirection::Neutral;
    }

    let recent = if markers.len() > 4 {
        &markers[markers.len() - 4..]
    } else {
        markers
    };

    let bullish = recent.iter().filter(|m| m.swing_type.is_bullish()).count();
    let bearish = recent.len() - bullish;

    if bullish > bearish {
        TrendDirection::Bullish
    } else if bearish > bullish {
        TrendDirection::Bearish
    } else {
        TrendDirection::Neutral
    }
}

pub(crate) fn swing_explanation(swing_type: SwingType) -> &'static str {
    match swing_type {
        SwingType::HH => "Higher High pattern = strong bullish momentum",
        SwingType::HL => "Higher Low pattern = buyers stepping in higher",
        SwingType::LH => "Lower High pattern = sellers stepping in lower",
        SwingType::LL => "Lower Low pattern = strong bearish momentum",
    }
}

/// Phase from pivot structure and where price sits relative to the last
/// pivot: moving away from the last low in an uptrend is an impulse,
/// above the last high a continuation, anything else a correction.
pub fn detect_trend_phase(
    pivots: &[PivotPoint],
    current_price: f64,
    trend: TrendDirection,
) -> TrendPhase {
    if trend == TrendDirection::Neutral || pivots.len() < 2 {
        return TrendPhase::Correction;
    }

    let last = &pivots[pivots.len() - 1];

    match trend {
        TrendDirection::Bullish => {
            if current_price > last.price {
                if last.kind == PivotKind::Low {
                    TrendPhase::Impulse
                } else {
                    TrendPhase::Continuation
                }
            } else {
                TrendPhase::Correction
            }
        }
        TrendDirection::Bearish => {
            if current_price < last.price {
                if last.kind == PivotKind::High {
                    TrendPhase::Impulse
                } else {
                    TrendPhase::Continuation
                }
            } else {
                TrendPhase::Correction
            }
        }
        TrendDirection::Neutral => TrendPhase::Correction,
    }
}

/// Sideways-market detection from recent pivots.
///
/// Ranging when the peak-to-trough span of the recent pivots is under 2%
/// of their average price, or when the last two highs and the last two
/// lows each sit within 1% of the average (a flat channel).
pub fn detect_ranging(pivots: &[PivotPoint]) -> (bool, Option<String>) {
    if pivots.len() < 4 {
        return (false, None);
    }

    let prices: Vec<f64> = pivots.iter().map(|p| p.price).collect();
    let avg_price = prices.iter().sum::<f64>() / prices.len() as f64;
    let max = prices.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let min = prices.iter().cloned().fold(f64::INFINITY, f64::min);
    let range_percent = (max - min) / avg_price * 100.0;

    let is_narrow = range_percent < RANGING_THRESHOLD_PERCENT;

    let highs: Vec<f64> = pivots
        .iter()
        .filter(|p| p.kind == PivotKind::High)
        .map(|p| p.price)
        .collect();
    let lows: Vec<f64> = pivots
        .iter()
        .filter(|p| p.kind == PivotKind::Low)
        .map(|p| p.price)
        .collect();

    let flat_channel = if highs.len() >= 2 && lows.len() >= 2 {
        let high_diff = (highs[highs.len() - 1] - highs[highs.len() - 2]).abs() / avg_price * 100.0;
        let low_diff = (lows[lows.len() - 1] - lows[lows.len() - 2]).abs() / avg_price * 100.0;
        high_diff < 1.0 && low_diff < 1.0
    } else {
        false
    };

    if is_narrow || flat_channel {
        let warning = format!(
            "Market ranging within {range_percent:.1}% range. \
             Fibonacci levels less reliable - consider waiting for breakout."
        );
        (true, Some(warning))
    } else {
        (false, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::BarTime;
    use technical_analysis::SwingMarker;

    fn pivot(index: usize, price: f64, kind: PivotKind) -> PivotPoint {
        PivotPoint {
            index,
            price,
            kind,
            time: BarTime::Timestamp(index as i64),
        }
    }

    fn marker(index: usize, swing_type: SwingType) -> SwingMarker {
        SwingMarker {
            index,
            price: 100.0,
            time: BarTime::Timestamp(index as i64),
            swing_type,
        }
    }

    #[test]
    fn majority_of_markers_sets_the_trend() {
        let bullish = vec![
            marker(1, SwingType::HH),
            marker(2, SwingType::HL),
            marker(3, SwingType::HH),
            marker(4, SwingType::LH),
        ];
        assert_eq!(trend_from_markers(&bullish), TrendDirection::Bullish);

        let bearish = vec![
            marker(1, SwingType::LL),
            marker(2, SwingType::LH),
            marker(3, SwingType::HL),
            marker(4, SwingType::LL),
        ];
        assert_eq!(trend_from_markers(&bearish), TrendDirection::Bearish);

        let split = vec![
            marker(1, SwingType::HH),
            marker(2, SwingType::LL),
            marker(3, SwingType::HL),
            marker(4, SwingType::LH),
        ];
        assert_eq!(trend_from_markers(&split), TrendDirection::Neutral);
    }

    #[test]
    fn only_the_last_four_markers_count() {
        let markers = vec![
            marker(1, SwingType::LL),
            marker(2, SwingType::LL),
            marker(3, SwingType::LL),
            marker(4, SwingType::HH),
            marker(5, SwingType::HL),
            marker(6, SwingType::HH),
            marker(7, SwingType::HL),
        ];
        assert_eq!(trend_from_markers(&markers), TrendDirection::Bullish);
    }

    #[test]
    fn phase_follows_price_against_last_pivot() {
        let pivots = vec![
            pivot(2, 110.0, PivotKind::High),
            pivot(5, 100.0, PivotKind::Low),
        ];

        // Above the last low in an uptrend = impulse
        assert_eq!(
            detect_trend_phase(&pivots, 105.0, TrendDirection::Bullish),
            TrendPhase::Impulse
        );
        // Below the last low while bullish = correction
        assert_eq!(
            detect_trend_phase(&pivots, 95.0, TrendDirection::Bullish),
            TrendPhase::Correction
        );

        let high_last = vec![
            pivot(2, 100.0, PivotKind::Low),
            pivot(5, 110.0, PivotKind::High),
        ];
        assert_eq!(
            detect_trend_phase(&high_last, 115.0, TrendDirection::Bullish),
            TrendPhase::Continuation
        );
        assert_eq!(
            detect_trend_phase(&high_last, 95.0, TrendDirection::Bearish),
            TrendPhase::Impulse
        );
    }

    #[test]
    fn neutral_trend_is_always_a_correction() {
        let pivots = vec![
            pivot(2, 110.0, PivotKind::High),
            pivot(5, 100.0, PivotKind::Low),
        ];
        assert_eq!(
            detect_trend_phase(&pivots, 120.0, TrendDirection::Neutral),
            TrendPhase::Correction
        );
    }

    #[test]
    fn narrow_range_is_ranging() {
        let pivots = vec![
            pivot(1, 100.0, PivotKind::High),
            pivot(2, 99.2, PivotKind::Low),
            pivot(3, 100.4, PivotKind::High),
            pivot(4, 99.4, PivotKind::Low),
        ];

        let (is_ranging, warning) = detect_ranging(&pivots);
        assert!(is_ranging);
        let warning = warning.unwrap();
        assert!(warning.to_lowercase().contains("ranging"));
        assert!(warning.to_lowercase().contains("breakout"));
    }

    #[test]
    fn flat_channel_is_ranging_even_with_wide_history() {
        // Wide overall range but the last two highs and lows are flat
        let pivots = vec![
            pivot(1, 120.0, PivotKind::High),
            pivot(2, 80.0, PivotKind::Low),
            pivot(3, 100.3, PivotKind::High),
            pivot(4, 99.0, PivotKind::Low),
            pivot(5, 100.0, PivotKind::High),
            pivot(6, 99.3, PivotKind::Low),
        ];

        let (is_ranging, _) = detect_ranging(&pivots);
        assert!(is_ranging);
    }

    #[test]
    fn trending_pivots_are_not_ranging() {
        let pivots = vec![
            pivot(1, 100.0, PivotKind::Low),
            pivot(2, 110.0, PivotKind::High),
            pivot(3, 108.0, PivotKind::Low),
            pivot(4, 120.0, PivotKind::High),
        ];

        let (is_ranging, warning) = detect_ranging(&pivots);
        assert!(!is_ranging);
        assert!(warning.is_none());
    }

    #[test]
    fn fewer_than_four_pivots_never_range() {
        let pivots = vec![
            pivot(1, 100.0, PivotKind::High),
            pivot(2, 99.9, PivotKind::Low),
        ];
        assert!(!detect_ranging(&pivots).0);
    }
}
