use analysis_core::Timeframe;
use market_data::MarketDataService;

use crate::trend::assess_trend;
use crate::types::{
    AlignmentResult, StrengthLevel, TimeframeTrend, TradeActionResult, TradeCategory,
    TradeDirection, TrendDirection,
};

/// Decide a trade action from higher/lower timeframe trends.
///
/// Pullback rules:
///
/// | Higher  | Lower   | Action      |
/// |---------|---------|-------------|
/// | bullish | bearish | GO LONG     |
/// | bearish | bullish | GO SHORT    |
/// | same    | same    | STAND ASIDE |
/// | neutral | any     | STAND ASIDE |
pub fn determine_trade_action(
    higher_tf_trend: TrendDirection,
    lower_tf_trend: TrendDirection,
) -> TradeActionResult {
    if higher_tf_trend == TrendDirection::Neutral {
        return TradeActionResult {
            should_trade: false,
            direction: None,
            reason: "Stand aside - no clear trend on higher timeframe".to_string(),
        };
    }

    if lower_tf_trend == TrendDirection::Neutral {
        return TradeActionResult {
            should_trade: false,
            direction: None,
            reason: "Stand aside - wait for pullback on lower timeframe".to_string(),
        };
    }

    if higher_tf_trend == lower_tf_trend {
        return TradeActionResult {
            should_trade: false,
            direction: None,
            reason: "Stand aside - both timeframes aligned, wait for pullback".to_string(),
        };
    }

    match higher_tf_trend {
        TrendDirection::Bullish => TradeActionResult {
            should_trade: true,
            direction: Some(TradeDirection::Long),
            reason: "Buy the dip - higher TF bullish, lower TF pullback".to_string(),
        },
        TrendDirection::Bearish => TradeActionResult {
            should_trade: true,
            direction: Some(TradeDirection::Short),
            reason: "Sell the rally - higher TF bearish, lower TF rally".to_string(),
        },
        TrendDirection::Neutral => unreachable!("neutral handled above"),
    }
}

/// True when the trade direction goes with the higher timeframe trend.
pub fn is_aligned_with_higher_tf(
    higher_tf_trend: TrendDirection,
    direction: TradeDirection,
) -> bool {
    matches!(
        (higher_tf_trend, direction),
        (TrendDirection::Bullish, TradeDirection::Long)
            | (TrendDirection::Bearish, TradeDirection::Short)
    )
}

/// Categorize a trade for position sizing.
///
/// With the higher timeframe: `with_trend`. Against it: `counter_trend`
/// at strong confluence (score >= 5), otherwise `reversal_attempt`.
pub fn categorize_trade(
    higher_tf_trend: TrendDirection,
    _lower_tf_trend: TrendDirection,
    direction: TradeDirection,
    confluence_score: u32,
) -> TradeCategory {
    if is_aligned_with_higher_tf(higher_tf_trend, direction) {
        return TradeCategory::WithTrend;
    }

    if confluence_score >= 5 {
        TradeCategory::CounterTrend
    } else {
        TradeCategory::ReversalAttempt
    }
}

fn alignment_strength(aligned: usize, total: usize) -> StrengthLevel {
    if total == 0 {
        return StrengthLevel::Weak;
    }
    let ratio = aligned as f64 / total as f64;
    if ratio >= 0.7 {
        StrengthLevel::Strong
    } else if ratio >= 0.4 {
        StrengthLevel::Moderate
    } else {
        StrengthLevel::Weak
    }
}

/// Check trend alignment across several timeframes for one symbol.
pub async fn check_timeframe_alignment(
    symbol: &str,
    timeframes: &[Timeframe],
    market_service: &MarketDataService,
) -> AlignmentResult {
    let mut results = Vec::with_capacity(timeframes.len());
    let mut bullish = 0;
    let mut bearish = 0;

    for &tf in timeframes {
        let assessment = assess_trend(symbol, tf, market_service).await;
        match assessment.trend {
            TrendDirection::Bullish => bullish += 1,
            TrendDirection::Bearish => bearish += 1,
            TrendDirection::Neutral => {}
        }
        results.push(TimeframeTrend {
            timeframe: tf.as_str().to_string(),
            trend: assessment.trend,
            swing_type: Some(assessment.swing_type),
        });
    }

    let aligned_count = bullish.max(bearish);

    AlignmentResult {
        aligned_count,
        total_count: timeframes.len(),
        strength: alignment_strength(aligned_count, timeframes.len()),
        timeframes: results,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pullback_long_when_higher_bullish_lower_bearish() {
        let action = determine_trade_action(TrendDirection::Bullish, TrendDirection::Bearish);

        assert!(action.should_trade);
        assert_eq!(action.direction, Some(TradeDirection::Long));
        assert!(action.reason.contains("dip"));
    }

    #[test]
    fn pullback_short_when_higher_bearish_lower_bullish() {
        let action = determine_trade_action(TrendDirection::Bearish, TrendDirection::Bullish);

        assert!(action.should_trade);
        assert_eq!(action.direction, Some(TradeDirection::Short));
        assert!(action.reason.contains("rally"));
    }

    #[test]
    fn aligned_timeframes_stand_aside() {
        for trend in [TrendDirection::Bullish, TrendDirection::Bearish] {
            let action = determine_trade_action(trend, trend);
            assert!(!action.should_trade);
            assert!(action.direction.is_none());
        }
    }

    #[test]
    fn neutral_timeframes_stand_aside() {
        assert!(!determine_trade_action(TrendDirection::Neutral, TrendDirection::Bullish).should_trade);
        assert!(!determine_trade_action(TrendDirection::Bullish, TrendDirection::Neutral).should_trade);
    }

    #[test]
    fn with_trend_category_for_aligned_direction() {
        let category = categorize_trade(
            TrendDirection::Bullish,
            TrendDirection::Bearish,
            TradeDirection::Long,
            1,
        );
        assert_eq!(category, TradeCategory::WithTrend);
    }

    #[test]
    fn counter_trend_requires_strong_confluence() {
        let counter = categorize_trade(
            TrendDirection::Bullish,
            TrendDirection::Bearish,
            TradeDirection::Short,
            5,
        );
        assert_eq!(counter, TradeCategory::CounterTrend);

        let reversal = categorize_trade(
            TrendDirection::Bullish,
            TrendDirection::Bearish,
            TradeDirection::Short,
            4,
        );
        assert_eq!(reversal, TradeCategory::ReversalAttempt);
    }

    #[test]
    fn category_risk_multipliers() {
        assert_eq!(TradeCategory::WithTrend.risk_multiplier(), 1.0);
        assert_eq!(TradeCategory::CounterTrend.risk_multiplier(), 0.5);
        assert_eq!(TradeCategory::ReversalAttempt.risk_multiplier(), 0.25);
    }

    #[test]
    fn alignment_strength_thresholds() {
        assert_eq!(alignment_strength(3, 4), StrengthLevel::Strong);
        assert_eq!(alignment_strength(2, 4), StrengthLevel::Moderate);
        assert_eq!(alignment_strength(1, 4), StrengthLevel::Weak);
        assert_eq!(alignment_strength(0, 0), StrengthLevel::Weak);
    }
}
