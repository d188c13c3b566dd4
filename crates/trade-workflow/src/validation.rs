use analysis_core::{OhlcBar, Timeframe};
use market_data::MarketDataService;
use serde::{Deserialize, Serialize};
use technical_analysis::{detect_pivots, volume_analysis, FibDirection, FibTool};

use crate::alignment::{categorize_trade, determine_trade_action};
use crate::confirm::confirm_with_indicators;
use crate::confluence::{calculate_confluence_score, ConfluenceScore, LevelWithTool};
use crate::levels::build_levels;
use crate::trend::assess_trend;
use crate::types::{
    IndicatorSignalKind, LevelsResult, TradeCategory, TradeDirection, TrendDirection,
};

/// Candidate trade to validate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationRequest {
    pub symbol: String,
    pub higher_timeframe: Timeframe,
    pub lower_timeframe: Timeframe,
    pub direction: TradeDirection,
    pub signal_bar: Option<OhlcBar>,
    pub entry_level: Option<f64>,
}

/// One validation check result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationCheck {
    pub name: String,
    pub passed: bool,
    pub explanation: String,
    pub details: Option<String>,
}

/// Aggregate of the full checklist. A trade is valid at 60%+ passes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub checks: Vec<ValidationCheck>,
    pub passed_count: usize,
    pub total_count: usize,
    pub is_valid: bool,
    pub pass_percentage: f64,
}

const VALID_THRESHOLD_PERCENT: f64 = 60.0;

/// Validate a candidate trade against the eight-point checklist:
/// trend alignment, entry zone, target zones, RSI, MACD, volume,
/// confluence, and signal-bar confirmation.
pub async fn validate_trade(
    request: &ValidationRequest,
    market_service: &MarketDataService,
) -> ValidationResult {
    let mut checks: Vec<ValidationCheck> = Vec::with_capacity(8);

    let higher = assess_trend(&request.symbol, request.higher_timeframe, market_service).await;
    let lower = assess_trend(&request.symbol, request.lower_timeframe, market_service).await;

    // 1. Trend alignment
    let action = determine_trade_action(higher.trend, lower.trend);
    let alignment_passed = action.should_trade
        && action.direction == Some(request.direction)
        && higher.confidence >= 60;
    checks.push(ValidationCheck {
        name: "Trend Alignment".to_string(),
        passed: alignment_passed,
        explanation: if alignment_passed {
            action.reason.clone()
        } else {
            "Timeframes not aligned for this trade direction".to_string()
        },
        details: Some(format!(
            "Higher TF: {}, Lower TF: {}, Confidence: {}%",
            higher.trend, lower.trend, higher.confidence
        )),
    });

    // 2 & 3. Entry and target zones on the lower timeframe
    let fib_direction = match request.direction {
        TradeDirection::Long => FibDirection::Buy,
        TradeDirection::Short => FibDirection::Sell,
    };

    let market_lower = market_service
        .get_ohlc(&request.symbol, request.lower_timeframe, 50, false)
        .await;
    let detection = detect_pivots(&market_lower.data, 5, 10);

    let levels = match (&detection.swing_high, &detection.swing_low) {
        (Some(high), Some(low)) => build_levels(high.price, low.price, fib_direction),
        _ => LevelsResult::default(),
    };

    let entry_passed = !levels.entry_zones.is_empty();
    checks.push(ValidationCheck {
        name: "Entry Zone".to_string(),
        passed: entry_passed,
        explanation: if entry_passed {
            format!("Found {} Fibonacci entry levels", levels.entry_zones.len())
        } else {
            "No Fibonacci entry zones found".to_string()
        },
        details: levels
            .entry_zones
            .first()
            .map(|z| format!("Best: {} at {:.2}", z.label, z.price)),
    });

    let targets_passed = !levels.target_zones.is_empty();
    checks.push(ValidationCheck {
        name: "Target Zones".to_string(),
        passed: targets_passed,
        explanation: if targets_passed {
            format!("Found {} extension targets", levels.target_zones.len())
        } else {
            "No extension targets found".to_string()
        },
        details: levels
            .target_zones
            .first()
            .map(|z| format!("First: {} at {:.2}", z.label, z.price)),
    });

    // 4. RSI on the lower timeframe, pullback-aware
    let confirmation =
        confirm_with_indicators(&request.symbol, request.lower_timeframe, market_service).await;
    let rsi_passed = check_rsi(
        request.direction,
        confirmation.rsi.signal,
        higher.trend,
        lower.trend,
    );
    checks.push(ValidationCheck {
        name: "RSI Confirmation".to_string(),
        passed: rsi_passed,
        explanation: rsi_explanation(
            request.direction,
            confirmation.rsi.signal,
            confirmation.rsi.value,
            higher.trend,
            lower.trend,
        ),
        details: confirmation.rsi.value.map(|v| format!("RSI: {v:.1}")),
    });

    // 5. MACD on the higher timeframe
    let higher_confirmation =
        confirm_with_indicators(&request.symbol, request.higher_timeframe, market_service).await;
    let macd_passed = match request.direction {
        TradeDirection::Long => higher_confirmation.macd.signal == IndicatorSignalKind::Bullish,
        TradeDirection::Short => higher_confirmation.macd.signal == IndicatorSignalKind::Bearish,
    };
    checks.push(ValidationCheck {
        name: "MACD Confirmation".to_string(),
        passed: macd_passed,
        explanation: if macd_passed {
            format!(
                "{} MACD confirms {} momentum",
                request.higher_timeframe, request.direction
            )
        } else {
            "Higher timeframe MACD momentum not confirmed".to_string()
        },
        details: Some(format!(
            "Higher TF MACD: {:?}",
            higher_confirmation.macd.signal
        )),
    });

    // 6. Volume on the lower timeframe
    let volumes: Vec<f64> = market_lower
        .data
        .iter()
        .filter_map(|b| b.volume)
        .collect();
    let volume = volume_analysis(&volumes, 20);
    let volume_passed = volume.as_ref().is_some_and(|v| v.is_above_average);
    checks.push(ValidationCheck {
        name: "Volume Confirmation".to_string(),
        passed: volume_passed,
        explanation: match &volume {
            Some(v) if v.is_above_average => {
                format!("Relative volume {:.2} at or above average", v.relative_volume)
            }
            Some(v) => format!("Relative volume {:.2} below average", v.relative_volume),
            None => "No volume data available".to_string(),
        },
        details: volume.map(|v| format!("RVOL: {:.2}", v.relative_volume)),
    });

    // 7. Confluence by trade category
    let candidate = request
        .entry_level
        .or_else(|| levels.entry_zones.first().map(|z| z.price));
    let confluence = candidate.map(|price| {
        score_candidate_level(price, &levels, &detection.recent_pivots)
    });
    let confluence_total = confluence.as_ref().map_or(0, |c| c.total);
    let category = categorize_trade(
        higher.trend,
        lower.trend,
        request.direction,
        confluence_total,
    );
    let confluence_passed = match category {
        TradeCategory::WithTrend => confluence_total >= 3,
        TradeCategory::CounterTrend => confluence_total >= 5,
        TradeCategory::ReversalAttempt => false,
    };
    checks.push(ValidationCheck {
        name: "Confluence Score".to_string(),
        passed: confluence_passed,
        explanation: match (&confluence, category) {
            (None, _) => "No candidate level to score".to_string(),
            (Some(_), TradeCategory::ReversalAttempt) => {
                "Reversal attempts never meet the confluence bar".to_string()
            }
            (Some(c), _) if confluence_passed => {
                format!("Confluence {} meets the {category} minimum", c.total)
            }
            (Some(c), _) => {
                format!("Confluence {} below the {category} minimum", c.total)
            }
        },
        details: confluence
            .as_ref()
            .map(|c| format!("Score: {} ({:?})", c.total, c.interpretation)),
    });

    // 8. Signal bar, caller-supplied
    let (signal_passed, signal_explanation) =
        check_signal_bar(request.direction, &request.signal_bar, request.entry_level);
    checks.push(ValidationCheck {
        name: "Signal Bar Confirmation".to_string(),
        passed: signal_passed,
        explanation: signal_explanation,
        details: request
            .entry_level
            .map(|level| format!("Entry level: {level:.2}")),
    });

    let passed_count = checks.iter().filter(|c| c.passed).count();
    let total_count = checks.len();
    let pass_percentage = passed_count as f64 / total_count as f64 * 100.0;

    ValidationResult {
        checks,
        passed_count,
        total_count,
        is_valid: pass_percentage >= VALID_THRESHOLD_PERCENT,
        pass_percentage,
    }
}

/// Confluence input for the candidate: sibling retracements on the same
/// timeframe, extensions as a second tool, recent pivots.
fn score_candidate_level(
    price: f64,
    levels: &LevelsResult,
    recent_pivots: &[technical_analysis::PivotPoint],
) -> ConfluenceScore {
    let same_tf: Vec<f64> = levels
        .entry_zones
        .iter()
        .map(|z| z.price)
        .filter(|p| (p - price).abs() > f64::EPSILON)
        .collect();
    let other_tools: Vec<LevelWithTool> = levels
        .target_zones
        .iter()
        .map(|z| LevelWithTool {
            price: z.price,
            tool: FibTool::Extension,
        })
        .collect();
    let pivots: Vec<f64> = recent_pivots.iter().map(|p| p.price).collect();

    calculate_confluence_score(
        price,
        &same_tf,
        &[],
        &pivots,
        0.5,
        Some(FibTool::Retracement),
        &other_tools,
    )
}

/// Pullback RSI semantics: a long pullback entry wants a bearish or
/// oversold RSI, a short rally entry wants bullish or overbought;
/// non-pullback trades accept trend-aligned or neutral readings.
fn check_rsi(
    direction: TradeDirection,
    rsi_signal: IndicatorSignalKind,
    higher_trend: TrendDirection,
    lower_trend: TrendDirection,
) -> bool {
    if is_pullback(direction, higher_trend, lower_trend) {
        return match direction {
            TradeDirection::Long => matches!(
                rsi_signal,
                IndicatorSignalKind::Bearish | IndicatorSignalKind::Oversold
            ),
            TradeDirection::Short => matches!(
                rsi_signal,
                IndicatorSignalKind::Bullish | IndicatorSignalKind::Overbought
            ),
        };
    }

    match direction {
        TradeDirection::Long => matches!(
            rsi_signal,
            IndicatorSignalKind::Bullish
                | IndicatorSignalKind::Oversold
                | IndicatorSignalKind::Neutral
        ),
        TradeDirection::Short => matches!(
            rsi_signal,
            IndicatorSignalKind::Bearish
                | IndicatorSignalKind::Overbought
                | IndicatorSignalKind::Neutral
        ),
    }
}

fn rsi_explanation(
    direction: TradeDirection,
    rsi_signal: IndicatorSignalKind,
    rsi_value: Option<f64>,
    higher_trend: TrendDirection,
    lower_trend: TrendDirection,
) -> String {
    let rsi_str = rsi_value.map_or("N/A".to_string(), |v| format!("{v:.1}"));

    if is_pullback(direction, higher_trend, lower_trend) {
        return match direction {
            TradeDirection::Long => {
                if matches!(
                    rsi_signal,
                    IndicatorSignalKind::Bearish | IndicatorSignalKind::Oversold
                ) {
                    format!("RSI {rsi_str} - pullback entry opportunity")
                } else {
                    format!("RSI {rsi_str} - wait for deeper pullback")
                }
            }
            TradeDirection::Short => {
                if matches!(
                    rsi_signal,
                    IndicatorSignalKind::Bullish | IndicatorSignalKind::Overbought
                ) {
                    format!("RSI {rsi_str} - rally entry opportunity")
                } else {
                    format!("RSI {rsi_str} - wait for stronger rally")
                }
            }
        };
    }

    format!("RSI {rsi_signal:?} ({rsi_str})")
}

fn is_pullback(
    direction: TradeDirection,
    higher_trend: TrendDirection,
    lower_trend: TrendDirection,
) -> bool {
    matches!(
        (direction, higher_trend, lower_trend),
        (
            TradeDirection::Long,
            TrendDirection::Bullish,
            TrendDirection::Bearish
        ) | (
            TradeDirection::Short,
            TrendDirection::Bearish,
            TrendDirection::Bullish
        )
    )
}

/// Signal-bar confirmation against a caller-supplied bar and entry
/// level. A long needs a bullish close above the level; a short needs a
/// bearish close below it.
pub fn check_signal_bar(
    direction: TradeDirection,
    signal_bar: &Option<OhlcBar>,
    entry_level: Option<f64>,
) -> (bool, String) {
    let (Some(bar), Some(level)) = (signal_bar, entry_level) else {
        return (
            false,
            "Signal bar and entry level required for confirmation".to_string(),
        );
    };

    let passed = match direction {
        TradeDirection::Long => bar.close > bar.open && bar.close > level,
        TradeDirection::Short => bar.close < bar.open && bar.close < level,
    };

    let explanation = if passed {
        format!("Signal bar confirms {direction} at {level:.2}")
    } else {
        format!("Bar does not confirm {direction} entry at {level:.2}")
    };

    (passed, explanation)
}
