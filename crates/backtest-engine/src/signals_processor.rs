use analysis_core::OhlcBar;
use serde::{Deserialize, Serialize};
use technical_analysis::{
    analyze_atr, classify_swings, detect_pivots, detect_signal, extension_price,
    retracement_price, FibDirection, SignalDirection,
};
use trade_workflow::{trend_from_markers, TradeCategory, TradeDirection, TrendDirection};

/// Retracement ratios a signal bar must coincide with.
const KEY_RETRACEMENTS: [f64; 3] = [0.382, 0.5, 0.618];
/// Extension ratios used for the target ladder.
const TARGET_EXTENSIONS: [f64; 3] = [1.0, 1.272, 1.618];

/// Entry signal detected during bar-by-bar replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntrySignal {
    pub bar_index: usize,
    pub direction: TradeDirection,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub targets: Vec<f64>,
    pub confluence_score: u32,
    pub trade_category: TradeCategory,
    pub atr: f64,
    /// Fraction of internal checks passed (0-1).
    pub validation_score: f64,
}

/// Fibonacci levels over the trailing window, tagged by tool.
struct WindowLevels {
    retracements: Vec<(f64, f64)>,
    extensions: Vec<(f64, f64)>,
}

/// Detects entry signals by replaying the workflow decision logic over
/// a trailing window of lower-timeframe bars.
pub struct SignalsProcessor {
    lookback_periods: usize,
    confluence_threshold: u32,
    validation_threshold: f64,
    atr_period: usize,
    atr_stop_multiplier: f64,
}

impl SignalsProcessor {
    pub fn new(
        lookback_periods: usize,
        confluence_threshold: u32,
        validation_threshold: f64,
        atr_stop_multiplier: f64,
    ) -> Self {
        Self {
            lookback_periods,
            confluence_threshold,
            validation_threshold,
            atr_period: 14,
            atr_stop_multiplier,
        }
    }

    /// Detect an entry signal at `bar_index` of the lower timeframe.
    ///
    /// Returns `None` until the lookback window is full, when either
    /// trend is neutral, when no signal bar prints at a key retracement,
    /// or when the confluence / validation gates fail.
    pub fn detect_entry_signal(
        &self,
        higher_tf_bars: &[OhlcBar],
        lower_tf_bars: &[OhlcBar],
        bar_index: usize,
    ) -> Option<EntrySignal> {
        if bar_index < self.lookback_periods || bar_index >= lower_tf_bars.len() {
            return None;
        }

        let current_bar = &lower_tf_bars[bar_index];
        let start = bar_index.saturating_sub(self.lookback_periods);
        let window = &lower_tf_bars[start..=bar_index];

        let higher_trend = assess_window_trend(higher_tf_bars);
        let lower_trend = assess_window_trend(window);

        if higher_trend == TrendDirection::Neutral || lower_trend == TrendDirection::Neutral {
            return None;
        }

        let (direction, category) = trade_direction_for(higher_trend, lower_trend)?;

        let levels = window_fib_levels(window, direction)?;

        if !self.signal_bar_at_key_level(current_bar, &levels, direction) {
            return None;
        }

        let highs: Vec<f64> = window.iter().map(|b| b.high).collect();
        let lows: Vec<f64> = window.iter().map(|b| b.low).collect();
        let closes: Vec<f64> = window.iter().map(|b| b.close).collect();
        let atr = analyze_atr(&highs, &lows, &closes, self.atr_period)?;

        let confluence = self.confluence_at(&levels, current_bar.close, atr.atr);
        if confluence < self.confluence_threshold {
            return None;
        }

        let validation_score =
            self.validation_score(higher_trend, lower_trend, direction, confluence);
        if validation_score < self.validation_threshold {
            return None;
        }

        let entry_price = current_bar.close;
        let stop_distance = atr.atr * self.atr_stop_multiplier;
        let stop_loss = match direction {
            TradeDirection::Long => entry_price - stop_distance,
            TradeDirection::Short => entry_price + stop_distance,
        };

        Some(EntrySignal {
            bar_index,
            direction,
            entry_price,
            stop_loss,
            targets: target_ladder(&levels, direction),
            confluence_score: confluence,
            trade_category: category,
            atr: atr.atr,
            validation_score,
        })
    }

    /// A valid signal bar must print at one of the key retracements in
    /// the trade's direction.
    fn signal_bar_at_key_level(
        &self,
        bar: &OhlcBar,
        levels: &WindowLevels,
        direction: TradeDirection,
    ) -> bool {
        let expected = match direction {
            TradeDirection::Long => SignalDirection::Buy,
            TradeDirection::Short => SignalDirection::Sell,
        };

        levels
            .retracements
            .iter()
            .filter(|(ratio, _)| KEY_RETRACEMENTS.contains(ratio))
            .any(|(_, price)| {
                detect_signal(bar, *price).is_some_and(|signal| signal.direction == expected)
            })
    }

    /// Lightweight confluence: +1 per level within half an ATR of price,
    /// +1 at a round hundred, on top of the base point.
    fn confluence_at(&self, levels: &WindowLevels, price: f64, atr: f64) -> u32 {
        let tolerance = atr * 0.5;
        let mut score = 1;

        for (_, level) in levels.retracements.iter().chain(levels.extensions.iter()) {
            if (level - price).abs() <= tolerance {
                score += 1;
            }
        }

        let round_level = (price / 100.0).round() * 100.0;
        if (price - round_level).abs() <= tolerance {
            score += 1;
        }

        score
    }

    /// Five-point internal checklist mirroring the workflow validator:
    /// higher-TF alignment, counter-trend pullback, confluence at
    /// threshold, minimum confluence, signal bar (already confirmed).
    fn validation_score(
        &self,
        higher_trend: TrendDirection,
        lower_trend: TrendDirection,
        direction: TradeDirection,
        confluence: u32,
    ) -> f64 {
        let mut passed = 0u32;

        match (direction, higher_trend) {
            (TradeDirection::Long, TrendDirection::Bullish)
            | (TradeDirection::Short, TrendDirection::Bearish) => passed += 1,
            _ => {}
        }

        match (direction, lower_trend) {
            (TradeDirection::Long, TrendDirection::Bearish)
            | (TradeDirection::Short, TrendDirection::Bullish) => passed += 1,
            _ => {}
        }

        if confluence >= self.confluence_threshold {
            passed += 1;
        }
        if confluence >= 2 {
            passed += 1;
        }
        passed += 1; // Signal bar was checked before this point

        passed as f64 / 5.0
    }
}

/// Swing-marker majority trend over a bar window. Neutral below ten bars
/// or with fewer than two markers.
fn assess_window_trend(bars: &[OhlcBar]) -> TrendDirection {
    if bars.len() < 10 {
        return TrendDirection::Neutral;
    }

    let detection = detect_pivots(bars, 5, 0);
    let markers = classify_swings(&detection.pivots);

    trend_from_markers(&markers)
}

/// Direction and category from trend alignment. Pullback setups trade
/// with the higher timeframe at full category; aligned same-direction
/// setups are taken at reduced (counter-trend) sizing since the move is
/// already underway.
fn trade_direction_for(
    higher: TrendDirection,
    lower: TrendDirection,
) -> Option<(TradeDirection, TradeCategory)> {
    match (higher, lower) {
        (TrendDirection::Bullish, TrendDirection::Bearish) => {
            Some((TradeDirection::Long, TradeCategory::WithTrend))
        }
        (TrendDirection::Bearish, TrendDirection::Bullish) => {
            Some((TradeDirection::Short, TradeCategory::WithTrend))
        }
        (TrendDirection::Bullish, TrendDirection::Bullish) => {
            Some((TradeDirection::Long, TradeCategory::CounterTrend))
        }
        (TrendDirection::Bearish, TrendDirection::Bearish) => {
            Some((TradeDirection::Short, TradeCategory::CounterTrend))
        }
        _ => None,
    }
}

/// Fibonacci levels from the window extrema (swing substitute for the
/// workflow pivots). `None` when the window has no range.
fn window_fib_levels(window: &[OhlcBar], direction: TradeDirection) -> Option<WindowLevels> {
    if window.len() < 10 {
        return None;
    }

    let swing_high = window.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
    let swing_low = window.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
    if swing_high <= swing_low {
        return None;
    }

    let fib_direction = match direction {
        TradeDirection::Long => FibDirection::Buy,
        TradeDirection::Short => FibDirection::Sell,
    };

    let retracements = technical_analysis::RETRACEMENT_RATIOS
        .iter()
        .map(|&r| (r, retracement_price(swing_high, swing_low, r, fib_direction)))
        .collect();
    let extensions = TARGET_EXTENSIONS
        .iter()
        .map(|&r| (r, extension_price(swing_high, swing_low, r, fib_direction)))
        .collect();

    Some(WindowLevels {
        retracements,
        extensions,
    })
}

/// Up to three extension targets sorted in the direction of travel.
fn target_ladder(levels: &WindowLevels, direction: TradeDirection) -> Vec<f64> {
    let mut targets: Vec<f64> = levels.extensions.iter().map(|(_, p)| *p).collect();

    match direction {
        TradeDirection::Long => targets.sort_by(|a, b| a.total_cmp(b)),
        TradeDirection::Short => targets.sort_by(|a, b| b.total_cmp(a)),
    }

    targets.truncate(3);
    targets
}
