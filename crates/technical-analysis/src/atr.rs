use serde::{Deserialize, Serialize};

/// True Range for one bar. For the first bar (no previous close) this
/// collapses to `high - low`.
pub fn true_range(high: f64, low: f64, prev_close: Option<f64>) -> f64 {
    match prev_close {
        None => high - low,
        Some(pc) => (high - low).max((high - pc).abs()).max((low - pc).abs()),
    }
}

/// Average True Range with Wilder smoothing.
///
/// Output is aligned to the input: `None` before index `period - 1`, the
/// plain TR average at `period - 1`, Wilder-smoothed after. Mismatched
/// input lengths yield an empty vector; too little data yields all-None.
pub fn atr(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> Vec<Option<f64>> {
    if highs.is_empty() || highs.len() != lows.len() || highs.len() != closes.len() {
        return Vec::new();
    }
    if period == 0 || highs.len() < period {
        return vec![None; highs.len()];
    }

    let true_ranges: Vec<f64> = (0..highs.len())
        .map(|i| {
            let prev_close = if i > 0 { Some(closes[i - 1]) } else { None };
            true_range(highs[i], lows[i], prev_close)
        })
        .collect();

    let mut result: Vec<Option<f64>> = Vec::with_capacity(highs.len());
    let mut smoothed = 0.0;

    for (i, tr) in true_ranges.iter().enumerate() {
        if i < period - 1 {
            result.push(None);
        } else if i == period - 1 {
            smoothed = true_ranges[..period].iter().sum::<f64>() / period as f64;
            result.push(Some(smoothed));
        } else {
            smoothed = (smoothed * (period - 1) as f64 + tr) / period as f64;
            result.push(Some(smoothed));
        }
    }

    result
}

/// Volatility classification from ATR as a percentage of price.
pub fn classify_volatility(atr_percent: f64) -> (&'static str, &'static str) {
    if atr_percent < 0.5 {
        (
            "low",
            "Low volatility - market is quiet, may lack directional movement",
        )
    } else if atr_percent < 1.5 {
        ("normal", "Normal volatility - typical trading conditions")
    } else if atr_percent < 3.0 {
        (
            "high",
            "High volatility - use caution, consider reducing position size",
        )
    } else {
        (
            "extreme",
            "Extreme volatility - very risky, consider avoiding or minimal size",
        )
    }
}

/// ATR summary used for stop placement and volatility gating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtrAnalysis {
    pub atr: f64,
    pub atr_percent: f64,
    pub volatility_level: String,
    pub current_price: f64,
    pub suggested_stop_1x: f64,
    pub suggested_stop_1_5x: f64,
    pub suggested_stop_2x: f64,
    pub interpretation: String,
}

/// Analyze the most recent ATR: volatility level and suggested stop
/// distances at 1.0x / 1.5x / 2.0x. `None` when there is not enough data
/// or the current price is non-positive.
pub fn analyze_atr(
    highs: &[f64],
    lows: &[f64],
    closes: &[f64],
    period: usize,
) -> Option<AtrAnalysis> {
    if highs.len() < period || closes.len() < period {
        return None;
    }

    let series = atr(highs, lows, closes, period);
    let recent = series.last().copied().flatten()?;

    let current_price = *closes.last()?;
    if current_price <= 0.0 {
        return None;
    }

    let atr_percent = recent / current_price * 100.0;
    let (level, interpretation) = classify_volatility(atr_percent);

    Some(AtrAnalysis {
        atr: recent,
        atr_percent,
        volatility_level: level.to_string(),
        current_price,
        suggested_stop_1x: recent,
        suggested_stop_1_5x: recent * 1.5,
        suggested_stop_2x: recent * 2.0,
        interpretation: interpretation.to_string(),
    })
}
