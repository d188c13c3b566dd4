use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Direction the levels are drawn for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FibDirection {
    Buy,
    Sell,
}

/// Fibonacci tool families, used for cross-tool confluence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FibTool {
    Retracement,
    Extension,
    Projection,
    Expansion,
}

pub const RETRACEMENT_RATIOS: [f64; 5] = [0.236, 0.382, 0.5, 0.618, 0.786];
pub const EXTENSION_RATIOS: [f64; 5] = [1.272, 1.414, 1.618, 2.0, 2.618];

/// Boundary key for a ratio: `round(ratio * 1000)` as a string, e.g.
/// `0.382 -> "382"`, `1.272 -> "1272"`.
pub fn ratio_key(ratio: f64) -> String {
    format!("{}", (ratio * 1000.0).round() as i64)
}

/// Retracement price at `ratio` between a swing high and swing low.
///
/// Buy direction measures down from the high (`H - range * r`); sell
/// measures up from the low (`L + range * r`).
pub fn retracement_price(high: f64, low: f64, ratio: f64, direction: FibDirection) -> f64 {
    let range = high - low;
    match direction {
        FibDirection::Buy => high - range * ratio,
        FibDirection::Sell => low + range * ratio,
    }
}

/// Extension price at `ratio` beyond the anchor swing.
///
/// This system's convention projects buy-direction extensions below the
/// swing low (`L - range * (r - 1)`); sell-direction extensions go above
/// the high (`H + range * (r - 1)`).
pub fn extension_price(high: f64, low: f64, ratio: f64, direction: FibDirection) -> f64 {
    let range = high - low;
    match direction {
        FibDirection::Buy => low - range * (ratio - 1.0),
        FibDirection::Sell => high + range * (ratio - 1.0),
    }
}

/// All standard retracement levels keyed by ratio.
pub fn retracement_levels(
    high: f64,
    low: f64,
    direction: FibDirection,
) -> BTreeMap<String, f64> {
    RETRACEMENT_RATIOS
        .iter()
        .map(|&r| (ratio_key(r), retracement_price(high, low, r, direction)))
        .collect()
}

/// All standard extension levels keyed by ratio.
pub fn extension_levels(high: f64, low: f64, direction: FibDirection) -> BTreeMap<String, f64> {
    EXTENSION_RATIOS
        .iter()
        .map(|&r| (ratio_key(r), extension_price(high, low, r, direction)))
        .collect()
}

/// Project the A->B leg from point C: `C -/+ |B - A| * ratio` for
/// buy/sell respectively.
pub fn projection_price(
    point_a: f64,
    point_b: f64,
    point_c: f64,
    ratio: f64,
    direction: FibDirection,
) -> f64 {
    let leg = (point_b - point_a).abs();
    match direction {
        FibDirection::Buy => point_c - leg * ratio,
        FibDirection::Sell => point_c + leg * ratio,
    }
}

/// Expand the A->B leg from point B: `B -/+ |B - A| * ratio`.
pub fn expansion_price(point_a: f64, point_b: f64, ratio: f64, direction: FibDirection) -> f64 {
    let leg = (point_b - point_a).abs();
    match direction {
        FibDirection::Buy => point_b - leg * ratio,
        FibDirection::Sell => point_b + leg * ratio,
    }
}
