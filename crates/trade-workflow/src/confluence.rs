use serde::{Deserialize, Serialize};
use technical_analysis::FibTool;

/// A price level tagged with the Fibonacci tool that produced it, for
/// cross-tool confluence detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelWithTool {
    pub price: f64,
    pub tool: FibTool,
}

/// Component-wise confluence breakdown.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfluenceBreakdown {
    /// Every Fibonacci level starts with one point.
    pub base_fib_level: u32,
    /// +1 per same-timeframe level within tolerance.
    pub same_tf_confluence: u32,
    /// +2 per higher-timeframe level within tolerance.
    pub higher_tf_confluence: u32,
    /// +2 per distinct other tool converging within tolerance.
    pub cross_tool_confluence: u32,
    /// +2 when a previous major pivot sits within tolerance.
    pub previous_pivot: u32,
    /// +1 at round-number price bands.
    pub psychological_level: u32,
}

/// Interpretation tier of a confluence total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfluenceTier {
    Standard,
    Important,
    Significant,
    Major,
}

/// Weighted confluence score for a price level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfluenceScore {
    pub total: u32,
    pub breakdown: ConfluenceBreakdown,
    pub interpretation: ConfluenceTier,
}

/// Score a candidate level against nearby levels, pivots, and round
/// numbers. Tolerance defaults to 0.5% of the candidate price.
pub fn calculate_confluence_score(
    level_price: f64,
    same_tf_levels: &[f64],
    higher_tf_levels: &[f64],
    previous_pivots: &[f64],
    tolerance_percent: f64,
    level_tool: Option<FibTool>,
    other_tool_levels: &[LevelWithTool],
) -> ConfluenceScore {
    let tolerance = level_price * (tolerance_percent / 100.0);

    let same_tf = count_within(level_price, same_tf_levels, tolerance);
    let higher_tf = count_within(level_price, higher_tf_levels, tolerance) * 2;
    let cross_tool = cross_tool_confluence(level_price, tolerance, level_tool, other_tool_levels);
    let pivot = if any_within(level_price, previous_pivots, tolerance) {
        2
    } else {
        0
    };
    let psychological = if is_psychological_level(level_price) { 1 } else { 0 };

    let breakdown = ConfluenceBreakdown {
        base_fib_level: 1,
        same_tf_confluence: same_tf,
        higher_tf_confluence: higher_tf,
        cross_tool_confluence: cross_tool,
        previous_pivot: pivot,
        psychological_level: psychological,
    };

    let total = breakdown.base_fib_level
        + breakdown.same_tf_confluence
        + breakdown.higher_tf_confluence
        + breakdown.cross_tool_confluence
        + breakdown.previous_pivot
        + breakdown.psychological_level;

    ConfluenceScore {
        total,
        breakdown,
        interpretation: interpret(total),
    }
}

fn count_within(target: f64, levels: &[f64], tolerance: f64) -> u32 {
    levels
        .iter()
        .filter(|level| (*level - target).abs() <= tolerance)
        .count() as u32
}

fn any_within(target: f64, levels: &[f64], tolerance: f64) -> bool {
    levels.iter().any(|level| (level - target).abs() <= tolerance)
}

/// +2 for each distinct tool, other than the candidate's own, with a
/// level inside the tolerance band.
fn cross_tool_confluence(
    level_price: f64,
    tolerance: f64,
    level_tool: Option<FibTool>,
    other_tool_levels: &[LevelWithTool],
) -> u32 {
    let Some(own_tool) = level_tool else {
        return 0;
    };

    let mut converging: Vec<FibTool> = Vec::new();
    for other in other_tool_levels {
        if other.tool == own_tool || converging.contains(&other.tool) {
            continue;
        }
        if (other.price - level_price).abs() <= tolerance {
            converging.push(other.tool);
        }
    }

    converging.len() as u32 * 2
}

/// Round-number check by price band: multiples of 10 under 100, of 100
/// under 1000, of 500 under 10000, of 1000 above.
pub fn is_psychological_level(price: f64) -> bool {
    let divisor = if price < 100.0 {
        10.0
    } else if price < 1_000.0 {
        100.0
    } else if price < 10_000.0 {
        500.0
    } else {
        1_000.0
    };
    (price % divisor).abs() < f64::EPSILON || (divisor - price % divisor).abs() < f64::EPSILON
}

fn interpret(total: u32) -> ConfluenceTier {
    if total >= 7 {
        ConfluenceTier::Major
    } else if total >= 5 {
        ConfluenceTier::Significant
    } else if total >= 3 {
        ConfluenceTier::Important
    } else {
        ConfluenceTier::Standard
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score_simple(level: f64, same: &[f64], higher: &[f64], pivots: &[f64]) -> ConfluenceScore {
        calculate_confluence_score(level, same, higher, pivots, 0.5, None, &[])
    }

    #[test]
    fn base_score_is_always_one() {
        let score = score_simple(101.0, &[], &[], &[]);
        assert_eq!(score.breakdown.base_fib_level, 1);
        assert_eq!(score.total, 1);
        assert_eq!(score.interpretation, ConfluenceTier::Standard);
    }

    #[test]
    fn same_tf_levels_add_one_each() {
        let score = score_simple(101.0, &[101.3, 101.4, 100.8], &[], &[]);
        assert_eq!(score.breakdown.same_tf_confluence, 3);
        assert_eq!(score.total, 4);
    }

    #[test]
    fn higher_tf_levels_add_two_each() {
        let score = score_simple(101.0, &[], &[101.2, 100.9], &[]);
        assert_eq!(score.breakdown.higher_tf_confluence, 4);
        assert_eq!(score.total, 5);
        assert_eq!(score.interpretation, ConfluenceTier::Significant);
    }

    #[test]
    fn distant_levels_do_not_count() {
        let score = score_simple(101.0, &[103.0], &[95.0], &[110.0]);
        assert_eq!(score.total, 1);
    }

    #[test]
    fn previous_pivot_adds_two_once() {
        let score = score_simple(101.0, &[], &[], &[101.1, 101.2]);
        assert_eq!(score.breakdown.previous_pivot, 2);
        assert_eq!(score.total, 3);
    }

    #[test]
    fn cross_tool_awards_per_distinct_tool() {
        let others = vec![
            LevelWithTool {
                price: 101.2,
                tool: FibTool::Extension,
            },
            LevelWithTool {
                price: 100.9,
                tool: FibTool::Extension,
            },
            LevelWithTool {
                price: 101.1,
                tool: FibTool::Projection,
            },
            LevelWithTool {
                price: 101.0,
                tool: FibTool::Retracement,
            },
        ];

        let score = calculate_confluence_score(
            101.0,
            &[],
            &[],
            &[],
            0.5,
            Some(FibTool::Retracement),
            &others,
        );

        // Extension counted once, projection once, own tool skipped
        assert_eq!(score.breakdown.cross_tool_confluence, 4);
    }

    #[test]
    fn psychological_bands() {
        assert!(is_psychological_level(90.0));
        assert!(!is_psychological_level(95.0));
        assert!(is_psychological_level(400.0));
        assert!(!is_psychological_level(450.0));
        assert!(is_psychological_level(8_500.0));
        assert!(!is_psychological_level(8_400.0));
        assert!(is_psychological_level(39_000.0));
        assert!(!is_psychological_level(39_500.0));
    }

    #[test]
    fn tier_ordering_is_monotonic_in_total() {
        assert_eq!(interpret(1), ConfluenceTier::Standard);
        assert_eq!(interpret(2), ConfluenceTier::Standard);
        assert_eq!(interpret(3), ConfluenceTier::Important);
        assert_eq!(interpret(4), ConfluenceTier::Important);
        assert_eq!(interpret(5), ConfluenceTier::Significant);
        assert_eq!(interpret(6), ConfluenceTier::Significant);
        assert_eq!(interpret(7), ConfluenceTier::Major);
        assert_eq!(interpret(12), ConfluenceTier::Major);

        assert!(ConfluenceTier::Standard < ConfluenceTier::Important);
        assert!(ConfluenceTier::Important < ConfluenceTier::Significant);
        assert!(ConfluenceTier::Significant < ConfluenceTier::Major);
    }
}
