use analysis_core::{Timeframe, TIMEFRAME_HIERARCHY};
use market_data::MarketDataService;
use serde::{Deserialize, Serialize};
use technical_analysis::SwingType;

use crate::trend::assess_trend;
use crate::types::TrendDirection;

/// Trend state of one timeframe inside a cascade analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeframeTrendState {
    pub timeframe: String,
    pub trend: TrendDirection,
    pub is_aligned_with_dominant: bool,
    pub is_diverging: bool,
    pub swing_type: Option<SwingType>,
    pub confidence: u32,
}

/// How deeply a reversal has propagated from fine to coarse timeframes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CascadeAnalysis {
    /// Ordinal stage 1-6.
    pub stage: u8,
    pub dominant_trend: TrendDirection,
    pub reversal_trend: TrendDirection,
    pub diverging_timeframes: Vec<String>,
    pub aligned_timeframes: Vec<String>,
    pub timeframe_states: Vec<TimeframeTrendState>,
    pub progression: String,
    pub actionable_insight: String,
    /// Probability 0-100 that a full reversal completes.
    pub reversal_probability: u8,
}

/// Position in the coarsest-first hierarchy; finer timeframes sort later.
fn hierarchy_rank(tf: Timeframe) -> usize {
    TIMEFRAME_HIERARCHY
        .iter()
        .position(|&h| h == tf)
        .unwrap_or(TIMEFRAME_HIERARCHY.len())
}

/// Detect the cascade stage for a symbol across timeframes.
///
/// Timeframes are assessed coarsest first. The dominant trend is the
/// majority vote of the coarser half of the list; timeframes trending
/// the other (non-neutral) way are diverging. The stage follows the
/// coarsest diverging timeframe: intraday-only divergence is an early
/// stage, divergence reaching 4H or 1D a late one, and divergence into
/// the weekly/monthly anchor a completed cascade.
pub async fn detect_cascade(
    symbol: &str,
    timeframes: &[Timeframe],
    market_service: &MarketDataService,
) -> CascadeAnalysis {
    let mut ordered: Vec<Timeframe> = timeframes.to_vec();
    ordered.sort_by_key(|&tf| hierarchy_rank(tf));
    ordered.dedup();

    let mut assessments = Vec::with_capacity(ordered.len());
    for &tf in &ordered {
        let assessment = assess_trend(symbol, tf, market_service).await;
        assessments.push((tf, assessment));
    }

    let dominant = dominant_trend(&assessments);
    let reversal = dominant.opposite();

    let mut aligned = Vec::new();
    let mut diverging = Vec::new();
    let mut states = Vec::with_capacity(assessments.len());

    for (tf, assessment) in &assessments {
        let is_aligned = dominant != TrendDirection::Neutral && assessment.trend == dominant;
        let is_diverging = dominant != TrendDirection::Neutral
            && assessment.trend != TrendDirection::Neutral
            && assessment.trend != dominant;

        if is_aligned {
            aligned.push(tf.as_str().to_string());
        }
        if is_diverging {
            diverging.push(tf.as_str().to_string());
        }

        states.push(TimeframeTrendState {
            timeframe: tf.as_str().to_string(),
            trend: assessment.trend,
            is_aligned_with_dominant: is_aligned,
            is_diverging,
            swing_type: Some(assessment.swing_type),
            confidence: assessment.confidence,
        });
    }

    // Coarsest diverging timeframe decides how deep the cascade runs
    let deepest = ordered
        .iter()
        .find(|tf| diverging.contains(&tf.as_str().to_string()))
        .copied();

    let (stage, probability) = stage_for(dominant, deepest);
    let (progression, insight) = describe_stage(stage, dominant, deepest);

    CascadeAnalysis {
        stage,
        dominant_trend: dominant,
        reversal_trend: reversal,
        diverging_timeframes: diverging,
        aligned_timeframes: aligned,
        timeframe_states: states,
        progression,
        actionable_insight: insight,
        reversal_probability: probability,
    }
}

/// Majority vote over the coarser half of the list. Ties and all-neutral
/// halves stay neutral.
fn dominant_trend(assessments: &[(Timeframe, crate::types::TrendAssessment)]) -> TrendDirection {
    if assessments.is_empty() {
        return TrendDirection::Neutral;
    }

    let top_half = assessments.len().div_ceil(2);
    let mut bullish = 0;
    let mut bearish = 0;

    for (_, assessment) in assessments.iter().take(top_half) {
        match assessment.trend {
            TrendDirection::Bullish => bullish += 1,
            TrendDirection::Bearish => bearish += 1,
            TrendDirection::Neutral => {}
        }
    }

    if bullish > bearish {
        TrendDirection::Bullish
    } else if bearish > bullish {
        TrendDirection::Bearish
    } else {
        TrendDirection::Neutral
    }
}

/// Stage and reversal probability from the coarsest diverging timeframe.
/// A neutral dominant trend forces stage 1.
fn stage_for(dominant: TrendDirection, deepest: Option<Timeframe>) -> (u8, u8) {
    if dominant == TrendDirection::Neutral {
        return (1, 5);
    }

    match deepest {
        None => (1, 5),
        Some(Timeframe::M1 | Timeframe::M3 | Timeframe::M5 | Timeframe::M15) => (2, 15),
        Some(Timeframe::H1) => (3, 30),
        Some(Timeframe::H4) => (4, 50),
        Some(Timeframe::D1) => (5, 75),
        Some(Timeframe::W1 | Timeframe::Mo1) => (6, 95),
    }
}

fn describe_stage(
    stage: u8,
    dominant: TrendDirection,
    deepest: Option<Timeframe>,
) -> (String, String) {
    let joined = deepest.map(|tf| tf.as_str()).unwrap_or("none");

    match stage {
        1 => (
            format!("All timeframes aligned with {dominant} trend"),
            "Trend intact - trade with-trend setups at full size".to_string(),
        ),
        2 => (
            format!("{joined} joined reversal"),
            "Minor intraday pullback - normal within trend, watch for entries".to_string(),
        ),
        3 => (
            format!("{joined} joined reversal"),
            "Momentum building against trend - tighten stops on open positions".to_string(),
        ),
        4 => (
            format!("{joined} joined reversal"),
            "Momentum shifting - reduce position size on new with-trend entries".to_string(),
        ),
        5 => (
            format!("{joined} joined reversal"),
            "Trend change likely - exit with-trend positions, prepare to reverse".to_string(),
        ),
        _ => (
            "Reversal reached the anchor timeframe".to_string(),
            "Cascade complete - look for entries with the new trend".to_string(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TrendAssessment, TrendPhase};

    fn assessment(trend: TrendDirection) -> TrendAssessment {
        TrendAssessment {
            trend,
            phase: TrendPhase::Impulse,
            swing_type: SwingType::HH,
            explanation: String::new(),
            confidence: 75,
            is_ranging: false,
            ranging_warning: None,
        }
    }

    fn states(
        pairs: &[(Timeframe, TrendDirection)],
    ) -> Vec<(Timeframe, TrendAssessment)> {
        pairs
            .iter()
            .map(|&(tf, trend)| (tf, assessment(trend)))
            .collect()
    }

    #[test]
    fn dominant_is_majority_of_the_coarse_half() {
        use TrendDirection::*;

        let all = states(&[
            (Timeframe::D1, Bullish),
            (Timeframe::H4, Bullish),
            (Timeframe::H1, Bullish),
            (Timeframe::M15, Bearish),
            (Timeframe::M5, Bearish),
        ]);
        // Top half = 1D, 4H, 1H, all bullish
        assert_eq!(dominant_trend(&all), Bullish);

        let tied = states(&[
            (Timeframe::D1, Bullish),
            (Timeframe::H4, Bearish),
            (Timeframe::H1, Neutral),
            (Timeframe::M15, Bearish),
        ]);
        assert_eq!(dominant_trend(&tied), Neutral);

        assert_eq!(dominant_trend(&[]), Neutral);
    }

    #[test]
    fn stage_mapping_by_deepest_diverging_timeframe() {
        use TrendDirection::Bullish;

        assert_eq!(stage_for(Bullish, None), (1, 5));
        assert_eq!(stage_for(Bullish, Some(Timeframe::M5)), (2, 15));
        assert_eq!(stage_for(Bullish, Some(Timeframe::M15)), (2, 15));
        assert_eq!(stage_for(Bullish, Some(Timeframe::H1)), (3, 30));
        assert_eq!(stage_for(Bullish, Some(Timeframe::H4)), (4, 50));
        assert_eq!(stage_for(Bullish, Some(Timeframe::D1)), (5, 75));
        assert_eq!(stage_for(Bullish, Some(Timeframe::W1)), (6, 95));
    }

    #[test]
    fn neutral_dominant_forces_stage_one() {
        // Stage 6 can never fire when the dominant trend is neutral
        assert_eq!(
            stage_for(TrendDirection::Neutral, Some(Timeframe::W1)),
            (1, 5)
        );
    }

    #[test]
    fn stage_one_progression_mentions_alignment() {
        let (progression, _) = describe_stage(1, TrendDirection::Bullish, None);
        assert!(progression.to_lowercase().contains("aligned"));
    }

    #[test]
    fn each_stage_has_an_insight() {
        for stage in 1..=6 {
            let (progression, insight) =
                describe_stage(stage, TrendDirection::Bullish, Some(Timeframe::H1));
            assert!(!progression.is_empty());
            assert!(!insight.is_empty());
        }
    }

    #[tokio::test]
    async fn detect_cascade_over_simulated_data() {
        use market_data::{MarketDataConfig, MarketDataService, SimulatedProvider};
        use std::sync::Arc;

        let service = MarketDataService::with_providers(
            MarketDataConfig::default(),
            vec![Arc::new(SimulatedProvider::new())],
        );

        let result = detect_cascade(
            "DJI",
            &[Timeframe::M15, Timeframe::D1, Timeframe::H4, Timeframe::H1],
            &service,
        )
        .await;

        assert!((1..=6).contains(&result.stage));
        assert!(result.reversal_probability <= 100);
        assert_eq!(result.timeframe_states.len(), 4);
        // States come back hierarchy-ordered, coarsest first
        assert_eq!(result.timeframe_states[0].timeframe, "1D");
        assert_eq!(result.timeframe_states[3].timeframe, "15m");
    }
}
