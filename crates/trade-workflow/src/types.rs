use serde::{Deserialize, Serialize};
use technical_analysis::SwingType;

/// Overall trend direction read from swing structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Bullish,
    Bearish,
    Neutral,
}

impl TrendDirection {
    pub fn opposite(&self) -> TrendDirection {
        match self {
            TrendDirection::Bullish => TrendDirection::Bearish,
            TrendDirection::Bearish => TrendDirection::Bullish,
            TrendDirection::Neutral => TrendDirection::Neutral,
        }
    }
}

impl std::fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TrendDirection::Bullish => "bullish",
            TrendDirection::Bearish => "bearish",
            TrendDirection::Neutral => "neutral",
        };
        f.write_str(s)
    }
}

/// Phase of the current trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendPhase {
    Impulse,
    Correction,
    Continuation,
    Exhaustion,
}

impl std::fmt::Display for TrendPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TrendPhase::Impulse => "impulse",
            TrendPhase::Correction => "correction",
            TrendPhase::Continuation => "continuation",
            TrendPhase::Exhaustion => "exhaustion",
        };
        f.write_str(s)
    }
}

/// Trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeDirection {
    Long,
    Short,
}

impl std::fmt::Display for TradeDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            TradeDirection::Long => "long",
            TradeDirection::Short => "short",
        })
    }
}

/// Trade category driving position-size risk multipliers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeCategory {
    WithTrend,
    CounterTrend,
    ReversalAttempt,
}

impl TradeCategory {
    /// Fraction of base risk allowed for this category.
    pub fn risk_multiplier(&self) -> f64 {
        match self {
            TradeCategory::WithTrend => 1.0,
            TradeCategory::CounterTrend => 0.5,
            TradeCategory::ReversalAttempt => 0.25,
        }
    }

    pub fn explanation(&self) -> &'static str {
        match self {
            TradeCategory::WithTrend => "Trading with higher TF trend - full risk allowed",
            TradeCategory::CounterTrend => "Against higher TF at major confluence - 50% risk",
            TradeCategory::ReversalAttempt => "Speculative reversal trade - 25% risk only",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TradeCategory::WithTrend => "with_trend",
            TradeCategory::CounterTrend => "counter_trend",
            TradeCategory::ReversalAttempt => "reversal_attempt",
        }
    }
}

impl std::fmt::Display for TradeCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Alignment strength across timeframes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrengthLevel {
    Strong,
    Moderate,
    Weak,
}

/// Interpretation of an indicator reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorSignalKind {
    Bullish,
    Bearish,
    Neutral,
    Oversold,
    Overbought,
}

impl IndicatorSignalKind {
    pub fn is_bullish_leaning(&self) -> bool {
        matches!(self, IndicatorSignalKind::Bullish | IndicatorSignalKind::Oversold)
    }

    pub fn is_bearish_leaning(&self) -> bool {
        matches!(self, IndicatorSignalKind::Bearish | IndicatorSignalKind::Overbought)
    }
}

/// Combined indicator confirmation status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallConfirmation {
    Strong,
    Partial,
    Wait,
}

/// Result of trend assessment from swing pattern analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendAssessment {
    pub trend: TrendDirection,
    pub phase: TrendPhase,
    pub swing_type: SwingType,
    pub explanation: String,
    /// Confidence 0-100.
    pub confidence: u32,
    pub is_ranging: bool,
    pub ranging_warning: Option<String>,
}

/// Trend summary for one timeframe inside an alignment check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeframeTrend {
    pub timeframe: String,
    pub trend: TrendDirection,
    pub swing_type: Option<SwingType>,
}

/// Result of a multi-timeframe alignment check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlignmentResult {
    pub aligned_count: usize,
    pub total_count: usize,
    pub strength: StrengthLevel,
    pub timeframes: Vec<TimeframeTrend>,
}

/// Action decided by the pullback alignment rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeActionResult {
    pub should_trade: bool,
    pub direction: Option<TradeDirection>,
    pub reason: String,
}

/// A single Fibonacci price zone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelZone {
    pub label: String,
    pub price: f64,
    /// Confluence heat 0-100.
    pub heat: u32,
    pub formula: String,
}

/// Entry and target zones for a symbol/timeframe.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LevelsResult {
    pub entry_zones: Vec<LevelZone>,
    pub target_zones: Vec<LevelZone>,
}

/// Signal from one indicator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorSignal {
    pub value: Option<f64>,
    pub signal: IndicatorSignalKind,
    pub explanation: String,
}

/// Combined RSI/MACD confirmation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorConfirmation {
    pub rsi: IndicatorSignal,
    pub macd: IndicatorSignal,
    pub overall: OverallConfirmation,
}

/// A trade opportunity surfaced by the scanner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeOpportunity {
    pub symbol: String,
    pub higher_timeframe: String,
    pub lower_timeframe: String,
    pub direction: TradeDirection,
    /// Confidence 0-100.
    pub confidence: u32,
    pub category: TradeCategory,
    pub phase: TrendPhase,
    pub description: String,
    pub is_pullback: bool,
    pub is_confirmed: bool,
    pub awaiting_confirmation: Option<String>,
}

/// Result of scanning symbols for opportunities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpportunityScanResult {
    pub symbols_scanned: Vec<String>,
    pub opportunities: Vec<TradeOpportunity>,
    pub scan_time_ms: u64,
}
