use std::collections::HashMap;

use analysis_core::Timeframe;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use trade_workflow::{TradeCategory, TradeDirection};

/// Terminal status of a closed trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeStatus {
    Closed,
    StoppedOut,
    TargetHit,
}

/// Why a trade exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    StopLoss,
    Target1,
    Target2,
    Target3,
    TrailingStop,
    EndOfData,
    Manual,
}

impl ExitReason {
    /// Numbered target exit for a 0-based target index, clamped to 3.
    pub fn for_target(index: usize) -> ExitReason {
        match index {
            0 => ExitReason::Target1,
            1 => ExitReason::Target2,
            _ => ExitReason::Target3,
        }
    }

    pub fn status(&self) -> TradeStatus {
        match self {
            ExitReason::StopLoss => TradeStatus::StoppedOut,
            ExitReason::Target1 | ExitReason::Target2 | ExitReason::Target3 => {
                TradeStatus::TargetHit
            }
            ExitReason::TrailingStop | ExitReason::EndOfData | ExitReason::Manual => {
                TradeStatus::Closed
            }
        }
    }
}

/// Configuration for one backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub symbol: String,
    pub higher_timeframe: Timeframe,
    pub lower_timeframe: Timeframe,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub initial_capital: f64,
    /// Fraction of capital risked per trade.
    pub risk_per_trade: f64,
    pub lookback_periods: usize,
    pub confluence_threshold: u32,
    /// Minimum validation pass fraction (0-1).
    pub validation_pass_threshold: f64,
    pub atr_stop_multiplier: f64,
    /// R-multiple at which the stop moves to breakeven.
    pub breakeven_at_r: f64,
    /// R-multiple at which trailing starts.
    pub trailing_stop_at_r: f64,
    /// ATR multiplier for the trailing distance.
    pub trailing_stop_atr: f64,
}

impl BacktestConfig {
    pub fn new(
        symbol: impl Into<String>,
        higher_timeframe: Timeframe,
        lower_timeframe: Timeframe,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            higher_timeframe,
            lower_timeframe,
            start_date,
            end_date,
            initial_capital: 100_000.0,
            risk_per_trade: 0.01,
            lookback_periods: 50,
            confluence_threshold: 3,
            validation_pass_threshold: 0.6,
            atr_stop_multiplier: 1.5,
            breakeven_at_r: 1.0,
            trailing_stop_at_r: 2.0,
            trailing_stop_atr: 1.0,
        }
    }
}

/// An open position being tracked through the simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenTrade {
    pub entry_time: DateTime<Utc>,
    pub entry_price: f64,
    pub direction: TradeDirection,
    pub position_size: f64,
    /// Initial stop; R-multiples are measured against this.
    pub stop_loss: f64,
    pub targets: Vec<f64>,
    pub trade_category: TradeCategory,
    pub confluence_score: u32,
    pub entry_bar_index: usize,
    pub atr_at_entry: f64,
    pub current_stop: f64,
    /// Best price seen so far (longs).
    pub highest_price: Option<f64>,
    /// Best price seen so far (shorts).
    pub lowest_price: Option<f64>,
    pub at_breakeven: bool,
}

impl OpenTrade {
    /// Transition to closed. Consumes the open state so exit fields can
    /// never be partially set.
    pub fn close(
        self,
        exit_time: DateTime<Utc>,
        exit_price: f64,
        exit_bar_index: usize,
        exit_reason: ExitReason,
    ) -> ClosedTrade {
        ClosedTrade {
            entry_time: self.entry_time,
            entry_price: self.entry_price,
            direction: self.direction,
            position_size: self.position_size,
            stop_loss: self.stop_loss,
            targets: self.targets,
            trade_category: self.trade_category,
            confluence_score: self.confluence_score,
            entry_bar_index: self.entry_bar_index,
            atr_at_entry: self.atr_at_entry,
            at_breakeven: self.at_breakeven,
            status: exit_reason.status(),
            exit_time,
            exit_price,
            exit_reason,
            exit_bar_index,
        }
    }

    /// Mark-to-market PnL at a reference price.
    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        match self.direction {
            TradeDirection::Long => (price - self.entry_price) * self.position_size,
            TradeDirection::Short => (self.entry_price - price) * self.position_size,
        }
    }
}

/// A completed trade. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub entry_time: DateTime<Utc>,
    pub entry_price: f64,
    pub direction: TradeDirection,
    pub position_size: f64,
    pub stop_loss: f64,
    pub targets: Vec<f64>,
    pub trade_category: TradeCategory,
    pub confluence_score: u32,
    pub entry_bar_index: usize,
    pub atr_at_entry: f64,
    pub at_breakeven: bool,
    pub status: TradeStatus,
    pub exit_time: DateTime<Utc>,
    pub exit_price: f64,
    pub exit_reason: ExitReason,
    pub exit_bar_index: usize,
}

impl ClosedTrade {
    /// Profit/loss in account currency.
    pub fn pnl(&self) -> f64 {
        match self.direction {
            TradeDirection::Long => (self.exit_price - self.entry_price) * self.position_size,
            TradeDirection::Short => (self.entry_price - self.exit_price) * self.position_size,
        }
    }

    /// Profit in units of initial risk. With zero initial risk: 0 for a
    /// flat or losing exit, +infinity for a profit.
    pub fn r_multiple(&self) -> f64 {
        let per_unit = match self.direction {
            TradeDirection::Long => self.exit_price - self.entry_price,
            TradeDirection::Short => self.entry_price - self.exit_price,
        };
        let risk = (self.entry_price - self.stop_loss).abs();
        if risk == 0.0 {
            return if per_unit > 0.0 { f64::INFINITY } else { 0.0 };
        }
        per_unit / risk
    }
}

/// One point on the equity curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityCurvePoint {
    pub timestamp: DateTime<Utc>,
    pub bar_index: usize,
    pub equity: f64,
    pub open_pnl: f64,
    pub closed_pnl: f64,
    /// Closed trades so far.
    pub trade_count: usize,
}

/// Per-category performance slice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryMetrics {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    pub total_pnl: f64,
    pub average_r: f64,
    pub profit_factor: f64,
}

/// Performance metrics for a backtest run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BacktestMetrics {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub breakeven_trades: usize,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub total_pnl: f64,
    pub average_pnl: f64,
    pub average_winner: f64,
    pub average_loser: f64,
    pub average_r: f64,
    pub largest_winner: f64,
    pub largest_loser: f64,
    /// Max drawdown as a fraction of the running peak.
    pub max_drawdown: f64,
    /// Longest run of bars spent below the running peak.
    pub max_drawdown_duration: usize,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub calmar_ratio: f64,
    pub by_category: HashMap<String, CategoryMetrics>,
}

/// Complete result of a backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    pub config: BacktestConfig,
    pub metrics: BacktestMetrics,
    pub trades: Vec<ClosedTrade>,
    pub equity_curve: Vec<EquityCurvePoint>,
    pub execution_time_seconds: f64,
}

/// One tunable parameter in a grid search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationParameter {
    /// Must match a `BacktestConfig` field name.
    pub name: String,
    pub min_value: f64,
    pub max_value: f64,
    pub step: f64,
}

impl OptimizationParameter {
    /// Grid values `[min, min+step, ...]` inclusive of values <= max.
    pub fn values(&self) -> Vec<f64> {
        let mut values = Vec::new();
        if self.step <= 0.0 {
            return vec![self.min_value];
        }
        let mut current = self.min_value;
        // Float accumulation slack on the inclusive upper bound
        while current <= self.max_value + 1e-9 {
            values.push(current);
            current += self.step;
        }
        values
    }
}

/// Configuration for a walk-forward optimization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationConfig {
    pub base_config: BacktestConfig,
    pub parameters: Vec<OptimizationParameter>,
    pub in_sample_months: u32,
    pub out_of_sample_months: u32,
    /// Metric name to maximize, e.g. "sharpe_ratio".
    pub optimization_target: String,
}

/// Per-window record in an optimization result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowRecord {
    pub in_sample_start: DateTime<Utc>,
    pub in_sample_end: DateTime<Utc>,
    pub out_of_sample_start: DateTime<Utc>,
    pub out_of_sample_end: DateTime<Utc>,
    pub best_params: HashMap<String, f64>,
    pub in_sample_metric: f64,
    pub out_of_sample_metrics: BacktestMetrics,
}

/// Result of a walk-forward optimization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub windows: Vec<WindowRecord>,
    /// Per-parameter medians across window winners.
    pub best_parameters: HashMap<String, f64>,
    /// Metrics over all out-of-sample trades combined.
    pub combined_metrics: BacktestMetrics,
    /// `exp(-avg CV)` of winning parameters across windows.
    pub robustness_score: f64,
}

#[cfg(test)]
mod model_tests {
    use super::*;

    fn closed(entry: f64, exit: f64, stop: f64, size: f64, direction: TradeDirection) -> ClosedTrade {
        ClosedTrade {
            entry_time: Utc::now(),
            entry_price: entry,
            direction,
            position_size: size,
            stop_loss: stop,
            targets: vec![],
            trade_category: TradeCategory::WithTrend,
            confluence_score: 3,
            entry_bar_index: 0,
            atr_at_entry: 1.0,
            at_breakeven: false,
            status: TradeStatus::Closed,
            exit_time: Utc::now(),
            exit_price: exit,
            exit_reason: ExitReason::Manual,
            exit_bar_index: 1,
        }
    }

    #[test]
    fn pnl_respects_direction() {
        assert_eq!(closed(100.0, 110.0, 95.0, 2.0, TradeDirection::Long).pnl(), 20.0);
        assert_eq!(closed(100.0, 110.0, 105.0, 2.0, TradeDirection::Short).pnl(), -20.0);
        assert_eq!(closed(100.0, 90.0, 105.0, 2.0, TradeDirection::Short).pnl(), 20.0);
    }

    #[test]
    fn r_multiple_is_pnl_per_unit_over_initial_risk() {
        let trade = closed(100.0, 110.0, 95.0, 3.0, TradeDirection::Long);
        assert!((trade.r_multiple() - 2.0).abs() < 1e-9);
        // Consistency: r == (pnl / size) / risk
        let reconstructed = trade.pnl() / trade.position_size
            / (trade.entry_price - trade.stop_loss).abs();
        assert!((trade.r_multiple() - reconstructed).abs() < 1e-9);
    }

    #[test]
    fn zero_risk_r_multiple_edge_cases() {
        let flat = closed(100.0, 100.0, 100.0, 1.0, TradeDirection::Long);
        assert_eq!(flat.r_multiple(), 0.0);

        let profit = closed(100.0, 105.0, 100.0, 1.0, TradeDirection::Long);
        assert_eq!(profit.r_multiple(), f64::INFINITY);

        let loss = closed(100.0, 95.0, 100.0, 1.0, TradeDirection::Long);
        assert_eq!(loss.r_multiple(), 0.0);
    }

    #[test]
    fn exit_reason_status_mapping() {
        assert_eq!(ExitReason::StopLoss.status(), TradeStatus::StoppedOut);
        assert_eq!(ExitReason::Target1.status(), TradeStatus::TargetHit);
        assert_eq!(ExitReason::Target3.status(), TradeStatus::TargetHit);
        assert_eq!(ExitReason::TrailingStop.status(), TradeStatus::Closed);
        assert_eq!(ExitReason::EndOfData.status(), TradeStatus::Closed);
        assert_eq!(ExitReason::Manual.status(), TradeStatus::Closed);
    }

    #[test]
    fn target_reason_clamps_to_three() {
        assert_eq!(ExitReason::for_target(0), ExitReason::Target1);
        assert_eq!(ExitReason::for_target(1), ExitReason::Target2);
        assert_eq!(ExitReason::for_target(2), ExitReason::Target3);
        assert_eq!(ExitReason::for_target(7), ExitReason::Target3);
    }

    #[test]
    fn optimization_parameter_grid_is_inclusive() {
        let param = OptimizationParameter {
            name: "atr_stop_multiplier".to_string(),
            min_value: 1.0,
            max_value: 2.0,
            step: 0.5,
        };
        assert_eq!(param.values(), vec![1.0, 1.5, 2.0]);

        let single = OptimizationParameter {
            name: "lookback_periods".to_string(),
            min_value: 50.0,
            max_value: 50.0,
            step: 10.0,
        };
        assert_eq!(single.values(), vec![50.0]);
    }
}
