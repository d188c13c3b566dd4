use std::collections::HashMap;

use crate::models::{BacktestMetrics, CategoryMetrics, ClosedTrade, EquityCurvePoint};

/// Sentinel for ratios whose denominator is empty (no losses, no
/// downside deviation).
const RATIO_SENTINEL: f64 = 999.99;

/// Calculates performance metrics from closed trades and the equity
/// curve.
pub struct MetricsCalculator {
    risk_free_rate: f64,
    annualization_factor: f64,
}

impl Default for MetricsCalculator {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.0,
            annualization_factor: 252.0,
        }
    }
}

impl MetricsCalculator {
    pub fn new(risk_free_rate: f64, annualization_factor: f64) -> Self {
        Self {
            risk_free_rate,
            annualization_factor,
        }
    }

    pub fn calculate(
        &self,
        trades: &[ClosedTrade],
        equity_curve: &[EquityCurvePoint],
        initial_capital: f64,
    ) -> BacktestMetrics {
        if trades.is_empty() {
            return BacktestMetrics::default();
        }

        let pnls: Vec<f64> = trades.iter().map(|t| t.pnl()).collect();

        let winning_trades = pnls.iter().filter(|p| **p > 0.0).count();
        let losing_trades = pnls.iter().filter(|p| **p < 0.0).count();
        let breakeven_trades = pnls.iter().filter(|p| **p == 0.0).count();
        let total = trades.len();

        let total_pnl: f64 = pnls.iter().sum();
        let gross_profit: f64 = pnls.iter().filter(|p| **p > 0.0).sum();
        let gross_loss: f64 = pnls.iter().filter(|p| **p < 0.0).sum::<f64>().abs();

        let profit_factor = if gross_loss > 0.0 {
            gross_profit / gross_loss
        } else {
            RATIO_SENTINEL
        };

        let average_winner = if winning_trades > 0 {
            gross_profit / winning_trades as f64
        } else {
            0.0
        };
        let average_loser = if losing_trades > 0 {
            -gross_loss / losing_trades as f64
        } else {
            0.0
        };

        let r_multiples: Vec<f64> = trades.iter().map(|t| t.r_multiple()).collect();
        let average_r = r_multiples.iter().sum::<f64>() / r_multiples.len() as f64;

        let largest_winner = pnls.iter().cloned().fold(f64::NEG_INFINITY, f64::max).max(0.0);
        let largest_loser = pnls.iter().cloned().fold(f64::INFINITY, f64::min).min(0.0);

        let (max_drawdown, max_drawdown_duration) = drawdown(equity_curve);

        let returns = bar_returns(equity_curve);
        let sharpe_ratio = self.sharpe(&returns);
        let sortino_ratio = self.sortino(&returns);
        let calmar_ratio = self.calmar(equity_curve, initial_capital, max_drawdown);

        BacktestMetrics {
            total_trades: total,
            winning_trades,
            losing_trades,
            breakeven_trades,
            win_rate: winning_trades as f64 / total as f64,
            profit_factor,
            total_pnl,
            average_pnl: total_pnl / total as f64,
            average_winner,
            average_loser,
            average_r,
            largest_winner,
            largest_loser,
            max_drawdown,
            max_drawdown_duration,
            sharpe_ratio,
            sortino_ratio,
            calmar_ratio,
            by_category: category_breakdown(trades),
        }
    }

    /// Annualized Sharpe over per-bar returns.
    fn sharpe(&self, returns: &[f64]) -> f64 {
        if returns.is_empty() {
            return 0.0;
        }
        let n = returns.len() as f64;
        let mean = returns.iter().sum::<f64>() / n;
        let rf_per_bar = self.risk_free_rate / self.annualization_factor;

        let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
        let std_dev = variance.sqrt();
        if std_dev == 0.0 {
            return 0.0;
        }

        (mean - rf_per_bar) / std_dev * self.annualization_factor.sqrt()
    }

    /// Annualized Sortino: denominator uses only below-rf returns. With
    /// no downside, 0 for a non-positive mean and the sentinel otherwise.
    fn sortino(&self, returns: &[f64]) -> f64 {
        if returns.is_empty() {
            return 0.0;
        }
        let n = returns.len() as f64;
        let mean = returns.iter().sum::<f64>() / n;
        let rf_per_bar = self.risk_free_rate / self.annualization_factor;

        let downside: Vec<f64> = returns.iter().filter(|r| **r < rf_per_bar).cloned().collect();
        if downside.is_empty() {
            return if mean <= rf_per_bar { 0.0 } else { RATIO_SENTINEL };
        }

        let downside_variance = downside
            .iter()
            .map(|r| (r - rf_per_bar).powi(2))
            .sum::<f64>()
            / downside.len() as f64;
        let downside_std = downside_variance.sqrt();
        if downside_std == 0.0 {
            return 0.0;
        }

        (mean - rf_per_bar) / downside_std * self.annualization_factor.sqrt()
    }

    /// Annualized total return over max drawdown.
    fn calmar(
        &self,
        equity_curve: &[EquityCurvePoint],
        initial_capital: f64,
        max_drawdown: f64,
    ) -> f64 {
        if equity_curve.is_empty() || max_drawdown == 0.0 {
            return 0.0;
        }

        let final_equity = equity_curve[equity_curve.len() - 1].equity;
        let total_return = (final_equity - initial_capital) / initial_capital;

        let num_bars = equity_curve.len() as f64;
        let years = num_bars / self.annualization_factor;
        if years <= 0.0 {
            return 0.0;
        }

        let annual_return = (1.0 + total_return).powf(1.0 / years) - 1.0;
        annual_return / max_drawdown
    }
}

/// Per-bar simple returns, skipping bars whose previous equity is
/// non-positive.
fn bar_returns(equity_curve: &[EquityCurvePoint]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .filter(|w| w[0].equity > 0.0)
        .map(|w| (w[1].equity - w[0].equity) / w[0].equity)
        .collect()
}

/// Max drawdown (fraction of peak) and its duration in bars. Duration is
/// the longest consecutive run spent below the running peak.
fn drawdown(equity_curve: &[EquityCurvePoint]) -> (f64, usize) {
    if equity_curve.is_empty() {
        return (0.0, 0);
    }

    let mut peak = equity_curve[0].equity;
    let mut max_dd = 0.0;
    let mut max_duration = 0;
    let mut current_duration = 0;

    for point in equity_curve {
        if point.equity > peak {
            peak = point.equity;
            current_duration = 0;
        } else {
            let dd = if peak > 0.0 {
                (peak - point.equity) / peak
            } else {
                0.0
            };
            if dd > max_dd {
                max_dd = dd;
            }
            if dd > 0.0 {
                current_duration += 1;
                max_duration = max_duration.max(current_duration);
            }
        }
    }

    (max_dd, max_duration)
}

fn category_breakdown(trades: &[ClosedTrade]) -> HashMap<String, CategoryMetrics> {
    let mut by_category: HashMap<String, Vec<&ClosedTrade>> = HashMap::new();
    for trade in trades {
        by_category
            .entry(trade.trade_category.as_str().to_string())
            .or_default()
            .push(trade);
    }

    by_category
        .into_iter()
        .map(|(category, trades)| {
            let pnls: Vec<f64> = trades.iter().map(|t| t.pnl()).collect();
            let total = trades.len();
            let winning = pnls.iter().filter(|p| **p > 0.0).count();
            let losing = pnls.iter().filter(|p| **p < 0.0).count();
            let gross_profit: f64 = pnls.iter().filter(|p| **p > 0.0).sum();
            let gross_loss: f64 = pnls.iter().filter(|p| **p < 0.0).sum::<f64>().abs();
            let average_r =
                trades.iter().map(|t| t.r_multiple()).sum::<f64>() / total.max(1) as f64;

            let metrics = CategoryMetrics {
                total_trades: total,
                winning_trades: winning,
                losing_trades: losing,
                win_rate: winning as f64 / total.max(1) as f64,
                total_pnl: pnls.iter().sum(),
                average_r,
                profit_factor: if gross_loss > 0.0 {
                    gross_profit / gross_loss
                } else {
                    RATIO_SENTINEL
                },
            };
            (category, metrics)
        })
        .collect()
}
