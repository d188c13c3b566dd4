use std::collections::HashMap;
use std::sync::Arc;

use analysis_core::OhlcBar;
use chrono::{DateTime, Duration, Utc};
use rayon::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::data_loader::{filter_bars_by_range, DataLoader};
use crate::engine::run_on_bars;
use crate::metrics::MetricsCalculator;
use crate::models::{
    BacktestConfig, BacktestMetrics, ClosedTrade, EquityCurvePoint, OptimizationConfig,
    OptimizationParameter, OptimizationResult, WindowRecord,
};

/// One rolling walk-forward window.
#[derive(Debug, Clone, Copy)]
struct Window {
    in_sample_start: DateTime<Utc>,
    in_sample_end: DateTime<Utc>,
    out_of_sample_start: DateTime<Utc>,
    out_of_sample_end: DateTime<Utc>,
}

/// Walk-forward optimizer: grid search on rolling in-sample windows,
/// validation on the adjacent out-of-sample windows.
pub struct WalkForwardOptimizer {
    data_loader: Arc<DataLoader>,
}

impl WalkForwardOptimizer {
    pub fn new(data_loader: Arc<DataLoader>) -> Self {
        Self { data_loader }
    }

    pub async fn optimize(&self, config: &OptimizationConfig) -> OptimizationResult {
        let base = &config.base_config;

        let windows = generate_windows(
            base.start_date,
            base.end_date,
            config.in_sample_months,
            config.out_of_sample_months,
        );

        if windows.is_empty() {
            return OptimizationResult {
                windows: Vec::new(),
                best_parameters: HashMap::new(),
                combined_metrics: BacktestMetrics::default(),
                robustness_score: 0.0,
            };
        }

        let grid = parameter_grid(&config.parameters);

        // One load per timeframe covers every window
        let higher_bars = self
            .data_loader
            .load_data(
                &base.symbol,
                base.higher_timeframe,
                base.start_date,
                base.end_date,
            )
            .await
            .unwrap_or_default();
        let lower_bars = self
            .data_loader
            .load_data(
                &base.symbol,
                base.lower_timeframe,
                base.start_date,
                base.end_date,
            )
            .await
            .unwrap_or_default();

        let mut window_records = Vec::with_capacity(windows.len());
        let mut all_oos_trades: Vec<ClosedTrade> = Vec::new();
        let mut all_oos_equity: Vec<EquityCurvePoint> = Vec::new();
        let mut winners_per_window: Vec<HashMap<String, f64>> = Vec::new();

        for window in &windows {
            let (best_params, best_metric) = optimize_window(
                base,
                &grid,
                window,
                &config.optimization_target,
                &higher_bars,
                &lower_bars,
            );

            let oos_config = window_config(
                base,
                &best_params,
                window.out_of_sample_start,
                window.out_of_sample_end,
            );
            let oos_higher = filter_bars_by_range(
                &higher_bars,
                window.out_of_sample_start,
                window.out_of_sample_end,
            );
            let oos_lower = filter_bars_by_range(
                &lower_bars,
                window.out_of_sample_start,
                window.out_of_sample_end,
            );
            let oos_result = run_on_bars(
                &oos_config,
                &oos_higher,
                &oos_lower,
                &CancellationToken::new(),
            );

            debug!(
                in_sample_metric = best_metric,
                oos_trades = oos_result.trades.len(),
                "walk-forward window complete"
            );

            all_oos_trades.extend(oos_result.trades.clone());
            all_oos_equity.extend(oos_result.equity_curve.clone());

            window_records.push(WindowRecord {
                in_sample_start: window.in_sample_start,
                in_sample_end: window.in_sample_end,
                out_of_sample_start: window.out_of_sample_start,
                out_of_sample_end: window.out_of_sample_end,
                best_params: best_params.clone(),
                in_sample_metric: best_metric,
                out_of_sample_metrics: oos_result.metrics,
            });
            winners_per_window.push(best_params);
        }

        let combined_metrics = MetricsCalculator::default().calculate(
            &all_oos_trades,
            &all_oos_equity,
            base.initial_capital,
        );

        OptimizationResult {
            windows: window_records,
            best_parameters: robust_parameters(&winners_per_window),
            combined_metrics,
            robustness_score: robustness(&winners_per_window),
        }
    }
}

/// Rolling windows stepping by the out-of-sample span. Months are
/// 30-day blocks.
fn generate_windows(
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    in_sample_months: u32,
    out_of_sample_months: u32,
) -> Vec<Window> {
    let in_sample = Duration::days(i64::from(in_sample_months) * 30);
    let out_of_sample = Duration::days(i64::from(out_of_sample_months) * 30);
    let window_span = in_sample + out_of_sample;
    let step = out_of_sample;

    if step.is_zero() || window_span.is_zero() {
        return Vec::new();
    }

    let mut windows = Vec::new();
    let mut current = start_date;

    while current + window_span <= end_date {
        let in_sample_end = current + in_sample;
        let out_of_sample_end = in_sample_end + out_of_sample;

        if out_of_sample_end <= end_date {
            windows.push(Window {
                in_sample_start: current,
                in_sample_end,
                out_of_sample_start: in_sample_end,
                out_of_sample_end,
            });
        }

        current += step;
    }

    windows
}

/// Cartesian product of all parameter value lists.
fn parameter_grid(parameters: &[OptimizationParameter]) -> Vec<HashMap<String, f64>> {
    if parameters.is_empty() {
        return vec![HashMap::new()];
    }

    let mut grid: Vec<HashMap<String, f64>> = vec![HashMap::new()];

    for param in parameters {
        let values = param.values();
        let mut expanded = Vec::with_capacity(grid.len() * values.len());
        for combo in &grid {
            for &value in &values {
                let mut next = combo.clone();
                next.insert(param.name.clone(), value);
                expanded.push(next);
            }
        }
        grid = expanded;
    }

    grid
}

/// Grid search over one in-sample range, parallel across grid points.
/// Returns the best parameter set and its metric value.
fn optimize_window(
    base: &BacktestConfig,
    grid: &[HashMap<String, f64>],
    window: &Window,
    target: &str,
    higher_bars: &[OhlcBar],
    lower_bars: &[OhlcBar],
) -> (HashMap<String, f64>, f64) {
    let is_higher =
        filter_bars_by_range(higher_bars, window.in_sample_start, window.in_sample_end);
    let is_lower = filter_bars_by_range(lower_bars, window.in_sample_start, window.in_sample_end);

    let scored: Vec<(usize, f64)> = grid
        .par_iter()
        .enumerate()
        .map(|(i, params)| {
            let config = window_config(base, params, window.in_sample_start, window.in_sample_end);
            let result = run_on_bars(&config, &is_higher, &is_lower, &CancellationToken::new());
            (i, metric_value(&result.metrics, target))
        })
        .collect();

    // First strictly-greater wins, keeping the search deterministic
    let mut best_index = 0;
    let mut best_metric = f64::NEG_INFINITY;
    for (i, metric) in scored {
        if metric > best_metric {
            best_metric = metric;
            best_index = i;
        }
    }

    (grid[best_index].clone(), best_metric)
}

/// Apply a parameter set onto the base config with the given date range.
fn window_config(
    base: &BacktestConfig,
    params: &HashMap<String, f64>,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
) -> BacktestConfig {
    let mut config = base.clone();
    config.start_date = start_date;
    config.end_date = end_date;

    for (name, &value) in params {
        match name.as_str() {
            "risk_per_trade" => config.risk_per_trade = value,
            "lookback_periods" => config.lookback_periods = value as usize,
            "confluence_threshold" => config.confluence_threshold = value as u32,
            "validation_pass_threshold" => config.validation_pass_threshold = value,
            "atr_stop_multiplier" => config.atr_stop_multiplier = value,
            "breakeven_at_r" => config.breakeven_at_r = value,
            "trailing_stop_at_r" => config.trailing_stop_at_r = value,
            "trailing_stop_atr" => config.trailing_stop_atr = value,
            _ => {}
        }
    }

    config
}

/// Metric selector by name. Unknown names score zero.
fn metric_value(metrics: &BacktestMetrics, target: &str) -> f64 {
    match target {
        "sharpe_ratio" => metrics.sharpe_ratio,
        "sortino_ratio" => metrics.sortino_ratio,
        "calmar_ratio" => metrics.calmar_ratio,
        "profit_factor" => metrics.profit_factor,
        "total_pnl" => metrics.total_pnl,
        "win_rate" => metrics.win_rate,
        "average_r" => metrics.average_r,
        _ => 0.0,
    }
}

/// Per-parameter median over the window winners.
fn robust_parameters(winners: &[HashMap<String, f64>]) -> HashMap<String, f64> {
    let mut by_name: HashMap<String, Vec<f64>> = HashMap::new();
    for winner in winners {
        for (name, &value) in winner {
            by_name.entry(name.clone()).or_default().push(value);
        }
    }

    by_name
        .into_iter()
        .map(|(name, mut values)| {
            values.sort_by(|a, b| a.total_cmp(b));
            let mid = values.len() / 2;
            let median = if values.len() % 2 == 0 {
                (values[mid - 1] + values[mid]) / 2.0
            } else {
                values[mid]
            };
            (name, median)
        })
        .collect()
}

/// `exp(-avg CV)` across parameters; zero-mean parameters are excluded.
/// Fewer than two windows scores a full 1.0.
fn robustness(winners: &[HashMap<String, f64>]) -> f64 {
    if winners.len() < 2 {
        return 1.0;
    }

    let mut by_name: HashMap<String, Vec<f64>> = HashMap::new();
    for winner in winners {
        for (name, &value) in winner {
            by_name.entry(name.clone()).or_default().push(value);
        }
    }

    let cvs: Vec<f64> = by_name
        .values()
        .filter_map(|values| {
            let n = values.len() as f64;
            let mean = values.iter().sum::<f64>() / n;
            if mean == 0.0 {
                return None;
            }
            let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
            Some(variance.sqrt() / mean.abs())
        })
        .collect();

    if cvs.is_empty() {
        return 1.0;
    }

    let avg_cv = cvs.iter().sum::<f64>() / cvs.len() as f64;
    (-avg_cv).exp()
}
