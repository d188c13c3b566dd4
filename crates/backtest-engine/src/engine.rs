use std::time::Instant;

use analysis_core::OhlcBar;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::data_loader::DataLoader;
use crate::metrics::MetricsCalculator;
use crate::models::{
    BacktestConfig, BacktestMetrics, BacktestResult, ClosedTrade, EquityCurvePoint, OpenTrade,
};
use crate::signals_processor::SignalsProcessor;
use crate::trade_simulator::{TradeSimulator, TradeUpdate};
use trade_workflow::calculate_position_size;

/// Replays historical data bar by bar, detecting entries and managing
/// positions through to exit.
pub struct BacktestEngine {
    data_loader: DataLoader,
}

impl BacktestEngine {
    pub fn new(data_loader: DataLoader) -> Self {
        Self { data_loader }
    }

    /// Load both timeframes and run the simulation.
    pub async fn run(&self, config: &BacktestConfig) -> BacktestResult {
        self.run_cancellable(config, &CancellationToken::new()).await
    }

    pub async fn run_cancellable(
        &self,
        config: &BacktestConfig,
        cancel: &CancellationToken,
    ) -> BacktestResult {
        let started = Instant::now();

        let higher_tf_bars = self
            .data_loader
            .load_data(
                &config.symbol,
                config.higher_timeframe,
                config.start_date,
                config.end_date,
            )
            .await
            .unwrap_or_default();

        let lower_tf_bars = self
            .data_loader
            .load_data(
                &config.symbol,
                config.lower_timeframe,
                config.start_date,
                config.end_date,
            )
            .await
            .unwrap_or_default();

        let mut result = run_on_bars(config, &higher_tf_bars, &lower_tf_bars, cancel);
        result.execution_time_seconds = started.elapsed().as_secs_f64();
        result
    }
}

/// Pure, synchronous simulation over preloaded bars. Deterministic for
/// identical inputs; `cancel` is checked at bar boundaries.
pub fn run_on_bars(
    config: &BacktestConfig,
    higher_tf_bars: &[OhlcBar],
    lower_tf_bars: &[OhlcBar],
    cancel: &CancellationToken,
) -> BacktestResult {
    let metrics_calculator = MetricsCalculator::default();

    if lower_tf_bars.is_empty() {
        return BacktestResult {
            config: config.clone(),
            metrics: BacktestMetrics::default(),
            trades: Vec::new(),
            equity_curve: Vec::new(),
            execution_time_seconds: 0.0,
        };
    }

    let processor = SignalsProcessor::new(
        config.lookback_periods,
        config.confluence_threshold,
        config.validation_pass_threshold,
        config.atr_stop_multiplier,
    );
    let simulator = TradeSimulator::new(
        config.breakeven_at_r,
        config.trailing_stop_at_r,
        config.trailing_stop_atr,
    );

    let mut open_trade: Option<OpenTrade> = None;
    let mut closed_trades: Vec<ClosedTrade> = Vec::new();
    let mut equity_curve: Vec<EquityCurvePoint> = Vec::with_capacity(lower_tf_bars.len());
    let mut closed_pnl = 0.0;
    let mut capital = config.initial_capital;

    for (bar_index, bar) in lower_tf_bars.iter().enumerate() {
        if cancel.is_cancelled() {
            break;
        }

        // 1. Advance any open trade
        if let Some(trade) = open_trade.take() {
            match simulator.update_trade(trade, bar, bar_index) {
                TradeUpdate::StillOpen(trade) => open_trade = Some(trade),
                TradeUpdate::Closed(closed) => {
                    closed_pnl += closed.pnl();
                    closed_trades.push(closed);
                }
            }
        }

        // 2. Look for a fresh entry when flat
        if open_trade.is_none() {
            if let Some(signal) =
                processor.detect_entry_signal(higher_tf_bars, lower_tf_bars, bar_index)
            {
                let risk_capital = capital * config.risk_per_trade;
                let sizing = calculate_position_size(
                    signal.entry_price,
                    signal.stop_loss,
                    risk_capital,
                    capital,
                    Some(signal.trade_category),
                );

                if sizing.is_valid {
                    debug!(
                        bar_index,
                        direction = %signal.direction,
                        entry = signal.entry_price,
                        "opening trade"
                    );
                    open_trade = Some(simulator.open_trade(
                        bar,
                        bar_index,
                        signal.direction,
                        sizing.position_size,
                        signal.stop_loss,
                        signal.targets.clone(),
                        signal.trade_category,
                        signal.confluence_score,
                        signal.atr,
                    ));
                }
            }
        }

        // 3. Mark to market
        let open_pnl = open_trade
            .as_ref()
            .map_or(0.0, |t| t.unrealized_pnl(bar.close));
        let equity = config.initial_capital + closed_pnl + open_pnl;

        equity_curve.push(EquityCurvePoint {
            timestamp: bar.time.as_datetime().unwrap_or_default(),
            bar_index,
            equity,
            open_pnl,
            closed_pnl,
            trade_count: closed_trades.len(),
        });

        capital = config.initial_capital + closed_pnl;
    }

    // 4. Force-close whatever is still open at the final bar
    if let Some(trade) = open_trade.take() {
        let final_index = lower_tf_bars.len() - 1;
        let final_bar = &lower_tf_bars[final_index];
        closed_trades.extend(simulator.close_all_trades(vec![trade], final_bar, final_index));
    }

    let metrics = metrics_calculator.calculate(
        &closed_trades,
        &equity_curve,
        config.initial_capital,
    );

    BacktestResult {
        config: config.clone(),
        metrics,
        trades: closed_trades,
        equity_curve,
        execution_time_seconds: 0.0,
    }
}
