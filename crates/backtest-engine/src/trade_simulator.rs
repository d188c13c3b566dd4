use analysis_core::OhlcBar;
use chrono::{DateTime, Utc};
use trade_workflow::{TradeCategory, TradeDirection};

use crate::models::{ClosedTrade, ExitReason, OpenTrade};

/// Outcome of updating a trade with one bar.
#[derive(Debug, Clone, PartialEq)]
pub enum TradeUpdate {
    StillOpen(OpenTrade),
    Closed(ClosedTrade),
}

/// Simulates trade execution: stop checks, target exits, breakeven
/// shift, and ATR trailing stops.
pub struct TradeSimulator {
    breakeven_at_r: f64,
    trailing_stop_at_r: f64,
    trailing_stop_atr: f64,
}

impl TradeSimulator {
    pub fn new(breakeven_at_r: f64, trailing_stop_at_r: f64, trailing_stop_atr: f64) -> Self {
        Self {
            breakeven_at_r,
            trailing_stop_at_r,
            trailing_stop_atr,
        }
    }

    /// Open a trade at the bar's close.
    #[allow(clippy::too_many_arguments)]
    pub fn open_trade(
        &self,
        bar: &OhlcBar,
        bar_index: usize,
        direction: TradeDirection,
        position_size: f64,
        stop_loss: f64,
        targets: Vec<f64>,
        trade_category: TradeCategory,
        confluence_score: u32,
        atr: f64,
    ) -> OpenTrade {
        OpenTrade {
            entry_time: bar_datetime(bar),
            entry_price: bar.close,
            direction,
            position_size,
            stop_loss,
            targets,
            trade_category,
            confluence_score,
            entry_bar_index: bar_index,
            atr_at_entry: atr,
            current_stop: stop_loss,
            highest_price: (direction == TradeDirection::Long).then_some(bar.high),
            lowest_price: (direction == TradeDirection::Short).then_some(bar.low),
            at_breakeven: false,
        }
    }

    /// Advance a trade by one bar. Checks run in a fixed order: stop
    /// first (worst case), then targets, then tracking updates.
    pub fn update_trade(&self, trade: OpenTrade, bar: &OhlcBar, bar_index: usize) -> TradeUpdate {
        if stop_hit(&trade, bar) {
            let exit_price = trade.current_stop;
            let reason = if trade.at_breakeven {
                ExitReason::TrailingStop
            } else {
                ExitReason::StopLoss
            };
            return TradeUpdate::Closed(trade.close(
                bar_datetime(bar),
                exit_price,
                bar_index,
                reason,
            ));
        }

        if let Some((target_price, reason)) = target_hit(&trade, bar) {
            return TradeUpdate::Closed(trade.close(
                bar_datetime(bar),
                target_price,
                bar_index,
                reason,
            ));
        }

        TradeUpdate::StillOpen(self.track(trade, bar))
    }

    /// Close every open trade at the final bar's close.
    pub fn close_all_trades(
        &self,
        trades: Vec<OpenTrade>,
        final_bar: &OhlcBar,
        final_index: usize,
    ) -> Vec<ClosedTrade> {
        trades
            .into_iter()
            .map(|trade| {
                trade.close(
                    bar_datetime(final_bar),
                    final_bar.close,
                    final_index,
                    ExitReason::EndOfData,
                )
            })
            .collect()
    }

    /// Update the favorable extremum, shift to breakeven, and ratchet
    /// the trailing stop. The stop only ever moves in the trade's favor.
    fn track(&self, mut trade: OpenTrade, bar: &OhlcBar) -> OpenTrade {
        let risk = (trade.entry_price - trade.stop_loss).abs();
        if risk == 0.0 {
            return trade;
        }

        match trade.direction {
            TradeDirection::Long => {
                let highest = trade.highest_price.map_or(bar.high, |h| h.max(bar.high));
                trade.highest_price = Some(highest);

                let current_r = (highest - trade.entry_price) / risk;

                if !trade.at_breakeven && current_r >= self.breakeven_at_r {
                    trade.current_stop = trade.entry_price;
                    trade.at_breakeven = true;
                }

                if current_r >= self.trailing_stop_at_r {
                    let new_stop = highest - trade.atr_at_entry * self.trailing_stop_atr;
                    if new_stop > trade.current_stop {
                        trade.current_stop = new_stop;
                    }
                }
            }
            TradeDirection::Short => {
                let lowest = trade.lowest_price.map_or(bar.low, |l| l.min(bar.low));
                trade.lowest_price = Some(lowest);

                let current_r = (trade.entry_price - lowest) / risk;

                if !trade.at_breakeven && current_r >= self.breakeven_at_r {
                    trade.current_stop = trade.entry_price;
                    trade.at_breakeven = true;
                }

                if current_r >= self.trailing_stop_at_r {
                    let new_stop = lowest + trade.atr_at_entry * self.trailing_stop_atr;
                    if new_stop < trade.current_stop {
                        trade.current_stop = new_stop;
                    }
                }
            }
        }

        trade
    }
}

fn stop_hit(trade: &OpenTrade, bar: &OhlcBar) -> bool {
    match trade.direction {
        TradeDirection::Long => bar.low <= trade.current_stop,
        TradeDirection::Short => bar.high >= trade.current_stop,
    }
}

/// First target the bar reaches, scanned in ladder order.
fn target_hit(trade: &OpenTrade, bar: &OhlcBar) -> Option<(f64, ExitReason)> {
    for (i, &target) in trade.targets.iter().enumerate() {
        let hit = match trade.direction {
            TradeDirection::Long => bar.high >= target,
            TradeDirection::Short => bar.low <= target,
        };
        if hit {
            return Some((target, ExitReason::for_target(i)));
        }
    }
    None
}

fn bar_datetime(bar: &OhlcBar) -> DateTime<Utc> {
    bar.time.as_datetime().unwrap_or_default()
}
