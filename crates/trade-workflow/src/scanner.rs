use std::time::Instant;

use analysis_core::Timeframe;
use futures::future::join_all;
use market_data::MarketDataService;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::alignment::{categorize_trade, determine_trade_action};
use crate::trend::assess_trend;
use crate::types::{
    OpportunityScanResult, TradeDirection, TradeOpportunity, TrendDirection,
};

const MIN_HIGHER_TF_CONFIDENCE: u32 = 60;
const AWAITING_SIGNAL_BAR: &str = "Awaiting signal bar at Fib support/resistance";

/// Scan symbols across timeframe pairs for trade opportunities.
///
/// One task per `(symbol, pair)` fans out concurrently; aggregation is
/// order-independent. Pullback setups are confirmed opportunities; when
/// `include_potential` is set, aligned with-trend setups are reported as
/// unconfirmed, awaiting a signal bar.
pub async fn scan_opportunities(
    symbols: &[String],
    timeframe_pairs: &[(Timeframe, Timeframe)],
    include_potential: bool,
    market_service: &MarketDataService,
    cancel: &CancellationToken,
) -> OpportunityScanResult {
    let started = Instant::now();

    let tasks = symbols.iter().flat_map(|symbol| {
        timeframe_pairs.iter().map(move |&(higher, lower)| {
            let symbol = symbol.clone();
            async move {
                if cancel.is_cancelled() {
                    return None;
                }
                analyze_symbol_pair(
                    &symbol,
                    higher,
                    lower,
                    include_potential,
                    market_service,
                )
                .await
            }
        })
    });

    let opportunities: Vec<TradeOpportunity> =
        join_all(tasks).await.into_iter().flatten().collect();

    debug!(
        scanned = symbols.len(),
        found = opportunities.len(),
        "opportunity scan complete"
    );

    OpportunityScanResult {
        symbols_scanned: symbols.to_vec(),
        opportunities,
        scan_time_ms: started.elapsed().as_millis() as u64,
    }
}

async fn analyze_symbol_pair(
    symbol: &str,
    higher_tf: Timeframe,
    lower_tf: Timeframe,
    include_potential: bool,
    market_service: &MarketDataService,
) -> Option<TradeOpportunity> {
    let higher = assess_trend(symbol, higher_tf, market_service).await;
    let lower = assess_trend(symbol, lower_tf, market_service).await;

    if higher.confidence < MIN_HIGHER_TF_CONFIDENCE {
        return None;
    }

    let action = determine_trade_action(higher.trend, lower.trend);

    let (direction, is_pullback, is_confirmed) = if let Some(direction) = action.direction {
        (direction, true, true)
    } else if include_potential && higher.trend == lower.trend {
        // Both timeframes pointing the same non-neutral way: a with-trend
        // setup that still needs its signal bar
        match higher.trend {
            TrendDirection::Bullish => (TradeDirection::Long, false, false),
            TrendDirection::Bearish => (TradeDirection::Short, false, false),
            TrendDirection::Neutral => return None,
        }
    } else {
        return None;
    };

    let confidence = ((higher.confidence + lower.confidence) / 2).min(100);
    let category = categorize_trade(higher.trend, lower.trend, direction, 3);

    let direction_text = match direction {
        TradeDirection::Long => "Buy",
        TradeDirection::Short => "Sell",
    };
    let description = format!(
        "{direction_text} {} in {} {} trend",
        lower.phase, higher_tf, higher.trend
    );

    Some(TradeOpportunity {
        symbol: symbol.to_string(),
        higher_timeframe: higher_tf.as_str().to_string(),
        lower_timeframe: lower_tf.as_str().to_string(),
        direction,
        confidence,
        category,
        phase: lower.phase,
        description,
        is_pullback,
        is_confirmed,
        awaiting_confirmation: (!is_confirmed).then(|| AWAITING_SIGNAL_BAR.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use market_data::{MarketDataConfig, SimulatedProvider};
    use std::sync::Arc;

    fn service() -> MarketDataService {
        MarketDataService::with_providers(
            MarketDataConfig::default(),
            vec![Arc::new(SimulatedProvider::new())],
        )
    }

    #[tokio::test]
    async fn scan_covers_every_symbol_pair() {
        let service = service();
        let symbols = vec!["DJI".to_string(), "SPX".to_string()];
        let pairs = vec![(Timeframe::D1, Timeframe::H4)];

        let result = scan_opportunities(
            &symbols,
            &pairs,
            true,
            &service,
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(result.symbols_scanned, symbols);
        // Every surfaced opportunity carries its own identifiers
        for opp in &result.opportunities {
            assert!(symbols.contains(&opp.symbol));
            assert_eq!(opp.higher_timeframe, "1D");
            assert_eq!(opp.lower_timeframe, "4H");
            assert!(opp.confidence <= 100);
            if !opp.is_confirmed {
                let awaiting = opp.awaiting_confirmation.as_ref().unwrap();
                assert!(awaiting.to_lowercase().contains("signal bar"));
            }
        }
    }

    #[tokio::test]
    async fn cancelled_scan_returns_no_opportunities() {
        let service = service();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = scan_opportunities(
            &["DJI".to_string()],
            &[(Timeframe::D1, Timeframe::H4)],
            true,
            &service,
            &cancel,
        )
        .await;

        assert!(result.opportunities.is_empty());
    }

    #[tokio::test]
    async fn unknown_symbols_contribute_nothing() {
        let service = service();
        let result = scan_opportunities(
            &["NOPE".to_string()],
            &[(Timeframe::D1, Timeframe::H4)],
            true,
            &service,
            &CancellationToken::new(),
        )
        .await;

        // Failed assessments come back neutral with zero confidence
        assert!(result.opportunities.is_empty());
        assert_eq!(result.symbols_scanned, vec!["NOPE".to_string()]);
    }
}
