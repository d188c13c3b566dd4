use analysis_core::Timeframe;
use market_data::MarketDataService;
use technical_analysis::{macd, rsi};

use crate::types::{
    IndicatorConfirmation, IndicatorSignal, IndicatorSignalKind, OverallConfirmation,
};

/// Confirm a setup with RSI and MACD on one timeframe.
pub async fn confirm_with_indicators(
    symbol: &str,
    timeframe: Timeframe,
    market_service: &MarketDataService,
) -> IndicatorConfirmation {
    let market = market_service.get_ohlc(symbol, timeframe, 50, false).await;

    if !market.success || market.data.is_empty() {
        return neutral_confirmation();
    }

    let closes: Vec<f64> = market.data.iter().map(|b| b.close).collect();

    // RSI needs period + 1 bars
    if closes.len() < 15 {
        return neutral_confirmation();
    }

    let rsi_value = rsi(&closes, 14)
        .ok()
        .and_then(|series| series.iter().rev().find_map(|v| *v))
        .unwrap_or(50.0);
    let (rsi_signal, rsi_explanation) = interpret_rsi(rsi_value);

    let (macd_signal, macd_explanation) = if closes.len() < 26 {
        (
            IndicatorSignalKind::Neutral,
            "Insufficient data for MACD".to_string(),
        )
    } else {
        let histogram = macd(&closes, 12, 26, 9)
            .ok()
            .and_then(|series| series.histogram.iter().rev().find_map(|v| *v))
            .unwrap_or(0.0);
        interpret_macd(histogram)
    };

    let overall = combine(rsi_signal, macd_signal);

    IndicatorConfirmation {
        rsi: IndicatorSignal {
            value: Some(rsi_value),
            signal: rsi_signal,
            explanation: rsi_explanation,
        },
        macd: IndicatorSignal {
            value: None,
            signal: macd_signal,
            explanation: macd_explanation,
        },
        overall,
    }
}

fn interpret_rsi(value: f64) -> (IndicatorSignalKind, String) {
    if value < 30.0 {
        (
            IndicatorSignalKind::Oversold,
            "RSI below 30 = potential buy opportunity".to_string(),
        )
    } else if value > 70.0 {
        (
            IndicatorSignalKind::Overbought,
            "RSI above 70 = potential sell signal".to_string(),
        )
    } else if value < 50.0 {
        (
            IndicatorSignalKind::Neutral,
            format!("RSI at {value:.1} = slightly bearish bias"),
        )
    } else {
        (
            IndicatorSignalKind::Neutral,
            format!("RSI at {value:.1} = slightly bullish bias"),
        )
    }
}

fn interpret_macd(histogram: f64) -> (IndicatorSignalKind, String) {
    if histogram > 0.0 {
        (
            IndicatorSignalKind::Bullish,
            "MACD histogram positive = bullish momentum".to_string(),
        )
    } else if histogram < 0.0 {
        (
            IndicatorSignalKind::Bearish,
            "MACD histogram negative = bearish momentum".to_string(),
        )
    } else {
        (
            IndicatorSignalKind::Neutral,
            "MACD histogram at zero = no clear momentum".to_string(),
        )
    }
}

fn combine(
    rsi_signal: IndicatorSignalKind,
    macd_signal: IndicatorSignalKind,
) -> OverallConfirmation {
    let rsi_bullish = rsi_signal.is_bullish_leaning();
    let rsi_bearish = rsi_signal.is_bearish_leaning();
    let macd_bullish = macd_signal.is_bullish_leaning();
    let macd_bearish = macd_signal.is_bearish_leaning();

    if (rsi_bullish && macd_bullish) || (rsi_bearish && macd_bearish) {
        OverallConfirmation::Strong
    } else if rsi_bullish || macd_bullish || rsi_bearish || macd_bearish {
        OverallConfirmation::Partial
    } else {
        OverallConfirmation::Wait
    }
}

fn neutral_confirmation() -> IndicatorConfirmation {
    IndicatorConfirmation {
        rsi: IndicatorSignal {
            value: Some(50.0),
            signal: IndicatorSignalKind::Neutral,
            explanation: "No data".to_string(),
        },
        macd: IndicatorSignal {
            value: None,
            signal: IndicatorSignalKind::Neutral,
            explanation: "No data".to_string(),
        },
        overall: OverallConfirmation::Wait,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rsi_interpretation_bands() {
        assert_eq!(interpret_rsi(25.0).0, IndicatorSignalKind::Oversold);
        assert_eq!(interpret_rsi(75.0).0, IndicatorSignalKind::Overbought);
        assert_eq!(interpret_rsi(45.0).0, IndicatorSignalKind::Neutral);
        assert!(interpret_rsi(45.0).1.contains("bearish bias"));
        assert!(interpret_rsi(55.0).1.contains("bullish bias"));
    }

    #[test]
    fn macd_interpretation_by_sign() {
        assert_eq!(interpret_macd(1.5).0, IndicatorSignalKind::Bullish);
        assert_eq!(interpret_macd(-1.5).0, IndicatorSignalKind::Bearish);
        assert_eq!(interpret_macd(0.0).0, IndicatorSignalKind::Neutral);
    }

    #[test]
    fn combined_confirmation_levels() {
        assert_eq!(
            combine(IndicatorSignalKind::Oversold, IndicatorSignalKind::Bullish),
            OverallConfirmation::Strong
        );
        assert_eq!(
            combine(IndicatorSignalKind::Overbought, IndicatorSignalKind::Bearish),
            OverallConfirmation::Strong
        );
        assert_eq!(
            combine(IndicatorSignalKind::Neutral, IndicatorSignalKind::Bullish),
            OverallConfirmation::Partial
        );
        assert_eq!(
            combine(IndicatorSignalKind::Neutral, IndicatorSignalKind::Neutral),
            OverallConfirmation::Wait
        );
    }
}
