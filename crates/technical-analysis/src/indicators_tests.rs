mod tests {
    use crate::atr::*;
    use crate::fibonacci::*;
    use crate::indicators::*;
    use crate::pivots::*;
    use crate::signals::*;
    use analysis_core::{BarTime, OhlcBar};

    fn bar(time: &str, open: f64, high: f64, low: f64, close: f64) -> OhlcBar {
        OhlcBar {
            time: BarTime::Date(time.to_string()),
            open,
            high,
            low,
            close,
            volume: None,
        }
    }

    fn sample_prices() -> Vec<f64> {
        vec![
            44.34, 44.09, 44.15, 43.61, 44.33, 44.83, 45.10, 45.42, 45.84, 46.08, 45.89, 46.03,
            45.61, 46.28, 46.28, 46.00, 46.03, 46.41, 46.22, 45.64,
        ]
    }

    // --- EMA ---

    #[test]
    fn ema_length_matches_input() {
        let prices = sample_prices();
        let result = ema(&prices, 5).unwrap();
        assert_eq!(result.len(), prices.len());
    }

    #[test]
    fn ema_warmup_is_expanding_average() {
        let prices = vec![10.0, 20.0, 30.0, 40.0, 50.0];
        let result = ema(&prices, 3).unwrap();

        assert!((result[0] - 10.0).abs() < 1e-9);
        assert!((result[1] - 15.0).abs() < 1e-9);
        // Index period-1 is the SMA of the first `period` prices
        assert!((result[2] - 20.0).abs() < 1e-9);
    }

    #[test]
    fn ema_smooths_after_seed() {
        let prices = vec![10.0, 20.0, 30.0, 40.0];
        let result = ema(&prices, 3).unwrap();

        // alpha = 0.5: 40 * 0.5 + 20 * 0.5 = 30
        assert!((result[3] - 30.0).abs() < 1e-9);
    }

    #[test]
    fn ema_rejects_bad_period_and_short_input() {
        assert!(ema(&[1.0, 2.0], 0).is_err());
        assert!(ema(&[1.0, 2.0], 3).is_err());
    }

    // --- MACD ---

    #[test]
    fn macd_histogram_equals_macd_minus_signal() {
        let prices: Vec<f64> = (0..60).map(|i| 100.0 + (i as f64 * 0.7).sin() * 5.0).collect();
        let series = macd(&prices, 12, 26, 9).unwrap();

        for i in 0..prices.len() {
            match (series.macd[i], series.signal[i], series.histogram[i]) {
                (Some(m), Some(s), Some(h)) => assert!((h - (m - s)).abs() < 1e-9),
                (_, _, None) => {
                    assert!(series.macd[i].is_none() || series.signal[i].is_none());
                }
                _ => panic!("histogram defined where an input was not"),
            }
        }
    }

    #[test]
    fn macd_warmup_is_none() {
        let prices: Vec<f64> = (0..40).map(|i| 100.0 + i as f64).collect();
        let series = macd(&prices, 12, 26, 9).unwrap();

        for i in 0..25 {
            assert!(series.macd[i].is_none());
        }
        assert!(series.macd[25].is_some());
    }

    #[test]
    fn macd_rejects_fast_not_less_than_slow() {
        let prices: Vec<f64> = (0..40).map(|i| i as f64).collect();
        assert!(macd(&prices, 26, 26, 9).is_err());
        assert!(macd(&prices, 30, 26, 9).is_err());
    }

    // --- RSI ---

    #[test]
    fn rsi_warmup_and_range() {
        let prices = sample_prices();
        let result = rsi(&prices, 14).unwrap();

        assert_eq!(result.len(), prices.len());
        for value in result.iter().take(14) {
            assert!(value.is_none());
        }
        for value in result.iter().skip(14) {
            let v = value.unwrap();
            assert!((0.0..=100.0).contains(&v));
        }
    }

    #[test]
    fn rsi_all_gains_is_100() {
        let prices: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let result = rsi(&prices, 14).unwrap();
        assert!((result[14].unwrap() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn rsi_flat_prices_is_50() {
        let prices = vec![100.0; 20];
        let result = rsi(&prices, 14).unwrap();
        assert!((result[14].unwrap() - 50.0).abs() < 1e-9);
    }

    // --- ATR ---

    #[test]
    fn atr_first_bar_uses_high_minus_low() {
        assert!((true_range(105.0, 95.0, None) - 10.0).abs() < 1e-9);
        assert!((true_range(105.0, 100.0, Some(90.0)) - 15.0).abs() < 1e-9);
    }

    #[test]
    fn atr_seeds_with_simple_average() {
        let highs = vec![12.0, 12.0, 12.0];
        let lows = vec![10.0, 10.0, 10.0];
        let closes = vec![11.0, 11.0, 11.0];

        let series = atr(&highs, &lows, &closes, 3);
        assert_eq!(series.len(), 3);
        assert!(series[0].is_none());
        assert!(series[1].is_none());
        assert!((series[2].unwrap() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn atr_mismatched_lengths_returns_empty() {
        assert!(atr(&[1.0, 2.0], &[1.0], &[1.0, 2.0], 2).is_empty());
    }

    #[test]
    fn volatility_classification_bands() {
        assert_eq!(classify_volatility(0.3).0, "low");
        assert_eq!(classify_volatility(1.0).0, "normal");
        assert_eq!(classify_volatility(2.0).0, "high");
        assert_eq!(classify_volatility(5.0).0, "extreme");
    }

    // --- Volume ---

    #[test]
    fn volume_analysis_flags() {
        let mut volumes = vec![100.0; 20];
        volumes.push(160.0);
        let analysis = volume_analysis(&volumes, 20).unwrap();

        assert!(analysis.relative_volume > 1.5);
        assert!(analysis.is_high_volume);
        assert!(analysis.is_above_average);
    }

    // --- Fibonacci ---

    #[test]
    fn buy_retracement_levels_match_reference_values() {
        let levels = retracement_levels(100.0, 50.0, FibDirection::Buy);

        assert!((levels["236"] - 88.2).abs() < 0.01);
        assert!((levels["382"] - 80.9).abs() < 0.01);
        assert!((levels["500"] - 75.0).abs() < 0.01);
        assert!((levels["618"] - 69.1).abs() < 0.01);
        assert!((levels["786"] - 60.7).abs() < 0.01);
    }

    #[test]
    fn retracement_endpoints_invert() {
        // ratio 0 returns the high, ratio 1 the low (buy direction)
        assert!((retracement_price(100.0, 50.0, 0.0, FibDirection::Buy) - 100.0).abs() < 1e-9);
        assert!((retracement_price(100.0, 50.0, 1.0, FibDirection::Buy) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn buy_extensions_project_below_the_low() {
        let levels = extension_levels(100.0, 50.0, FibDirection::Buy);

        assert!((levels["1272"] - 36.4).abs() < 0.01);
        assert!((levels["1618"] - 19.1).abs() < 0.01);
        // ratio 1 sits exactly on the low
        assert!((extension_price(100.0, 50.0, 1.0, FibDirection::Buy) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn sell_extensions_project_above_the_high() {
        assert!((extension_price(100.0, 50.0, 1.272, FibDirection::Sell) - 113.6).abs() < 0.01);
    }

    #[test]
    fn projection_and_expansion_scale_the_leg() {
        assert!((projection_price(100.0, 50.0, 75.0, 1.0, FibDirection::Buy) - 25.0).abs() < 0.01);
        assert!((expansion_price(50.0, 100.0, 1.0, FibDirection::Sell) - 150.0).abs() < 0.01);
    }

    #[test]
    fn ratio_keys_are_string_integers() {
        assert_eq!(ratio_key(0.382), "382");
        assert_eq!(ratio_key(0.618), "618");
        assert_eq!(ratio_key(1.272), "1272");
    }

    // --- Pivots ---

    /// Bars with an obvious peak at index 5 and trough at index 11.
    fn pivot_bars() -> Vec<OhlcBar> {
        let highs = [
            100.0, 101.0, 102.0, 103.0, 104.0, 110.0, 104.0, 103.0, 102.0, 101.0, 100.0, 95.0,
            100.0, 101.0, 102.0, 103.0, 104.0,
        ];
        highs
            .iter()
            .enumerate()
            .map(|(i, &h)| bar(&format!("2024-01-{:02}", i + 1), h - 2.0, h, h - 4.0, h - 1.0))
            .collect()
    }

    #[test]
    fn detect_pivots_finds_peak_and_trough() {
        let result = detect_pivots(&pivot_bars(), 3, 10);

        let swing_high = result.swing_high.unwrap();
        let swing_low = result.swing_low.unwrap();
        assert_eq!(swing_high.index, 5);
        assert!((swing_high.price - 110.0).abs() < 1e-9);
        assert_eq!(swing_low.index, 11);
        assert!((swing_low.price - 91.0).abs() < 1e-9);
    }

    #[test]
    fn pivots_alternate_kinds() {
        let result = detect_pivots(&pivot_bars(), 2, 0);

        for pair in result.pivots.windows(2) {
            assert_ne!(pair[0].kind, pair[1].kind);
        }
    }

    #[test]
    fn too_few_bars_yields_empty_result() {
        let bars = pivot_bars()[..5].to_vec();
        let result = detect_pivots(&bars, 5, 10);

        assert!(result.pivots.is_empty());
        assert_eq!(result.pivot_high, 0.0);
        assert_eq!(result.pivot_low, 0.0);
        assert!(result.swing_high.is_none());
    }

    #[test]
    fn recent_pivots_takes_the_tail() {
        let result = detect_pivots(&pivot_bars(), 2, 1);
        assert_eq!(result.recent_pivots.len(), 1);
        assert_eq!(
            result.recent_pivots[0],
            *result.pivots.last().unwrap()
        );
    }

    #[test]
    fn classify_swings_labels_patterns() {
        let pivots = vec![
            PivotPoint {
                index: 2,
                price: 100.0,
                kind: PivotKind::High,
                time: BarTime::Timestamp(1),
            },
            PivotPoint {
                index: 4,
                price: 90.0,
                kind: PivotKind::Low,
                time: BarTime::Timestamp(2),
            },
            PivotPoint {
                index: 6,
                price: 105.0,
                kind: PivotKind::High,
                time: BarTime::Timestamp(3),
            },
            PivotPoint {
                index: 8,
                price: 95.0,
                kind: PivotKind::Low,
                time: BarTime::Timestamp(4),
            },
        ];

        let markers = classify_swings(&pivots);

        // First high and first low are unclassified
        assert_eq!(markers.len(), 2);
        assert_eq!(markers[0].swing_type, SwingType::HH);
        assert_eq!(markers[1].swing_type, SwingType::HL);
    }

    #[test]
    fn classify_swings_equal_price_is_not_higher() {
        let pivots = vec![
            PivotPoint {
                index: 1,
                price: 100.0,
                kind: PivotKind::High,
                time: BarTime::Timestamp(1),
            },
            PivotPoint {
                index: 3,
                price: 100.0,
                kind: PivotKind::High,
                time: BarTime::Timestamp(2),
            },
        ];

        let markers = classify_swings(&pivots);
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].swing_type, SwingType::LH);
    }

    // --- Signal bars ---

    #[test]
    fn bullish_bar_through_level_is_a_buy() {
        let signal = detect_signal(&bar("2024-01-02", 60.0, 72.0, 58.0, 70.0), 65.0).unwrap();

        assert_eq!(signal.direction, SignalDirection::Buy);
        assert_eq!(signal.signal_type, "type_1");
        assert!((0.0..=1.0).contains(&signal.strength));
    }

    #[test]
    fn bearish_bar_through_level_is_a_sell() {
        let signal = detect_signal(&bar("2024-01-02", 70.0, 72.0, 58.0, 60.0), 65.0).unwrap();
        assert_eq!(signal.direction, SignalDirection::Sell);
    }

    #[test]
    fn doji_produces_no_signal() {
        assert!(detect_signal(&bar("2024-01-02", 65.0, 70.0, 60.0, 65.0), 65.0).is_none());
    }

    #[test]
    fn untouched_level_produces_no_signal() {
        assert!(detect_signal(&bar("2024-01-02", 60.0, 72.0, 58.0, 70.0), 40.0).is_none());
    }
}
