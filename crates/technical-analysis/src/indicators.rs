use analysis_core::AnalysisError;

/// Exponential Moving Average.
///
/// Returns a vector of the same length as the input. Indices before
/// `period - 1` hold the expanding simple average over `[0..=i]`; index
/// `period - 1` holds the SMA of the first `period` prices; later values
/// apply the standard smoothing with multiplier `2 / (period + 1)`.
pub fn ema(prices: &[f64], period: usize) -> Result<Vec<f64>, AnalysisError> {
    if period == 0 {
        return Err(AnalysisError::InvalidArgument(
            "EMA period must be positive".to_string(),
        ));
    }
    if prices.len() < period {
        return Err(AnalysisError::InvalidArgument(format!(
            "Need at least {} prices, got {}",
            period,
            prices.len()
        )));
    }

    let multiplier = 2.0 / (period as f64 + 1.0);
    let mut result = Vec::with_capacity(prices.len());

    // Expanding-window warmup
    let mut running_sum = 0.0;
    for (i, price) in prices.iter().take(period - 1).enumerate() {
        running_sum += price;
        result.push(running_sum / (i + 1) as f64);
    }

    let seed: f64 = prices[..period].iter().sum::<f64>() / period as f64;
    result.push(seed);

    for price in &prices[period..] {
        let prev = *result.last().unwrap();
        result.push(price * multiplier + prev * (1.0 - multiplier));
    }

    Ok(result)
}

/// MACD line, signal line, and histogram, all aligned to the input.
///
/// Slots are `None` during warmup: the MACD line is defined from index
/// `slow - 1`, the signal line once `signal` MACD values exist, the
/// histogram wherever both are defined.
#[derive(Debug, Clone, PartialEq)]
pub struct MacdSeries {
    pub macd: Vec<Option<f64>>,
    pub signal: Vec<Option<f64>>,
    pub histogram: Vec<Option<f64>>,
}

pub fn macd(
    prices: &[f64],
    fast_period: usize,
    slow_period: usize,
    signal_period: usize,
) -> Result<MacdSeries, AnalysisError> {
    if fast_period >= slow_period {
        return Err(AnalysisError::InvalidArgument(format!(
            "fast_period ({fast_period}) must be less than slow_period ({slow_period})"
        )));
    }
    if prices.len() < slow_period {
        return Err(AnalysisError::InvalidArgument(format!(
            "Need at least {} prices, got {}",
            slow_period,
            prices.len()
        )));
    }

    let fast_ema = ema(prices, fast_period)?;
    let slow_ema = ema(prices, slow_period)?;

    let macd_line: Vec<Option<f64>> = (0..prices.len())
        .map(|i| {
            if i >= slow_period - 1 {
                Some(fast_ema[i] - slow_ema[i])
            } else {
                None
            }
        })
        .collect();

    let signal_line = macd_signal_line(&macd_line, signal_period);

    let histogram: Vec<Option<f64>> = macd_line
        .iter()
        .zip(signal_line.iter())
        .map(|(m, s)| match (m, s) {
            (Some(m), Some(s)) => Some(m - s),
            _ => None,
        })
        .collect();

    Ok(MacdSeries {
        macd: macd_line,
        signal: signal_line,
        histogram,
    })
}

/// EMA over the defined portion of the MACD line, written back into the
/// original indices.
fn macd_signal_line(macd_line: &[Option<f64>], signal_period: usize) -> Vec<Option<f64>> {
    let valid: Vec<f64> = macd_line.iter().filter_map(|v| *v).collect();

    if valid.len() < signal_period {
        return vec![None; macd_line.len()];
    }

    // Cannot fail: period checked above and valid is long enough.
    let signal_ema = ema(&valid, signal_period).unwrap_or_default();

    let mut signal_idx = 0;
    macd_line
        .iter()
        .map(|m| {
            if m.is_none() {
                return None;
            }
            let value = signal_ema.get(signal_idx).copied();
            signal_idx += 1;
            value
        })
        .collect()
}

/// Relative Strength Index using Wilder smoothing.
///
/// The first `period` outputs are `None`. Seed averages are arithmetic
/// means of the first `period` gains/losses; later averages use
/// `(avg * (n - 1) + current) / n`. With zero average loss the result is
/// 100 when any gain exists, 50 otherwise.
pub fn rsi(prices: &[f64], period: usize) -> Result<Vec<Option<f64>>, AnalysisError> {
    if period == 0 {
        return Err(AnalysisError::InvalidArgument(
            "RSI period must be positive".to_string(),
        ));
    }
    if prices.len() < period + 1 {
        return Err(AnalysisError::InvalidArgument(format!(
            "Need at least {} prices, got {}",
            period + 1,
            prices.len()
        )));
    }

    let changes: Vec<f64> = prices.windows(2).map(|w| w[1] - w[0]).collect();
    let gains: Vec<f64> = changes.iter().map(|c| c.max(0.0)).collect();
    let losses: Vec<f64> = changes.iter().map(|c| (-c).max(0.0)).collect();

    let mut result: Vec<Option<f64>> = vec![None; period];

    let mut avg_gain = gains[..period].iter().sum::<f64>() / period as f64;
    let mut avg_loss = losses[..period].iter().sum::<f64>() / period as f64;
    result.push(Some(rsi_value(avg_gain, avg_loss)));

    for i in period..changes.len() {
        avg_gain = (avg_gain * (period - 1) as f64 + gains[i]) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + losses[i]) / period as f64;
        result.push(Some(rsi_value(avg_gain, avg_loss)));
    }

    Ok(result)
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return if avg_gain > 0.0 { 100.0 } else { 50.0 };
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}

/// Volume relative to its moving average.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeAnalysis {
    pub current_volume: f64,
    pub average_volume: f64,
    pub relative_volume: f64,
    pub is_high_volume: bool,
    pub is_above_average: bool,
}

/// Compare the latest volume to its SMA over `ma_period` bars.
///
/// Returns `None` when there are fewer than `ma_period` observations or
/// the average is zero.
pub fn volume_analysis(volumes: &[f64], ma_period: usize) -> Option<VolumeAnalysis> {
    if ma_period == 0 || volumes.len() < ma_period {
        return None;
    }

    let window = &volumes[volumes.len() - ma_period..];
    let average = window.iter().sum::<f64>() / ma_period as f64;
    if average <= 0.0 {
        return None;
    }

    let current = *volumes.last().unwrap();
    let relative = current / average;

    Some(VolumeAnalysis {
        current_volume: current,
        average_volume: average,
        relative_volume: relative,
        is_high_volume: relative >= 1.5,
        is_above_average: relative >= 1.0,
    })
}
