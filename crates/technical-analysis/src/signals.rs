use analysis_core::OhlcBar;
use serde::{Deserialize, Serialize};

/// Direction of a detected signal bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalDirection {
    Buy,
    Sell,
}

/// A single-bar signal at a Fibonacci level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelSignal {
    pub direction: SignalDirection,
    pub signal_type: String,
    /// Body-to-range ratio in [0, 1].
    pub strength: f64,
    pub level: f64,
}

/// Detect a signal bar at a price level.
///
/// A bullish bar (close above open) whose range touches the level and
/// closes above it is a buy signal; the bearish mirror is a sell. Dojis
/// and bars that never reach the level produce nothing.
pub fn detect_signal(bar: &OhlcBar, level: f64) -> Option<LevelSignal> {
    let touches = bar.low <= level && level <= bar.high;
    if !touches {
        return None;
    }

    let range = bar.high - bar.low;
    if range <= 0.0 {
        return None;
    }
    let strength = ((bar.close - bar.open).abs() / range).clamp(0.0, 1.0);

    if bar.close > bar.open && bar.close > level {
        Some(LevelSignal {
            direction: SignalDirection::Buy,
            signal_type: "type_1".to_string(),
            strength,
            level,
        })
    } else if bar.close < bar.open && bar.close < level {
        Some(LevelSignal {
            direction: SignalDirection::Sell,
            signal_type: "type_1".to_string(),
            strength,
            level,
        })
    } else {
        None
    }
}
