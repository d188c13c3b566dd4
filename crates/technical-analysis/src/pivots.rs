use analysis_core::{BarTime, OhlcBar};
use serde::{Deserialize, Serialize};

/// Whether a pivot marks a swing high or a swing low.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PivotKind {
    High,
    Low,
}

/// Detected swing high or low.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PivotPoint {
    pub index: usize,
    pub price: f64,
    pub kind: PivotKind,
    pub time: BarTime,
}

/// Result of pivot detection over a bar sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PivotDetection {
    /// All alternating pivots in chronological order.
    pub pivots: Vec<PivotPoint>,
    /// The most recent `count` pivots.
    pub recent_pivots: Vec<PivotPoint>,
    /// Highest price among high pivots (0 when none).
    pub pivot_high: f64,
    /// Lowest price among low pivots (0 when none).
    pub pivot_low: f64,
    /// Most recent swing high.
    pub swing_high: Option<PivotPoint>,
    /// Most recent swing low.
    pub swing_low: Option<PivotPoint>,
}

impl PivotDetection {
    fn empty() -> Self {
        Self {
            pivots: Vec::new(),
            recent_pivots: Vec::new(),
            pivot_high: 0.0,
            pivot_low: 0.0,
            swing_high: None,
            swing_low: None,
        }
    }
}

/// Swing pattern relative to the previous same-kind pivot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwingType {
    HH,
    HL,
    LH,
    LL,
}

impl SwingType {
    pub fn is_bullish(&self) -> bool {
        matches!(self, SwingType::HH | SwingType::HL)
    }
}

/// A pivot classified with its HH/HL/LH/LL pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwingMarker {
    pub index: usize,
    pub price: f64,
    pub time: BarTime,
    pub swing_type: SwingType,
}

fn is_swing_high(bars: &[OhlcBar], index: usize, lookback: usize) -> bool {
    let current = bars[index].high;
    for j in index - lookback..=index + lookback {
        if j != index && bars[j].high >= current {
            return false;
        }
    }
    true
}

fn is_swing_low(bars: &[OhlcBar], index: usize, lookback: usize) -> bool {
    let current = bars[index].low;
    for j in index - lookback..=index + lookback {
        if j != index && bars[j].low <= current {
            return false;
        }
    }
    true
}

/// Collect every swing-high/low candidate in index order. A single bar
/// may contribute both a high and a low candidate.
fn find_raw_pivots(bars: &[OhlcBar], lookback: usize) -> Vec<PivotPoint> {
    let mut raw = Vec::new();

    for i in lookback..bars.len() - lookback {
        if is_swing_high(bars, i, lookback) {
            raw.push(PivotPoint {
                index: i,
                price: bars[i].high,
                kind: PivotKind::High,
                time: bars[i].time.clone(),
            });
        }
        if is_swing_low(bars, i, lookback) {
            raw.push(PivotPoint {
                index: i,
                price: bars[i].low,
                kind: PivotKind::Low,
                time: bars[i].time.clone(),
            });
        }
    }

    raw
}

/// Keep pivots alternating high-low; within a same-kind run only the most
/// extreme survives (highest high, lowest low).
fn enforce_alternation(raw: Vec<PivotPoint>) -> Vec<PivotPoint> {
    let mut alternating: Vec<PivotPoint> = Vec::new();

    for pivot in raw {
        match alternating.last() {
            None => alternating.push(pivot),
            Some(last) if pivot.kind != last.kind => alternating.push(pivot),
            Some(last) => {
                let more_extreme = match pivot.kind {
                    PivotKind::High => pivot.price > last.price,
                    PivotKind::Low => pivot.price < last.price,
                };
                if more_extreme {
                    *alternating.last_mut().unwrap() = pivot;
                }
            }
        }
    }

    alternating
}

/// Detect swing highs and lows in OHLC data.
///
/// A bar is a swing high when its high strictly exceeds every high within
/// `lookback` bars on each side (ties disqualify); swing lows mirror this
/// on lows. Returns an empty result when fewer than `2 * lookback + 1`
/// bars are available. `count <= 0` returns all pivots as recent.
pub fn detect_pivots(bars: &[OhlcBar], lookback: usize, count: isize) -> PivotDetection {
    if lookback == 0 || bars.len() < 2 * lookback + 1 {
        return PivotDetection::empty();
    }

    let pivots = enforce_alternation(find_raw_pivots(bars, lookback));

    let highs: Vec<&PivotPoint> = pivots.iter().filter(|p| p.kind == PivotKind::High).collect();
    let lows: Vec<&PivotPoint> = pivots.iter().filter(|p| p.kind == PivotKind::Low).collect();

    let recent_pivots = if count > 0 && pivots.len() > count as usize {
        pivots[pivots.len() - count as usize..].to_vec()
    } else {
        pivots.clone()
    };

    PivotDetection {
        pivot_high: highs
            .iter()
            .map(|p| p.price)
            .fold(f64::NEG_INFINITY, f64::max),
        pivot_low: lows.iter().map(|p| p.price).fold(f64::INFINITY, f64::min),
        swing_high: highs.last().map(|p| (*p).clone()),
        swing_low: lows.last().map(|p| (*p).clone()),
        recent_pivots,
        pivots,
    }
    .normalized()
}

impl PivotDetection {
    /// Replace the fold sentinels with 0 when a side had no pivots.
    fn normalized(mut self) -> Self {
        if !self.pivot_high.is_finite() || self.swing_high.is_none() {
            self.pivot_high = 0.0;
        }
        if !self.pivot_low.is_finite() || self.swing_low.is_none() {
            self.pivot_low = 0.0;
        }
        self
    }
}

/// Classify pivots into HH/HL/LH/LL markers.
///
/// Each pivot is compared against the previous pivot of the same kind
/// with strict inequality for the "higher" case; the first pivot of each
/// kind has nothing to compare against and is omitted.
pub fn classify_swings(pivots: &[PivotPoint]) -> Vec<SwingMarker> {
    if pivots.len() < 2 {
        return Vec::new();
    }

    let mut markers = Vec::new();
    let mut prev_high: Option<&PivotPoint> = None;
    let mut prev_low: Option<&PivotPoint> = None;

    for pivot in pivots {
        match pivot.kind {
            PivotKind::High => {
                if let Some(prev) = prev_high {
                    let swing_type = if pivot.price > prev.price {
                        SwingType::HH
                    } else {
                        SwingType::LH
                    };
                    markers.push(SwingMarker {
                        index: pivot.index,
                        price: pivot.price,
                        time: pivot.time.clone(),
                        swing_type,
                    });
                }
                prev_high = Some(pivot);
            }
            PivotKind::Low => {
                if let Some(prev) = prev_low {
                    let swing_type = if pivot.price > prev.price {
                        SwingType::HL
                    } else {
                        SwingType::LL
                    };
                    markers.push(SwingMarker {
                        index: pivot.index,
                        price: pivot.price,
                        time: pivot.time.clone(),
                        swing_type,
                    });
                }
                prev_low = Some(pivot);
            }
        }
    }

    markers
}
