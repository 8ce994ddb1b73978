//! Historical rate trend analysis.
//!
//! Aggregates a lane's stored observations over a lookback window into
//! summary statistics, a direction call, and a short linear projection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Lane, MarketRate};

/// Rates moving less than this fraction over the window are "stable".
const STABLE_BAND_PCT: f64 = 2.0;
/// How far ahead the linear projection extends, in days.
const PROJECTION_DAYS: f64 = 7.0;
/// Sample count at which trend confidence saturates.
const FULL_CONFIDENCE_SAMPLES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrendDirection {
    Rising,
    Falling,
    Stable,
}

impl std::fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrendDirection::Rising => write!(f, "RISING"),
            TrendDirection::Falling => write!(f, "FALLING"),
            TrendDirection::Stable => write!(f, "STABLE"),
        }
    }
}

/// Result of a trend analysis over one lane's history.
#[derive(Debug, Clone, Serialize)]
pub struct RateTrendAnalysis {
    pub lane: Lane,
    pub window_days: i64,
    pub sample_count: usize,
    pub min_rate: f64,
    pub max_rate: f64,
    pub average_rate: f64,
    pub direction: TrendDirection,
    /// Relative change over the window, in percent
    pub change_pct: f64,
    /// Average rate projected seven days forward
    pub projected_rate: f64,
    /// [0, 1]; zero when the window held no samples
    pub confidence: f64,
    pub analyzed_at: DateTime<Utc>,
}

/// Relative change between the oldest and newest observation, as a
/// fraction. Zero when the history cannot support a comparison.
pub fn relative_change(history: &[MarketRate]) -> f64 {
    match (history.first(), history.last()) {
        (Some(first), Some(last)) if history.len() >= 2 && first.average_rate > 0.0 => {
            (last.average_rate - first.average_rate) / first.average_rate
        }
        _ => 0.0,
    }
}

/// Classify a percent change against the stable band.
pub fn classify(change_pct: f64) -> TrendDirection {
    if change_pct > STABLE_BAND_PCT {
        TrendDirection::Rising
    } else if change_pct < -STABLE_BAND_PCT {
        TrendDirection::Falling
    } else {
        TrendDirection::Stable
    }
}

/// Analyze a lane's rate history. `history` must be sorted oldest
/// first, the order `MarketRateStore::rate_history` returns. An empty
/// window yields a zero-confidence result rather than an error.
pub fn analyze(
    lane: &Lane,
    history: &[MarketRate],
    window_days: i64,
    now: DateTime<Utc>,
) -> RateTrendAnalysis {
    if history.is_empty() {
        return RateTrendAnalysis {
            lane: lane.clone(),
            window_days,
            sample_count: 0,
            min_rate: 0.0,
            max_rate: 0.0,
            average_rate: 0.0,
            direction: TrendDirection::Stable,
            change_pct: 0.0,
            projected_rate: 0.0,
            confidence: 0.0,
            analyzed_at: now,
        };
    }

    let min_rate = history.iter().map(|r| r.average_rate).fold(f64::INFINITY, f64::min);
    let max_rate = history.iter().map(|r| r.average_rate).fold(f64::NEG_INFINITY, f64::max);
    let average_rate =
        history.iter().map(|r| r.average_rate).sum::<f64>() / history.len() as f64;

    let change_pct = relative_change(history) * 100.0;
    let direction = classify(change_pct);
    let projected_rate = project(history);
    let confidence =
        (history.len() as f64 / FULL_CONFIDENCE_SAMPLES as f64).min(1.0);

    RateTrendAnalysis {
        lane: lane.clone(),
        window_days,
        sample_count: history.len(),
        min_rate,
        max_rate,
        average_rate,
        direction,
        change_pct,
        projected_rate,
        confidence,
        analyzed_at: now,
    }
}

/// Linear extrapolation from the window endpoints, seven days ahead,
/// floored at zero. A single observation projects flat.
fn project(history: &[MarketRate]) -> f64 {
    let (first, last) = match (history.first(), history.last()) {
        (Some(f), Some(l)) => (f, l),
        _ => return 0.0,
    };
    if history.len() < 2 {
        return last.average_rate;
    }

    let elapsed_days =
        (last.recorded_at - first.recorded_at).num_seconds() as f64 / 86_400.0;
    if elapsed_days <= 0.0 {
        return last.average_rate;
    }

    let slope_per_day = (last.average_rate - first.average_rate) / elapsed_days;
    (last.average_rate + slope_per_day * PROJECTION_DAYS).max(0.0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
