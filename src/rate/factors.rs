//! Five-factor rate adjustment model.
//!
//! The blend anchors on a fixed base factor: with every other factor
//! neutral the applied multiplier is exactly 1.0. The remaining four
//! factors contribute signed deltas, each clamped to the adjustment
//! band before weighting.

use std::collections::HashMap;

use serde::Serialize;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Hard floor on any adjustment, per factor and overall.
pub const MIN_RATE_ADJUSTMENT: f64 = -0.15;
/// Hard ceiling on any adjustment, per factor and overall.
pub const MAX_RATE_ADJUSTMENT: f64 = 0.30;

pub const BASE_WEIGHT: f64 = 0.40;
pub const SUPPLY_DEMAND_WEIGHT: f64 = 0.25;
pub const TREND_WEIGHT: f64 = 0.15;
pub const URGENCY_WEIGHT: f64 = 0.10;
pub const NETWORK_WEIGHT: f64 = 0.10;

// ---------------------------------------------------------------------------
// Per-factor inputs
// ---------------------------------------------------------------------------

/// Compress large swings so an extreme input cannot dominate the
/// blend: `sign(x) * ln(1 + |x|)`. Near zero this is ~identity.
pub fn damp(x: f64) -> f64 {
    if x == 0.0 {
        return 0.0;
    }
    x.signum() * (1.0 + x.abs()).ln()
}

/// Clamp an adjustment delta to the allowed band.
pub fn clamp_adjustment(x: f64) -> f64 {
    x.clamp(MIN_RATE_ADJUSTMENT, MAX_RATE_ADJUSTMENT)
}

/// Supply/demand delta from a trucks-per-load ratio. A tight market
/// (ratio < 1) pushes rates up, a loose one pushes them down, with
/// asymmetric slopes: shortages move pricing faster than surpluses.
pub fn supply_demand_delta(ratio: f64) -> f64 {
    let raw = if ratio < 1.0 {
        0.1 * (1.0 - ratio)
    } else {
        -0.05 * (ratio - 1.0)
    };
    clamp_adjustment(damp(raw))
}

/// Trend delta from the relative rate change over the lookback window.
pub fn trend_delta(relative_change: f64) -> f64 {
    clamp_adjustment(relative_change)
}

/// Urgency delta from hours remaining until pickup. A load that must
/// move within hours commands a premium; anything beyond three days
/// is business as usual.
pub fn urgency_delta(hours_until_pickup: Option<f64>) -> f64 {
    match hours_until_pickup {
        None => 0.0,
        Some(h) if h < 12.0 => 0.15,
        Some(h) if h < 24.0 => 0.10,
        Some(h) if h < 48.0 => 0.05,
        Some(h) if h < 72.0 => 0.02,
        Some(_) => 0.0,
    }
}

/// Network delta. A backhaul opportunity lets the carrier price below
/// market because the truck was heading that way anyway.
pub fn network_delta(backhaul_opportunity: bool) -> f64 {
    if backhaul_opportunity {
        -0.05
    } else {
        0.0
    }
}

// ---------------------------------------------------------------------------
// Blend
// ---------------------------------------------------------------------------

/// One factor's contribution to the rate multiplier.
#[derive(Debug, Clone, Serialize)]
pub struct RateFactor {
    /// Weight of this factor in the blend
    pub weight: f64,
    /// Factor multiplier; 1.0 is neutral
    pub value: f64,
    /// weight * value
    pub weighted: f64,
}

impl RateFactor {
    fn from_delta(weight: f64, delta: f64) -> Self {
        let value = 1.0 + delta;
        Self {
            weight,
            value,
            weighted: weight * value,
        }
    }
}

/// The blended adjustment plus its per-factor breakdown.
#[derive(Debug, Clone)]
pub struct FactorBlend {
    pub factors: HashMap<String, RateFactor>,
    /// Sum of weighted factor values minus 1, clamped to the caller's
    /// adjustment band.
    pub adjustment_factor: f64,
}

/// Blend the four signed deltas around the fixed base factor. The
/// weights sum to 1, so the weighted factor values sum to exactly
/// `1 + adjustment` before the final clamp.
pub fn blend(
    supply_demand: f64,
    trend: f64,
    urgency: f64,
    network: f64,
    min_adjustment: f64,
    max_adjustment: f64,
) -> FactorBlend {
    let mut factors = HashMap::new();
    factors.insert("base".to_string(), RateFactor::from_delta(BASE_WEIGHT, 0.0));
    factors.insert(
        "supply_demand".to_string(),
        RateFactor::from_delta(SUPPLY_DEMAND_WEIGHT, supply_demand),
    );
    factors.insert(
        "historical_trend".to_string(),
        RateFactor::from_delta(TREND_WEIGHT, trend),
    );
    factors.insert(
        "urgency".to_string(),
        RateFactor::from_delta(URGENCY_WEIGHT, urgency),
    );
    factors.insert(
        "network".to_string(),
        RateFactor::from_delta(NETWORK_WEIGHT, network),
    );

    let adjustment = SUPPLY_DEMAND_WEIGHT * supply_demand
        + TREND_WEIGHT * trend
        + URGENCY_WEIGHT * urgency
        + NETWORK_WEIGHT * network;

    FactorBlend {
        factors,
        adjustment_factor: adjustment.clamp(min_adjustment, max_adjustment),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
