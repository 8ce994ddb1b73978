//! Hotspot severity and bonus math.
//!
//! Pure functions shared by the five detectors: the composite severity
//! score, the bonus calculator, and the same-type spatial dedup that
//! collapses overlapping zones.

use std::cmp::Ordering;

use crate::types::{Hotspot, HotspotSeverity, HotspotType};

/// Bonus base before multipliers, USD.
pub const BONUS_BASE: f64 = 100.0;
/// Floor fraction of the lane base rate, when one is known.
pub const BONUS_RATE_FLOOR_PCT: f64 = 0.05;

/// Composite severity score. Demand and confidence push it up; a slack
/// supply/demand ratio (trucks per load above 1.0) pulls it down.
pub fn composite_score(demand_score: f64, confidence: f64, supply_demand_ratio: f64) -> f64 {
    0.5 * demand_score + 0.3 * confidence - 0.2 * supply_demand_ratio
}

/// Bonus for a zone: base scaled by the severity and type multipliers,
/// floored at 5% of the relevant base rate when one is known, capped
/// at `max_bonus`.
pub fn bonus_amount(
    severity: HotspotSeverity,
    hotspot_type: HotspotType,
    base_rate: Option<f64>,
    max_bonus: f64,
) -> f64 {
    let mut bonus = BONUS_BASE * severity.bonus_multiplier() * hotspot_type.bonus_multiplier();
    if let Some(rate) = base_rate {
        if rate > 0.0 {
            bonus = bonus.max(BONUS_RATE_FLOOR_PCT * rate);
        }
    }
    bonus.min(max_bonus)
}

/// Collapse same-type zones whose centers sit within the sum of their
/// radii; they describe one imbalance. The highest severity survives,
/// ties going to the higher confidence.
pub fn dedup_overlapping(mut candidates: Vec<Hotspot>) -> Vec<Hotspot> {
    // Strongest first, so a kept zone absorbs its weaker overlaps.
    candidates.sort_by(|a, b| {
        b.severity.cmp(&a.severity).then(
            b.confidence_score
                .partial_cmp(&a.confidence_score)
                .unwrap_or(Ordering::Equal),
        )
    });

    let mut kept: Vec<Hotspot> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if kept.iter().any(|k| k.overlaps(&candidate)) {
            continue;
        }
        kept.push(candidate);
    }
    kept
}
