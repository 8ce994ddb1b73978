//! Hotspot detection.
//!
//! Turns the latest demand forecast, live supply/demand ratios, rate
//! history, and weather feeds into severity-ranked geographic zones
//! with driver bonuses attached. Overlapping zones of the same type
//! collapse to the strongest before anything is persisted.

mod detectors;
pub mod scoring;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::geo::GeoPoint;
use crate::providers::events::{emit, EventSink, EventType};
use crate::providers::{ExternalMarketData, SupplyDemandSnapshot};
use crate::stores::{HotspotStore, MarketRateStore};
use crate::types::{DemandForecast, EquipmentType, Hotspot, LanewiseResult};

/// Live supply/demand snapshots keyed by (region, equipment), gathered
/// once per detection run and shared across detectors.
type RatioMap = HashMap<(String, EquipmentType), SupplyDemandSnapshot>;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Hotspot engine configuration.
#[derive(Debug, Clone)]
pub struct HotspotConfig {
    /// Radius for zones that don't carry their own, in miles.
    pub default_radius_miles: f64,
    /// Zone validity window, in hours.
    pub validity_hours: i64,
    /// Hard cap on any bonus, USD.
    pub max_bonus: f64,
    /// Trucks-per-load ratio below which a shortage zone is emitted.
    pub shortage_ratio_threshold: f64,
    /// Rate uplift over the historical average that flags an opportunity.
    pub rate_uplift_threshold: f64,
    /// Historical window behind the rate-opportunity average, in days.
    pub rate_lookback_days: i64,
    /// How recently a lane must have samples to be scanned, in days.
    pub recent_lane_days: i64,
}

impl Default for HotspotConfig {
    fn default() -> Self {
        Self {
            default_radius_miles: 50.0,
            validity_hours: 48,
            max_bonus: 500.0,
            shortage_ratio_threshold: 0.6,
            rate_uplift_threshold: 0.15,
            rate_lookback_days: 30,
            recent_lane_days: 7,
        }
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct HotspotEngine {
    config: HotspotConfig,
    hotspots: Arc<dyn HotspotStore>,
    rates: Arc<dyn MarketRateStore>,
    market_data: Arc<dyn ExternalMarketData>,
    events: Arc<dyn EventSink>,
}

impl HotspotEngine {
    pub fn new(
        config: HotspotConfig,
        hotspots: Arc<dyn HotspotStore>,
        rates: Arc<dyn MarketRateStore>,
        market_data: Arc<dyn ExternalMarketData>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            config,
            hotspots,
            rates,
            market_data,
            events,
        }
    }

    /// Access the hotspot configuration.
    pub fn config(&self) -> &HotspotConfig {
        &self.config
    }

    /// Run all five detectors against the given forecast, collapse
    /// overlapping zones, persist the survivors, and publish one
    /// `hotspot.created` per zone.
    pub async fn detect_hotspots(&self, forecast: &DemandForecast) -> LanewiseResult<Vec<Hotspot>> {
        let now = Utc::now();
        if !forecast.is_valid_at(now) {
            warn!(
                forecast_id = %forecast.forecast_id,
                valid_until = %forecast.valid_until,
                "Detecting against an expired forecast"
            );
        }

        let ratios = self.gather_ratios(forecast).await;

        let mut candidates = Vec::new();
        candidates.extend(self.detect_demand_surges(forecast, &ratios, now));
        candidates.extend(self.detect_supply_shortages(&ratios, now));
        candidates.extend(self.detect_rate_opportunities(now).await?);
        candidates.extend(self.detect_repositioning_needs(forecast, &ratios, now));
        candidates.extend(self.detect_weather_impacts(now).await);

        let candidate_count = candidates.len();
        let zones = scoring::dedup_overlapping(candidates);

        for zone in &zones {
            self.hotspots.upsert_hotspot(zone.clone()).await?;
            info!(
                hotspot_id = %zone.hotspot_id,
                kind = %zone.hotspot_type,
                severity = %zone.severity,
                region = %zone.region,
                bonus = format!("${:.2}", zone.bonus_amount),
                "Hotspot created"
            );
            emit(
                self.events.as_ref(),
                EventType::HotspotCreated,
                serde_json::json!({
                    "hotspot_id": zone.hotspot_id,
                    "type": zone.hotspot_type,
                    "severity": zone.severity,
                    "region": zone.region,
                    "bonus_amount": zone.bonus_amount,
                    "valid_until": zone.valid_until,
                }),
            )
            .await;
        }

        info!(
            candidates = candidate_count,
            zones = zones.len(),
            "Hotspot detection finished"
        );
        Ok(zones)
    }

    /// Hotspots currently live (active and inside their validity
    /// window).
    pub async fn active_hotspots(&self) -> LanewiseResult<Vec<Hotspot>> {
        self.hotspots.active_hotspots(Utc::now()).await
    }

    /// Live hotspots whose radius contains the given point.
    pub async fn hotspots_at(&self, point: GeoPoint) -> LanewiseResult<Vec<Hotspot>> {
        let active = self.hotspots.active_hotspots(Utc::now()).await?;
        Ok(active.into_iter().filter(|h| h.contains(point)).collect())
    }

    /// Sweep hotspots whose validity window has closed, returning how
    /// many were flipped inactive.
    pub async fn deactivate_expired(&self) -> LanewiseResult<usize> {
        let count = self.hotspots.deactivate_expired(Utc::now()).await?;
        if count > 0 {
            info!(count, "Expired hotspots deactivated");
        }
        Ok(count)
    }

    /// One supply/demand snapshot per (region, equipment) pair in the
    /// forecast. Failed lookups are logged and left out; detectors
    /// treat a missing pair as balanced.
    async fn gather_ratios(&self, forecast: &DemandForecast) -> RatioMap {
        let mut ratios = RatioMap::new();
        for regional in &forecast.regional {
            for demand in &regional.equipment_demand {
                let key = (regional.region.clone(), demand.equipment_type);
                if ratios.contains_key(&key) {
                    continue;
                }
                match self
                    .market_data
                    .region_supply_demand(&regional.region, demand.equipment_type)
                    .await
                {
                    Ok(snapshot) => {
                        ratios.insert(key, snapshot);
                    }
                    Err(e) => {
                        warn!(
                            region = %regional.region,
                            equipment = %demand.equipment_type,
                            error = %e,
                            "Supply/demand lookup failed"
                        );
                    }
                }
            }
        }
        ratios
    }
}
