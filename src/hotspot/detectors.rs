//! The five hotspot detectors.
//!
//! Each walks one signal source (forecast regions, live ratios, rate
//! history, forecast lanes, weather feeds) and emits fully-formed zone
//! candidates; the engine merges and persists them.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::geo::{region_center, GeoPoint};
use crate::types::{
    DemandForecast, EquipmentType, Hotspot, HotspotSeverity, HotspotType, LanewiseResult,
};

use super::scoring::{bonus_amount, composite_score};
use super::{HotspotEngine, RatioMap};

/// Regional forecast confidence (0-100) required before a surge zone
/// is trusted.
const SURGE_MIN_CONFIDENCE_PCT: f64 = 70.0;
/// Rate uplift at which the opportunity demand signal saturates.
const RATE_UPLIFT_SATURATION: f64 = 0.30;
/// Provider weather severity at or above which a zone goes CRITICAL.
const SEVERE_WEATHER_THRESHOLD: f64 = 0.7;

impl HotspotEngine {
    /// Regions whose forecast shows elevated demand with enough
    /// confidence behind it.
    pub(super) fn detect_demand_surges(
        &self,
        forecast: &DemandForecast,
        ratios: &RatioMap,
        now: DateTime<Utc>,
    ) -> Vec<Hotspot> {
        let mut zones = Vec::new();
        for regional in &forecast.regional {
            if regional.confidence < SURGE_MIN_CONFIDENCE_PCT {
                continue;
            }
            let Some(peak) = regional
                .equipment_demand
                .iter()
                .filter(|d| d.demand_level.is_elevated())
                .max_by_key(|d| d.demand_level)
            else {
                continue;
            };
            let Some(center) = region_center(&regional.region) else {
                debug!(region = %regional.region, "No centroid for region, skipping surge zone");
                continue;
            };

            let confidence = regional.confidence / 100.0;
            let ratio = ratios
                .get(&(regional.region.clone(), peak.equipment_type))
                .map_or(1.0, |s| s.ratio);
            let severity = HotspotSeverity::from_composite(composite_score(
                peak.demand_level.score(),
                confidence,
                ratio,
            ));

            zones.push(self.build_zone(
                format!("Demand surge: {} ({})", regional.region, peak.equipment_type),
                HotspotType::DemandSurge,
                severity,
                center,
                confidence,
                None,
                regional.region.clone(),
                Some(peak.equipment_type),
                now,
            ));
        }
        zones
    }

    /// Region/equipment pairs where live capacity is critically tight.
    pub(super) fn detect_supply_shortages(&self, ratios: &RatioMap, now: DateTime<Utc>) -> Vec<Hotspot> {
        let mut zones = Vec::new();
        for ((region, equipment), snapshot) in ratios {
            if snapshot.ratio >= self.config.shortage_ratio_threshold {
                continue;
            }
            let Some(center) = region_center(region) else {
                continue;
            };

            let demand = (1.0 - snapshot.ratio).clamp(0.0, 1.0);
            let severity = HotspotSeverity::from_composite(composite_score(
                demand,
                snapshot.confidence,
                snapshot.ratio,
            ));

            zones.push(self.build_zone(
                format!("Supply shortage: {region} ({equipment})"),
                HotspotType::SupplyShortage,
                severity,
                center,
                snapshot.confidence,
                None,
                region.clone(),
                Some(*equipment),
                now,
            ));
        }
        zones
    }

    /// Lanes whose latest rate runs well ahead of their historical
    /// average. The current rate becomes the bonus base.
    pub(super) async fn detect_rate_opportunities(
        &self,
        now: DateTime<Utc>,
    ) -> LanewiseResult<Vec<Hotspot>> {
        let lanes = self
            .rates
            .recent_lanes(now - Duration::days(self.config.recent_lane_days))
            .await?;

        let mut zones = Vec::new();
        for lane in lanes {
            let history = self
                .rates
                .rate_history(&lane, now - Duration::days(self.config.rate_lookback_days))
                .await?;
            if history.len() < 2 {
                continue;
            }

            let current = history[history.len() - 1].average_rate;
            let prior = &history[..history.len() - 1];
            let historical_avg =
                prior.iter().map(|r| r.average_rate).sum::<f64>() / prior.len() as f64;
            if historical_avg <= 0.0 {
                continue;
            }
            let uplift = (current - historical_avg) / historical_avg;
            if uplift <= self.config.rate_uplift_threshold {
                continue;
            }
            let Some(center) = region_center(&lane.origin) else {
                debug!(lane = %lane, "No centroid for lane origin, skipping rate zone");
                continue;
            };

            let demand = (uplift / RATE_UPLIFT_SATURATION).clamp(0.0, 1.0);
            let confidence = (history.len() as f64 / 10.0).min(1.0);
            // Live balance is not part of this signal; hold it neutral.
            let severity =
                HotspotSeverity::from_composite(composite_score(demand, confidence, 1.0));

            zones.push(self.build_zone(
                format!("Rate opportunity: {} -> {}", lane.origin, lane.destination),
                HotspotType::RateOpportunity,
                severity,
                center,
                confidence,
                Some(current),
                lane.origin.clone(),
                Some(lane.equipment),
                now,
            ));
        }
        Ok(zones)
    }

    /// Lanes whose outbound demand dwarfs the return direction, leaving
    /// trucks stranded at the destination.
    pub(super) fn detect_repositioning_needs(
        &self,
        forecast: &DemandForecast,
        ratios: &RatioMap,
        now: DateTime<Utc>,
    ) -> Vec<Hotspot> {
        let mut zones = Vec::new();
        for lane_fc in &forecast.lanes {
            let outbound = f64::from(lane_fc.expected_load_count);
            let inbound = forecast
                .lanes
                .iter()
                .find(|r| {
                    r.origin_region == lane_fc.destination_region
                        && r.destination_region == lane_fc.origin_region
                        && r.equipment_type == lane_fc.equipment_type
                })
                .map_or(0.0, |r| f64::from(r.expected_load_count));
            if outbound <= 2.0 * inbound {
                continue;
            }
            let Some(center) = region_center(&lane_fc.origin_region) else {
                continue;
            };

            let confidence = lane_fc.confidence / 100.0;
            let ratio = ratios
                .get(&(lane_fc.origin_region.clone(), lane_fc.equipment_type))
                .map_or(1.0, |s| s.ratio);
            let severity = HotspotSeverity::from_composite(composite_score(
                lane_fc.demand_level.score(),
                confidence,
                ratio,
            ));

            zones.push(self.build_zone(
                format!(
                    "Repositioning need: {} -> {}",
                    lane_fc.origin_region, lane_fc.destination_region
                ),
                HotspotType::RepositioningNeed,
                severity,
                center,
                confidence,
                None,
                lane_fc.origin_region.clone(),
                Some(lane_fc.equipment_type),
                now,
            ));
        }
        zones
    }

    /// Active weather disruption zones from the provider. Carries the
    /// provider's own center and radius; a failed lookup skips the
    /// detector rather than failing the run.
    pub(super) async fn detect_weather_impacts(&self, now: DateTime<Utc>) -> Vec<Hotspot> {
        let impacts = match self.market_data.weather_impacts().await {
            Ok(impacts) => impacts,
            Err(e) => {
                warn!(error = %e, "Weather lookup failed, skipping weather detection");
                return Vec::new();
            }
        };

        let mut zones = Vec::new();
        for impact in impacts {
            let severity = if impact.severity >= SEVERE_WEATHER_THRESHOLD {
                HotspotSeverity::Critical
            } else {
                HotspotSeverity::High
            };
            zones.push(Hotspot {
                hotspot_id: Uuid::new_v4().to_string(),
                name: format!("Weather: {}", impact.description),
                hotspot_type: HotspotType::WeatherImpact,
                severity,
                center: impact.center,
                radius_miles: impact.radius_miles,
                confidence_score: impact.severity.clamp(0.0, 1.0),
                bonus_amount: bonus_amount(
                    severity,
                    HotspotType::WeatherImpact,
                    None,
                    self.config.max_bonus,
                ),
                region: impact.region.to_lowercase(),
                equipment_type: None,
                detected_at: now,
                valid_from: now,
                valid_until: now + Duration::hours(self.config.validity_hours),
                active: true,
            });
        }
        zones
    }

    fn build_zone(
        &self,
        name: String,
        hotspot_type: HotspotType,
        severity: HotspotSeverity,
        center: GeoPoint,
        confidence: f64,
        bonus_base_rate: Option<f64>,
        region: String,
        equipment_type: Option<EquipmentType>,
        now: DateTime<Utc>,
    ) -> Hotspot {
        Hotspot {
            hotspot_id: Uuid::new_v4().to_string(),
            name,
            hotspot_type,
            severity,
            center,
            radius_miles: self.config.default_radius_miles,
            confidence_score: confidence,
            bonus_amount: bonus_amount(severity, hotspot_type, bonus_base_rate, self.config.max_bonus),
            region,
            equipment_type,
            detected_at: now,
            valid_from: now,
            valid_until: now + Duration::hours(self.config.validity_hours),
            active: true,
        }
    }
}
