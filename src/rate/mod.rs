//! Lane rate calculation.
//!
//! Resolves a base rate for a lane (stored history first, then the
//! external rate board, then a fixed default), blends the five-factor
//! adjustment on top, and reports per-mile pricing with a confidence
//! score that reflects how much signal actually backed the number.

pub mod factors;
pub mod trends;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::providers::events::{emit, EventSink, EventType};
use crate::providers::ExternalMarketData;
use crate::stores::MarketRateStore;
use crate::types::{EquipmentType, Lane, LanewiseError, LanewiseResult, Load, MarketRate};

use self::factors::RateFactor;
use self::trends::RateTrendAnalysis;

/// Floor on the per-mile rate.
pub const MIN_MILEAGE_RATE: f64 = 2.0;
/// Ceiling on the per-mile rate.
pub const MAX_MILEAGE_RATE: f64 = 5.0;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Rate engine configuration.
#[derive(Debug, Clone)]
pub struct RateConfig {
    /// Fallback base rate when neither storage nor the rate board has
    /// a usable number.
    pub default_base_rate: f64,
    /// Floor on the blended adjustment factor.
    pub min_adjustment: f64,
    /// Ceiling on the blended adjustment factor.
    pub max_adjustment: f64,
    /// Lookback for the historical trend factor, in days.
    pub trend_window_days: i64,
    /// Below this sample size a base-rate signal counts as thin.
    pub thin_sample_floor: u32,
    /// Below this many observations the trend signal counts as thin.
    pub thin_trend_samples: usize,
}

impl Default for RateConfig {
    fn default() -> Self {
        Self {
            default_base_rate: 1000.0,
            min_adjustment: factors::MIN_RATE_ADJUSTMENT,
            max_adjustment: factors::MAX_RATE_ADJUSTMENT,
            trend_window_days: 30,
            thin_sample_floor: 5,
            thin_trend_samples: 3,
        }
    }
}

// ---------------------------------------------------------------------------
// Inputs and outputs
// ---------------------------------------------------------------------------

/// Recognized per-calculation inputs. Everything defaults to "nothing
/// special about this load".
#[derive(Debug, Clone, Default)]
pub struct RateOptions {
    /// Route distance override; lane centroid distance otherwise.
    pub distance_miles: Option<f64>,
    /// Hours until pickup; None applies no urgency premium.
    pub pickup_window_hours: Option<f64>,
    /// The carrier already has capacity heading this way.
    pub backhaul_opportunity: bool,
    /// Load attributes, carried into the calculation log line.
    pub hazardous: bool,
    pub temp_controlled: bool,
}

/// A priced lane.
#[derive(Debug, Clone, Serialize)]
pub struct RateCalculation {
    pub lane: Lane,
    pub distance_miles: f64,
    pub base_rate: f64,
    /// Blended adjustment applied to the base rate
    pub adjustment_factor: f64,
    pub total_rate: f64,
    /// total_rate / distance, clamped to [2.0, 5.0]
    pub mileage_rate: f64,
    pub factors: HashMap<String, RateFactor>,
    /// [0, 1]; lower when the inputs were thin or defaulted
    pub confidence: f64,
    /// True when the fixed default base rate had to stand in
    pub used_default_base: bool,
    pub calculated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct RateEngine {
    config: RateConfig,
    rates: Arc<dyn MarketRateStore>,
    market_data: Arc<dyn ExternalMarketData>,
    events: Arc<dyn EventSink>,
}

impl RateEngine {
    pub fn new(
        config: RateConfig,
        rates: Arc<dyn MarketRateStore>,
        market_data: Arc<dyn ExternalMarketData>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            config,
            rates,
            market_data,
            events,
        }
    }

    /// Access the rate configuration.
    pub fn config(&self) -> &RateConfig {
        &self.config
    }

    /// Price a lane.
    pub async fn calculate_rate(
        &self,
        origin: &str,
        destination: &str,
        equipment: EquipmentType,
        options: &RateOptions,
    ) -> LanewiseResult<RateCalculation> {
        if origin.trim().is_empty() || destination.trim().is_empty() {
            return Err(LanewiseError::InvalidInput(
                "origin and destination regions are required".to_string(),
            ));
        }
        let lane = Lane::new(origin, destination, equipment);

        let distance_miles = match options.distance_miles {
            Some(d) => d,
            None => lane.distance_miles().ok_or_else(|| {
                LanewiseError::InvalidInput(format!("no distance available for lane {lane}"))
            })?,
        };
        if distance_miles <= 0.0 {
            return Err(LanewiseError::InvalidInput(format!(
                "distance must be positive, got {distance_miles}"
            )));
        }

        let now = Utc::now();
        let (base_rate, thin_base, used_default_base) = self.resolve_base_rate(&lane, now).await?;

        let (sd_ratio, weak_sd) = match self.market_data.supply_demand_ratio(&lane).await {
            Ok(snapshot) => (snapshot.ratio, snapshot.confidence < 0.5),
            Err(e) => {
                warn!(
                    lane = %lane,
                    error = %e,
                    "Supply/demand lookup failed; assuming balance"
                );
                (1.0, true)
            }
        };

        let since = now - Duration::days(self.config.trend_window_days);
        let history = self.rates.rate_history(&lane, since).await?;
        let thin_trend = history.len() < self.config.thin_trend_samples;

        let blend = factors::blend(
            factors::supply_demand_delta(sd_ratio),
            factors::trend_delta(trends::relative_change(&history)),
            factors::urgency_delta(options.pickup_window_hours),
            factors::network_delta(options.backhaul_opportunity),
            self.config.min_adjustment,
            self.config.max_adjustment,
        );

        let total_rate = base_rate * (1.0 + blend.adjustment_factor);
        let mileage_rate = (total_rate / distance_miles).clamp(MIN_MILEAGE_RATE, MAX_MILEAGE_RATE);

        let mut confidence: f64 = 1.0;
        if thin_base {
            confidence -= 0.1;
        }
        if used_default_base {
            confidence -= 0.5;
        }
        if weak_sd {
            confidence -= 0.05;
        }
        if thin_trend {
            confidence -= 0.05;
        }
        let confidence = confidence.max(0.0);

        debug!(
            lane = %lane,
            base = format!("${:.2}", base_rate),
            adjustment = format!("{:+.4}", blend.adjustment_factor),
            total = format!("${:.2}", total_rate),
            per_mile = format!("${:.2}", mileage_rate),
            confidence = format!("{:.2}", confidence),
            hazardous = options.hazardous,
            temp_controlled = options.temp_controlled,
            "Rate calculated"
        );

        Ok(RateCalculation {
            lane,
            distance_miles,
            base_rate,
            adjustment_factor: blend.adjustment_factor,
            total_rate,
            mileage_rate,
            factors: blend.factors,
            confidence,
            used_default_base,
            calculated_at: now,
        })
    }

    /// Price a load, deriving the lane, distance, and urgency from the
    /// load itself.
    pub async fn calculate_load_rate(&self, load: &Load) -> LanewiseResult<RateCalculation> {
        let origin = load
            .origin_region()
            .ok_or_else(|| LanewiseError::MissingLocation(load.load_id.clone()))?;
        let destination = load
            .destination_region()
            .ok_or_else(|| LanewiseError::MissingLocation(load.load_id.clone()))?;

        let options = RateOptions {
            distance_miles: load.route_distance_miles(),
            pickup_window_hours: Some(load.hours_until_pickup(Utc::now())),
            backhaul_opportunity: false,
            hazardous: load.hazardous,
            temp_controlled: load.temp_controlled,
        };

        self.calculate_rate(&origin, &destination, load.equipment_type, &options)
            .await
    }

    /// Summarize a lane's stored rate history over the given window.
    pub async fn analyze_rate_trends(
        &self,
        lane: &Lane,
        days: i64,
    ) -> LanewiseResult<RateTrendAnalysis> {
        if days <= 0 {
            return Err(LanewiseError::InvalidInput(format!(
                "trend window must be positive, got {days} days"
            )));
        }
        let now = Utc::now();
        let history = self.rates.rate_history(lane, now - Duration::days(days)).await?;
        Ok(trends::analyze(lane, &history, days, now))
    }

    /// Resolve the base rate: stored history first, then the rate
    /// board (persisting what it returns), then the fixed default.
    /// Returns (rate, thin_signal, used_default).
    async fn resolve_base_rate(
        &self,
        lane: &Lane,
        now: DateTime<Utc>,
    ) -> LanewiseResult<(f64, bool, bool)> {
        if let Some(stored) = self.rates.latest_rate(lane).await? {
            if stored.average_rate > 0.0 {
                let thin = stored.is_thin(self.config.thin_sample_floor);
                return Ok((stored.average_rate, thin, false));
            }
        }

        match self.market_data.current_rate(lane).await {
            Ok(Some(obs)) if obs.average_rate > 0.0 => {
                let rate = MarketRate {
                    rate_id: Uuid::new_v4().to_string(),
                    origin_region: lane.origin.clone(),
                    destination_region: lane.destination.clone(),
                    equipment_type: lane.equipment,
                    average_rate: obs.average_rate,
                    min_rate: obs.min_rate,
                    max_rate: obs.max_rate,
                    sample_size: obs.sample_size,
                    // Recorded when we saw it, keeping per-lane history
                    // monotonic regardless of provider timestamps.
                    recorded_at: now,
                };
                if let Err(e) = self.rates.record_rate(rate.clone()).await {
                    warn!(lane = %lane, error = %e, "Failed to persist external rate");
                } else {
                    info!(
                        lane = %lane,
                        rate = format!("${:.2}", rate.average_rate),
                        source = self.market_data.name(),
                        "Persisted external base rate"
                    );
                    emit(
                        self.events.as_ref(),
                        EventType::RateUpdated,
                        serde_json::json!({
                            "rate_id": rate.rate_id,
                            "origin": lane.origin,
                            "destination": lane.destination,
                            "equipment": lane.equipment.as_token(),
                            "average_rate": rate.average_rate,
                            "sample_size": rate.sample_size,
                            "source": self.market_data.name(),
                        }),
                    )
                    .await;
                }
                // External fetches count as thin until corroborated.
                Ok((obs.average_rate, true, false))
            }
            Ok(_) => {
                warn!(
                    lane = %lane,
                    default = self.config.default_base_rate,
                    "No market rate available; using default base"
                );
                Ok((self.config.default_base_rate, false, true))
            }
            Err(e) => {
                warn!(
                    lane = %lane,
                    error = %e,
                    "Rate lookup failed; using default base"
                );
                Ok((self.config.default_base_rate, false, true))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
