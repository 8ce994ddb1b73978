//! Demand forecasting.
//!
//! Builds timeframe-scoped regional and lane demand forecasts from a
//! `DemandPredictor`, graded by how much recorded history backs them.
//! Generated forecasts are cached under a normalized parameter key;
//! a cache hit is still re-checked against the document's own
//! `valid_until` before being served.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, Utc, Weekday};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::providers::cache::TtlCache;
use crate::providers::events::{emit, EventSink, EventType};
use crate::providers::{DemandPredictor, DemandSignal, ExternalMarketData};
use crate::stores::{DemandHistoryStore, DemandSample};
use crate::types::{
    ConfidenceLevel, DemandForecast, DemandLevel, EquipmentDemand, EquipmentType,
    ForecastTimeframe, Lane, LaneDemandForecast, LanewiseError, LanewiseResult,
    RegionalDemandForecast,
};

/// Span of expected rate movement across the demand-score range, as a
/// percentage. Balanced demand (score 0.5) implies no movement; the
/// extremes imply half the span in either direction.
const RATE_PRESSURE_SPAN_PCT: f64 = 20.0;

const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Forecast engine configuration.
#[derive(Debug, Clone)]
pub struct ForecastConfig {
    /// Cache TTL for generated forecasts, in seconds.
    pub cache_ttl_secs: u64,
    /// How long a generated forecast stays valid, in hours.
    pub validity_hours: i64,
    /// Demand history lookback, in days.
    pub lookback_days: i64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 3600,
            validity_hours: 48,
            lookback_days: 90,
        }
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct ForecastEngine {
    config: ForecastConfig,
    predictor: Arc<dyn DemandPredictor>,
    history: Arc<dyn DemandHistoryStore>,
    events: Arc<dyn EventSink>,
    cache: TtlCache<Vec<u8>>,
}

impl ForecastEngine {
    pub fn new(
        config: ForecastConfig,
        predictor: Arc<dyn DemandPredictor>,
        history: Arc<dyn DemandHistoryStore>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        let cache = TtlCache::new(StdDuration::from_secs(config.cache_ttl_secs));
        Self {
            config,
            predictor,
            history,
            events,
            cache,
        }
    }

    /// Access the forecast configuration.
    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    /// Produce a demand forecast for the given horizon, regions, and
    /// equipment classes, serving a cached document when one is still
    /// valid.
    pub async fn generate_forecast(
        &self,
        timeframe: ForecastTimeframe,
        regions: &[String],
        equipment_types: &[EquipmentType],
    ) -> LanewiseResult<DemandForecast> {
        let regions = normalize_regions(regions)?;
        let equipment_types = normalize_equipment(equipment_types)?;
        let key = cache_key(timeframe, &regions, &equipment_types);
        let now = Utc::now();

        if let Some(bytes) = self.cache.get(&key) {
            match serde_json::from_slice::<DemandForecast>(&bytes) {
                Ok(cached) if cached.is_valid_at(now) => {
                    debug!(key = %key, forecast_id = %cached.forecast_id, "Forecast cache hit");
                    return Ok(cached);
                }
                Ok(cached) => {
                    debug!(
                        key = %key,
                        forecast_id = %cached.forecast_id,
                        "Cached forecast expired, regenerating"
                    );
                    self.cache.invalidate(&key);
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "Cached forecast unreadable, regenerating");
                    self.cache.invalidate(&key);
                }
            }
        }

        let since = now - Duration::days(self.config.lookback_days);
        let mut all_samples = Vec::new();
        let mut pairs_with_history = 0usize;
        for region in &regions {
            for &equipment in &equipment_types {
                let samples = self.history.samples(region, equipment, since).await?;
                if !samples.is_empty() {
                    pairs_with_history += 1;
                }
                all_samples.extend(samples);
            }
        }
        let total_pairs = regions.len() * equipment_types.len();
        let data_coverage = pairs_with_history as f64 / total_pairs as f64;
        let seasonal = seasonal_factors(&all_samples);

        let mut regional = Vec::with_capacity(regions.len());
        for region in &regions {
            let mut equipment_demand = Vec::with_capacity(equipment_types.len());
            let mut confidence_sum = 0.0;
            for &equipment in &equipment_types {
                let signal = self
                    .predictor
                    .region_demand(region, equipment, timeframe)
                    .await
                    .map_err(|e| {
                        LanewiseError::external(
                            self.predictor.model_version(),
                            format!("region demand for {region}/{equipment}: {e}"),
                        )
                    })?;
                confidence_sum += signal.confidence;
                equipment_demand.push(EquipmentDemand {
                    equipment_type: equipment,
                    demand_level: DemandLevel::from_score(signal.score),
                    expected_loads: signal.expected_loads,
                    expected_rate_change_pct: rate_pressure_pct(signal.score),
                });
            }
            let confidence = confidence_sum / equipment_types.len() as f64 * 100.0;
            regional.push(RegionalDemandForecast {
                region: region.clone(),
                equipment_demand,
                confidence,
            });
        }

        let mut lanes = Vec::new();
        for origin in &regions {
            for destination in &regions {
                if origin == destination {
                    continue;
                }
                for &equipment in &equipment_types {
                    let lane = Lane::new(origin, destination, equipment);
                    let signal =
                        self.predictor.lane_demand(&lane, timeframe).await.map_err(|e| {
                            LanewiseError::external(
                                self.predictor.model_version(),
                                format!("lane demand for {lane}: {e}"),
                            )
                        })?;
                    lanes.push(LaneDemandForecast {
                        origin_region: origin.clone(),
                        destination_region: destination.clone(),
                        equipment_type: equipment,
                        demand_level: DemandLevel::from_score(signal.score),
                        expected_load_count: signal.expected_loads,
                        expected_rate_change_pct: rate_pressure_pct(signal.score),
                        confidence: signal.confidence * 100.0,
                    });
                }
            }
        }

        let mean_region_confidence = if regional.is_empty() {
            0.0
        } else {
            regional.iter().map(|r| r.confidence).sum::<f64>() / regional.len() as f64
        };
        let confidence_score = (mean_region_confidence / 100.0) * data_coverage;

        let mut factors = HashMap::with_capacity(8);
        factors.insert("data_coverage".to_string(), data_coverage);
        for (weekday, factor) in &seasonal {
            factors.insert(format!("seasonal_{}", weekday_label(*weekday)), *factor);
        }

        let forecast = DemandForecast {
            forecast_id: Uuid::new_v4().to_string(),
            timeframe,
            generated_at: now,
            valid_until: now + Duration::hours(self.config.validity_hours),
            confidence: ConfidenceLevel::from_score(confidence_score),
            confidence_score,
            regional,
            lanes,
            factors,
            model_version: self.predictor.model_version().to_string(),
        };

        match serde_json::to_vec(&forecast) {
            Ok(bytes) => self.cache.put(&key, bytes),
            Err(e) => warn!(key = %key, error = %e, "Failed to cache forecast"),
        }

        info!(
            forecast_id = %forecast.forecast_id,
            timeframe = %timeframe,
            regions = regions.len(),
            lanes = forecast.lanes.len(),
            confidence = %forecast.confidence,
            score = format!("{:.2}", confidence_score),
            "Forecast generated"
        );
        emit(
            self.events.as_ref(),
            EventType::ForecastGenerated,
            serde_json::json!({
                "forecast_id": forecast.forecast_id,
                "timeframe": timeframe.as_token(),
                "regions": regions,
                "confidence": forecast.confidence,
                "confidence_score": confidence_score,
                "model": forecast.model_version,
            }),
        )
        .await;

        Ok(forecast)
    }

    /// Drop any cached forecast for this parameter set. Nothing is ever
    /// cached under an invalid parameter set, so those are ignored.
    pub fn invalidate(
        &self,
        timeframe: ForecastTimeframe,
        regions: &[String],
        equipment_types: &[EquipmentType],
    ) {
        let Ok(regions) = normalize_regions(regions) else {
            return;
        };
        let Ok(equipment_types) = normalize_equipment(equipment_types) else {
            return;
        };
        let key = cache_key(timeframe, &regions, &equipment_types);
        self.cache.invalidate(&key);
        debug!(key = %key, "Forecast cache invalidated");
    }
}

// ---------------------------------------------------------------------------
// Seasonal predictor
// ---------------------------------------------------------------------------

/// Share of a region's outbound freight assumed to ride one major lane.
const LANE_SHARE: f64 = 0.25;
/// Confidence discount for lane-granularity predictions.
const LANE_CONFIDENCE_DISCOUNT: f64 = 0.9;
/// Below this many history samples a prediction's confidence is cut.
const THIN_HISTORY_SAMPLES: usize = 5;
const THIN_HISTORY_DISCOUNT: f64 = 0.6;

/// Default demand model: live supply/demand balance shaped by the
/// weekday seasonality observed in recorded history. Stands in when no
/// dedicated prediction service is wired.
pub struct SeasonalPredictor {
    market_data: Arc<dyn ExternalMarketData>,
    history: Arc<dyn DemandHistoryStore>,
    lookback_days: i64,
}

impl SeasonalPredictor {
    pub fn new(market_data: Arc<dyn ExternalMarketData>, history: Arc<dyn DemandHistoryStore>) -> Self {
        Self {
            market_data,
            history,
            lookback_days: 90,
        }
    }
}

#[async_trait]
impl DemandPredictor for SeasonalPredictor {
    async fn region_demand(
        &self,
        region: &str,
        equipment: EquipmentType,
        timeframe: ForecastTimeframe,
    ) -> Result<DemandSignal> {
        let snapshot = self.market_data.region_supply_demand(region, equipment).await?;
        // Trucks-per-load 1.0 (balanced) maps to 0.5; tighter capacity
        // pushes the score up.
        let base_score = (1.0 - snapshot.ratio / 2.0).clamp(0.0, 1.0);

        let now = Utc::now();
        let since = now - Duration::days(self.lookback_days);
        let samples = self.history.samples(region, equipment, since).await?;
        let factor = seasonal_factors(&samples)
            .get(&target_weekday(now, timeframe))
            .copied()
            .unwrap_or(1.0);
        let score = (base_score * factor).clamp(0.0, 1.0);

        let mut confidence = snapshot.confidence;
        if samples.len() < THIN_HISTORY_SAMPLES {
            confidence *= THIN_HISTORY_DISCOUNT;
        }

        Ok(DemandSignal {
            score,
            expected_loads: expected_loads_over(&samples, timeframe, factor),
            confidence: confidence.clamp(0.0, 1.0),
        })
    }

    async fn lane_demand(&self, lane: &Lane, timeframe: ForecastTimeframe) -> Result<DemandSignal> {
        let origin = self.region_demand(&lane.origin, lane.equipment, timeframe).await?;
        let destination = self
            .region_demand(&lane.destination, lane.equipment, timeframe)
            .await?;
        // Freight originates at the origin; the destination market
        // mostly shapes how attractive the delivery end is.
        let score = (0.7 * origin.score + 0.3 * destination.score).clamp(0.0, 1.0);
        Ok(DemandSignal {
            score,
            expected_loads: (f64::from(origin.expected_loads) * LANE_SHARE).round() as u32,
            confidence: origin.confidence.min(destination.confidence) * LANE_CONFIDENCE_DISCOUNT,
        })
    }

    fn model_version(&self) -> &str {
        "seasonal-v1"
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn normalize_regions(regions: &[String]) -> LanewiseResult<Vec<String>> {
    if regions.is_empty() {
        return Err(LanewiseError::InvalidInput(
            "at least one region is required".to_string(),
        ));
    }
    let mut normalized = Vec::with_capacity(regions.len());
    for region in regions {
        let region = region.trim().to_lowercase();
        if region.is_empty() {
            return Err(LanewiseError::InvalidInput(
                "region names must be non-empty".to_string(),
            ));
        }
        normalized.push(region);
    }
    normalized.sort();
    normalized.dedup();
    Ok(normalized)
}

fn normalize_equipment(equipment: &[EquipmentType]) -> LanewiseResult<Vec<EquipmentType>> {
    if equipment.is_empty() {
        return Err(LanewiseError::InvalidInput(
            "at least one equipment type is required".to_string(),
        ));
    }
    let mut normalized = equipment.to_vec();
    normalized.sort_by_key(|e| e.as_token());
    normalized.dedup();
    Ok(normalized)
}

/// Cache key over normalized (sorted, deduplicated) parameters, so the
/// same parameter set always lands on the same entry.
fn cache_key(timeframe: ForecastTimeframe, regions: &[String], equipment: &[EquipmentType]) -> String {
    let equips: Vec<&str> = equipment.iter().map(|e| e.as_token()).collect();
    format!(
        "forecast:{}:{}:{}",
        timeframe.as_token(),
        regions.join(","),
        equips.join(",")
    )
}

/// Per-weekday volume ratio against the overall per-sample mean.
/// Weekdays with no samples sit at the neutral 1.0.
fn seasonal_factors(samples: &[DemandSample]) -> HashMap<Weekday, f64> {
    let mut per_day: HashMap<Weekday, (u64, u32)> = HashMap::new();
    let mut total_loads = 0u64;
    for sample in samples {
        let entry = per_day.entry(sample.observed_at.weekday()).or_insert((0, 0));
        entry.0 += u64::from(sample.load_count);
        entry.1 += 1;
        total_loads += u64::from(sample.load_count);
    }
    let overall_mean = if samples.is_empty() {
        0.0
    } else {
        total_loads as f64 / samples.len() as f64
    };

    let mut factors = HashMap::with_capacity(7);
    for weekday in WEEKDAYS {
        let factor = match per_day.get(&weekday) {
            Some(&(loads, count)) if overall_mean > 0.0 && count > 0 => {
                (loads as f64 / f64::from(count)) / overall_mean
            }
            _ => 1.0,
        };
        factors.insert(weekday, factor);
    }
    factors
}

fn weekday_label(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}

/// Expected rate movement implied by a demand score, as a signed
/// percentage.
fn rate_pressure_pct(score: f64) -> f64 {
    (score - 0.5) * RATE_PRESSURE_SPAN_PCT
}

/// The weekday the forecast horizon lands on.
fn target_weekday(now: DateTime<Utc>, timeframe: ForecastTimeframe) -> Weekday {
    (now + timeframe.duration()).weekday()
}

/// Expected loads over the horizon, extrapolated from observed daily
/// volume and shaped by the seasonal factor.
fn expected_loads_over(samples: &[DemandSample], timeframe: ForecastTimeframe, factor: f64) -> u32 {
    if samples.is_empty() {
        return 0;
    }
    let total: u64 = samples.iter().map(|s| u64::from(s.load_count)).sum();
    let first = samples[0].observed_at;
    let last = samples[samples.len() - 1].observed_at;
    let observed_days = ((last - first).num_hours() as f64 / 24.0).max(1.0);
    let daily = total as f64 / observed_days;
    let horizon_days = timeframe.duration().num_hours() as f64 / 24.0;
    (daily * horizon_days * factor).round() as u32
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
