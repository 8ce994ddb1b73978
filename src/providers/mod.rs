//! External provider integrations.
//!
//! Defines the trait seams the engines depend on:
//! - `ExternalMarketData` — rate-board observations, supply/demand, trends, weather
//! - `DemandPredictor` — demand model scores per region/lane
//! - `BidderScoring` — profile scores attached to auction bids
//!
//! HTTP-backed implementations live in `http`; event publication in
//! `events`; the response cache in `cache`.

pub mod cache;
pub mod events;
pub mod http;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::GeoPoint;
use crate::types::{BidderType, EquipmentType, ForecastTimeframe, Lane};

// ---------------------------------------------------------------------------
// Market data
// ---------------------------------------------------------------------------

/// One lane observation from the rate board.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaneRateObservation {
    pub average_rate: f64,
    pub min_rate: f64,
    pub max_rate: f64,
    pub sample_size: u32,
    pub observed_at: DateTime<Utc>,
}

/// Supply/demand balance for a lane or region.
///
/// `ratio` is trucks-per-load: below 1.0 means capacity is tight
/// (demand exceeds supply), above 1.0 means trucks are idle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SupplyDemandSnapshot {
    pub ratio: f64,
    /// Provider confidence in the ratio, 0-1
    pub confidence: f64,
}

impl SupplyDemandSnapshot {
    /// Signed imbalance: positive when capacity is tight.
    pub fn imbalance(&self) -> f64 {
        1.0 - self.ratio
    }
}

/// Recent rate movement on a lane as reported by the provider.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TrendSnapshot {
    /// Signed movement over the provider's window, as a percentage
    pub change_pct: f64,
    /// Signal strength, 0-1
    pub strength: f64,
    pub sample_count: u32,
}

/// A weather disruption zone reported by the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherImpact {
    pub region: String,
    pub center: GeoPoint,
    pub radius_miles: f64,
    /// Disruption severity, 0-1
    pub severity: f64,
    pub description: String,
}

/// Abstraction over external freight market data sources.
///
/// Implementors provide lane rates, supply/demand balance, and weather
/// disruptions. All methods are fallible; the engines degrade to
/// defaults when a provider call fails.
#[async_trait]
pub trait ExternalMarketData: Send + Sync {
    /// Latest observed rate for a lane. None when the provider has no
    /// observations for it.
    async fn current_rate(&self, lane: &Lane) -> Result<Option<LaneRateObservation>>;

    /// Supply/demand balance for a lane.
    async fn supply_demand_ratio(&self, lane: &Lane) -> Result<SupplyDemandSnapshot>;

    /// Supply/demand balance for a whole region and equipment class.
    async fn region_supply_demand(
        &self,
        region: &str,
        equipment: EquipmentType,
    ) -> Result<SupplyDemandSnapshot>;

    /// Recent rate movement for a lane.
    async fn market_trend(&self, lane: &Lane) -> Result<TrendSnapshot>;

    /// Active weather disruption zones.
    async fn weather_impacts(&self) -> Result<Vec<WeatherImpact>>;

    /// Provider name for logging and identification.
    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Demand prediction
// ---------------------------------------------------------------------------

/// Output of the demand model for one region or lane.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DemandSignal {
    /// Demand score in [0, 1]
    pub score: f64,
    /// Expected loads over the horizon
    pub expected_loads: u32,
    /// Model confidence in [0, 1]
    pub confidence: f64,
}

/// Abstraction over demand models feeding the forecast engine.
#[async_trait]
pub trait DemandPredictor: Send + Sync {
    async fn region_demand(
        &self,
        region: &str,
        equipment: EquipmentType,
        timeframe: ForecastTimeframe,
    ) -> Result<DemandSignal>;

    async fn lane_demand(&self, lane: &Lane, timeframe: ForecastTimeframe) -> Result<DemandSignal>;

    /// Model identifier recorded on generated forecasts.
    fn model_version(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Bidder scoring
// ---------------------------------------------------------------------------

/// Profile scores attached to a bid at placement, each 0-100.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BidderScores {
    pub efficiency: f64,
    pub network_contribution: f64,
    pub driver: f64,
}

/// Abstraction over the profile service that scores bidders.
#[async_trait]
pub trait BidderScoring: Send + Sync {
    async fn scores_for(
        &self,
        bidder_id: &str,
        bidder_type: BidderType,
        load_id: &str,
    ) -> Result<BidderScores>;

    fn name(&self) -> &str;
}

/// Neutral scoring used when no profile service is wired. Every bidder
/// receives midpoint scores, so winner selection reduces to price.
pub struct NeutralBidderScoring;

#[async_trait]
impl BidderScoring for NeutralBidderScoring {
    async fn scores_for(
        &self,
        _bidder_id: &str,
        _bidder_type: BidderType,
        _load_id: &str,
    ) -> Result<BidderScores> {
        Ok(BidderScores {
            efficiency: 50.0,
            network_contribution: 50.0,
            driver: 50.0,
        })
    }

    fn name(&self) -> &str {
        "neutral"
    }
}
