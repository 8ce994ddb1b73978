//! Deterministic provider fakes for integration testing.
//!
//! Each fake implements one of the provider seams with fully
//! controllable in-memory state: known lane rates, scripted
//! supply/demand ratios, fixed demand signals, and recorded events.
//! Unset lookups fall back to a neutral default rather than erroring,
//! matching how the engines treat a quiet market.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;

use lanewise::geo::{region_center, GeoPoint};
use lanewise::providers::events::{EventSink, EventType, MarketEvent};
use lanewise::providers::{
    BidderScores, BidderScoring, DemandPredictor, DemandSignal, ExternalMarketData,
    LaneRateObservation, SupplyDemandSnapshot, TrendSnapshot, WeatherImpact,
};
use lanewise::types::{BidderType, EquipmentType, ForecastTimeframe, Lane};

fn lane_key(origin: &str, destination: &str, equipment: EquipmentType) -> String {
    Lane::new(origin, destination, equipment).to_string()
}

fn region_key(region: &str, equipment: EquipmentType) -> String {
    format!("{}/{}", region.to_lowercase(), equipment.as_token())
}

// ---------------------------------------------------------------------------
// Rate board
// ---------------------------------------------------------------------------

/// A scripted rate board. Lanes and regions without an entry report a
/// balanced market and no rate observations.
pub struct FakeRateBoard {
    lane_rates: Arc<Mutex<HashMap<String, LaneRateObservation>>>,
    lane_ratios: Arc<Mutex<HashMap<String, SupplyDemandSnapshot>>>,
    region_ratios: Arc<Mutex<HashMap<String, SupplyDemandSnapshot>>>,
    weather: Arc<Mutex<Vec<WeatherImpact>>>,
    /// If set, all operations will return this error.
    force_error: Arc<Mutex<Option<String>>>,
}

impl FakeRateBoard {
    pub fn new() -> Self {
        Self {
            lane_rates: Arc::new(Mutex::new(HashMap::new())),
            lane_ratios: Arc::new(Mutex::new(HashMap::new())),
            region_ratios: Arc::new(Mutex::new(HashMap::new())),
            weather: Arc::new(Mutex::new(Vec::new())),
            force_error: Arc::new(Mutex::new(None)),
        }
    }

    pub fn set_lane_rate(
        &self,
        origin: &str,
        destination: &str,
        equipment: EquipmentType,
        average: f64,
        sample_size: u32,
    ) {
        self.lane_rates.lock().unwrap().insert(
            lane_key(origin, destination, equipment),
            LaneRateObservation {
                average_rate: average,
                min_rate: average * 0.9,
                max_rate: average * 1.1,
                sample_size,
                observed_at: Utc::now(),
            },
        );
    }

    pub fn set_lane_ratio(
        &self,
        origin: &str,
        destination: &str,
        equipment: EquipmentType,
        ratio: f64,
        confidence: f64,
    ) {
        self.lane_ratios.lock().unwrap().insert(
            lane_key(origin, destination, equipment),
            SupplyDemandSnapshot { ratio, confidence },
        );
    }

    pub fn set_region_ratio(&self, region: &str, equipment: EquipmentType, ratio: f64, confidence: f64) {
        self.region_ratios.lock().unwrap().insert(
            region_key(region, equipment),
            SupplyDemandSnapshot { ratio, confidence },
        );
    }

    /// Add a weather disruption centered on a known region.
    pub fn add_weather(&self, region: &str, radius_miles: f64, severity: f64, description: &str) {
        let center = region_center(region).unwrap_or(GeoPoint::new(0.0, 0.0));
        self.weather.lock().unwrap().push(WeatherImpact {
            region: region.to_string(),
            center,
            radius_miles,
            severity,
            description: description.to_string(),
        });
    }

    /// Force all subsequent operations to return an error.
    pub fn set_error(&self, msg: &str) {
        *self.force_error.lock().unwrap() = Some(msg.to_string());
    }

    /// Clear any forced error.
    pub fn clear_error(&self) {
        *self.force_error.lock().unwrap() = None;
    }

    fn check_error(&self) -> Result<()> {
        if let Some(err) = self.force_error.lock().unwrap().as_ref() {
            return Err(anyhow!("{}", err));
        }
        Ok(())
    }
}

#[async_trait]
impl ExternalMarketData for FakeRateBoard {
    async fn current_rate(&self, lane: &Lane) -> Result<Option<LaneRateObservation>> {
        self.check_error()?;
        Ok(self.lane_rates.lock().unwrap().get(&lane.to_string()).cloned())
    }

    async fn supply_demand_ratio(&self, lane: &Lane) -> Result<SupplyDemandSnapshot> {
        self.check_error()?;
        Ok(self
            .lane_ratios
            .lock()
            .unwrap()
            .get(&lane.to_string())
            .copied()
            .unwrap_or(SupplyDemandSnapshot { ratio: 1.0, confidence: 0.9 }))
    }

    async fn region_supply_demand(
        &self,
        region: &str,
        equipment: EquipmentType,
    ) -> Result<SupplyDemandSnapshot> {
        self.check_error()?;
        Ok(self
            .region_ratios
            .lock()
            .unwrap()
            .get(&region_key(region, equipment))
            .copied()
            .unwrap_or(SupplyDemandSnapshot { ratio: 1.0, confidence: 0.9 }))
    }

    async fn market_trend(&self, _lane: &Lane) -> Result<TrendSnapshot> {
        self.check_error()?;
        Ok(TrendSnapshot {
            change_pct: 0.0,
            strength: 0.0,
            sample_count: 0,
        })
    }

    async fn weather_impacts(&self) -> Result<Vec<WeatherImpact>> {
        self.check_error()?;
        Ok(self.weather.lock().unwrap().clone())
    }

    fn name(&self) -> &str {
        "fake-rateboard"
    }
}

// ---------------------------------------------------------------------------
// Demand model
// ---------------------------------------------------------------------------

/// A demand model returning fixed signals. Regions and lanes without
/// an entry report moderate demand with decent confidence.
pub struct StaticPredictor {
    region_signals: Arc<Mutex<HashMap<String, DemandSignal>>>,
    lane_signals: Arc<Mutex<HashMap<String, DemandSignal>>>,
}

impl StaticPredictor {
    pub fn new() -> Self {
        Self {
            region_signals: Arc::new(Mutex::new(HashMap::new())),
            lane_signals: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn set_region_signal(
        &self,
        region: &str,
        equipment: EquipmentType,
        score: f64,
        expected_loads: u32,
        confidence: f64,
    ) {
        self.region_signals.lock().unwrap().insert(
            region_key(region, equipment),
            DemandSignal { score, expected_loads, confidence },
        );
    }

    pub fn set_lane_signal(
        &self,
        origin: &str,
        destination: &str,
        equipment: EquipmentType,
        score: f64,
        expected_loads: u32,
        confidence: f64,
    ) {
        self.lane_signals.lock().unwrap().insert(
            lane_key(origin, destination, equipment),
            DemandSignal { score, expected_loads, confidence },
        );
    }

    fn default_signal() -> DemandSignal {
        DemandSignal {
            score: 0.5,
            expected_loads: 10,
            confidence: 0.8,
        }
    }
}

#[async_trait]
impl DemandPredictor for StaticPredictor {
    async fn region_demand(
        &self,
        region: &str,
        equipment: EquipmentType,
        _timeframe: ForecastTimeframe,
    ) -> Result<DemandSignal> {
        Ok(self
            .region_signals
            .lock()
            .unwrap()
            .get(&region_key(region, equipment))
            .copied()
            .unwrap_or_else(Self::default_signal))
    }

    async fn lane_demand(&self, lane: &Lane, _timeframe: ForecastTimeframe) -> Result<DemandSignal> {
        Ok(self
            .lane_signals
            .lock()
            .unwrap()
            .get(&lane.to_string())
            .copied()
            .unwrap_or_else(Self::default_signal))
    }

    fn model_version(&self) -> &str {
        "static-v1"
    }
}

// ---------------------------------------------------------------------------
// Bidder profiles
// ---------------------------------------------------------------------------

/// A profile service with per-bidder scripted scores. Unknown bidders
/// get the neutral 50/50/50 profile.
pub struct ScriptedScoring {
    scores: Arc<Mutex<HashMap<String, BidderScores>>>,
    force_error: Arc<Mutex<Option<String>>>,
}

impl ScriptedScoring {
    pub fn new() -> Self {
        Self {
            scores: Arc::new(Mutex::new(HashMap::new())),
            force_error: Arc::new(Mutex::new(None)),
        }
    }

    pub fn set_scores(&self, bidder_id: &str, efficiency: f64, network_contribution: f64, driver: f64) {
        self.scores.lock().unwrap().insert(
            bidder_id.to_string(),
            BidderScores {
                efficiency,
                network_contribution,
                driver,
            },
        );
    }

    pub fn set_error(&self, msg: &str) {
        *self.force_error.lock().unwrap() = Some(msg.to_string());
    }
}

#[async_trait]
impl BidderScoring for ScriptedScoring {
    async fn scores_for(
        &self,
        bidder_id: &str,
        _bidder_type: BidderType,
        _load_id: &str,
    ) -> Result<BidderScores> {
        if let Some(err) = self.force_error.lock().unwrap().as_ref() {
            return Err(anyhow!("{}", err));
        }
        Ok(self
            .scores
            .lock()
            .unwrap()
            .get(bidder_id)
            .copied()
            .unwrap_or(BidderScores {
                efficiency: 50.0,
                network_contribution: 50.0,
                driver: 50.0,
            }))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

// ---------------------------------------------------------------------------
// Event recording
// ---------------------------------------------------------------------------

/// Records every published event for assertion.
pub struct RecordingSink {
    events: Arc<Mutex<Vec<MarketEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn events(&self) -> Vec<MarketEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, event_type: EventType) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.event_type == event_type)
            .count()
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn publish(&self, event: &MarketEvent) -> Result<()> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fake_rateboard_defaults_are_quiet_market() {
        let board = FakeRateBoard::new();
        let lane = Lane::new("chicago", "dallas", EquipmentType::DryVan);

        assert!(board.current_rate(&lane).await.unwrap().is_none());
        let snapshot = board.supply_demand_ratio(&lane).await.unwrap();
        assert!((snapshot.ratio - 1.0).abs() < 1e-9);
        assert!(board.weather_impacts().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fake_rateboard_scripted_lane() {
        let board = FakeRateBoard::new();
        board.set_lane_rate("Chicago", "Dallas", EquipmentType::DryVan, 1200.0, 30);

        // Lane keys normalize case the same way `Lane::new` does.
        let lane = Lane::new("chicago", "dallas", EquipmentType::DryVan);
        let obs = board.current_rate(&lane).await.unwrap().unwrap();
        assert!((obs.average_rate - 1200.0).abs() < 1e-9);
        assert_eq!(obs.sample_size, 30);
    }

    #[tokio::test]
    async fn test_fake_rateboard_forced_error() {
        let board = FakeRateBoard::new();
        board.set_error("board down");

        let lane = Lane::new("chicago", "dallas", EquipmentType::DryVan);
        assert!(board.current_rate(&lane).await.is_err());
        assert!(board.supply_demand_ratio(&lane).await.is_err());

        board.clear_error();
        assert!(board.current_rate(&lane).await.is_ok());
    }

    #[tokio::test]
    async fn test_scripted_scoring_falls_back_to_neutral() {
        let scoring = ScriptedScoring::new();
        scoring.set_scores("carrier-a", 80.0, 70.0, 75.0);

        let a = scoring
            .scores_for("carrier-a", BidderType::Carrier, "load-1")
            .await
            .unwrap();
        assert!((a.efficiency - 80.0).abs() < 1e-9);

        let unknown = scoring
            .scores_for("carrier-z", BidderType::Carrier, "load-1")
            .await
            .unwrap();
        assert!((unknown.efficiency - 50.0).abs() < 1e-9);
        assert!((unknown.driver - 50.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_recording_sink_counts_by_type() {
        let sink = RecordingSink::new();
        sink.publish(&MarketEvent::new(EventType::RateUpdated, serde_json::json!({})))
            .await
            .unwrap();
        sink.publish(&MarketEvent::new(EventType::RateUpdated, serde_json::json!({})))
            .await
            .unwrap();
        sink.publish(&MarketEvent::new(EventType::BidPlaced, serde_json::json!({})))
            .await
            .unwrap();

        assert_eq!(sink.count(EventType::RateUpdated), 2);
        assert_eq!(sink.count(EventType::BidPlaced), 1);
        assert_eq!(sink.count(EventType::AuctionCompleted), 0);
        assert_eq!(sink.events().len(), 3);
    }
}
