//! Shared types for the Lanewise engine.
//!
//! These types form the data model used across all modules.
//! They are designed to be stable so that provider, engine,
//! and store modules can depend on them without circular references.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::geo::{haversine_miles, GeoPoint};

// ---------------------------------------------------------------------------
// Lanes & equipment
// ---------------------------------------------------------------------------

/// Trailer/equipment class a load requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquipmentType {
    DryVan,
    Reefer,
    Flatbed,
    StepDeck,
    BoxTruck,
    PowerOnly,
}

impl EquipmentType {
    /// All known equipment types (useful for iteration).
    pub const ALL: &'static [EquipmentType] = &[
        EquipmentType::DryVan,
        EquipmentType::Reefer,
        EquipmentType::Flatbed,
        EquipmentType::StepDeck,
        EquipmentType::BoxTruck,
        EquipmentType::PowerOnly,
    ];

    /// Stable lowercase token, used in cache keys and API paths.
    pub fn as_token(&self) -> &'static str {
        match self {
            EquipmentType::DryVan => "dry_van",
            EquipmentType::Reefer => "reefer",
            EquipmentType::Flatbed => "flatbed",
            EquipmentType::StepDeck => "step_deck",
            EquipmentType::BoxTruck => "box_truck",
            EquipmentType::PowerOnly => "power_only",
        }
    }
}

impl fmt::Display for EquipmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_token())
    }
}

/// Attempt to parse a string into an EquipmentType (case-insensitive).
impl std::str::FromStr for EquipmentType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dry_van" | "dryvan" | "van" => Ok(EquipmentType::DryVan),
            "reefer" | "refrigerated" => Ok(EquipmentType::Reefer),
            "flatbed" | "flat" => Ok(EquipmentType::Flatbed),
            "step_deck" | "stepdeck" => Ok(EquipmentType::StepDeck),
            "box_truck" | "boxtruck" | "box" => Ok(EquipmentType::BoxTruck),
            "power_only" | "poweronly" | "power" => Ok(EquipmentType::PowerOnly),
            _ => Err(anyhow::anyhow!("Unknown equipment type: {s}")),
        }
    }
}

/// An origin/destination region pair plus equipment — the unit the rate
/// and forecast pipelines price.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Lane {
    pub origin: String,
    pub destination: String,
    pub equipment: EquipmentType,
}

impl Lane {
    /// Build a lane, normalizing region codes to lowercase.
    pub fn new(origin: &str, destination: &str, equipment: EquipmentType) -> Self {
        Self {
            origin: origin.to_lowercase(),
            destination: destination.to_lowercase(),
            equipment,
        }
    }

    /// The same lane run in the opposite direction (backhaul).
    pub fn reversed(&self) -> Self {
        Self {
            origin: self.destination.clone(),
            destination: self.origin.clone(),
            equipment: self.equipment,
        }
    }

    /// Centroid-to-centroid lane distance, if both regions are known.
    pub fn distance_miles(&self) -> Option<f64> {
        crate::geo::region_distance_miles(&self.origin, &self.destination)
    }
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} ({})", self.origin, self.destination, self.equipment)
    }
}

// ---------------------------------------------------------------------------
// Market rates
// ---------------------------------------------------------------------------

/// An observed or computed market rate for a lane.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketRate {
    pub rate_id: String,
    pub origin_region: String,
    pub destination_region: String,
    pub equipment_type: EquipmentType,
    /// Average rate for the lane in USD
    pub average_rate: f64,
    pub min_rate: f64,
    pub max_rate: f64,
    /// Number of observations behind this rate
    pub sample_size: u32,
    pub recorded_at: DateTime<Utc>,
}

impl MarketRate {
    /// The lane this rate belongs to.
    pub fn lane(&self) -> Lane {
        Lane::new(&self.origin_region, &self.destination_region, self.equipment_type)
    }

    /// Whether the rate rests on fewer observations than the given floor.
    pub fn is_thin(&self, min_samples: u32) -> bool {
        self.sample_size < min_samples
    }

    /// Range between max and min as a fraction of the average.
    /// Returns 0.0 for a zero average.
    pub fn spread_pct(&self) -> f64 {
        if self.average_rate <= 0.0 {
            0.0
        } else {
            (self.max_rate - self.min_rate) / self.average_rate
        }
    }
}

impl fmt::Display for MarketRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} avg=${:.2} [${:.2}-${:.2}] n={}",
            self.lane(),
            self.average_rate,
            self.min_rate,
            self.max_rate,
            self.sample_size,
        )
    }
}

// ---------------------------------------------------------------------------
// Demand forecasts
// ---------------------------------------------------------------------------

/// Forecast horizon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ForecastTimeframe {
    #[serde(rename = "24h")]
    Hours24,
    #[serde(rename = "48h")]
    Hours48,
    #[serde(rename = "7d")]
    Days7,
    #[serde(rename = "30d")]
    Days30,
}

impl ForecastTimeframe {
    /// All supported horizons.
    pub const ALL: &'static [ForecastTimeframe] = &[
        ForecastTimeframe::Hours24,
        ForecastTimeframe::Hours48,
        ForecastTimeframe::Days7,
        ForecastTimeframe::Days30,
    ];

    /// The horizon length as a duration.
    pub fn duration(&self) -> Duration {
        match self {
            ForecastTimeframe::Hours24 => Duration::hours(24),
            ForecastTimeframe::Hours48 => Duration::hours(48),
            ForecastTimeframe::Days7 => Duration::days(7),
            ForecastTimeframe::Days30 => Duration::days(30),
        }
    }

    /// Stable token used in cache keys and API query params.
    pub fn as_token(&self) -> &'static str {
        match self {
            ForecastTimeframe::Hours24 => "24h",
            ForecastTimeframe::Hours48 => "48h",
            ForecastTimeframe::Days7 => "7d",
            ForecastTimeframe::Days30 => "30d",
        }
    }
}

impl fmt::Display for ForecastTimeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_token())
    }
}

impl std::str::FromStr for ForecastTimeframe {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "24h" | "24" | "day" => Ok(ForecastTimeframe::Hours24),
            "48h" | "48" => Ok(ForecastTimeframe::Hours48),
            "7d" | "week" => Ok(ForecastTimeframe::Days7),
            "30d" | "month" => Ok(ForecastTimeframe::Days30),
            _ => Err(anyhow::anyhow!("Unknown forecast timeframe: {s}")),
        }
    }
}

/// Coarse confidence bucket attached to a forecast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
}

impl ConfidenceLevel {
    /// Map a [0, 1] confidence score to a bucket.
    /// >= 0.85 is HIGH, >= 0.70 is MEDIUM, anything below is LOW.
    pub fn from_score(score: f64) -> Self {
        if score >= 0.85 {
            ConfidenceLevel::High
        } else if score >= 0.70 {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfidenceLevel::High => write!(f, "HIGH"),
            ConfidenceLevel::Medium => write!(f, "MEDIUM"),
            ConfidenceLevel::Low => write!(f, "LOW"),
        }
    }
}

/// Qualitative demand bucket for a region or lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DemandLevel {
    VeryLow,
    Low,
    Moderate,
    High,
    VeryHigh,
}

impl DemandLevel {
    /// Numeric demand score in [0, 1] for this bucket.
    pub fn score(&self) -> f64 {
        match self {
            DemandLevel::VeryLow => 0.1,
            DemandLevel::Low => 0.3,
            DemandLevel::Moderate => 0.5,
            DemandLevel::High => 0.8,
            DemandLevel::VeryHigh => 1.0,
        }
    }

    /// Map a [0, 1] demand score back to a bucket.
    pub fn from_score(score: f64) -> Self {
        if score >= 0.9 {
            DemandLevel::VeryHigh
        } else if score >= 0.65 {
            DemandLevel::High
        } else if score >= 0.4 {
            DemandLevel::Moderate
        } else if score >= 0.2 {
            DemandLevel::Low
        } else {
            DemandLevel::VeryLow
        }
    }

    /// Whether demand is elevated enough to drive surge behavior.
    pub fn is_elevated(&self) -> bool {
        matches!(self, DemandLevel::High | DemandLevel::VeryHigh)
    }
}

impl fmt::Display for DemandLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DemandLevel::VeryLow => write!(f, "very_low"),
            DemandLevel::Low => write!(f, "low"),
            DemandLevel::Moderate => write!(f, "moderate"),
            DemandLevel::High => write!(f, "high"),
            DemandLevel::VeryHigh => write!(f, "very_high"),
        }
    }
}

/// Demand picture for one equipment type inside a regional forecast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquipmentDemand {
    pub equipment_type: EquipmentType,
    pub demand_level: DemandLevel,
    /// Expected loads over the forecast horizon
    pub expected_loads: u32,
    /// Expected rate movement over the horizon, as a signed percentage
    pub expected_rate_change_pct: f64,
}

/// Per-region slice of a demand forecast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionalDemandForecast {
    pub region: String,
    pub equipment_demand: Vec<EquipmentDemand>,
    /// Region-level confidence, 0-100
    pub confidence: f64,
}

impl RegionalDemandForecast {
    /// The strongest demand bucket across equipment types.
    pub fn peak_demand(&self) -> Option<DemandLevel> {
        self.equipment_demand.iter().map(|d| d.demand_level).max()
    }

    /// Total expected loads across equipment types.
    pub fn total_expected_loads(&self) -> u32 {
        self.equipment_demand.iter().map(|d| d.expected_loads).sum()
    }

    /// The demand entry for a specific equipment type, if forecast.
    pub fn demand_for(&self, equipment: EquipmentType) -> Option<&EquipmentDemand> {
        self.equipment_demand.iter().find(|d| d.equipment_type == equipment)
    }
}

/// Per-lane slice of a demand forecast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaneDemandForecast {
    pub origin_region: String,
    pub destination_region: String,
    pub equipment_type: EquipmentType,
    pub demand_level: DemandLevel,
    pub expected_load_count: u32,
    /// Expected rate movement over the horizon, as a signed percentage
    pub expected_rate_change_pct: f64,
    /// Lane-level confidence, 0-100
    pub confidence: f64,
}

impl LaneDemandForecast {
    pub fn lane(&self) -> Lane {
        Lane::new(&self.origin_region, &self.destination_region, self.equipment_type)
    }
}

/// A complete demand forecast for one horizon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemandForecast {
    pub forecast_id: String,
    pub timeframe: ForecastTimeframe,
    pub generated_at: DateTime<Utc>,
    /// Forecasts expire; consumers must check validity before use
    pub valid_until: DateTime<Utc>,
    #[serde(rename = "confidence_level")]
    pub confidence: ConfidenceLevel,
    /// Overall confidence score in [0, 1] backing the bucket
    #[serde(rename = "overall_confidence_score")]
    pub confidence_score: f64,
    #[serde(rename = "regional_forecasts")]
    pub regional: Vec<RegionalDemandForecast>,
    #[serde(rename = "lane_forecasts")]
    pub lanes: Vec<LaneDemandForecast>,
    /// Named model factors that shaped this forecast (seasonal, weather, ...)
    pub factors: HashMap<String, f64>,
    pub model_version: String,
}

impl DemandForecast {
    /// Whether the forecast is still usable at the given instant.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now <= self.valid_until
    }

    /// The regional slice for a region code, if present.
    pub fn region(&self, code: &str) -> Option<&RegionalDemandForecast> {
        let code = code.to_lowercase();
        self.regional.iter().find(|r| r.region == code)
    }

    /// The lane slice for a lane, if present.
    pub fn lane(&self, lane: &Lane) -> Option<&LaneDemandForecast> {
        self.lanes.iter().find(|l| {
            l.origin_region == lane.origin
                && l.destination_region == lane.destination
                && l.equipment_type == lane.equipment
        })
    }
}

impl fmt::Display for DemandForecast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Forecast {} [{}] conf={} ({:.0}%) regions={} lanes={} valid_until={}",
            self.forecast_id,
            self.timeframe,
            self.confidence,
            self.confidence_score * 100.0,
            self.regional.len(),
            self.lanes.len(),
            self.valid_until.format("%Y-%m-%d %H:%M UTC"),
        )
    }
}

// ---------------------------------------------------------------------------
// Hotspots
// ---------------------------------------------------------------------------

/// What kind of market imbalance a hotspot flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HotspotType {
    DemandSurge,
    SupplyShortage,
    RateOpportunity,
    RepositioningNeed,
    WeatherImpact,
}

impl HotspotType {
    /// All hotspot types (useful for iteration).
    pub const ALL: &'static [HotspotType] = &[
        HotspotType::DemandSurge,
        HotspotType::SupplyShortage,
        HotspotType::RateOpportunity,
        HotspotType::RepositioningNeed,
        HotspotType::WeatherImpact,
    ];

    /// Bonus multiplier contributed by the hotspot type.
    pub fn bonus_multiplier(&self) -> f64 {
        match self {
            HotspotType::DemandSurge => 1.1,
            HotspotType::SupplyShortage => 1.2,
            HotspotType::RateOpportunity => 0.9,
            HotspotType::RepositioningNeed => 1.15,
            HotspotType::WeatherImpact => 1.3,
        }
    }
}

impl fmt::Display for HotspotType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HotspotType::DemandSurge => write!(f, "DEMAND_SURGE"),
            HotspotType::SupplyShortage => write!(f, "SUPPLY_SHORTAGE"),
            HotspotType::RateOpportunity => write!(f, "RATE_OPPORTUNITY"),
            HotspotType::RepositioningNeed => write!(f, "REPOSITIONING_NEED"),
            HotspotType::WeatherImpact => write!(f, "WEATHER_IMPACT"),
        }
    }
}

/// Severity bucket for a hotspot. Ordering follows escalation, so
/// `Critical > High > Medium > Low` holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HotspotSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl HotspotSeverity {
    /// Map a composite score in [0, 1] to a severity bucket.
    /// >= 0.8 CRITICAL, >= 0.6 HIGH, >= 0.4 MEDIUM, else LOW.
    pub fn from_composite(score: f64) -> Self {
        if score >= 0.8 {
            HotspotSeverity::Critical
        } else if score >= 0.6 {
            HotspotSeverity::High
        } else if score >= 0.4 {
            HotspotSeverity::Medium
        } else {
            HotspotSeverity::Low
        }
    }

    /// Bonus multiplier contributed by the severity bucket.
    pub fn bonus_multiplier(&self) -> f64 {
        match self {
            HotspotSeverity::Low => 1.05,
            HotspotSeverity::Medium => 1.1,
            HotspotSeverity::High => 1.2,
            HotspotSeverity::Critical => 1.5,
        }
    }
}

impl fmt::Display for HotspotSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HotspotSeverity::Low => write!(f, "LOW"),
            HotspotSeverity::Medium => write!(f, "MEDIUM"),
            HotspotSeverity::High => write!(f, "HIGH"),
            HotspotSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// A geographic zone of market imbalance, with an incentive bonus
/// attached to loads picked up inside it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hotspot {
    pub hotspot_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub hotspot_type: HotspotType,
    pub severity: HotspotSeverity,
    pub center: GeoPoint,
    pub radius_miles: f64,
    /// Detector confidence in [0, 1]
    pub confidence_score: f64,
    /// Flat USD bonus applied to qualifying loads
    pub bonus_amount: f64,
    pub region: String,
    /// Some hotspots are equipment-specific; None applies to all
    pub equipment_type: Option<EquipmentType>,
    pub detected_at: DateTime<Utc>,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub active: bool,
}

impl Hotspot {
    /// Whether the hotspot is live at the given instant.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.active && now >= self.valid_from && now <= self.valid_until
    }

    /// Whether a point falls inside the hotspot's radius.
    pub fn contains(&self, point: GeoPoint) -> bool {
        haversine_miles(self.center, point) <= self.radius_miles
    }

    /// Whether another hotspot of the same type overlaps this one
    /// (centers closer than the sum of the radii).
    pub fn overlaps(&self, other: &Hotspot) -> bool {
        self.hotspot_type == other.hotspot_type
            && haversine_miles(self.center, other.center)
                < self.radius_miles + other.radius_miles
    }
}

impl fmt::Display for Hotspot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {} r={:.0}mi conf={:.0}% bonus=${:.2}",
            self.severity,
            self.hotspot_type,
            self.region,
            self.radius_miles,
            self.confidence_score * 100.0,
            self.bonus_amount,
        )
    }
}

// ---------------------------------------------------------------------------
// Auctions & bids
// ---------------------------------------------------------------------------

/// Auction format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuctionType {
    Standard,
    Reverse,
    Sealed,
}

impl fmt::Display for AuctionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuctionType::Standard => write!(f, "STANDARD"),
            AuctionType::Reverse => write!(f, "REVERSE"),
            AuctionType::Sealed => write!(f, "SEALED"),
        }
    }
}

/// Auction lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuctionStatus {
    Draft,
    Scheduled,
    Active,
    Completed,
    Cancelled,
}

impl AuctionStatus {
    /// Terminal states admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AuctionStatus::Completed | AuctionStatus::Cancelled)
    }

    /// Whether an auction in this state may be started.
    pub fn can_start(&self) -> bool {
        matches!(self, AuctionStatus::Draft | AuctionStatus::Scheduled)
    }
}

impl fmt::Display for AuctionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuctionStatus::Draft => write!(f, "DRAFT"),
            AuctionStatus::Scheduled => write!(f, "SCHEDULED"),
            AuctionStatus::Active => write!(f, "ACTIVE"),
            AuctionStatus::Completed => write!(f, "COMPLETED"),
            AuctionStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// An auction run over a single load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadAuction {
    pub auction_id: String,
    pub load_id: String,
    pub auction_type: AuctionType,
    pub status: AuctionStatus,
    /// Scheduled bidding window
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub actual_start_time: Option<DateTime<Utc>>,
    pub actual_end_time: Option<DateTime<Utc>>,
    pub starting_price: f64,
    /// Ceiling on the winning amount; bids above it never win. None
    /// means no reserve.
    pub reserve_price: Option<f64>,
    pub current_price: f64,
    pub min_bid_increment: f64,
    /// Winner-selection weights; should sum to ~1.0
    pub price_weight: f64,
    pub network_efficiency_weight: f64,
    pub driver_score_weight: f64,
    pub bids_count: u32,
    pub winning_bid_id: Option<String>,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl LoadAuction {
    /// Whether bids may be placed at the given instant.
    pub fn bidding_open(&self, now: DateTime<Utc>) -> bool {
        self.status == AuctionStatus::Active && now >= self.start_time && now < self.end_time
    }

    /// Whether the scheduled bidding window has elapsed.
    pub fn window_elapsed(&self, now: DateTime<Utc>) -> bool {
        now >= self.end_time
    }
}

impl fmt::Display for LoadAuction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Auction {} [{}] load={} {} start=${:.2} current=${:.2} bids={}",
            self.auction_id,
            self.auction_type,
            self.load_id,
            self.status,
            self.starting_price,
            self.current_price,
            self.bids_count,
        )
    }
}

/// Bid lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BidStatus {
    Pending,
    Active,
    Accepted,
    Rejected,
    Withdrawn,
    Expired,
}

impl BidStatus {
    /// Live bids count toward duplicate checks and winner selection.
    pub fn is_live(&self) -> bool {
        matches!(self, BidStatus::Pending | BidStatus::Active)
    }
}

impl fmt::Display for BidStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BidStatus::Pending => write!(f, "PENDING"),
            BidStatus::Active => write!(f, "ACTIVE"),
            BidStatus::Accepted => write!(f, "ACCEPTED"),
            BidStatus::Rejected => write!(f, "REJECTED"),
            BidStatus::Withdrawn => write!(f, "WITHDRAWN"),
            BidStatus::Expired => write!(f, "EXPIRED"),
        }
    }
}

/// Who is bidding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BidderType {
    Driver,
    Carrier,
}

impl fmt::Display for BidderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BidderType::Driver => write!(f, "driver"),
            BidderType::Carrier => write!(f, "carrier"),
        }
    }
}

/// A single bid on a load auction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuctionBid {
    pub bid_id: String,
    pub auction_id: String,
    pub load_id: String,
    pub bidder_id: String,
    pub bidder_type: BidderType,
    /// Offered price in USD
    pub amount: f64,
    pub status: BidStatus,
    /// Route-fit score, 0-100
    pub efficiency_score: f64,
    /// Marketplace network contribution score, 0-100
    pub network_contribution_score: f64,
    /// Bidder reputation score, 0-100
    pub driver_score: f64,
    /// Composite winner-selection score; lower is better
    pub weighted_score: f64,
    pub notes: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

impl AuctionBid {
    /// Whether this bid still competes for the win.
    pub fn is_live(&self) -> bool {
        self.status.is_live()
    }
}

impl fmt::Display for AuctionBid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Bid {} [{}] {} {} ${:.2} score={:.3}",
            self.bid_id,
            self.status,
            self.bidder_type,
            self.bidder_id,
            self.amount,
            self.weighted_score,
        )
    }
}

// ---------------------------------------------------------------------------
// Loads
// ---------------------------------------------------------------------------

/// One end of a load's route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadStop {
    pub point: GeoPoint,
    /// Region code, when the stop maps to a known market
    pub region: Option<String>,
}

/// The marketplace load the engines price, forecast, and auction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Load {
    pub load_id: String,
    pub equipment_type: EquipmentType,
    pub pickup: Option<LoadStop>,
    pub delivery: Option<LoadStop>,
    pub pickup_window_start: DateTime<Utc>,
    pub pickup_window_end: DateTime<Utc>,
    pub weight_lbs: Option<f64>,
    pub hazardous: bool,
    pub temp_controlled: bool,
}

impl Load {
    /// Great-circle pickup-to-delivery distance, if both stops have
    /// coordinates.
    pub fn route_distance_miles(&self) -> Option<f64> {
        let p = self.pickup.as_ref()?;
        let d = self.delivery.as_ref()?;
        Some(haversine_miles(p.point, d.point))
    }

    /// Hours until the pickup window opens. Negative once it has opened.
    pub fn hours_until_pickup(&self, now: DateTime<Utc>) -> f64 {
        (self.pickup_window_start - now).num_minutes() as f64 / 60.0
    }

    /// Origin region code, resolving from coordinates when not set.
    pub fn origin_region(&self) -> Option<String> {
        let stop = self.pickup.as_ref()?;
        if let Some(region) = &stop.region {
            return Some(region.to_lowercase());
        }
        crate::geo::nearest_region(stop.point).map(|r| r.code.to_string())
    }

    /// Destination region code, resolving from coordinates when not set.
    pub fn destination_region(&self) -> Option<String> {
        let stop = self.delivery.as_ref()?;
        if let Some(region) = &stop.region {
            return Some(region.to_lowercase());
        }
        crate::geo::nearest_region(stop.point).map(|r| r.code.to_string())
    }

    /// The lane this load moves on, when both ends resolve to regions.
    pub fn lane(&self) -> Option<Lane> {
        Some(Lane::new(
            &self.origin_region()?,
            &self.destination_region()?,
            self.equipment_type,
        ))
    }

    /// Helper to build a test/sample load with sensible defaults.
    #[cfg(test)]
    pub fn sample() -> Self {
        Load {
            load_id: "load-001".to_string(),
            equipment_type: EquipmentType::DryVan,
            pickup: Some(LoadStop {
                point: GeoPoint::new(41.88, -87.63),
                region: Some("chicago".to_string()),
            }),
            delivery: Some(LoadStop {
                point: GeoPoint::new(32.78, -96.80),
                region: Some("dallas".to_string()),
            }),
            pickup_window_start: Utc::now() + Duration::hours(36),
            pickup_window_end: Utc::now() + Duration::hours(40),
            weight_lbs: Some(28_000.0),
            hazardous: false,
            temp_controlled: false,
        }
    }
}

impl fmt::Display for Load {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.lane() {
            Some(lane) => write!(f, "Load {} {}", self.load_id, lane),
            None => write!(f, "Load {} ({})", self.load_id, self.equipment_type),
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for Lanewise.
#[derive(Debug, thiserror::Error)]
pub enum LanewiseError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Invalid transition for {entity} {id}: {detail}")]
    InvalidTransition {
        entity: &'static str,
        id: String,
        detail: String,
    },

    #[error("Duplicate bid: bidder {bidder_id} has already bid on auction {auction_id}")]
    DuplicateBid {
        auction_id: String,
        bidder_id: String,
    },

    #[error("Missing location on load {0}")]
    MissingLocation(String),

    #[error("External service error ({provider}): {message}")]
    ExternalService { provider: String, message: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl LanewiseError {
    /// Shorthand for a not-found error.
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        LanewiseError::NotFound { entity, id: id.into() }
    }

    /// Shorthand for an external service error.
    pub fn external(provider: impl Into<String>, message: impl Into<String>) -> Self {
        LanewiseError::ExternalService {
            provider: provider.into(),
            message: message.into(),
        }
    }
}

/// Convenience alias used across stores and engines.
pub type LanewiseResult<T> = Result<T, LanewiseError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
