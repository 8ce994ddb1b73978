//! Persistence layer.
//!
//! Trait seams for rate history, demand history, hotspots, and
//! auctions. Rate history is durable (SQLite); the rest run in-memory
//! by default. The auction store is where the marketplace's integrity
//! rules live: duplicate-bid checks, status transitions, and winner
//! commitment all happen atomically inside the store so concurrent
//! callers cannot interleave between check and act.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{
    AuctionBid, AuctionStatus, EquipmentType, Hotspot, Lane, LanewiseResult, LoadAuction,
    MarketRate,
};

// ---------------------------------------------------------------------------
// Rate history
// ---------------------------------------------------------------------------

/// Persistence for lane rate observations, the raw material for trend
/// analysis and base-rate lookups.
#[async_trait]
pub trait MarketRateStore: Send + Sync {
    /// Append an observation. `rate_id` must be unique.
    async fn record_rate(&self, rate: MarketRate) -> LanewiseResult<()>;

    /// Most recent observation for a lane, if any.
    async fn latest_rate(&self, lane: &Lane) -> LanewiseResult<Option<MarketRate>>;

    /// Observations for a lane since the given instant, oldest first.
    async fn rate_history(
        &self,
        lane: &Lane,
        since: DateTime<Utc>,
    ) -> LanewiseResult<Vec<MarketRate>>;

    /// Most recent observations across all lanes, newest first.
    async fn recent_rates(&self, limit: u32) -> LanewiseResult<Vec<MarketRate>>;

    /// Distinct lanes with at least one observation since the given
    /// instant.
    async fn recent_lanes(&self, since: DateTime<Utc>) -> LanewiseResult<Vec<Lane>>;
}

// ---------------------------------------------------------------------------
// Demand history
// ---------------------------------------------------------------------------

/// A demand observation kept for forecasting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemandSample {
    pub region: String,
    pub equipment_type: EquipmentType,
    /// Observed demand score in [0, 1]
    pub demand_score: f64,
    pub load_count: u32,
    pub observed_at: DateTime<Utc>,
}

/// Rolling demand history per region and equipment class. Implementors
/// cap retention; old samples fall off.
#[async_trait]
pub trait DemandHistoryStore: Send + Sync {
    async fn record_sample(&self, sample: DemandSample) -> LanewiseResult<()>;

    /// Samples since the given instant, oldest first.
    async fn samples(
        &self,
        region: &str,
        equipment: EquipmentType,
        since: DateTime<Utc>,
    ) -> LanewiseResult<Vec<DemandSample>>;
}

// ---------------------------------------------------------------------------
// Hotspots
// ---------------------------------------------------------------------------

#[async_trait]
pub trait HotspotStore: Send + Sync {
    /// Insert or replace a hotspot by id.
    async fn upsert_hotspot(&self, hotspot: Hotspot) -> LanewiseResult<()>;

    async fn hotspot(&self, id: &str) -> LanewiseResult<Hotspot>;

    /// Hotspots live at the given instant.
    async fn active_hotspots(&self, now: DateTime<Utc>) -> LanewiseResult<Vec<Hotspot>>;

    async fn all_hotspots(&self) -> LanewiseResult<Vec<Hotspot>>;

    /// Flag a hotspot inactive. No-op if already inactive.
    async fn deactivate(&self, id: &str) -> LanewiseResult<()>;

    /// Flag every hotspot whose validity window has passed as inactive.
    /// Returns the number flipped; repeated calls return 0. Idempotent.
    async fn deactivate_expired(&self, now: DateTime<Utc>) -> LanewiseResult<usize>;
}

// ---------------------------------------------------------------------------
// Auctions
// ---------------------------------------------------------------------------

/// The winner chosen for a completing auction.
#[derive(Debug, Clone)]
pub struct WinnerChoice {
    pub bid_id: String,
    pub final_price: f64,
}

/// Winner selection callback, run by the store inside the completion
/// transaction so no bid can slip in between selection and commit. The
/// callback may rewrite `weighted_score` on the slice; the store
/// persists those updates along with the status changes.
pub type WinnerFn = dyn Fn(&LoadAuction, &mut [AuctionBid]) -> Option<WinnerChoice> + Send + Sync;

/// Result of completing an auction.
#[derive(Debug, Clone)]
pub struct AuctionOutcome {
    pub auction: LoadAuction,
    pub winning_bid: Option<AuctionBid>,
    /// False when the auction was already COMPLETED and this call was
    /// a no-op.
    pub newly_completed: bool,
}

/// Auction and bid persistence with transactional integrity.
///
/// Mechanical bid rules (window open, duplicate bidder, sealed-bid
/// pricing) are enforced inside `add_bid` under the store's lock;
/// callers validate scores and business inputs first.
/// Status transitions are compare-and-set: exactly one concurrent
/// `complete_auction` call performs the transition, the rest observe
/// the already-completed state.
#[async_trait]
pub trait AuctionStore: Send + Sync {
    async fn create_auction(&self, auction: LoadAuction) -> LanewiseResult<()>;

    async fn auction(&self, id: &str) -> LanewiseResult<LoadAuction>;

    /// All auctions, optionally filtered by status. Newest first.
    async fn auctions_by_status(
        &self,
        status: Option<AuctionStatus>,
    ) -> LanewiseResult<Vec<LoadAuction>>;

    /// DRAFT/SCHEDULED → ACTIVE. Records the actual start time.
    async fn start_auction(&self, id: &str, now: DateTime<Utc>) -> LanewiseResult<LoadAuction>;

    /// Atomically validate and insert a bid. Updates `current_price`
    /// and `bids_count` on the auction for open-outcry formats.
    async fn add_bid(&self, bid: AuctionBid, now: DateTime<Utc>) -> LanewiseResult<AuctionBid>;

    async fn bid(&self, id: &str) -> LanewiseResult<AuctionBid>;

    /// Bids on an auction, oldest first.
    async fn bids_for_auction(&self, auction_id: &str) -> LanewiseResult<Vec<AuctionBid>>;

    /// Withdraw a live bid. Only the submitting bidder may withdraw,
    /// and only while the auction is still ACTIVE.
    async fn withdraw_bid(&self, bid_id: &str, bidder_id: &str) -> LanewiseResult<AuctionBid>;

    /// ACTIVE → COMPLETED. Runs `decide` over the live bids inside the
    /// transition; the chosen bid becomes ACCEPTED, the rest REJECTED.
    /// Calling on an already-COMPLETED auction is a no-op that returns
    /// the existing outcome, so concurrent enders race safely.
    async fn complete_auction(
        &self,
        id: &str,
        now: DateTime<Utc>,
        decide: &WinnerFn,
    ) -> LanewiseResult<AuctionOutcome>;

    /// Any non-terminal status → CANCELLED. Live bids become EXPIRED.
    /// Cancelling an already-CANCELLED auction is a no-op; the flag in
    /// the returned pair is false for it and for nothing else.
    async fn cancel_auction(
        &self,
        id: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> LanewiseResult<(LoadAuction, bool)>;
}
