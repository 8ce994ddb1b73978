//! In-memory store implementations.
//!
//! Each store guards its state with a single `tokio::sync::Mutex`, so
//! every operation is linearizable: the duplicate-bid check, the price
//! bookkeeping, and the status compare-and-set all happen under one
//! lock acquisition with no awaits inside the critical section.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::stores::{
    AuctionOutcome, AuctionStore, DemandHistoryStore, DemandSample, HotspotStore, MarketRateStore,
    WinnerChoice, WinnerFn,
};
use crate::types::{
    AuctionBid, AuctionStatus, AuctionType, BidStatus, EquipmentType, Hotspot, Lane, LanewiseError,
    LanewiseResult, LoadAuction, MarketRate,
};

// ---------------------------------------------------------------------------
// Rates
// ---------------------------------------------------------------------------

/// Append-only in-memory rate history.
#[derive(Default)]
pub struct MemoryRateStore {
    rates: Mutex<Vec<MarketRate>>,
}

impl MemoryRateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MarketRateStore for MemoryRateStore {
    async fn record_rate(&self, rate: MarketRate) -> LanewiseResult<()> {
        let mut rates = self.rates.lock().await;
        if rates.iter().any(|r| r.rate_id == rate.rate_id) {
            return Err(LanewiseError::Storage(format!(
                "rate {} already recorded",
                rate.rate_id
            )));
        }
        rates.push(rate);
        Ok(())
    }

    async fn latest_rate(&self, lane: &Lane) -> LanewiseResult<Option<MarketRate>> {
        let rates = self.rates.lock().await;
        Ok(rates
            .iter()
            .filter(|r| r.lane() == *lane)
            .max_by_key(|r| r.recorded_at)
            .cloned())
    }

    async fn rate_history(
        &self,
        lane: &Lane,
        since: DateTime<Utc>,
    ) -> LanewiseResult<Vec<MarketRate>> {
        let rates = self.rates.lock().await;
        let mut matching: Vec<MarketRate> = rates
            .iter()
            .filter(|r| r.lane() == *lane && r.recorded_at >= since)
            .cloned()
            .collect();
        matching.sort_by_key(|r| r.recorded_at);
        Ok(matching)
    }

    async fn recent_rates(&self, limit: u32) -> LanewiseResult<Vec<MarketRate>> {
        let rates = self.rates.lock().await;
        let mut all: Vec<MarketRate> = rates.clone();
        all.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        all.truncate(limit as usize);
        Ok(all)
    }

    async fn recent_lanes(&self, since: DateTime<Utc>) -> LanewiseResult<Vec<Lane>> {
        let rates = self.rates.lock().await;
        let mut lanes: Vec<Lane> = rates
            .iter()
            .filter(|r| r.recorded_at >= since)
            .map(|r| r.lane())
            .collect::<std::collections::HashSet<_>>()
            .into_iter()
            .collect();
        lanes.sort_by(|a, b| {
            (&a.origin, &a.destination, a.equipment.as_token())
                .cmp(&(&b.origin, &b.destination, b.equipment.as_token()))
        });
        Ok(lanes)
    }
}

// ---------------------------------------------------------------------------
// Demand history
// ---------------------------------------------------------------------------

const DEFAULT_SAMPLE_CAPACITY: usize = 500;

/// Rolling per-(region, equipment) demand history with bounded
/// retention. The oldest sample falls off once a key hits capacity.
pub struct MemoryDemandHistoryStore {
    samples: Mutex<HashMap<(String, EquipmentType), VecDeque<DemandSample>>>,
    capacity: usize,
}

impl MemoryDemandHistoryStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_SAMPLE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }
}

impl Default for MemoryDemandHistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DemandHistoryStore for MemoryDemandHistoryStore {
    async fn record_sample(&self, sample: DemandSample) -> LanewiseResult<()> {
        let mut samples = self.samples.lock().await;
        let key = (sample.region.to_lowercase(), sample.equipment_type);
        let entry = samples.entry(key).or_default();
        entry.push_back(sample);
        while entry.len() > self.capacity {
            entry.pop_front();
        }
        Ok(())
    }

    async fn samples(
        &self,
        region: &str,
        equipment: EquipmentType,
        since: DateTime<Utc>,
    ) -> LanewiseResult<Vec<DemandSample>> {
        let samples = self.samples.lock().await;
        let key = (region.to_lowercase(), equipment);
        let mut matching: Vec<DemandSample> = samples
            .get(&key)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|s| s.observed_at >= since)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        matching.sort_by_key(|s| s.observed_at);
        Ok(matching)
    }
}

// ---------------------------------------------------------------------------
// Hotspots
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryHotspotStore {
    hotspots: Mutex<HashMap<String, Hotspot>>,
}

impl MemoryHotspotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HotspotStore for MemoryHotspotStore {
    async fn upsert_hotspot(&self, hotspot: Hotspot) -> LanewiseResult<()> {
        let mut hotspots = self.hotspots.lock().await;
        hotspots.insert(hotspot.hotspot_id.clone(), hotspot);
        Ok(())
    }

    async fn hotspot(&self, id: &str) -> LanewiseResult<Hotspot> {
        let hotspots = self.hotspots.lock().await;
        hotspots
            .get(id)
            .cloned()
            .ok_or_else(|| LanewiseError::not_found("hotspot", id))
    }

    async fn active_hotspots(&self, now: DateTime<Utc>) -> LanewiseResult<Vec<Hotspot>> {
        let hotspots = self.hotspots.lock().await;
        let mut active: Vec<Hotspot> = hotspots
            .values()
            .filter(|h| h.is_active_at(now))
            .cloned()
            .collect();
        active.sort_by(|a, b| b.detected_at.cmp(&a.detected_at));
        Ok(active)
    }

    async fn all_hotspots(&self) -> LanewiseResult<Vec<Hotspot>> {
        let hotspots = self.hotspots.lock().await;
        let mut all: Vec<Hotspot> = hotspots.values().cloned().collect();
        all.sort_by(|a, b| b.detected_at.cmp(&a.detected_at));
        Ok(all)
    }

    async fn deactivate(&self, id: &str) -> LanewiseResult<()> {
        let mut hotspots = self.hotspots.lock().await;
        let hotspot = hotspots
            .get_mut(id)
            .ok_or_else(|| LanewiseError::not_found("hotspot", id))?;
        hotspot.active = false;
        Ok(())
    }

    async fn deactivate_expired(&self, now: DateTime<Utc>) -> LanewiseResult<usize> {
        let mut hotspots = self.hotspots.lock().await;
        let mut flipped = 0;
        for hotspot in hotspots.values_mut() {
            if hotspot.active && now > hotspot.valid_until {
                hotspot.active = false;
                flipped += 1;
            }
        }
        Ok(flipped)
    }
}

// ---------------------------------------------------------------------------
// Auctions
// ---------------------------------------------------------------------------

#[derive(Default)]
struct AuctionState {
    auctions: HashMap<String, LoadAuction>,
    bids: HashMap<String, AuctionBid>,
}

impl AuctionState {
    /// Live bids on an auction, oldest first.
    fn live_bids(&self, auction_id: &str) -> Vec<AuctionBid> {
        let mut live: Vec<AuctionBid> = self
            .bids
            .values()
            .filter(|b| b.auction_id == auction_id && b.is_live())
            .cloned()
            .collect();
        live.sort_by_key(|b| b.submitted_at);
        live
    }

    /// Lowest live offer, falling back to the starting price. Sealed
    /// auctions never move their displayed price.
    fn reprice(&mut self, auction_id: &str) {
        let floor = self
            .bids
            .values()
            .filter(|b| b.auction_id == auction_id && b.is_live())
            .map(|b| b.amount)
            .fold(f64::INFINITY, f64::min);
        if let Some(auction) = self.auctions.get_mut(auction_id) {
            if auction.auction_type == AuctionType::Sealed {
                return;
            }
            auction.current_price = if floor.is_finite() {
                floor.min(auction.starting_price)
            } else {
                auction.starting_price
            };
        }
    }
}

/// In-memory auction and bid store. The single mutex makes every
/// check-then-act sequence atomic, which is what the duplicate-bid and
/// single-completion guarantees rest on.
#[derive(Default)]
pub struct MemoryAuctionStore {
    state: Mutex<AuctionState>,
}

impl MemoryAuctionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuctionStore for MemoryAuctionStore {
    async fn create_auction(&self, auction: LoadAuction) -> LanewiseResult<()> {
        let mut state = self.state.lock().await;
        if state.auctions.contains_key(&auction.auction_id) {
            return Err(LanewiseError::Storage(format!(
                "auction {} already exists",
                auction.auction_id
            )));
        }
        state.auctions.insert(auction.auction_id.clone(), auction);
        Ok(())
    }

    async fn auction(&self, id: &str) -> LanewiseResult<LoadAuction> {
        let state = self.state.lock().await;
        state
            .auctions
            .get(id)
            .cloned()
            .ok_or_else(|| LanewiseError::not_found("auction", id))
    }

    async fn auctions_by_status(
        &self,
        status: Option<AuctionStatus>,
    ) -> LanewiseResult<Vec<LoadAuction>> {
        let state = self.state.lock().await;
        let mut matching: Vec<LoadAuction> = state
            .auctions
            .values()
            .filter(|a| status.map_or(true, |s| a.status == s))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matching)
    }

    async fn start_auction(&self, id: &str, now: DateTime<Utc>) -> LanewiseResult<LoadAuction> {
        let mut state = self.state.lock().await;
        let auction = state
            .auctions
            .get_mut(id)
            .ok_or_else(|| LanewiseError::not_found("auction", id))?;
        if !auction.status.can_start() {
            return Err(LanewiseError::InvalidTransition {
                entity: "auction",
                id: id.to_string(),
                detail: format!("cannot start from {}", auction.status),
            });
        }
        auction.status = AuctionStatus::Active;
        auction.actual_start_time = Some(now);
        Ok(auction.clone())
    }

    async fn add_bid(&self, bid: AuctionBid, now: DateTime<Utc>) -> LanewiseResult<AuctionBid> {
        let mut state = self.state.lock().await;
        let auction = state
            .auctions
            .get(&bid.auction_id)
            .ok_or_else(|| LanewiseError::not_found("auction", &bid.auction_id))?;
        if !auction.bidding_open(now) {
            return Err(LanewiseError::InvalidTransition {
                entity: "auction",
                id: bid.auction_id.clone(),
                detail: format!("bidding is not open (status {})", auction.status),
            });
        }
        // One bid per (auction, bidder), withdrawn bids included.
        if state
            .bids
            .values()
            .any(|b| b.auction_id == bid.auction_id && b.bidder_id == bid.bidder_id)
        {
            return Err(LanewiseError::DuplicateBid {
                auction_id: bid.auction_id.clone(),
                bidder_id: bid.bidder_id.clone(),
            });
        }

        let auction_id = bid.auction_id.clone();
        state.bids.insert(bid.bid_id.clone(), bid.clone());
        if let Some(auction) = state.auctions.get_mut(&auction_id) {
            auction.bids_count += 1;
        }
        state.reprice(&auction_id);
        Ok(bid)
    }

    async fn bid(&self, id: &str) -> LanewiseResult<AuctionBid> {
        let state = self.state.lock().await;
        state
            .bids
            .get(id)
            .cloned()
            .ok_or_else(|| LanewiseError::not_found("bid", id))
    }

    async fn bids_for_auction(&self, auction_id: &str) -> LanewiseResult<Vec<AuctionBid>> {
        let state = self.state.lock().await;
        let mut bids: Vec<AuctionBid> = state
            .bids
            .values()
            .filter(|b| b.auction_id == auction_id)
            .cloned()
            .collect();
        bids.sort_by_key(|b| b.submitted_at);
        Ok(bids)
    }

    async fn withdraw_bid(&self, bid_id: &str, bidder_id: &str) -> LanewiseResult<AuctionBid> {
        let mut state = self.state.lock().await;
        let bid = state
            .bids
            .get(bid_id)
            .ok_or_else(|| LanewiseError::not_found("bid", bid_id))?;
        if bid.bidder_id != bidder_id {
            return Err(LanewiseError::InvalidInput(format!(
                "bid {bid_id} does not belong to bidder {bidder_id}"
            )));
        }
        if !bid.is_live() {
            return Err(LanewiseError::InvalidTransition {
                entity: "bid",
                id: bid_id.to_string(),
                detail: format!("cannot withdraw from {}", bid.status),
            });
        }
        let auction_id = bid.auction_id.clone();
        let auction = state
            .auctions
            .get(&auction_id)
            .ok_or_else(|| LanewiseError::not_found("auction", &auction_id))?;
        if auction.status != AuctionStatus::Active {
            return Err(LanewiseError::InvalidTransition {
                entity: "auction",
                id: auction_id.clone(),
                detail: format!("withdrawal requires an active auction (status {})", auction.status),
            });
        }

        let bid = state
            .bids
            .get_mut(bid_id)
            .ok_or_else(|| LanewiseError::not_found("bid", bid_id))?;
        bid.status = BidStatus::Withdrawn;
        let withdrawn = bid.clone();
        if let Some(auction) = state.auctions.get_mut(&auction_id) {
            auction.bids_count = auction.bids_count.saturating_sub(1);
        }
        state.reprice(&auction_id);
        Ok(withdrawn)
    }

    async fn complete_auction(
        &self,
        id: &str,
        now: DateTime<Utc>,
        decide: &WinnerFn,
    ) -> LanewiseResult<AuctionOutcome> {
        let mut state = self.state.lock().await;
        let auction = state
            .auctions
            .get(id)
            .ok_or_else(|| LanewiseError::not_found("auction", id))?
            .clone();

        match auction.status {
            AuctionStatus::Active => {}
            // Losing the completion race is not an error.
            AuctionStatus::Completed => {
                let winning_bid = auction
                    .winning_bid_id
                    .as_ref()
                    .and_then(|bid_id| state.bids.get(bid_id).cloned());
                return Ok(AuctionOutcome {
                    auction,
                    winning_bid,
                    newly_completed: false,
                });
            }
            other => {
                return Err(LanewiseError::InvalidTransition {
                    entity: "auction",
                    id: id.to_string(),
                    detail: format!("cannot complete from {other}"),
                });
            }
        }

        let mut live = state.live_bids(id);
        let choice = decide(&auction, &mut live);

        for bid in &mut live {
            bid.status = match &choice {
                Some(c) if c.bid_id == bid.bid_id => BidStatus::Accepted,
                _ => BidStatus::Rejected,
            };
            state.bids.insert(bid.bid_id.clone(), bid.clone());
        }

        let auction = state
            .auctions
            .get_mut(id)
            .ok_or_else(|| LanewiseError::not_found("auction", id))?;
        auction.status = AuctionStatus::Completed;
        auction.actual_end_time = Some(now);
        auction.winning_bid_id = choice.as_ref().map(|c| c.bid_id.clone());
        if let Some(choice) = &choice {
            auction.current_price = choice.final_price;
        }
        let auction = auction.clone();

        let winning_bid = choice.and_then(|c| state.bids.get(&c.bid_id).cloned());
        Ok(AuctionOutcome {
            auction,
            winning_bid,
            newly_completed: true,
        })
    }

    async fn cancel_auction(
        &self,
        id: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> LanewiseResult<(LoadAuction, bool)> {
        let mut state = self.state.lock().await;
        let status = state
            .auctions
            .get(id)
            .ok_or_else(|| LanewiseError::not_found("auction", id))?
            .status;

        match status {
            AuctionStatus::Completed => {
                return Err(LanewiseError::InvalidTransition {
                    entity: "auction",
                    id: id.to_string(),
                    detail: "cannot cancel a completed auction".to_string(),
                });
            }
            // Cancelling twice is idempotent.
            AuctionStatus::Cancelled => {
                return Ok((state.auctions[id].clone(), false));
            }
            _ => {}
        }

        let expired: Vec<String> = state
            .bids
            .values()
            .filter(|b| b.auction_id == id && b.is_live())
            .map(|b| b.bid_id.clone())
            .collect();
        for bid_id in expired {
            if let Some(bid) = state.bids.get_mut(&bid_id) {
                bid.status = BidStatus::Expired;
            }
        }

        let auction = state
            .auctions
            .get_mut(id)
            .ok_or_else(|| LanewiseError::not_found("auction", id))?;
        auction.status = AuctionStatus::Cancelled;
        auction.cancellation_reason = Some(reason.to_string());
        auction.actual_end_time = Some(now);
        Ok((auction.clone(), true))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
