//! Load auction lifecycle.
//!
//! Drives the auction state machine (DRAFT -> ACTIVE -> COMPLETED or
//! CANCELLED) over an `AuctionStore`, scoring bidders through the
//! profile provider at placement and selecting the winner by the
//! lower-is-better weighted score at close. The store's transitions
//! are compare-and-set, so concurrent enders settle on one COMPLETED
//! transition and each lifecycle event publishes exactly once.

pub mod scoring;

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::providers::events::{emit, EventSink, EventType};
use crate::providers::BidderScoring;
use crate::stores::{AuctionOutcome, AuctionStore};
use crate::types::{
    AuctionBid, AuctionStatus, AuctionType, BidStatus, BidderType, LanewiseError, LanewiseResult,
    LoadAuction,
};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Auction engine configuration.
#[derive(Debug, Clone)]
pub struct AuctionConfig {
    /// Bidding window length when creation leaves `end_time` unset.
    pub default_duration_mins: i64,
    /// Default winner-selection weights for auctions created without
    /// their own.
    pub network_efficiency_weight: f64,
    pub price_weight: f64,
    pub driver_score_weight: f64,
    /// Divide the three weights by their sum at score time, keeping
    /// scores comparable across auctions with different weight sets.
    pub normalize_weights: bool,
}

impl Default for AuctionConfig {
    fn default() -> Self {
        Self {
            default_duration_mins: 60,
            network_efficiency_weight: 0.4,
            price_weight: 0.3,
            driver_score_weight: 0.3,
            normalize_weights: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// Inputs for opening an auction on a load.
#[derive(Debug, Clone)]
pub struct CreateAuctionParams {
    pub load_id: String,
    pub auction_type: AuctionType,
    pub starting_price: f64,
    /// Ceiling on the winning amount; no reserve when None.
    pub reserve_price: Option<f64>,
    pub min_bid_increment: f64,
    pub start_time: DateTime<Utc>,
    /// `start_time` plus the configured default duration when None.
    pub end_time: Option<DateTime<Utc>>,
    /// Per-auction weight overrides; engine defaults when None.
    pub network_efficiency_weight: Option<f64>,
    pub price_weight: Option<f64>,
    pub driver_score_weight: Option<f64>,
}

/// Inputs for placing a bid.
#[derive(Debug, Clone)]
pub struct PlaceBidParams {
    pub auction_id: String,
    pub bidder_id: String,
    pub bidder_type: BidderType,
    /// Offered price in USD
    pub amount: f64,
    pub notes: Option<String>,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct AuctionEngine {
    config: AuctionConfig,
    auctions: Arc<dyn AuctionStore>,
    scoring: Arc<dyn BidderScoring>,
    events: Arc<dyn EventSink>,
}

impl AuctionEngine {
    pub fn new(
        config: AuctionConfig,
        auctions: Arc<dyn AuctionStore>,
        scoring: Arc<dyn BidderScoring>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            config,
            auctions,
            scoring,
            events,
        }
    }

    /// Access the auction configuration.
    pub fn config(&self) -> &AuctionConfig {
        &self.config
    }

    /// Open an auction in DRAFT. Weights left unset fall back to the
    /// engine defaults; `end_time` falls back to the default duration.
    pub async fn create_auction(&self, params: CreateAuctionParams) -> LanewiseResult<LoadAuction> {
        if params.load_id.trim().is_empty() {
            return Err(LanewiseError::InvalidInput("load_id is required".to_string()));
        }
        if params.starting_price <= 0.0 {
            return Err(LanewiseError::InvalidInput(format!(
                "starting price must be positive, got {}",
                params.starting_price
            )));
        }
        if params.min_bid_increment < 0.0 {
            return Err(LanewiseError::InvalidInput(format!(
                "minimum bid increment cannot be negative, got {}",
                params.min_bid_increment
            )));
        }
        if let Some(reserve) = params.reserve_price {
            if reserve <= 0.0 {
                return Err(LanewiseError::InvalidInput(format!(
                    "reserve price must be positive, got {reserve}"
                )));
            }
        }

        let end_time = params.end_time.unwrap_or_else(|| {
            params.start_time + Duration::minutes(self.config.default_duration_mins)
        });
        if end_time <= params.start_time {
            return Err(LanewiseError::InvalidInput(
                "end time must be after start time".to_string(),
            ));
        }

        let network_weight = params
            .network_efficiency_weight
            .unwrap_or(self.config.network_efficiency_weight);
        let price_weight = params.price_weight.unwrap_or(self.config.price_weight);
        let driver_weight = params
            .driver_score_weight
            .unwrap_or(self.config.driver_score_weight);
        for (name, weight) in [
            ("network_efficiency_weight", network_weight),
            ("price_weight", price_weight),
            ("driver_score_weight", driver_weight),
        ] {
            if !(0.0..=1.0).contains(&weight) {
                return Err(LanewiseError::InvalidInput(format!(
                    "{name} must be within [0, 1], got {weight}"
                )));
            }
        }

        let auction = LoadAuction {
            auction_id: Uuid::new_v4().to_string(),
            load_id: params.load_id,
            auction_type: params.auction_type,
            status: AuctionStatus::Draft,
            start_time: params.start_time,
            end_time,
            actual_start_time: None,
            actual_end_time: None,
            starting_price: params.starting_price,
            reserve_price: params.reserve_price,
            current_price: params.starting_price,
            min_bid_increment: params.min_bid_increment,
            price_weight,
            network_efficiency_weight: network_weight,
            driver_score_weight: driver_weight,
            bids_count: 0,
            winning_bid_id: None,
            cancellation_reason: None,
            created_at: Utc::now(),
        };
        self.auctions.create_auction(auction.clone()).await?;

        info!(
            auction_id = %auction.auction_id,
            load_id = %auction.load_id,
            auction_type = %auction.auction_type,
            starting = format!("${:.2}", auction.starting_price),
            "Auction created"
        );
        emit(
            self.events.as_ref(),
            EventType::AuctionCreated,
            serde_json::json!({
                "auction_id": auction.auction_id,
                "load_id": auction.load_id,
                "auction_type": auction.auction_type.to_string(),
                "starting_price": auction.starting_price,
                "start_time": auction.start_time,
                "end_time": auction.end_time,
            }),
        )
        .await;
        Ok(auction)
    }

    /// DRAFT/SCHEDULED -> ACTIVE.
    pub async fn start_auction(&self, id: &str) -> LanewiseResult<LoadAuction> {
        let auction = self.auctions.start_auction(id, Utc::now()).await?;
        info!(
            auction_id = %auction.auction_id,
            load_id = %auction.load_id,
            "Auction started"
        );
        emit(
            self.events.as_ref(),
            EventType::AuctionStarted,
            serde_json::json!({
                "auction_id": auction.auction_id,
                "load_id": auction.load_id,
                "end_time": auction.end_time,
            }),
        )
        .await;
        Ok(auction)
    }

    /// Score the bidder and submit the bid. The store enforces the
    /// bidding window and bidder uniqueness under its own lock; this
    /// method owns input validation and scoring.
    pub async fn place_bid(&self, params: PlaceBidParams) -> LanewiseResult<AuctionBid> {
        if params.bidder_id.trim().is_empty() {
            return Err(LanewiseError::InvalidInput("bidder_id is required".to_string()));
        }
        if params.amount <= 0.0 {
            return Err(LanewiseError::InvalidInput(format!(
                "bid amount must be positive, got {}",
                params.amount
            )));
        }

        let auction = self.auctions.auction(&params.auction_id).await?;

        let scores = self
            .scoring
            .scores_for(&params.bidder_id, params.bidder_type, &auction.load_id)
            .await
            .map_err(|e| LanewiseError::external(self.scoring.name(), e.to_string()))?;
        for (name, score) in [
            ("efficiency", scores.efficiency),
            ("network_contribution", scores.network_contribution),
            ("driver", scores.driver),
        ] {
            if !(0.0..=100.0).contains(&score) {
                return Err(LanewiseError::external(
                    self.scoring.name(),
                    format!("{name} score out of range: {score}"),
                ));
            }
        }

        let now = Utc::now();
        let mut bid = AuctionBid {
            bid_id: Uuid::new_v4().to_string(),
            auction_id: auction.auction_id.clone(),
            load_id: auction.load_id.clone(),
            bidder_id: params.bidder_id,
            bidder_type: params.bidder_type,
            amount: params.amount,
            status: BidStatus::Active,
            efficiency_score: scores.efficiency,
            network_contribution_score: scores.network_contribution,
            driver_score: scores.driver,
            weighted_score: 0.0,
            notes: params.notes,
            submitted_at: now,
        };
        bid.weighted_score = scoring::weighted_score(&auction, &bid, self.config.normalize_weights);

        let bid = self.auctions.add_bid(bid, now).await?;

        info!(
            auction_id = %bid.auction_id,
            bidder = %bid.bidder_id,
            amount = format!("${:.2}", bid.amount),
            score = format!("{:.3}", bid.weighted_score),
            "Bid placed"
        );
        emit(
            self.events.as_ref(),
            EventType::BidPlaced,
            serde_json::json!({
                "bid_id": bid.bid_id,
                "auction_id": bid.auction_id,
                "bidder_id": bid.bidder_id,
                "bidder_type": bid.bidder_type.to_string(),
                "amount": bid.amount,
                "weighted_score": bid.weighted_score,
            }),
        )
        .await;
        Ok(bid)
    }

    /// Withdraw a live bid on behalf of its bidder.
    pub async fn withdraw_bid(&self, bid_id: &str, bidder_id: &str) -> LanewiseResult<AuctionBid> {
        let bid = self.auctions.withdraw_bid(bid_id, bidder_id).await?;
        info!(
            bid_id = %bid.bid_id,
            auction_id = %bid.auction_id,
            bidder = %bid.bidder_id,
            "Bid withdrawn"
        );
        emit(
            self.events.as_ref(),
            EventType::BidWithdrawn,
            serde_json::json!({
                "bid_id": bid.bid_id,
                "auction_id": bid.auction_id,
                "bidder_id": bid.bidder_id,
            }),
        )
        .await;
        Ok(bid)
    }

    /// Close an ACTIVE auction and pick the winner. Ending an auction
    /// that already completed returns the stored outcome without
    /// logging or publishing again.
    pub async fn end_auction(&self, id: &str) -> LanewiseResult<AuctionOutcome> {
        let normalize = self.config.normalize_weights;
        let decide = move |auction: &LoadAuction, bids: &mut [AuctionBid]| {
            scoring::select_winner(auction, bids, normalize)
        };
        let outcome = self.auctions.complete_auction(id, Utc::now(), &decide).await?;

        if !outcome.newly_completed {
            debug!(auction_id = id, "Auction already completed; nothing to do");
            return Ok(outcome);
        }

        match &outcome.winning_bid {
            Some(winner) => info!(
                auction_id = %outcome.auction.auction_id,
                load_id = %outcome.auction.load_id,
                winner = %winner.bidder_id,
                price = format!("${:.2}", winner.amount),
                score = format!("{:.3}", winner.weighted_score),
                "Auction completed"
            ),
            None => info!(
                auction_id = %outcome.auction.auction_id,
                load_id = %outcome.auction.load_id,
                "Auction completed without a winner"
            ),
        }
        emit(
            self.events.as_ref(),
            EventType::AuctionCompleted,
            serde_json::json!({
                "auction_id": outcome.auction.auction_id,
                "load_id": outcome.auction.load_id,
                "winning_bid_id": outcome.auction.winning_bid_id,
                "final_price": outcome.winning_bid.as_ref().map(|b| b.amount),
            }),
        )
        .await;
        Ok(outcome)
    }

    /// Cancel from any non-terminal state. Repeating a cancellation
    /// returns the stored auction without publishing again.
    pub async fn cancel_auction(&self, id: &str, reason: &str) -> LanewiseResult<LoadAuction> {
        let (auction, newly_cancelled) =
            self.auctions.cancel_auction(id, reason, Utc::now()).await?;
        if !newly_cancelled {
            debug!(auction_id = id, "Auction already cancelled; nothing to do");
            return Ok(auction);
        }
        info!(
            auction_id = %auction.auction_id,
            load_id = %auction.load_id,
            reason,
            "Auction cancelled"
        );
        emit(
            self.events.as_ref(),
            EventType::AuctionCancelled,
            serde_json::json!({
                "auction_id": auction.auction_id,
                "load_id": auction.load_id,
                "reason": reason,
            }),
        )
        .await;
        Ok(auction)
    }

    /// End every ACTIVE auction whose bidding window has elapsed. The
    /// scheduler runs this each intelligence cycle.
    pub async fn end_elapsed(&self) -> LanewiseResult<Vec<AuctionOutcome>> {
        let now = Utc::now();
        let elapsed: Vec<String> = self
            .auctions
            .auctions_by_status(Some(AuctionStatus::Active))
            .await?
            .into_iter()
            .filter(|a| a.window_elapsed(now))
            .map(|a| a.auction_id)
            .collect();

        let mut outcomes = Vec::with_capacity(elapsed.len());
        for id in elapsed {
            outcomes.push(self.end_auction(&id).await?);
        }
        if !outcomes.is_empty() {
            info!(count = outcomes.len(), "Elapsed auctions closed");
        }
        Ok(outcomes)
    }
}
