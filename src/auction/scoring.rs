//! Lower-is-better bid scoring and winner selection.
//!
//! The composite score inverts the efficiency and network terms so a
//! stronger bidder profile pulls the score down alongside a lower
//! price. Anything that ranks bids for display must flip the sign
//! convention before showing it to a driver.

use std::cmp::Ordering;

use crate::stores::WinnerChoice;
use crate::types::{AuctionBid, LoadAuction};

// ---------------------------------------------------------------------------
// Weights
// ---------------------------------------------------------------------------

/// Winner-selection weights in score-term order: price, network
/// efficiency, driver. With `normalize` set and a positive weight sum,
/// each weight is divided by the sum so scores stay comparable across
/// auctions carrying different weight sets.
pub fn effective_weights(auction: &LoadAuction, normalize: bool) -> (f64, f64, f64) {
    let (price, network, driver) = (
        auction.price_weight,
        auction.network_efficiency_weight,
        auction.driver_score_weight,
    );
    if !normalize {
        return (price, network, driver);
    }
    let sum = price + network + driver;
    if sum <= 0.0 {
        return (price, network, driver);
    }
    (price / sum, network / sum, driver / sum)
}

// ---------------------------------------------------------------------------
// Composite score
// ---------------------------------------------------------------------------

/// Composite bid score; lower wins.
///
/// `price_w · amount/starting_price`
/// `+ network_w · (1 − efficiency_score/100)`
/// `+ driver_w · (1 − network_contribution_score/100)`
///
/// A non-positive starting price leaves the price term at the neutral
/// 1.0 instead of dividing by it.
pub fn weighted_score(auction: &LoadAuction, bid: &AuctionBid, normalize: bool) -> f64 {
    let (price_w, network_w, driver_w) = effective_weights(auction, normalize);
    let norm_bid = if auction.starting_price > 0.0 {
        bid.amount / auction.starting_price
    } else {
        1.0
    };
    let norm_eff = bid.efficiency_score / 100.0;
    let norm_net = bid.network_contribution_score / 100.0;
    price_w * norm_bid + network_w * (1.0 - norm_eff) + driver_w * (1.0 - norm_net)
}

// ---------------------------------------------------------------------------
// Winner selection
// ---------------------------------------------------------------------------

/// Winner selection over a completing auction's bids. Recomputes every
/// bid's `weighted_score` from its stored component scores, then takes
/// the lowest-scoring live bid at or under the reserve ceiling, ties
/// broken by earliest submission. `None` when no live bid is eligible.
///
/// Runs inside the store's completion transaction as a `WinnerFn`, so
/// the in-place score rewrites land with the status changes.
pub fn select_winner(
    auction: &LoadAuction,
    bids: &mut [AuctionBid],
    normalize: bool,
) -> Option<WinnerChoice> {
    for bid in bids.iter_mut() {
        bid.weighted_score = weighted_score(auction, bid, normalize);
    }
    bids.iter()
        .filter(|b| b.is_live())
        .filter(|b| auction.reserve_price.map_or(true, |ceiling| b.amount <= ceiling))
        .min_by(|a, b| {
            a.weighted_score
                .partial_cmp(&b.weighted_score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.submitted_at.cmp(&b.submitted_at))
        })
        .map(|winner| WinnerChoice {
            bid_id: winner.bid_id.clone(),
            final_price: winner.amount,
        })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
