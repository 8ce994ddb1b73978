//! Full auction lifecycle scenarios: creation through bidding to
//! winner selection, with the scripted profile service driving the
//! weighted scores.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};

    use lanewise::auction::{AuctionConfig, AuctionEngine, CreateAuctionParams, PlaceBidParams};
    use lanewise::providers::events::EventType;
    use lanewise::stores::memory::MemoryAuctionStore;
    use lanewise::stores::AuctionStore;
    use lanewise::types::{
        AuctionStatus, AuctionType, BidStatus, BidderType, LanewiseError,
    };

    use crate::fakes::{RecordingSink, ScriptedScoring};

    fn make_engine(
        scoring: &Arc<ScriptedScoring>,
        sink: &Arc<RecordingSink>,
    ) -> (AuctionEngine, Arc<MemoryAuctionStore>) {
        let store = Arc::new(MemoryAuctionStore::new());
        let engine = AuctionEngine::new(
            AuctionConfig::default(),
            store.clone(),
            scoring.clone(),
            sink.clone(),
        );
        (engine, store)
    }

    /// An auction whose bidding window opened five minutes ago.
    fn open_params(load_id: &str) -> CreateAuctionParams {
        let now = Utc::now();
        CreateAuctionParams {
            load_id: load_id.to_string(),
            auction_type: AuctionType::Standard,
            starting_price: 1000.0,
            reserve_price: None,
            min_bid_increment: 10.0,
            start_time: now - Duration::minutes(5),
            end_time: Some(now + Duration::minutes(55)),
            network_efficiency_weight: Some(0.4),
            price_weight: Some(0.3),
            driver_score_weight: Some(0.3),
        }
    }

    fn bid(auction_id: &str, bidder_id: &str, amount: f64) -> PlaceBidParams {
        PlaceBidParams {
            auction_id: auction_id.to_string(),
            bidder_id: bidder_id.to_string(),
            bidder_type: BidderType::Carrier,
            amount,
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_stronger_profile_wins_over_lower_price() {
        let scoring = Arc::new(ScriptedScoring::new());
        let sink = Arc::new(RecordingSink::new());
        scoring.set_scores("carrier-a", 80.0, 70.0, 90.0);
        scoring.set_scores("carrier-b", 60.0, 50.0, 85.0);
        let (engine, store) = make_engine(&scoring, &sink);

        let auction = engine.create_auction(open_params("load-1")).await.unwrap();
        engine.start_auction(&auction.auction_id).await.unwrap();
        let bid_a = engine
            .place_bid(bid(&auction.auction_id, "carrier-a", 1000.0))
            .await
            .unwrap();
        engine
            .place_bid(bid(&auction.auction_id, "carrier-b", 900.0))
            .await
            .unwrap();

        // Standard auctions track the lowest live bid while open.
        let open = store.auction(&auction.auction_id).await.unwrap();
        assert!((open.current_price - 900.0).abs() < 1e-9);

        let outcome = engine.end_auction(&auction.auction_id).await.unwrap();
        assert!(outcome.newly_completed);
        let winner = outcome.winning_bid.expect("expected a winner");
        assert_eq!(winner.bidder_id, "carrier-a");
        assert!((winner.amount - 1000.0).abs() < 1e-9);

        // 0.3*1.0 + 0.4*0.2 + 0.3*0.3 = 0.47 beats 0.3*0.9 + 0.4*0.4 + 0.3*0.5 = 0.58.
        let bids = store.bids_for_auction(&auction.auction_id).await.unwrap();
        for stored in &bids {
            match stored.bidder_id.as_str() {
                "carrier-a" => {
                    assert!((stored.weighted_score - 0.47).abs() < 1e-9);
                    assert_eq!(stored.status, BidStatus::Accepted);
                }
                "carrier-b" => {
                    assert!((stored.weighted_score - 0.58).abs() < 1e-9);
                    assert_eq!(stored.status, BidStatus::Rejected);
                }
                other => panic!("unexpected bidder {other}"),
            }
        }

        let completed = store.auction(&auction.auction_id).await.unwrap();
        assert_eq!(completed.status, AuctionStatus::Completed);
        assert_eq!(completed.winning_bid_id.as_deref(), Some(bid_a.bid_id.as_str()));
        assert!((completed.current_price - 1000.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_duplicate_bidder_rejected_even_after_withdrawal() {
        let scoring = Arc::new(ScriptedScoring::new());
        let sink = Arc::new(RecordingSink::new());
        let (engine, store) = make_engine(&scoring, &sink);

        let auction = engine.create_auction(open_params("load-2")).await.unwrap();
        engine.start_auction(&auction.auction_id).await.unwrap();
        let first = engine
            .place_bid(bid(&auction.auction_id, "carrier-a", 1000.0))
            .await
            .unwrap();

        let err = engine
            .place_bid(bid(&auction.auction_id, "carrier-a", 950.0))
            .await
            .unwrap_err();
        assert!(matches!(err, LanewiseError::DuplicateBid { .. }));

        // Withdrawing does not re-open the slot for the same bidder.
        engine.withdraw_bid(&first.bid_id, "carrier-a").await.unwrap();
        let err = engine
            .place_bid(bid(&auction.auction_id, "carrier-a", 950.0))
            .await
            .unwrap_err();
        assert!(matches!(err, LanewiseError::DuplicateBid { .. }));

        let bids = store.bids_for_auction(&auction.auction_id).await.unwrap();
        assert_eq!(bids.len(), 1);
        assert_eq!(bids[0].status, BidStatus::Withdrawn);
    }

    #[tokio::test]
    async fn test_double_end_completes_and_publishes_once() {
        let scoring = Arc::new(ScriptedScoring::new());
        let sink = Arc::new(RecordingSink::new());
        let (engine, _store) = make_engine(&scoring, &sink);

        let auction = engine.create_auction(open_params("load-3")).await.unwrap();
        engine.start_auction(&auction.auction_id).await.unwrap();
        engine
            .place_bid(bid(&auction.auction_id, "carrier-a", 950.0))
            .await
            .unwrap();

        let first = engine.end_auction(&auction.auction_id).await.unwrap();
        assert!(first.newly_completed);
        let second = engine.end_auction(&auction.auction_id).await.unwrap();
        assert!(!second.newly_completed);
        assert_eq!(
            first.auction.winning_bid_id,
            second.auction.winning_bid_id
        );
        assert_eq!(sink.count(EventType::AuctionCompleted), 1);
    }

    #[tokio::test]
    async fn test_concurrent_enders_settle_on_one_completion() {
        let scoring = Arc::new(ScriptedScoring::new());
        let sink = Arc::new(RecordingSink::new());
        let (engine, _store) = make_engine(&scoring, &sink);

        let auction = engine.create_auction(open_params("load-4")).await.unwrap();
        engine.start_auction(&auction.auction_id).await.unwrap();
        engine
            .place_bid(bid(&auction.auction_id, "carrier-a", 950.0))
            .await
            .unwrap();

        let (left, right) = tokio::join!(
            engine.end_auction(&auction.auction_id),
            engine.end_auction(&auction.auction_id),
        );
        let left = left.unwrap();
        let right = right.unwrap();

        assert!(left.newly_completed ^ right.newly_completed);
        assert_eq!(left.auction.winning_bid_id, right.auction.winning_bid_id);
        assert_eq!(sink.count(EventType::AuctionCompleted), 1);
    }

    #[tokio::test]
    async fn test_reserve_ceiling_yields_no_winner() {
        let scoring = Arc::new(ScriptedScoring::new());
        let sink = Arc::new(RecordingSink::new());
        let (engine, store) = make_engine(&scoring, &sink);

        let mut params = open_params("load-5");
        params.reserve_price = Some(800.0);
        let auction = engine.create_auction(params).await.unwrap();
        engine.start_auction(&auction.auction_id).await.unwrap();
        engine
            .place_bid(bid(&auction.auction_id, "carrier-a", 900.0))
            .await
            .unwrap();
        engine
            .place_bid(bid(&auction.auction_id, "carrier-b", 1000.0))
            .await
            .unwrap();

        let outcome = engine.end_auction(&auction.auction_id).await.unwrap();
        assert!(outcome.newly_completed);
        assert!(outcome.winning_bid.is_none());

        let completed = store.auction(&auction.auction_id).await.unwrap();
        assert_eq!(completed.status, AuctionStatus::Completed);
        assert!(completed.winning_bid_id.is_none());
        let bids = store.bids_for_auction(&auction.auction_id).await.unwrap();
        assert!(bids.iter().all(|b| b.status == BidStatus::Rejected));
    }

    #[tokio::test]
    async fn test_reserve_ceiling_redirects_to_compliant_bid() {
        let scoring = Arc::new(ScriptedScoring::new());
        let sink = Arc::new(RecordingSink::new());
        scoring.set_scores("carrier-a", 80.0, 70.0, 90.0);
        scoring.set_scores("carrier-b", 60.0, 50.0, 85.0);
        let (engine, _store) = make_engine(&scoring, &sink);

        // carrier-a would win on score, but its amount breaches the
        // $950 ceiling.
        let mut params = open_params("load-6");
        params.reserve_price = Some(950.0);
        let auction = engine.create_auction(params).await.unwrap();
        engine.start_auction(&auction.auction_id).await.unwrap();
        engine
            .place_bid(bid(&auction.auction_id, "carrier-a", 1000.0))
            .await
            .unwrap();
        engine
            .place_bid(bid(&auction.auction_id, "carrier-b", 900.0))
            .await
            .unwrap();

        let outcome = engine.end_auction(&auction.auction_id).await.unwrap();
        let winner = outcome.winning_bid.expect("expected a winner");
        assert_eq!(winner.bidder_id, "carrier-b");
        assert!((winner.amount - 900.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_scoring_outage_blocks_bid() {
        let scoring = Arc::new(ScriptedScoring::new());
        let sink = Arc::new(RecordingSink::new());
        let (engine, store) = make_engine(&scoring, &sink);

        let auction = engine.create_auction(open_params("load-7")).await.unwrap();
        engine.start_auction(&auction.auction_id).await.unwrap();

        scoring.set_error("profile service down");
        let err = engine
            .place_bid(bid(&auction.auction_id, "carrier-a", 950.0))
            .await
            .unwrap_err();
        assert!(matches!(err, LanewiseError::ExternalService { .. }));

        assert!(store.bids_for_auction(&auction.auction_id).await.unwrap().is_empty());
        assert_eq!(sink.count(EventType::BidPlaced), 0);
    }

    #[tokio::test]
    async fn test_cancel_expires_bids_and_repeats_quietly() {
        let scoring = Arc::new(ScriptedScoring::new());
        let sink = Arc::new(RecordingSink::new());
        let (engine, store) = make_engine(&scoring, &sink);

        let auction = engine.create_auction(open_params("load-8")).await.unwrap();
        engine.start_auction(&auction.auction_id).await.unwrap();
        engine
            .place_bid(bid(&auction.auction_id, "carrier-a", 950.0))
            .await
            .unwrap();
        engine
            .place_bid(bid(&auction.auction_id, "carrier-b", 900.0))
            .await
            .unwrap();

        let cancelled = engine
            .cancel_auction(&auction.auction_id, "load covered off-platform")
            .await
            .unwrap();
        assert_eq!(cancelled.status, AuctionStatus::Cancelled);
        let bids = store.bids_for_auction(&auction.auction_id).await.unwrap();
        assert!(bids.iter().all(|b| b.status == BidStatus::Expired));
        assert_eq!(sink.count(EventType::AuctionCancelled), 1);

        // Repeating the cancellation neither overwrites the reason nor
        // publishes again.
        let again = engine
            .cancel_auction(&auction.auction_id, "duplicate request")
            .await
            .unwrap();
        assert_eq!(again.cancellation_reason.as_deref(), Some("load covered off-platform"));
        assert_eq!(sink.count(EventType::AuctionCancelled), 1);

        // A cancelled auction can no longer complete.
        let err = engine.end_auction(&auction.auction_id).await.unwrap_err();
        assert!(matches!(err, LanewiseError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_elapsed_sweep_closes_only_elapsed_auctions() {
        let scoring = Arc::new(ScriptedScoring::new());
        let sink = Arc::new(RecordingSink::new());
        let (engine, store) = make_engine(&scoring, &sink);
        let now = Utc::now();

        let mut elapsed = open_params("load-9");
        elapsed.start_time = now - Duration::hours(2);
        elapsed.end_time = Some(now - Duration::hours(1));
        let elapsed = engine.create_auction(elapsed).await.unwrap();
        engine.start_auction(&elapsed.auction_id).await.unwrap();

        let open = engine.create_auction(open_params("load-10")).await.unwrap();
        engine.start_auction(&open.auction_id).await.unwrap();
        engine
            .place_bid(bid(&open.auction_id, "carrier-b", 900.0))
            .await
            .unwrap();

        let outcomes = engine.end_elapsed().await.unwrap();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].auction.auction_id, elapsed.auction_id);
        assert!(outcomes[0].winning_bid.is_none());

        let untouched = store.auction(&open.auction_id).await.unwrap();
        assert_eq!(untouched.status, AuctionStatus::Active);

        // Nothing left to sweep.
        assert!(engine.end_elapsed().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sealed_auction_holds_price_until_close() {
        let scoring = Arc::new(ScriptedScoring::new());
        let sink = Arc::new(RecordingSink::new());
        let (engine, store) = make_engine(&scoring, &sink);

        let mut params = open_params("load-11");
        params.auction_type = AuctionType::Sealed;
        let auction = engine.create_auction(params).await.unwrap();
        engine.start_auction(&auction.auction_id).await.unwrap();
        engine
            .place_bid(bid(&auction.auction_id, "carrier-a", 950.0))
            .await
            .unwrap();
        engine
            .place_bid(bid(&auction.auction_id, "carrier-b", 900.0))
            .await
            .unwrap();

        // Sealed bids never move the visible price while open.
        let open = store.auction(&auction.auction_id).await.unwrap();
        assert!((open.current_price - 1000.0).abs() < 1e-9);

        // Neutral profiles leave price as the deciding term.
        let outcome = engine.end_auction(&auction.auction_id).await.unwrap();
        let winner = outcome.winning_bid.expect("expected a winner");
        assert_eq!(winner.bidder_id, "carrier-b");
        assert!((outcome.auction.current_price - 900.0).abs() < 1e-9);
    }
}
