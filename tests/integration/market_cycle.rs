//! End-to-end market intelligence scenarios: lane pricing against the
//! rate board, forecast caching, and hotspot detection over the
//! in-memory stores.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{DateTime, Duration, Utc};
    use uuid::Uuid;

    use lanewise::forecast::{ForecastConfig, ForecastEngine};
    use lanewise::geo::GeoPoint;
    use lanewise::hotspot::{HotspotConfig, HotspotEngine};
    use lanewise::providers::events::EventType;
    use lanewise::rate::{RateConfig, RateEngine, RateOptions};
    use lanewise::stores::memory::{MemoryDemandHistoryStore, MemoryHotspotStore, MemoryRateStore};
    use lanewise::stores::{HotspotStore, MarketRateStore};
    use lanewise::types::{
        EquipmentType, ForecastTimeframe, Hotspot, HotspotSeverity, HotspotType, MarketRate,
    };

    use crate::fakes::{FakeRateBoard, RecordingSink, StaticPredictor};

    fn make_rate_engine(
        board: &Arc<FakeRateBoard>,
        store: &Arc<MemoryRateStore>,
        sink: &Arc<RecordingSink>,
    ) -> RateEngine {
        RateEngine::new(RateConfig::default(), store.clone(), board.clone(), sink.clone())
    }

    fn make_forecast_engine(
        config: ForecastConfig,
        predictor: &Arc<StaticPredictor>,
        sink: &Arc<RecordingSink>,
    ) -> ForecastEngine {
        ForecastEngine::new(
            config,
            predictor.clone(),
            Arc::new(MemoryDemandHistoryStore::new()),
            sink.clone(),
        )
    }

    fn regions(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn make_rate(origin: &str, dest: &str, avg: f64, at: DateTime<Utc>) -> MarketRate {
        MarketRate {
            rate_id: Uuid::new_v4().to_string(),
            origin_region: origin.to_string(),
            destination_region: dest.to_string(),
            equipment_type: EquipmentType::DryVan,
            average_rate: avg,
            min_rate: avg * 0.9,
            max_rate: avg * 1.1,
            sample_size: 25,
            recorded_at: at,
        }
    }

    // -- Lane pricing -------------------------------------------------------

    #[tokio::test]
    async fn test_board_rate_persisted_then_reused() {
        let board = Arc::new(FakeRateBoard::new());
        let store = Arc::new(MemoryRateStore::new());
        let sink = Arc::new(RecordingSink::new());
        board.set_lane_rate("chicago", "dallas", EquipmentType::DryVan, 1200.0, 30);

        let engine = make_rate_engine(&board, &store, &sink);
        let first = engine
            .calculate_rate("chicago", "dallas", EquipmentType::DryVan, &RateOptions::default())
            .await
            .unwrap();

        assert!((first.base_rate - 1200.0).abs() < 1e-9);
        assert!(!first.used_default_base);
        assert_eq!(store.recent_rates(10).await.unwrap().len(), 1);
        assert_eq!(sink.count(EventType::RateUpdated), 1);

        // Second calculation resolves the base from storage; nothing new
        // is persisted or published.
        let second = engine
            .calculate_rate("chicago", "dallas", EquipmentType::DryVan, &RateOptions::default())
            .await
            .unwrap();
        assert!((second.base_rate - 1200.0).abs() < 1e-9);
        assert_eq!(store.recent_rates(10).await.unwrap().len(), 1);
        assert_eq!(sink.count(EventType::RateUpdated), 1);
    }

    #[tokio::test]
    async fn test_tight_urgent_market_prices_above_base_within_band() {
        let board = Arc::new(FakeRateBoard::new());
        let store = Arc::new(MemoryRateStore::new());
        let sink = Arc::new(RecordingSink::new());
        board.set_lane_rate("chicago", "dallas", EquipmentType::DryVan, 1000.0, 40);
        board.set_lane_ratio("chicago", "dallas", EquipmentType::DryVan, 0.5, 0.9);

        let engine = make_rate_engine(&board, &store, &sink);
        let options = RateOptions {
            pickup_window_hours: Some(2.0),
            ..RateOptions::default()
        };
        let calc = engine
            .calculate_rate("chicago", "dallas", EquipmentType::DryVan, &options)
            .await
            .unwrap();

        assert!(calc.total_rate > calc.base_rate);
        assert!(calc.adjustment_factor >= -0.15 && calc.adjustment_factor <= 0.30);
        // Roughly $1030 over ~800 miles sits under the per-mile floor.
        assert!((calc.mileage_rate - 2.0).abs() < 1e-9);

        // The same lane with a backhaul opportunity prices lower.
        let backhaul = engine
            .calculate_rate(
                "chicago",
                "dallas",
                EquipmentType::DryVan,
                &RateOptions {
                    pickup_window_hours: Some(2.0),
                    backhaul_opportunity: true,
                    ..RateOptions::default()
                },
            )
            .await
            .unwrap();
        assert!(backhaul.total_rate < calc.total_rate);
    }

    #[tokio::test]
    async fn test_loose_market_discounts_no_further_than_floor() {
        let board = Arc::new(FakeRateBoard::new());
        let store = Arc::new(MemoryRateStore::new());
        let sink = Arc::new(RecordingSink::new());
        board.set_lane_rate("atlanta", "memphis", EquipmentType::Flatbed, 900.0, 25);
        board.set_lane_ratio("atlanta", "memphis", EquipmentType::Flatbed, 5.0, 0.9);

        let engine = make_rate_engine(&board, &store, &sink);
        let calc = engine
            .calculate_rate("atlanta", "memphis", EquipmentType::Flatbed, &RateOptions::default())
            .await
            .unwrap();

        assert!(calc.total_rate < calc.base_rate);
        assert!(calc.total_rate >= calc.base_rate * 0.85);
        assert!(calc.adjustment_factor >= -0.15);
    }

    #[tokio::test]
    async fn test_provider_outage_degrades_to_default_base() {
        let board = Arc::new(FakeRateBoard::new());
        let store = Arc::new(MemoryRateStore::new());
        let sink = Arc::new(RecordingSink::new());
        board.set_error("board unreachable");

        let engine = make_rate_engine(&board, &store, &sink);
        let calc = engine
            .calculate_rate("chicago", "newark", EquipmentType::DryVan, &RateOptions::default())
            .await
            .unwrap();

        assert!(calc.used_default_base);
        assert!((calc.base_rate - 1000.0).abs() < 1e-9);
        assert!(calc.confidence < 0.5);
        assert_eq!(sink.count(EventType::RateUpdated), 0);
    }

    // -- Forecast caching ---------------------------------------------------

    #[tokio::test]
    async fn test_forecast_served_from_cache_until_invalidated() {
        let predictor = Arc::new(StaticPredictor::new());
        let sink = Arc::new(RecordingSink::new());
        let engine = make_forecast_engine(ForecastConfig::default(), &predictor, &sink);
        let sweep = regions(&["chicago", "dallas"]);
        let equipment = [EquipmentType::DryVan];

        let first = engine
            .generate_forecast(ForecastTimeframe::Hours48, &sweep, &equipment)
            .await
            .unwrap();
        let cached = engine
            .generate_forecast(ForecastTimeframe::Hours48, &sweep, &equipment)
            .await
            .unwrap();
        assert_eq!(first.forecast_id, cached.forecast_id);
        assert_eq!(sink.count(EventType::ForecastGenerated), 1);

        engine.invalidate(ForecastTimeframe::Hours48, &sweep, &equipment);
        let regenerated = engine
            .generate_forecast(ForecastTimeframe::Hours48, &sweep, &equipment)
            .await
            .unwrap();
        assert_ne!(first.forecast_id, regenerated.forecast_id);
        assert_eq!(sink.count(EventType::ForecastGenerated), 2);
    }

    #[tokio::test]
    async fn test_expired_cached_forecast_regenerated_not_served() {
        let predictor = Arc::new(StaticPredictor::new());
        let sink = Arc::new(RecordingSink::new());
        // Zero validity: every cached document is already expired when
        // the next request validates it.
        let config = ForecastConfig {
            validity_hours: 0,
            ..ForecastConfig::default()
        };
        let engine = make_forecast_engine(config, &predictor, &sink);
        let sweep = regions(&["memphis"]);
        let equipment = [EquipmentType::Reefer];

        let first = engine
            .generate_forecast(ForecastTimeframe::Hours24, &sweep, &equipment)
            .await
            .unwrap();
        let second = engine
            .generate_forecast(ForecastTimeframe::Hours24, &sweep, &equipment)
            .await
            .unwrap();
        assert_ne!(first.forecast_id, second.forecast_id);
        assert_eq!(sink.count(EventType::ForecastGenerated), 2);
    }

    // -- Hotspot detection --------------------------------------------------

    #[tokio::test]
    async fn test_surge_and_shortage_zones_from_hot_region() {
        let board = Arc::new(FakeRateBoard::new());
        let rate_store = Arc::new(MemoryRateStore::new());
        let hotspot_store = Arc::new(MemoryHotspotStore::new());
        let predictor = Arc::new(StaticPredictor::new());
        let sink = Arc::new(RecordingSink::new());

        // Chicago dry van is running very hot on thin capacity; Dallas
        // stays balanced.
        predictor.set_region_signal("chicago", EquipmentType::DryVan, 0.95, 40, 0.9);
        board.set_region_ratio("chicago", EquipmentType::DryVan, 0.5, 0.9);

        let forecasts = make_forecast_engine(ForecastConfig::default(), &predictor, &sink);
        let forecast = forecasts
            .generate_forecast(
                ForecastTimeframe::Hours48,
                &regions(&["chicago", "dallas"]),
                &[EquipmentType::DryVan],
            )
            .await
            .unwrap();

        let engine = HotspotEngine::new(
            HotspotConfig::default(),
            hotspot_store.clone(),
            rate_store.clone(),
            board.clone(),
            sink.clone(),
        );
        let zones = engine.detect_hotspots(&forecast).await.unwrap();

        let surge = zones
            .iter()
            .find(|z| z.hotspot_type == HotspotType::DemandSurge)
            .expect("expected a demand surge zone");
        assert_eq!(surge.region, "chicago");
        assert_eq!(surge.equipment_type, Some(EquipmentType::DryVan));
        assert!(surge.bonus_amount > 0.0 && surge.bonus_amount <= 500.0);

        assert!(zones
            .iter()
            .any(|z| z.hotspot_type == HotspotType::SupplyShortage && z.region == "chicago"));
        assert!(!zones.iter().any(|z| z.region == "dallas"));
        assert_eq!(sink.count(EventType::HotspotCreated), zones.len());

        // ~28 miles north of the Chicago centroid falls inside the
        // default 50-mile radius; Dallas is far outside it.
        let nearby = engine.hotspots_at(GeoPoint::new(42.28, -87.63)).await.unwrap();
        assert!(!nearby.is_empty());
        let far = engine.hotspots_at(GeoPoint::new(32.78, -96.80)).await.unwrap();
        assert!(far.is_empty());
    }

    #[tokio::test]
    async fn test_weather_zone_carries_provider_geometry() {
        let board = Arc::new(FakeRateBoard::new());
        let rate_store = Arc::new(MemoryRateStore::new());
        let hotspot_store = Arc::new(MemoryHotspotStore::new());
        let predictor = Arc::new(StaticPredictor::new());
        let sink = Arc::new(RecordingSink::new());

        board.add_weather("memphis", 120.0, 0.8, "Ice storm across the Mid-South");

        let forecasts = make_forecast_engine(ForecastConfig::default(), &predictor, &sink);
        let forecast = forecasts
            .generate_forecast(
                ForecastTimeframe::Hours48,
                &regions(&["memphis"]),
                &[EquipmentType::DryVan],
            )
            .await
            .unwrap();

        let engine = HotspotEngine::new(
            HotspotConfig::default(),
            hotspot_store,
            rate_store,
            board.clone(),
            sink.clone(),
        );
        let zones = engine.detect_hotspots(&forecast).await.unwrap();

        let weather = zones
            .iter()
            .find(|z| z.hotspot_type == HotspotType::WeatherImpact)
            .expect("expected a weather zone");
        assert_eq!(weather.severity, HotspotSeverity::Critical);
        assert!((weather.radius_miles - 120.0).abs() < 1e-9);
        assert_eq!(weather.region, "memphis");
        assert!(weather.name.contains("Ice storm"));
    }

    #[tokio::test]
    async fn test_repositioning_zone_from_one_way_lane_imbalance() {
        let board = Arc::new(FakeRateBoard::new());
        let rate_store = Arc::new(MemoryRateStore::new());
        let hotspot_store = Arc::new(MemoryHotspotStore::new());
        let predictor = Arc::new(StaticPredictor::new());
        let sink = Arc::new(RecordingSink::new());

        // Freight pours out of Chicago toward Dallas with almost
        // nothing coming back.
        predictor.set_lane_signal("chicago", "dallas", EquipmentType::DryVan, 0.9, 50, 0.9);
        predictor.set_lane_signal("dallas", "chicago", EquipmentType::DryVan, 0.2, 5, 0.9);

        let forecasts = make_forecast_engine(ForecastConfig::default(), &predictor, &sink);
        let forecast = forecasts
            .generate_forecast(
                ForecastTimeframe::Hours48,
                &regions(&["chicago", "dallas"]),
                &[EquipmentType::DryVan],
            )
            .await
            .unwrap();

        let engine = HotspotEngine::new(
            HotspotConfig::default(),
            hotspot_store,
            rate_store,
            board,
            sink,
        );
        let zones = engine.detect_hotspots(&forecast).await.unwrap();

        assert_eq!(zones.len(), 1);
        let zone = &zones[0];
        assert_eq!(zone.hotspot_type, HotspotType::RepositioningNeed);
        assert_eq!(zone.region, "chicago");
        assert_eq!(zone.equipment_type, Some(EquipmentType::DryVan));
        assert!(zone.name.contains("chicago -> dallas"));
    }

    #[tokio::test]
    async fn test_rate_opportunity_from_rising_lane_history() {
        let board = Arc::new(FakeRateBoard::new());
        let rate_store = Arc::new(MemoryRateStore::new());
        let hotspot_store = Arc::new(MemoryHotspotStore::new());
        let predictor = Arc::new(StaticPredictor::new());
        let sink = Arc::new(RecordingSink::new());
        let now = Utc::now();

        // A quiet week near $1000, then a $1400 print today.
        for days_ago in 1..=5i64 {
            rate_store
                .record_rate(make_rate(
                    "chicago",
                    "dallas",
                    1000.0,
                    now - Duration::days(days_ago),
                ))
                .await
                .unwrap();
        }
        rate_store
            .record_rate(make_rate("chicago", "dallas", 1400.0, now))
            .await
            .unwrap();

        let forecasts = make_forecast_engine(ForecastConfig::default(), &predictor, &sink);
        let forecast = forecasts
            .generate_forecast(
                ForecastTimeframe::Hours48,
                &regions(&["chicago"]),
                &[EquipmentType::DryVan],
            )
            .await
            .unwrap();

        let engine = HotspotEngine::new(
            HotspotConfig::default(),
            hotspot_store,
            rate_store,
            board,
            sink.clone(),
        );
        let zones = engine.detect_hotspots(&forecast).await.unwrap();

        // 40% over the trailing average, well past the 15% threshold.
        assert_eq!(zones.len(), 1);
        let zone = &zones[0];
        assert_eq!(zone.hotspot_type, HotspotType::RateOpportunity);
        assert_eq!(zone.severity, HotspotSeverity::Medium);
        assert_eq!(zone.region, "chicago");
        assert!(zone.name.contains("chicago -> dallas"));
        assert!(zone.bonus_amount > 0.0 && zone.bonus_amount <= 500.0);
        assert_eq!(sink.count(EventType::HotspotCreated), 1);
    }

    #[tokio::test]
    async fn test_expired_hotspots_swept_exactly_once() {
        let board = Arc::new(FakeRateBoard::new());
        let rate_store = Arc::new(MemoryRateStore::new());
        let hotspot_store = Arc::new(MemoryHotspotStore::new());
        let sink = Arc::new(RecordingSink::new());
        let now = Utc::now();

        hotspot_store
            .upsert_hotspot(Hotspot {
                hotspot_id: Uuid::new_v4().to_string(),
                name: "Stale surge".to_string(),
                hotspot_type: HotspotType::DemandSurge,
                severity: HotspotSeverity::High,
                center: GeoPoint::new(41.88, -87.63),
                radius_miles: 50.0,
                confidence_score: 0.8,
                bonus_amount: 150.0,
                region: "chicago".to_string(),
                equipment_type: Some(EquipmentType::DryVan),
                detected_at: now - Duration::hours(50),
                valid_from: now - Duration::hours(50),
                valid_until: now - Duration::hours(2),
                active: true,
            })
            .await
            .unwrap();

        let engine = HotspotEngine::new(
            HotspotConfig::default(),
            hotspot_store.clone(),
            rate_store,
            board,
            sink,
        );

        assert_eq!(engine.deactivate_expired().await.unwrap(), 1);
        assert_eq!(engine.deactivate_expired().await.unwrap(), 0);
        assert!(engine.active_hotspots().await.unwrap().is_empty());
    }
}
