//! LANEWISE — Freight Market Intelligence Engine
//!
//! Entry point. Loads configuration, initialises structured logging,
//! wires stores, providers, and the four engines, and runs the
//! scheduled intelligence cycle with graceful shutdown.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use lanewise::auction::{AuctionConfig, AuctionEngine};
use lanewise::config::AppConfig;
use lanewise::dashboard;
use lanewise::dashboard::routes::{CycleLogEntry, DashboardState};
use lanewise::forecast::{ForecastConfig, ForecastEngine, SeasonalPredictor};
use lanewise::geo;
use lanewise::hotspot::{HotspotConfig, HotspotEngine};
use lanewise::providers::events::{EventSink, LogEventSink};
use lanewise::providers::http::RateBoardClient;
use lanewise::providers::{
    BidderScoring, DemandPredictor, ExternalMarketData, NeutralBidderScoring,
};
use lanewise::rate::{RateConfig, RateEngine, RateOptions};
use lanewise::stores::memory::{
    MemoryAuctionStore, MemoryDemandHistoryStore, MemoryHotspotStore, MemoryRateStore,
};
use lanewise::stores::sqlite::SqliteRateStore;
use lanewise::stores::{AuctionStore, DemandHistoryStore, HotspotStore, MarketRateStore};
use lanewise::types::{ConfidenceLevel, EquipmentType, ForecastTimeframe};

const BANNER: &str = r#"
 _        _    _   _ _______        _____ ____  _____
| |      / \  | \ | | ____\ \      / /_ _/ ___|| ____|
| |     / _ \ |  \| |  _|  \ \ /\ / / | |\___ \|  _|
| |___ / ___ \| |\  | |___  \ V  V /  | | ___) | |___
|_____/_/   \_\_| \_|_____|  \_/\_/  |___|____/|_____|

  Lane-level market intelligence for the freight marketplace
  v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    // Load configuration from TOML
    let cfg = AppConfig::load("config.toml")?;

    // Initialise structured logging
    init_logging();

    // Print startup banner
    println!("{BANNER}");
    info!(
        engine_name = %cfg.engine.name,
        cycle_interval_secs = cfg.engine.cycle_interval_secs,
        regions = cfg.engine.regions.len(),
        provider = %cfg.market_data.provider,
        "LANEWISE starting up"
    );

    let equipment: Vec<EquipmentType> = cfg
        .engine
        .equipment
        .iter()
        .map(|token| token.parse())
        .collect::<Result<_>>()
        .context("Invalid equipment token in [engine] equipment")?;
    for region in &cfg.engine.regions {
        if geo::region_center(region).is_none() {
            warn!(region = %region, "Region is not in the registry; lane distances will be unavailable");
        }
    }

    // -- Stores ------------------------------------------------------------

    let rate_store: Arc<dyn MarketRateStore> = if cfg.database.url.trim().is_empty() {
        info!("No database configured; rate history kept in memory");
        Arc::new(MemoryRateStore::new())
    } else {
        info!(url = %cfg.database.url, "Opening rate history database");
        Arc::new(SqliteRateStore::new(&cfg.database.url).await?)
    };
    let hotspot_store: Arc<dyn HotspotStore> = Arc::new(MemoryHotspotStore::new());
    let auction_store: Arc<dyn AuctionStore> = Arc::new(MemoryAuctionStore::new());
    let demand_history: Arc<dyn DemandHistoryStore> = Arc::new(MemoryDemandHistoryStore::new());

    // -- Providers ---------------------------------------------------------

    let events: Arc<dyn EventSink> = Arc::new(LogEventSink);
    let market_data: Arc<dyn ExternalMarketData> = Arc::new(RateBoardClient::new(&cfg.market_data)?);
    let predictor: Arc<dyn DemandPredictor> = Arc::new(SeasonalPredictor::new(
        market_data.clone(),
        demand_history.clone(),
    ));
    let scoring: Arc<dyn BidderScoring> = Arc::new(NeutralBidderScoring);

    // -- Engines -----------------------------------------------------------

    let rate_defaults = RateConfig::default();
    let rate_engine = RateEngine::new(
        RateConfig {
            default_base_rate: cfg.rates.default_base_rate,
            min_adjustment: cfg.rates.min_adjustment.unwrap_or(rate_defaults.min_adjustment),
            max_adjustment: cfg.rates.max_adjustment.unwrap_or(rate_defaults.max_adjustment),
            ..rate_defaults
        },
        rate_store.clone(),
        market_data.clone(),
        events.clone(),
    );
    let forecast_engine = ForecastEngine::new(
        ForecastConfig {
            cache_ttl_secs: cfg.forecasts.cache_ttl_secs,
            ..ForecastConfig::default()
        },
        predictor,
        demand_history.clone(),
        events.clone(),
    );
    let hotspot_engine = HotspotEngine::new(
        HotspotConfig {
            default_radius_miles: cfg.hotspots.default_radius_miles,
            max_bonus: cfg.hotspots.max_bonus,
            ..HotspotConfig::default()
        },
        hotspot_store.clone(),
        rate_store.clone(),
        market_data.clone(),
        events.clone(),
    );
    let auction_engine = AuctionEngine::new(
        AuctionConfig {
            default_duration_mins: cfg.auctions.default_duration_mins,
            network_efficiency_weight: cfg.auctions.network_efficiency_weight,
            price_weight: cfg.auctions.price_weight,
            driver_score_weight: cfg.auctions.driver_score_weight,
            normalize_weights: cfg.auctions.normalize_weights,
        },
        auction_store.clone(),
        scoring,
        events.clone(),
    );

    // -- Dashboard ---------------------------------------------------------

    let dashboard_state = Arc::new(DashboardState::new(
        cfg.engine.name.clone(),
        hotspot_store.clone(),
        auction_store.clone(),
        rate_store.clone(),
    ));
    if cfg.dashboard.enabled {
        dashboard::spawn_dashboard(dashboard_state.clone(), cfg.dashboard.port);
    }

    // -- Main loop ---------------------------------------------------------

    let mut interval = tokio::time::interval(Duration::from_secs(cfg.engine.cycle_interval_secs));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(
        interval_secs = cfg.engine.cycle_interval_secs,
        "Entering intelligence loop. Press Ctrl+C to stop."
    );

    let mut cycle_number: u64 = 0;
    loop {
        tokio::select! {
            _ = interval.tick() => {
                cycle_number += 1;
                match run_cycle(
                    cycle_number, &cfg, &equipment,
                    &rate_engine, &forecast_engine, &hotspot_engine, &auction_engine,
                ).await {
                    Ok(report) => {
                        log_cycle_report(&report);
                        dashboard_state.record_cycle(CycleLogEntry {
                            cycle_number: report.cycle_number,
                            timestamp: report.timestamp.to_rfc3339(),
                            lanes_priced: report.lanes_priced,
                            rate_failures: report.rate_failures,
                            forecast_confidence: report.forecast_confidence,
                            hotspots_detected: report.hotspots_detected,
                            hotspots_expired: report.hotspots_expired,
                            auctions_closed: report.auctions_closed,
                        }).await;
                    }
                    Err(e) => {
                        error!(cycle = cycle_number, error = %e, "Cycle failed; continuing to next");
                    }
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received.");
                break;
            }
        }
    }

    info!(cycles = cycle_number, "LANEWISE shut down cleanly.");
    Ok(())
}

// ---------------------------------------------------------------------------
// Cycle
// ---------------------------------------------------------------------------

/// Summary of one price→forecast→detect→sweep cycle.
struct CycleReport {
    cycle_number: u64,
    lanes_priced: usize,
    rate_failures: usize,
    forecast_confidence: f64,
    forecast_level: ConfidenceLevel,
    hotspots_detected: usize,
    hotspots_expired: usize,
    auctions_closed: usize,
    timestamp: DateTime<Utc>,
}

/// Run a single intelligence cycle over the configured sweep set.
async fn run_cycle(
    cycle_number: u64,
    cfg: &AppConfig,
    equipment: &[EquipmentType],
    rates: &RateEngine,
    forecasts: &ForecastEngine,
    hotspots: &HotspotEngine,
    auctions: &AuctionEngine,
) -> Result<CycleReport> {
    info!(cycle = cycle_number, "Starting intelligence cycle");

    // 1. Refresh lane pricing, keeping the rate history warm.
    let mut lanes_priced = 0usize;
    let mut rate_failures = 0usize;
    for origin in &cfg.engine.regions {
        for destination in &cfg.engine.regions {
            if origin == destination {
                continue;
            }
            for &equip in equipment {
                match rates
                    .calculate_rate(origin, destination, equip, &RateOptions::default())
                    .await
                {
                    Ok(_) => lanes_priced += 1,
                    Err(e) => {
                        warn!(
                            origin = %origin,
                            destination = %destination,
                            equipment = %equip,
                            error = %e,
                            "Lane pricing failed"
                        );
                        rate_failures += 1;
                    }
                }
            }
        }
    }

    // 2. Demand forecast over the sweep set.
    let forecast = forecasts
        .generate_forecast(ForecastTimeframe::Hours48, &cfg.engine.regions, equipment)
        .await?;

    // 3. Hotspot detection from the fresh forecast.
    let detected = hotspots.detect_hotspots(&forecast).await?;

    // 4. Expiry and auction-close sweeps.
    let expired = hotspots.deactivate_expired().await?;
    let closed = auctions.end_elapsed().await?;

    Ok(CycleReport {
        cycle_number,
        lanes_priced,
        rate_failures,
        forecast_confidence: forecast.confidence_score,
        forecast_level: forecast.confidence,
        hotspots_detected: detected.len(),
        hotspots_expired: expired,
        auctions_closed: closed.len(),
        timestamp: Utc::now(),
    })
}

/// Log a human-readable cycle summary.
fn log_cycle_report(report: &CycleReport) {
    info!(
        cycle = report.cycle_number,
        lanes = report.lanes_priced,
        failures = report.rate_failures,
        forecast_confidence = format!("{:.2}", report.forecast_confidence),
        forecast_level = ?report.forecast_level,
        hotspots = report.hotspots_detected,
        expired = report.hotspots_expired,
        auctions_closed = report.auctions_closed,
        "Cycle complete"
    );
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("lanewise=info"));

    let json_logging = std::env::var("LANEWISE_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
