//! Dashboard API route handlers.
//!
//! All endpoints are read-only and return JSON. State is shared via
//! `Arc<DashboardState>`: the same store handles the engines write
//! through, plus a cycle log the scheduler appends to.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::error;

use crate::stores::{AuctionStore, HotspotStore, MarketRateStore};
use crate::types::{AuctionStatus, Hotspot, LanewiseError, LoadAuction, MarketRate};

/// Most recent entries served from the listing endpoints.
const LISTING_LIMIT: usize = 100;

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Shared state accessible by all route handlers.
pub struct DashboardState {
    pub engine_name: String,
    pub started_at: DateTime<Utc>,
    pub hotspots: Arc<dyn HotspotStore>,
    pub auctions: Arc<dyn AuctionStore>,
    pub rates: Arc<dyn MarketRateStore>,
    pub cycle_log: RwLock<Vec<CycleLogEntry>>,
}

impl DashboardState {
    pub fn new(
        engine_name: impl Into<String>,
        hotspots: Arc<dyn HotspotStore>,
        auctions: Arc<dyn AuctionStore>,
        rates: Arc<dyn MarketRateStore>,
    ) -> Self {
        Self {
            engine_name: engine_name.into(),
            started_at: Utc::now(),
            hotspots,
            auctions,
            rates,
            cycle_log: RwLock::new(Vec::new()),
        }
    }

    /// Append a cycle summary, keeping the most recent entries only.
    pub async fn record_cycle(&self, entry: CycleLogEntry) {
        let mut log = self.cycle_log.write().await;
        log.push(entry);
        let excess = log.len().saturating_sub(LISTING_LIMIT);
        if excess > 0 {
            log.drain(..excess);
        }
    }
}

pub type AppState = Arc<DashboardState>;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub engine: String,
    pub status: String,
    pub uptime_secs: i64,
    pub cycles_run: u64,
    pub last_cycle_at: Option<String>,
    pub active_hotspots: usize,
    pub active_auctions: usize,
    pub completed_auctions: usize,
}

/// One intelligence cycle's summary, appended by the scheduler.
#[derive(Debug, Clone, Serialize)]
pub struct CycleLogEntry {
    pub cycle_number: u64,
    pub timestamp: String,
    pub lanes_priced: usize,
    pub rate_failures: usize,
    pub forecast_confidence: f64,
    pub hotspots_detected: usize,
    pub hotspots_expired: usize,
    pub auctions_closed: usize,
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

fn query_failed(e: LanewiseError) -> StatusCode {
    error!(error = %e, "Dashboard query failed");
    StatusCode::INTERNAL_SERVER_ERROR
}

/// GET /api/status
pub async fn get_status(
    State(state): State<AppState>,
) -> Result<Json<StatusResponse>, StatusCode> {
    let now = Utc::now();
    let hotspots = state
        .hotspots
        .active_hotspots(now)
        .await
        .map_err(query_failed)?;
    let auctions = state
        .auctions
        .auctions_by_status(None)
        .await
        .map_err(query_failed)?;
    let active_auctions = auctions
        .iter()
        .filter(|a| a.status == AuctionStatus::Active)
        .count();
    let completed_auctions = auctions
        .iter()
        .filter(|a| a.status == AuctionStatus::Completed)
        .count();

    let log = state.cycle_log.read().await;
    Ok(Json(StatusResponse {
        engine: state.engine_name.clone(),
        status: "running".to_string(),
        uptime_secs: (now - state.started_at).num_seconds(),
        cycles_run: log.last().map(|e| e.cycle_number).unwrap_or(0),
        last_cycle_at: log.last().map(|e| e.timestamp.clone()),
        active_hotspots: hotspots.len(),
        active_auctions,
        completed_auctions,
    }))
}

/// GET /api/hotspots
pub async fn get_hotspots(
    State(state): State<AppState>,
) -> Result<Json<Vec<Hotspot>>, StatusCode> {
    let hotspots = state
        .hotspots
        .active_hotspots(Utc::now())
        .await
        .map_err(query_failed)?;
    Ok(Json(hotspots))
}

/// GET /api/auctions
pub async fn get_auctions(
    State(state): State<AppState>,
) -> Result<Json<Vec<LoadAuction>>, StatusCode> {
    let mut auctions = state
        .auctions
        .auctions_by_status(None)
        .await
        .map_err(query_failed)?;
    auctions.truncate(LISTING_LIMIT);
    Ok(Json(auctions))
}

/// GET /api/rates/recent
pub async fn get_recent_rates(
    State(state): State<AppState>,
) -> Result<Json<Vec<MarketRate>>, StatusCode> {
    let rates = state
        .rates
        .recent_rates(LISTING_LIMIT as u32)
        .await
        .map_err(query_failed)?;
    Ok(Json(rates))
}

/// GET /api/cycles
pub async fn get_cycles(State(state): State<AppState>) -> Json<Vec<CycleLogEntry>> {
    let log = state.cycle_log.read().await;
    Json(log.clone())
}

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
