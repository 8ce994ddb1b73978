//! HTTP rate-board client.
//!
//! Talks to the external freight market data API (lane rates,
//! supply/demand balance, trends, weather disruptions). Lane rate
//! lookups are cached with the configured TTL since the board updates
//! hourly at best.
//!
//! Auth: `Authorization: Bearer {key}` when an API key is configured;
//! most read endpoints also work anonymously with tighter rate limits.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::cache::TtlCache;
use super::{
    ExternalMarketData, LaneRateObservation, SupplyDemandSnapshot, TrendSnapshot, WeatherImpact,
};
use crate::config::MarketDataConfig;
use crate::geo::GeoPoint;
use crate::types::{EquipmentType, Lane};

// ---------------------------------------------------------------------------
// API response types (board JSON → Rust)
// ---------------------------------------------------------------------------

fn default_confidence() -> f64 {
    0.5
}

/// Lane rate as returned by `/v1/rates/current`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BoardRate {
    average_rate: f64,
    #[serde(default)]
    min_rate: f64,
    #[serde(default)]
    max_rate: f64,
    #[serde(default)]
    sample_size: u32,
    /// RFC 3339 timestamp; absent on some legacy board deployments
    #[serde(default)]
    observed_at: Option<String>,
}

/// Balance snapshot as returned by `/v1/market/balance`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BoardBalance {
    ratio: f64,
    #[serde(default = "default_confidence")]
    confidence: f64,
}

/// Trend as returned by `/v1/rates/trend`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BoardTrend {
    change_pct: f64,
    #[serde(default)]
    strength: f64,
    #[serde(default)]
    sample_count: u32,
}

/// Weather disruption zone as returned by `/v1/weather/impacts`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BoardWeatherImpact {
    region: String,
    lat: f64,
    lon: f64,
    radius_miles: f64,
    severity: f64,
    #[serde(default)]
    description: String,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Rate-board market data client.
pub struct RateBoardClient {
    http: Client,
    base_url: String,
    /// Optional API key for authenticated endpoints.
    api_key: Option<Secret<String>>,
    provider: String,
    rate_cache: TtlCache<LaneRateObservation>,
}

impl RateBoardClient {
    /// Create a new rate-board client from configuration. The API key
    /// env var is optional — anonymous reads still work.
    pub fn new(cfg: &MarketDataConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .user_agent("lanewise/0.1.0 (market-intelligence)")
            .build()
            .context("Failed to build HTTP client for rate board")?;

        let api_key = std::env::var(&cfg.api_key_env).ok().map(Secret::new);

        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key,
            provider: cfg.provider.clone(),
            rate_cache: TtlCache::new(Duration::from_secs(cfg.cache_ttl_secs)),
        })
    }

    // -- Internal helpers ------------------------------------------------

    /// GET a JSON document. Returns None on 404 (no data for the query),
    /// bails on any other non-success status.
    async fn get_json<T: DeserializeOwned>(&self, url: &str, what: &str) -> Result<Option<T>> {
        debug!(url = %url, "Fetching from rate board");

        let mut req = self.http.get(url);
        if let Some(key) = &self.api_key {
            req = req.header("Authorization", format!("Bearer {}", key.expose_secret()));
        }

        let resp = req
            .send()
            .await
            .with_context(|| format!("Rate board request failed: {what}"))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Rate board error {status} on {what}: {body}");
        }

        let parsed: T = resp
            .json()
            .await
            .with_context(|| format!("Failed to parse rate board response: {what}"))?;

        Ok(Some(parsed))
    }

    fn lane_query(lane: &Lane) -> String {
        format!(
            "origin={}&destination={}&equipment={}",
            urlencoding::encode(&lane.origin),
            urlencoding::encode(&lane.destination),
            lane.equipment.as_token(),
        )
    }

    fn cache_key(lane: &Lane) -> String {
        format!("rate:{}:{}:{}", lane.origin, lane.destination, lane.equipment)
    }

    /// Convert a board rate to the engine observation type. Board
    /// deployments occasionally omit min/max; fall back to the average
    /// so downstream spread math stays sane.
    fn to_observation(r: BoardRate) -> LaneRateObservation {
        let min_rate = if r.min_rate > 0.0 { r.min_rate } else { r.average_rate };
        let max_rate = if r.max_rate > 0.0 { r.max_rate } else { r.average_rate };
        let observed_at = r
            .observed_at
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);

        LaneRateObservation {
            average_rate: r.average_rate,
            min_rate,
            max_rate,
            sample_size: r.sample_size,
            observed_at,
        }
    }

    fn to_weather_impact(w: BoardWeatherImpact) -> WeatherImpact {
        WeatherImpact {
            region: w.region.to_lowercase(),
            center: GeoPoint::new(w.lat, w.lon),
            radius_miles: w.radius_miles,
            severity: w.severity.clamp(0.0, 1.0),
            description: w.description,
        }
    }
}

// ---------------------------------------------------------------------------
// ExternalMarketData trait implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl ExternalMarketData for RateBoardClient {
    async fn current_rate(&self, lane: &Lane) -> Result<Option<LaneRateObservation>> {
        let key = Self::cache_key(lane);
        if let Some(hit) = self.rate_cache.get(&key) {
            debug!(lane = %lane, "Rate cache hit");
            return Ok(Some(hit));
        }

        let url = format!("{}/v1/rates/current?{}", self.base_url, Self::lane_query(lane));
        let board: Option<BoardRate> = self.get_json(&url, "current rate").await?;

        match board {
            Some(r) => {
                let obs = Self::to_observation(r);
                self.rate_cache.put(key, obs.clone());
                Ok(Some(obs))
            }
            None => {
                debug!(lane = %lane, "No board rate for lane");
                Ok(None)
            }
        }
    }

    async fn supply_demand_ratio(&self, lane: &Lane) -> Result<SupplyDemandSnapshot> {
        let url = format!("{}/v1/market/balance?{}", self.base_url, Self::lane_query(lane));
        let board: Option<BoardBalance> = self.get_json(&url, "lane balance").await?;

        Ok(match board {
            Some(b) => SupplyDemandSnapshot {
                ratio: b.ratio,
                confidence: b.confidence.clamp(0.0, 1.0),
            },
            // No data: treat as balanced with zero confidence so the
            // rate engine discounts the factor.
            None => SupplyDemandSnapshot { ratio: 1.0, confidence: 0.0 },
        })
    }

    async fn region_supply_demand(
        &self,
        region: &str,
        equipment: EquipmentType,
    ) -> Result<SupplyDemandSnapshot> {
        let url = format!(
            "{}/v1/regions/{}/balance?equipment={}",
            self.base_url,
            urlencoding::encode(&region.to_lowercase()),
            equipment.as_token(),
        );
        let board: Option<BoardBalance> = self.get_json(&url, "region balance").await?;

        Ok(match board {
            Some(b) => SupplyDemandSnapshot {
                ratio: b.ratio,
                confidence: b.confidence.clamp(0.0, 1.0),
            },
            None => SupplyDemandSnapshot { ratio: 1.0, confidence: 0.0 },
        })
    }

    async fn market_trend(&self, lane: &Lane) -> Result<TrendSnapshot> {
        let url = format!("{}/v1/rates/trend?{}", self.base_url, Self::lane_query(lane));
        let board: Option<BoardTrend> = self.get_json(&url, "rate trend").await?;

        Ok(match board {
            Some(t) => TrendSnapshot {
                change_pct: t.change_pct,
                strength: t.strength.clamp(0.0, 1.0),
                sample_count: t.sample_count,
            },
            None => TrendSnapshot { change_pct: 0.0, strength: 0.0, sample_count: 0 },
        })
    }

    async fn weather_impacts(&self) -> Result<Vec<WeatherImpact>> {
        let url = format!("{}/v1/weather/impacts", self.base_url);
        let board: Option<Vec<BoardWeatherImpact>> = self.get_json(&url, "weather impacts").await?;

        let impacts: Vec<WeatherImpact> = board
            .unwrap_or_default()
            .into_iter()
            .map(Self::to_weather_impact)
            .collect();

        if impacts.is_empty() {
            debug!("No active weather impacts reported");
        } else {
            warn!(count = impacts.len(), "Weather disruption zones active");
        }

        Ok(impacts)
    }

    fn name(&self) -> &str {
        &self.provider
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
