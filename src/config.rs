//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (API keys) are referenced by env-var name in the config and
//! resolved at runtime via `std::env::var`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub market_data: MarketDataConfig,
    pub rates: RatesConfig,
    pub forecasts: ForecastsConfig,
    pub hotspots: HotspotsConfig,
    pub auctions: AuctionsConfig,
    pub database: DatabaseConfig,
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EngineConfig {
    pub name: String,
    pub cycle_interval_secs: u64,
    /// Region codes swept each cycle (must exist in the region registry)
    pub regions: Vec<String>,
    /// Equipment tokens swept each cycle
    pub equipment: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MarketDataConfig {
    /// Rate-board provider label, for logs only
    pub provider: String,
    pub base_url: String,
    pub api_key_env: String,
    pub timeout_secs: u64,
    /// TTL for cached provider responses
    pub cache_ttl_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RatesConfig {
    /// Base rate used when no market observation exists for a lane
    pub default_base_rate: f64,
    #[serde(default)]
    pub min_adjustment: Option<f64>,
    #[serde(default)]
    pub max_adjustment: Option<f64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ForecastsConfig {
    pub cache_ttl_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HotspotsConfig {
    pub default_radius_miles: f64,
    pub max_bonus: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuctionsConfig {
    pub default_duration_mins: i64,
    pub price_weight: f64,
    pub network_efficiency_weight: f64,
    pub driver_score_weight: f64,
    /// Rescale non-default weights to sum to 1.0 before scoring
    #[serde(default)]
    pub normalize_weights: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// SQLite connection string, e.g. "sqlite://lanewise.db?mode=rwc"
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DashboardConfig {
    pub enabled: bool,
    pub port: u16,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        Ok(config)
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }
}
