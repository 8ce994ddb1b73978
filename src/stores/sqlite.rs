//! SQLite-backed rate history.
//!
//! Rate observations are the one dataset worth keeping across
//! restarts, since trend analysis wants a week of history. Timestamps
//! are stored as fixed-precision RFC 3339 text so lexicographic order
//! matches chronological order.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};

use crate::stores::MarketRateStore;
use crate::types::{EquipmentType, Lane, LanewiseError, LanewiseResult, MarketRate};

#[derive(Clone)]
pub struct SqliteRateStore {
    pool: Pool<Sqlite>,
}

impl SqliteRateStore {
    pub async fn new(database_url: &str) -> LanewiseResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| LanewiseError::Storage(format!("rate db connect failed: {e}")))?
            .create_if_missing(true);

        // A pooled in-memory database is per-connection; keep exactly
        // one so every query sees the same tables.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| LanewiseError::Storage(format!("rate db connect failed: {e}")))?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| LanewiseError::Storage(format!("rate db migration failed: {e}")))?;

        Ok(Self { pool })
    }
}

fn timestamp_text(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(text: &str) -> LanewiseResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| LanewiseError::Storage(format!("bad timestamp {text:?} in rate row: {e}")))
}

fn rate_from_row(row: &SqliteRow) -> LanewiseResult<MarketRate> {
    let equipment_text: String = row.get("equipment_type");
    let equipment_type = EquipmentType::from_str(&equipment_text).map_err(|e| {
        LanewiseError::Storage(format!("bad equipment type in rate row: {e}"))
    })?;
    let recorded_text: String = row.get("recorded_at");
    let sample_size: i64 = row.get("sample_size");

    Ok(MarketRate {
        rate_id: row.get("rate_id"),
        origin_region: row.get("origin_region"),
        destination_region: row.get("destination_region"),
        equipment_type,
        average_rate: row.get("average_rate"),
        min_rate: row.get("min_rate"),
        max_rate: row.get("max_rate"),
        sample_size: sample_size.max(0) as u32,
        recorded_at: parse_timestamp(&recorded_text)?,
    })
}

#[async_trait]
impl MarketRateStore for SqliteRateStore {
    async fn record_rate(&self, rate: MarketRate) -> LanewiseResult<()> {
        sqlx::query(
            r#"
            INSERT INTO market_rates (
                rate_id,
                origin_region,
                destination_region,
                equipment_type,
                average_rate,
                min_rate,
                max_rate,
                sample_size,
                recorded_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&rate.rate_id)
        .bind(rate.origin_region.to_lowercase())
        .bind(rate.destination_region.to_lowercase())
        .bind(rate.equipment_type.as_token())
        .bind(rate.average_rate)
        .bind(rate.min_rate)
        .bind(rate.max_rate)
        .bind(rate.sample_size as i64)
        .bind(timestamp_text(rate.recorded_at))
        .execute(&self.pool)
        .await
        .map_err(|e| LanewiseError::Storage(format!("rate insert failed: {e}")))?;
        Ok(())
    }

    async fn latest_rate(&self, lane: &Lane) -> LanewiseResult<Option<MarketRate>> {
        let row = sqlx::query(
            r#"
            SELECT * FROM market_rates
            WHERE origin_region = ? AND destination_region = ? AND equipment_type = ?
            ORDER BY recorded_at DESC
            LIMIT 1
            "#,
        )
        .bind(&lane.origin)
        .bind(&lane.destination)
        .bind(lane.equipment.as_token())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| LanewiseError::Storage(format!("latest rate query failed: {e}")))?;

        row.map(|r| rate_from_row(&r)).transpose()
    }

    async fn rate_history(
        &self,
        lane: &Lane,
        since: DateTime<Utc>,
    ) -> LanewiseResult<Vec<MarketRate>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM market_rates
            WHERE origin_region = ? AND destination_region = ? AND equipment_type = ?
              AND recorded_at >= ?
            ORDER BY recorded_at ASC
            "#,
        )
        .bind(&lane.origin)
        .bind(&lane.destination)
        .bind(lane.equipment.as_token())
        .bind(timestamp_text(since))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| LanewiseError::Storage(format!("rate history query failed: {e}")))?;

        rows.iter().map(rate_from_row).collect()
    }

    async fn recent_rates(&self, limit: u32) -> LanewiseResult<Vec<MarketRate>> {
        let rows = sqlx::query(
            "SELECT * FROM market_rates ORDER BY recorded_at DESC LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| LanewiseError::Storage(format!("recent rates query failed: {e}")))?;

        rows.iter().map(rate_from_row).collect()
    }

    async fn recent_lanes(&self, since: DateTime<Utc>) -> LanewiseResult<Vec<Lane>> {
        let rows = sqlx::query(
            r#"
            SELECT DISTINCT origin_region, destination_region, equipment_type
            FROM market_rates
            WHERE recorded_at >= ?
            ORDER BY origin_region, destination_region, equipment_type
            "#,
        )
        .bind(timestamp_text(since))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| LanewiseError::Storage(format!("recent lanes query failed: {e}")))?;

        let mut lanes = Vec::with_capacity(rows.len());
        for row in &rows {
            let origin: String = row.get("origin_region");
            let destination: String = row.get("destination_region");
            let equipment_text: String = row.get("equipment_type");
            let equipment = EquipmentType::from_str(&equipment_text).map_err(|e| {
                LanewiseError::Storage(format!("bad equipment type in rate row: {e}"))
            })?;
            lanes.push(Lane::new(&origin, &destination, equipment));
        }
        Ok(lanes)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
