//! Lifecycle event publication.
//!
//! Every engine emits events (rate updates, hotspot creation, auction
//! lifecycle) through the `EventSink` seam. Publication is best-effort:
//! a sink failure is logged and never fails the operation that
//! triggered it.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

/// Event kinds emitted by the engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    RateUpdated,
    ForecastGenerated,
    HotspotCreated,
    AuctionCreated,
    AuctionStarted,
    BidPlaced,
    BidWithdrawn,
    AuctionCompleted,
    AuctionCancelled,
}

impl EventType {
    /// Dotted topic name used on the wire and in logs.
    pub fn topic(&self) -> &'static str {
        match self {
            EventType::RateUpdated => "rate.updated",
            EventType::ForecastGenerated => "forecast.generated",
            EventType::HotspotCreated => "hotspot.created",
            EventType::AuctionCreated => "auction.created",
            EventType::AuctionStarted => "auction.started",
            EventType::BidPlaced => "auction.bid_placed",
            EventType::BidWithdrawn => "auction.bid_withdrawn",
            EventType::AuctionCompleted => "auction.completed",
            EventType::AuctionCancelled => "auction.cancelled",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.topic())
    }
}

/// A single published event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketEvent {
    pub event_type: EventType,
    pub payload: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
}

impl MarketEvent {
    pub fn new(event_type: EventType, payload: serde_json::Value) -> Self {
        Self {
            event_type,
            payload,
            occurred_at: Utc::now(),
        }
    }
}

/// Abstraction over event transports (log, message bus, webhook).
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, event: &MarketEvent) -> Result<()>;

    /// Sink name for logging and identification.
    fn name(&self) -> &str;
}

/// Publish an event, logging and swallowing any sink failure.
/// Engine operations must never fail because a sink is down.
pub async fn emit(sink: &dyn EventSink, event_type: EventType, payload: serde_json::Value) {
    let event = MarketEvent::new(event_type, payload);
    if let Err(e) = sink.publish(&event).await {
        warn!(
            sink = sink.name(),
            event = %event.event_type,
            error = %e,
            "Event publish failed, continuing"
        );
    }
}

/// Default sink: structured log lines only.
pub struct LogEventSink;

#[async_trait]
impl EventSink for LogEventSink {
    async fn publish(&self, event: &MarketEvent) -> Result<()> {
        info!(
            event = %event.event_type,
            payload = %event.payload,
            occurred_at = %event.occurred_at,
            "event"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}
