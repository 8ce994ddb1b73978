//! LANEWISE — Freight Market Intelligence Engine
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod geo;
pub mod providers;
pub mod stores;
pub mod rate;
pub mod forecast;
pub mod hotspot;
pub mod auction;
pub mod dashboard;
