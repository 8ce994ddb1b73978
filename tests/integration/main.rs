//! Integration test harness.
//!
//! Exercises the engines end to end over the in-memory stores, with
//! the deterministic provider fakes in `fakes` standing in for the
//! rate board, the demand model, and the bidder profile service.

mod auction_flow;
mod fakes;
mod market_cycle;
