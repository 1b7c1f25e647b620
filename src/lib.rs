//! Tracks how much you write throughout the day. A background daemon watches
//! a documents directory, turns filesystem changes into per-document word
//! deltas bucketed into 5-minute windows, and a cli answers questions about
//! the accumulated history: sums, streaks, heatmaps, corpus totals.
//!

pub mod cli;
pub mod engine;
pub mod filter;
pub mod query;
pub mod storage;
pub mod utils;
