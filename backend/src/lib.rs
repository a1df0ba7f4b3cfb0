//! # Fleet Utilization Backend
//!
//! Utilization counter engine for an aviation fleet-maintenance back office.
//!
//! Each aircraft reports one snapshot of its cumulative counters per calendar
//! day (airframe hours/cycles, per-engine hours/cycles, APU hours/cycles). This
//! crate stores those snapshots, rejects submissions that would make any counter
//! go backwards, and derives day-over-day deltas and per-period utilization
//! summaries from the stored history. A REST API is exposed via Axum.
//!
//! ## Architecture
//!
//! - [`api`]: Identifier types and the public type surface
//! - [`models`]: Snapshot, counter and period domain types
//! - [`services`]: Pure computations (monotonicity validation, deltas, aggregation)
//! - [`db`]: Repository pattern, storage backends and the orchestrating service layer
//! - [`http`]: Axum-based HTTP server and request handlers
//!
//! ## Data Flow
//!
//! ```text
//! request ─► duplicate check ─► predecessor/successor lookup ─► validator ─► store
//!                                                                              │
//! read    ◄──────────────── delta calculator / period aggregator ◄─────────────┘
//! ```

// Allow large error types - RepositoryError contains rich context for debugging
#![allow(clippy::result_large_err)]

pub mod api;

pub mod db;
pub mod models;

pub mod services;

#[cfg(feature = "http-server")]
pub mod http;
