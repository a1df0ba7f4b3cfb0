//! Pure utilization logic.
//!
//! Everything here works on snapshots that were already fetched: the
//! monotonicity validator, the delta calculator and the period aggregator.
//! Repository orchestration lives in [`crate::db::services`].

pub mod aggregation;
pub mod delta;
pub mod monotonic;

pub use aggregation::{aggregate, CounterOverflow};
pub use delta::{compute_delta, daily_deltas};
pub use monotonic::{check_pair, validate_monotonic};
