//! Period aggregation over stored utilization snapshots.
//!
//! Snapshots are filtered (aircraft, inclusive date range), bucketed by their
//! `date` into day/month/year groups and reduced into one [`PeriodAggregate`]
//! per bucket, ascending by bucket.
//!
//! Two readings are exposed per bucket and are never mixed:
//!
//! - **Incremental utilization** (`flight_hours`, `flight_cycles`,
//!   `apu_hours`): per-aircraft deltas between adjacent snapshots of the
//!   filtered set, attributed to the bucket of the later snapshot. The first
//!   snapshot of each aircraft inside the filter has no predecessor and adds
//!   nothing.
//! - **Closing fleet totals** (`airframe_hours_end`, `airframe_cycles_end`):
//!   the cumulative counters of each aircraft's latest snapshot in the bucket,
//!   summed across aircraft.
//!
//! Cycle counts are integers and are summed with checked arithmetic; a bucket
//! whose fleet total no longer fits in an `i64` fails the whole aggregation
//! with [`CounterOverflow`].

use chrono::NaiveDate;
use log::debug;
use qtty::Hours;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::api::AircraftId;
use crate::models::{Period, PeriodBucket, SnapshotFilter, UtilizationSnapshot};
use crate::services::delta::compute_delta;

/// Reduced utilization for one bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodAggregate {
    /// Wire label: `2024-01-05`, `2024-01` or `2024`.
    pub bucket: PeriodBucket,
    pub period: Period,
    pub period_start: NaiveDate,
    pub snapshot_count: usize,
    pub aircraft_count: usize,
    pub flight_hours: Hours,
    pub flight_cycles: i64,
    pub apu_hours: Hours,
    pub airframe_hours_end: Hours,
    pub airframe_cycles_end: i64,
}

/// A summed cycle counter left the `i64` range.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{field} overflows in bucket {bucket}")]
pub struct CounterOverflow {
    pub bucket: String,
    pub field: &'static str,
}

fn add_cycles(
    total: i64,
    value: i64,
    bucket: PeriodBucket,
    field: &'static str,
) -> Result<i64, CounterOverflow> {
    total.checked_add(value).ok_or_else(|| CounterOverflow {
        bucket: bucket.label(),
        field,
    })
}

#[derive(Default)]
struct BucketAccumulator<'a> {
    snapshot_count: usize,
    flight_hours: f64,
    flight_cycles: i64,
    apu_hours: f64,
    /// Latest snapshot per aircraft inside the bucket.
    closing: BTreeMap<&'a AircraftId, &'a UtilizationSnapshot>,
}

impl<'a> BucketAccumulator<'a> {
    fn record(&mut self, snapshot: &'a UtilizationSnapshot) {
        self.snapshot_count += 1;
        let slot = self.closing.entry(&snapshot.aircraft_id).or_insert(snapshot);
        if snapshot.date > slot.date {
            *slot = snapshot;
        }
    }

    fn finish(self, bucket: PeriodBucket) -> Result<PeriodAggregate, CounterOverflow> {
        let airframe_hours_end: f64 = self
            .closing
            .values()
            .map(|s| s.counters.airframe_hours_total.value())
            .sum();
        let airframe_cycles_end = self.closing.values().try_fold(0i64, |total, s| {
            add_cycles(
                total,
                s.counters.airframe_cycles_total,
                bucket,
                "airframeCyclesEnd",
            )
        })?;

        Ok(PeriodAggregate {
            bucket,
            period: bucket.period,
            period_start: bucket.start,
            snapshot_count: self.snapshot_count,
            aircraft_count: self.closing.len(),
            flight_hours: Hours::new(self.flight_hours),
            flight_cycles: self.flight_cycles,
            apu_hours: Hours::new(self.apu_hours),
            airframe_hours_end: Hours::new(airframe_hours_end),
            airframe_cycles_end,
        })
    }
}

/// Group and reduce `snapshots` into per-bucket aggregates.
///
/// Input order does not matter. Buckets without snapshots are not emitted.
pub fn aggregate(
    snapshots: &[UtilizationSnapshot],
    period: Period,
    filter: &SnapshotFilter,
) -> Result<Vec<PeriodAggregate>, CounterOverflow> {
    let mut per_aircraft: BTreeMap<&AircraftId, Vec<&UtilizationSnapshot>> = BTreeMap::new();
    for snapshot in snapshots.iter().filter(|s| filter.matches(s)) {
        per_aircraft
            .entry(&snapshot.aircraft_id)
            .or_default()
            .push(snapshot);
    }

    let mut buckets: BTreeMap<PeriodBucket, BucketAccumulator> = BTreeMap::new();
    for history in per_aircraft.values_mut() {
        history.sort_by_key(|s| s.date);

        for (idx, snapshot) in history.iter().copied().enumerate() {
            let bucket = period.bucket_for(snapshot.date);
            let acc = buckets.entry(bucket).or_default();
            acc.record(snapshot);

            if idx == 0 {
                continue;
            }
            let delta = compute_delta(snapshot, history[idx - 1]);
            acc.flight_hours += delta.flight_hours.value();
            acc.flight_cycles =
                add_cycles(acc.flight_cycles, delta.flight_cycles, bucket, "flightCycles")?;
            acc.apu_hours += delta.apu_hours.value();
        }
    }

    debug!(
        "Aggregated {} aircraft into {} {} bucket(s)",
        per_aircraft.len(),
        buckets.len(),
        period
    );

    buckets
        .into_iter()
        .map(|(bucket, acc)| acc.finish(bucket))
        .collect()
}
