//! Monotonicity validation for cumulative utilization counters.
//!
//! A candidate snapshot is checked against the immediately preceding snapshot
//! of the same aircraft. Every counter present in both records must not be
//! lower in the candidate. All offending counters are collected into one
//! [`MonotonicValidationError`] so a caller can fix everything in one pass.
//!
//! Optional counters (engines 3/4, APU cycles) missing from either record are
//! skipped for that pair and reported through a warning log line.

use chrono::NaiveDate;
use log::warn;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

use crate::api::AircraftId;
use crate::models::{CounterField, CounterValue, SnapshotCandidate, UtilizationCounters, UtilizationSnapshot};

/// A single counter that went backwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterViolation {
    pub field: CounterField,
    pub previous_value: CounterValue,
    pub current_value: CounterValue,
    pub previous_date: NaiveDate,
    pub current_date: NaiveDate,
}

impl CounterViolation {
    /// Human-readable description, e.g.
    /// `airframeHoursTotal (99) cannot be less than previous value (100)`.
    pub fn message(&self) -> String {
        format!(
            "{} ({}) cannot be less than previous value ({})",
            self.field, self.current_value, self.previous_value
        )
    }
}

impl fmt::Display for CounterViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

/// Every monotonicity violation found for one candidate.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Monotonic validation failed for aircraft {aircraft_id}: {}", join_messages(.violations))]
pub struct MonotonicValidationError {
    pub aircraft_id: AircraftId,
    pub violations: Vec<CounterViolation>,
}

impl MonotonicValidationError {
    pub fn messages(&self) -> Vec<String> {
        self.violations.iter().map(CounterViolation::message).collect()
    }

    pub fn fields(&self) -> Vec<CounterField> {
        self.violations.iter().map(|v| v.field).collect()
    }

    /// Merge violations from another check on the same aircraft.
    pub fn extend(&mut self, other: MonotonicValidationError) {
        self.violations.extend(other.violations);
    }
}

fn join_messages(violations: &[CounterViolation]) -> String {
    violations
        .iter()
        .map(CounterViolation::message)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Validate `candidate` against its immediate predecessor.
///
/// `previous` is the latest snapshot of the same aircraft dated strictly
/// before the candidate, or `None` when the candidate would be the first
/// record (always accepted).
pub fn validate_monotonic(
    previous: Option<&UtilizationSnapshot>,
    candidate: &SnapshotCandidate,
) -> Result<(), MonotonicValidationError> {
    let Some(previous) = previous else {
        return Ok(());
    };

    check_pair(
        &candidate.aircraft_id,
        (previous.date, &previous.counters),
        (candidate.date, &candidate.counters),
    )
}

/// Compare two chronologically ordered counter sets.
///
/// `earlier` and `later` are `(date, counters)` pairs; the same rule as
/// [`validate_monotonic`] applies. Used for successor checks where the
/// candidate plays the role of the predecessor.
pub fn check_pair(
    aircraft_id: &AircraftId,
    earlier: (NaiveDate, &UtilizationCounters),
    later: (NaiveDate, &UtilizationCounters),
) -> Result<(), MonotonicValidationError> {
    let violations = find_violations(aircraft_id, earlier, later);
    if violations.is_empty() {
        Ok(())
    } else {
        Err(MonotonicValidationError {
            aircraft_id: aircraft_id.clone(),
            violations,
        })
    }
}

fn find_violations(
    aircraft_id: &AircraftId,
    (previous_date, previous): (NaiveDate, &UtilizationCounters),
    (current_date, current): (NaiveDate, &UtilizationCounters),
) -> Vec<CounterViolation> {
    let previous_readings: HashMap<CounterField, CounterValue> =
        previous.readings().into_iter().collect();
    let current_readings = current.readings();

    let mut violations = Vec::new();
    for (field, current_value) in &current_readings {
        let Some(previous_value) = previous_readings.get(field) else {
            warn!(
                "Skipping {} for aircraft {}: present on {} but not on previous snapshot {}",
                field, aircraft_id, current_date, previous_date
            );
            continue;
        };
        if current_value.is_less_than(previous_value) {
            violations.push(CounterViolation {
                field: *field,
                previous_value: *previous_value,
                current_value: *current_value,
                previous_date,
                current_date,
            });
        }
    }

    for (field, _) in previous.readings() {
        if current.reading(field).is_none() {
            warn!(
                "Skipping {} for aircraft {}: present on previous snapshot {} but not on {}",
                field, aircraft_id, previous_date, current_date
            );
        }
    }

    violations
}

#[cfg(test)]
#[path = "monotonic_tests.rs"]
mod tests;
