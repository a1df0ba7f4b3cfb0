//! Service layer for utilization snapshots.
//!
//! Repository-agnostic orchestration: every write looks up the neighbouring
//! snapshots of the same aircraft, runs the monotonicity validator against the
//! predecessor *and* the successor, and only then touches storage. Reads feed
//! fetched snapshots through the pure delta calculator and period aggregator.
//!
//! All functions take any [`FullRepository`] so they work the same against the
//! in-memory and Postgres backends.

use chrono::NaiveDate;
use log::{debug, info, warn};
use serde::Serialize;

use super::repository::{FullRepository, RepositoryError};
use crate::api::{
    AircraftId, CounterOverflow, DateRange, MonotonicValidationError, NewSnapshot, Period, PeriodAggregate,
    SnapshotCandidate, SnapshotFilter, SnapshotId, SnapshotPatch, UtilizationDelta,
    UtilizationSnapshot,
};
use crate::services::{aggregate, check_pair, daily_deltas, validate_monotonic};

/// Errors surfaced by the utilization service layer.
///
/// None of these are retried internally.
#[derive(Debug, thiserror::Error)]
pub enum UtilizationError {
    /// A snapshot already exists for this aircraft and day.
    #[error("Snapshot already exists for aircraft {aircraft_id} on {date}")]
    DuplicateSnapshot {
        aircraft_id: AircraftId,
        date: NaiveDate,
    },

    /// One or more counters would decrease; carries every violation.
    #[error(transparent)]
    MonotonicViolation(#[from] MonotonicValidationError),

    #[error("{0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A summed fleet counter does not fit the integer range.
    #[error(transparent)]
    CounterOverflow(#[from] CounterOverflow),

    #[error("Repository error: {0}")]
    Repository(RepositoryError),
}

impl UtilizationError {
    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::DuplicateSnapshot { .. } => "DUPLICATE_SNAPSHOT",
            Self::MonotonicViolation(_) => "MONOTONIC_VIOLATION",
            Self::NotFound(_) => "NOT_FOUND",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::CounterOverflow(_) => "COUNTER_OVERFLOW",
            Self::Repository(e) => repository_code(e),
        }
    }
}

/// Code reported for storage failures, shared with the HTTP error body.
pub fn repository_code(err: &RepositoryError) -> &'static str {
    if err.is_conflict() {
        "CONFLICT"
    } else {
        "REPOSITORY_ERROR"
    }
}

impl From<RepositoryError> for UtilizationError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { message, .. } => Self::NotFound(message),
            other => Self::Repository(other),
        }
    }
}

pub type UtilizationResult<T> = Result<T, UtilizationError>;

// ==================== Neighbour lookups ====================

/// Chronological neighbours of a day for one aircraft, ignoring `exclude`.
///
/// `exclude` is the snapshot being rewritten; when its date moves it would
/// otherwise show up as its own neighbour.
async fn neighbours<R: FullRepository + ?Sized>(
    repo: &R,
    aircraft_id: &AircraftId,
    date: NaiveDate,
    exclude: Option<SnapshotId>,
) -> UtilizationResult<(Option<UtilizationSnapshot>, Option<UtilizationSnapshot>)> {
    let is_excluded = |s: &UtilizationSnapshot| Some(s.id) == exclude;

    let mut previous = repo.find_previous_snapshot(aircraft_id, date).await?;
    if let Some(skip) = previous.as_ref().filter(|p| is_excluded(p)).map(|p| p.date) {
        previous = repo.find_previous_snapshot(aircraft_id, skip).await?;
    }

    let mut next = repo.find_next_snapshot(aircraft_id, date).await?;
    if let Some(skip) = next.as_ref().filter(|n| is_excluded(n)).map(|n| n.date) {
        next = repo.find_next_snapshot(aircraft_id, skip).await?;
    }

    Ok((previous, next))
}

/// Validate `candidate` against both neighbours, merging every violation.
fn check_chain(
    candidate: &SnapshotCandidate,
    previous: Option<&UtilizationSnapshot>,
    next: Option<&UtilizationSnapshot>,
) -> UtilizationResult<()> {
    let mut failure: Option<MonotonicValidationError> =
        validate_monotonic(previous, candidate).err();

    if let Some(next) = next {
        if let Err(successor) = check_pair(
            &candidate.aircraft_id,
            (candidate.date, &candidate.counters),
            (next.date, &next.counters),
        ) {
            warn!(
                "Snapshot for {} on {} would exceed the following snapshot on {}",
                candidate.aircraft_id, candidate.date, next.date
            );
            match failure.as_mut() {
                Some(existing) => existing.extend(successor),
                None => failure = Some(successor),
            }
        }
    }

    match failure {
        Some(err) => Err(err.into()),
        None => Ok(()),
    }
}

fn duplicate(candidate: &SnapshotCandidate) -> UtilizationError {
    UtilizationError::DuplicateSnapshot {
        aircraft_id: candidate.aircraft_id.clone(),
        date: candidate.date,
    }
}

// ==================== Write operations ====================

/// Create a snapshot after duplicate and monotonicity checks.
///
/// A back-dated snapshot is checked against the next later snapshot as well,
/// so inserting into the middle of a chain cannot break it.
pub async fn create_snapshot<R: FullRepository + ?Sized>(
    repo: &R,
    snapshot: NewSnapshot,
) -> UtilizationResult<UtilizationSnapshot> {
    let candidate = &snapshot.data;
    candidate
        .validate()
        .map_err(UtilizationError::InvalidInput)?;

    if repo
        .find_snapshot_on_date(&candidate.aircraft_id, candidate.date)
        .await?
        .is_some()
    {
        return Err(duplicate(candidate));
    }

    let (previous, next) = neighbours(repo, &candidate.aircraft_id, candidate.date, None).await?;
    check_chain(candidate, previous.as_ref(), next.as_ref())?;

    let aircraft_id = candidate.aircraft_id.clone();
    let date = candidate.date;
    let stored = repo.insert_snapshot(snapshot).await.map_err(|e| {
        if e.is_conflict() {
            UtilizationError::DuplicateSnapshot { aircraft_id, date }
        } else {
            e.into()
        }
    })?;

    info!(
        "Created snapshot {} for aircraft {} on {}",
        stored.id, stored.aircraft_id, stored.date
    );
    Ok(stored)
}

/// Apply a partial update to an existing snapshot.
///
/// The merged result is re-validated against its predecessor and successor
/// at the (possibly new) date.
pub async fn update_snapshot<R: FullRepository + ?Sized>(
    repo: &R,
    id: SnapshotId,
    patch: &SnapshotPatch,
    updated_by: &str,
) -> UtilizationResult<UtilizationSnapshot> {
    let existing = repo.get_snapshot(id).await?;
    let candidate = patch
        .apply(&existing)
        .map_err(UtilizationError::InvalidInput)?;

    if candidate.date != existing.date {
        if let Some(other) = repo
            .find_snapshot_on_date(&candidate.aircraft_id, candidate.date)
            .await?
        {
            if other.id != id {
                return Err(duplicate(&candidate));
            }
        }
    }

    let (previous, next) =
        neighbours(repo, &candidate.aircraft_id, candidate.date, Some(id)).await?;
    check_chain(&candidate, previous.as_ref(), next.as_ref())?;

    let replacement = UtilizationSnapshot {
        id,
        aircraft_id: candidate.aircraft_id.clone(),
        date: candidate.date,
        counters: candidate.counters.clone(),
        last_flight_date: candidate.last_flight_date,
        updated_by: updated_by.to_string(),
        created_at: existing.created_at,
        updated_at: existing.updated_at,
    };

    let updated = repo.update_snapshot(id, replacement).await.map_err(|e| {
        if e.is_conflict() {
            duplicate(&candidate)
        } else {
            e.into()
        }
    })?;

    info!(
        "Updated snapshot {} for aircraft {} on {}",
        updated.id, updated.aircraft_id, updated.date
    );
    Ok(updated)
}

/// Delete a snapshot, refusing when its removal would break the chain.
///
/// After deletion the predecessor and successor become adjacent; they must
/// satisfy the monotonicity rule on their own.
pub async fn delete_snapshot<R: FullRepository + ?Sized>(
    repo: &R,
    id: SnapshotId,
) -> UtilizationResult<UtilizationSnapshot> {
    let existing = repo.get_snapshot(id).await?;
    let (previous, next) = neighbours(repo, &existing.aircraft_id, existing.date, Some(id)).await?;

    if let (Some(previous), Some(next)) = (&previous, &next) {
        check_pair(
            &existing.aircraft_id,
            (previous.date, &previous.counters),
            (next.date, &next.counters),
        )
        .inspect_err(|_| {
            warn!(
                "Refusing to delete snapshot {}: {} and {} would become inconsistent",
                id, previous.date, next.date
            )
        })?;
    }

    let deleted = repo.delete_snapshot(id).await?;
    info!(
        "Deleted snapshot {} for aircraft {} on {}",
        deleted.id, deleted.aircraft_id, deleted.date
    );
    Ok(deleted)
}

// ==================== Batch import ====================

/// Outcome of one row of a batch import.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ImportOutcome {
    #[serde(rename_all = "camelCase")]
    Created { snapshot_id: SnapshotId },
    #[serde(rename_all = "camelCase")]
    Rejected {
        code: String,
        message: String,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        violations: Vec<String>,
    },
}

/// Per-row result, `index` pointing into the submitted batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRow {
    pub index: usize,
    pub aircraft_id: AircraftId,
    pub date: NaiveDate,
    #[serde(flatten)]
    pub outcome: ImportOutcome,
}

/// Summary of a batch import.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub total: usize,
    pub created: usize,
    pub rejected: usize,
    pub rows: Vec<ImportRow>,
}

/// Create many snapshots, each through [`create_snapshot`].
///
/// Rows are processed in `(aircraft, date)` order so a batch covering several
/// days validates against itself. A rejected row does not stop the batch.
/// Report rows are returned in submission order.
pub async fn import_snapshots<R: FullRepository + ?Sized>(
    repo: &R,
    snapshots: Vec<NewSnapshot>,
) -> UtilizationResult<ImportReport> {
    let total = snapshots.len();
    let mut ordered: Vec<(usize, NewSnapshot)> = snapshots.into_iter().enumerate().collect();
    ordered.sort_by(|(ia, a), (ib, b)| {
        (&a.data.aircraft_id, a.data.date, ia).cmp(&(&b.data.aircraft_id, b.data.date, ib))
    });

    let mut rows = Vec::with_capacity(total);
    for (index, snapshot) in ordered {
        let aircraft_id = snapshot.data.aircraft_id.clone();
        let date = snapshot.data.date;

        let outcome = match create_snapshot(repo, snapshot).await {
            Ok(stored) => ImportOutcome::Created {
                snapshot_id: stored.id,
            },
            Err(UtilizationError::Repository(e)) if !e.is_conflict() => {
                // Storage failures are not row-level problems.
                return Err(UtilizationError::Repository(e));
            }
            Err(e) => {
                warn!("Import row {} ({} on {}) rejected: {}", index, aircraft_id, date, e);
                let violations = match &e {
                    UtilizationError::MonotonicViolation(v) => v.messages(),
                    _ => Vec::new(),
                };
                ImportOutcome::Rejected {
                    code: e.code().to_string(),
                    message: e.to_string(),
                    violations,
                }
            }
        };

        rows.push(ImportRow {
            index,
            aircraft_id,
            date,
            outcome,
        });
    }
    rows.sort_by_key(|row| row.index);

    let created = rows
        .iter()
        .filter(|r| matches!(r.outcome, ImportOutcome::Created { .. }))
        .count();
    info!(
        "Imported {} of {} snapshot(s), {} rejected",
        created,
        total,
        total - created
    );

    Ok(ImportReport {
        total,
        created,
        rejected: total - created,
        rows,
    })
}

// ==================== Read operations ====================

pub async fn get_snapshot<R: FullRepository + ?Sized>(
    repo: &R,
    id: SnapshotId,
) -> UtilizationResult<UtilizationSnapshot> {
    Ok(repo.get_snapshot(id).await?)
}

/// Snapshots matching `filter`, ordered by aircraft then date.
pub async fn list_snapshots<R: FullRepository + ?Sized>(
    repo: &R,
    filter: &SnapshotFilter,
) -> UtilizationResult<Vec<UtilizationSnapshot>> {
    Ok(repo.list_snapshots(filter).await?)
}

/// Most recent snapshot of an aircraft; `NotFound` when it has none.
pub async fn latest_snapshot<R: FullRepository + ?Sized>(
    repo: &R,
    aircraft_id: &AircraftId,
) -> UtilizationResult<UtilizationSnapshot> {
    repo.latest_snapshot(aircraft_id).await?.ok_or_else(|| {
        UtilizationError::NotFound(format!("No snapshots for aircraft {}", aircraft_id))
    })
}

pub async fn list_aircraft<R: FullRepository + ?Sized>(
    repo: &R,
) -> UtilizationResult<Vec<AircraftId>> {
    Ok(repo.list_aircraft().await?)
}

/// Day-over-day deltas for one aircraft inside `range`.
///
/// Only snapshots inside the range take part: the first delta is computed
/// against the earliest snapshot in range, not the true predecessor. Widen
/// the range for continuity across its start.
pub async fn get_daily_deltas<R: FullRepository + ?Sized>(
    repo: &R,
    aircraft_id: &AircraftId,
    range: DateRange,
) -> UtilizationResult<Vec<UtilizationDelta>> {
    let filter = SnapshotFilter::for_aircraft(aircraft_id.clone()).with_range(range);
    let snapshots = repo.list_snapshots(&filter).await?;
    let deltas = daily_deltas(&snapshots);
    debug!(
        "Computed {} delta(s) from {} snapshot(s) of {}",
        deltas.len(),
        snapshots.len(),
        aircraft_id
    );
    Ok(deltas)
}

/// Bucketed utilization for the snapshots matching `filter`.
pub async fn aggregate_utilization<R: FullRepository + ?Sized>(
    repo: &R,
    period: Period,
    filter: &SnapshotFilter,
) -> UtilizationResult<Vec<PeriodAggregate>> {
    let snapshots = repo.list_snapshots(filter).await?;
    Ok(aggregate(&snapshots, period, filter)?)
}

/// Check if the storage backend is healthy.
pub async fn health_check<R: FullRepository + ?Sized>(repo: &R) -> UtilizationResult<bool> {
    Ok(repo.health_check().await?)
}
