//! In-memory local repository implementation.
//!
//! Snapshots live in an ordered map keyed by id, with a secondary index on
//! `(aircraft, date)` that enforces the one-snapshot-per-day rule and serves
//! the chronological lookups. Suitable for unit tests and local development.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;
use std::sync::Arc;

use crate::api::{AircraftId, NewSnapshot, SnapshotFilter, SnapshotId, UtilizationSnapshot};
use crate::db::repository::{
    ErrorContext, FleetRepository, RepositoryError, RepositoryResult, UtilizationRepository,
};

/// In-memory local repository.
///
/// Cloning yields a handle onto the same data.
///
/// # Example
/// ```
/// use fleet_utilization::db::repositories::LocalRepository;
///
/// let repo = LocalRepository::new();
/// assert_eq!(repo.snapshot_count(), 0);
/// ```
#[derive(Clone)]
pub struct LocalRepository {
    data: Arc<RwLock<LocalData>>,
}

struct LocalData {
    snapshots: BTreeMap<SnapshotId, UtilizationSnapshot>,
    by_day: BTreeMap<(AircraftId, NaiveDate), SnapshotId>,
    next_snapshot_id: i64,
    is_healthy: bool,
}

impl Default for LocalData {
    fn default() -> Self {
        Self {
            snapshots: BTreeMap::new(),
            by_day: BTreeMap::new(),
            next_snapshot_id: 1,
            is_healthy: true,
        }
    }
}

impl LocalData {
    fn check_health(&self) -> RepositoryResult<()> {
        if !self.is_healthy {
            return Err(RepositoryError::connection("Database is not healthy"));
        }
        Ok(())
    }

    fn get(&self, id: SnapshotId, operation: &str) -> RepositoryResult<&UtilizationSnapshot> {
        self.snapshots.get(&id).ok_or_else(|| {
            RepositoryError::not_found_with_context(
                format!("Snapshot {} not found", id),
                ErrorContext::new(operation)
                    .with_entity("snapshot")
                    .with_entity_id(id),
            )
        })
    }

    fn conflict(aircraft_id: &AircraftId, date: NaiveDate, operation: &str) -> RepositoryError {
        RepositoryError::conflict_with_context(
            format!(
                "Snapshot already exists for aircraft {} on {}",
                aircraft_id, date
            ),
            ErrorContext::new(operation)
                .with_entity("snapshot")
                .with_entity_id(format!("{}@{}", aircraft_id, date)),
        )
    }

    /// Snapshots of one aircraft within the given day bounds, ascending.
    fn day_range<'a>(
        &'a self,
        aircraft_id: &AircraftId,
        lower: Bound<NaiveDate>,
        upper: Bound<NaiveDate>,
    ) -> impl DoubleEndedIterator<Item = &'a UtilizationSnapshot> + 'a {
        let key = |bound: Bound<NaiveDate>, open: NaiveDate| match bound {
            Bound::Included(d) => Bound::Included((aircraft_id.clone(), d)),
            Bound::Excluded(d) => Bound::Excluded((aircraft_id.clone(), d)),
            Bound::Unbounded => Bound::Included((aircraft_id.clone(), open)),
        };
        self.by_day
            .range((key(lower, NaiveDate::MIN), key(upper, NaiveDate::MAX)))
            .filter_map(move |(_, id)| self.snapshots.get(id))
    }
}

impl LocalRepository {
    /// Create a new empty local repository.
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(LocalData::default())),
        }
    }

    /// Set the health status for testing connection failures.
    pub fn set_healthy(&self, healthy: bool) {
        self.data.write().is_healthy = healthy;
    }

    /// Clear all data from the repository.
    pub fn clear(&self) {
        let mut data = self.data.write();
        let healthy = data.is_healthy;
        *data = LocalData {
            is_healthy: healthy,
            ..Default::default()
        };
    }

    /// Get the number of snapshots stored.
    pub fn snapshot_count(&self) -> usize {
        self.data.read().snapshots.len()
    }
}

impl Default for LocalRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UtilizationRepository for LocalRepository {
    async fn health_check(&self) -> RepositoryResult<bool> {
        Ok(self.data.read().is_healthy)
    }

    async fn insert_snapshot(&self, snapshot: NewSnapshot) -> RepositoryResult<UtilizationSnapshot> {
        let mut data = self.data.write();
        data.check_health()?;

        let candidate = snapshot.data;
        let key = (candidate.aircraft_id.clone(), candidate.date);
        if data.by_day.contains_key(&key) {
            return Err(LocalData::conflict(
                &candidate.aircraft_id,
                candidate.date,
                "insert_snapshot",
            ));
        }

        let id = SnapshotId::new(data.next_snapshot_id);
        data.next_snapshot_id += 1;

        let now = Utc::now();
        let stored = UtilizationSnapshot {
            id,
            aircraft_id: candidate.aircraft_id,
            date: candidate.date,
            counters: candidate.counters,
            last_flight_date: candidate.last_flight_date,
            updated_by: snapshot.updated_by,
            created_at: now,
            updated_at: now,
        };

        data.by_day.insert(key, id);
        data.snapshots.insert(id, stored.clone());
        Ok(stored)
    }

    async fn get_snapshot(&self, id: SnapshotId) -> RepositoryResult<UtilizationSnapshot> {
        let data = self.data.read();
        data.check_health()?;
        data.get(id, "get_snapshot").cloned()
    }

    async fn update_snapshot(
        &self,
        id: SnapshotId,
        snapshot: UtilizationSnapshot,
    ) -> RepositoryResult<UtilizationSnapshot> {
        let mut data = self.data.write();
        data.check_health()?;

        let existing = data.get(id, "update_snapshot")?.clone();
        let old_key = (existing.aircraft_id.clone(), existing.date);
        let new_key = (snapshot.aircraft_id.clone(), snapshot.date);

        if new_key != old_key {
            if let Some(other) = data.by_day.get(&new_key) {
                if *other != id {
                    return Err(LocalData::conflict(
                        &snapshot.aircraft_id,
                        snapshot.date,
                        "update_snapshot",
                    ));
                }
            }
            data.by_day.remove(&old_key);
            data.by_day.insert(new_key, id);
        }

        let updated = UtilizationSnapshot {
            id,
            created_at: existing.created_at,
            updated_at: Utc::now(),
            ..snapshot
        };
        data.snapshots.insert(id, updated.clone());
        Ok(updated)
    }

    async fn delete_snapshot(&self, id: SnapshotId) -> RepositoryResult<UtilizationSnapshot> {
        let mut data = self.data.write();
        data.check_health()?;

        let removed = data.snapshots.remove(&id).ok_or_else(|| {
            RepositoryError::not_found_with_context(
                format!("Snapshot {} not found", id),
                ErrorContext::new("delete_snapshot")
                    .with_entity("snapshot")
                    .with_entity_id(id),
            )
        })?;
        data.by_day
            .remove(&(removed.aircraft_id.clone(), removed.date));
        Ok(removed)
    }

    async fn find_snapshot_on_date(
        &self,
        aircraft_id: &AircraftId,
        date: NaiveDate,
    ) -> RepositoryResult<Option<UtilizationSnapshot>> {
        let data = self.data.read();
        data.check_health()?;
        Ok(data
            .by_day
            .get(&(aircraft_id.clone(), date))
            .and_then(|id| data.snapshots.get(id))
            .cloned())
    }

    async fn find_previous_snapshot(
        &self,
        aircraft_id: &AircraftId,
        date: NaiveDate,
    ) -> RepositoryResult<Option<UtilizationSnapshot>> {
        let data = self.data.read();
        data.check_health()?;
        let previous = data
            .day_range(aircraft_id, Bound::Unbounded, Bound::Excluded(date))
            .next_back()
            .cloned();
        Ok(previous)
    }

    async fn find_next_snapshot(
        &self,
        aircraft_id: &AircraftId,
        date: NaiveDate,
    ) -> RepositoryResult<Option<UtilizationSnapshot>> {
        let data = self.data.read();
        data.check_health()?;
        let next = data
            .day_range(aircraft_id, Bound::Excluded(date), Bound::Unbounded)
            .next()
            .cloned();
        Ok(next)
    }
}

#[async_trait]
impl FleetRepository for LocalRepository {
    async fn list_snapshots(
        &self,
        filter: &SnapshotFilter,
    ) -> RepositoryResult<Vec<UtilizationSnapshot>> {
        let data = self.data.read();
        data.check_health()?;

        // by_day is keyed by (aircraft, date), so iteration order is already the
        // listing order.
        let snapshots = data
            .by_day
            .values()
            .filter_map(|id| data.snapshots.get(id))
            .filter(|s| filter.matches(s))
            .cloned()
            .collect();
        Ok(snapshots)
    }

    async fn list_aircraft(&self) -> RepositoryResult<Vec<AircraftId>> {
        let data = self.data.read();
        data.check_health()?;
        let aircraft: BTreeSet<&AircraftId> = data.by_day.keys().map(|(a, _)| a).collect();
        Ok(aircraft.into_iter().cloned().collect())
    }

    async fn latest_snapshot(
        &self,
        aircraft_id: &AircraftId,
    ) -> RepositoryResult<Option<UtilizationSnapshot>> {
        let data = self.data.read();
        data.check_health()?;
        let latest = data
            .day_range(aircraft_id, Bound::Unbounded, Bound::Unbounded)
            .next_back()
            .cloned();
        Ok(latest)
    }
}
