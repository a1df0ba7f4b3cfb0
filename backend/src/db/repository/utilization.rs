//! Snapshot repository trait: CRUD plus chronological neighbour lookups.

use async_trait::async_trait;
use chrono::NaiveDate;

use super::error::RepositoryResult;
use crate::api::{AircraftId, NewSnapshot, SnapshotId, UtilizationSnapshot};

/// Storage for daily utilization snapshots.
///
/// At most one snapshot exists per `(aircraft, date)`; implementations must
/// enforce this themselves and report a second one as
/// [`RepositoryError::Conflict`](super::RepositoryError::Conflict).
///
/// # Thread Safety
/// Implementations must be `Send + Sync` to work with async Rust.
#[async_trait]
pub trait UtilizationRepository: Send + Sync {
    // ==================== Health & Connection ====================

    /// Check if the storage backend is reachable.
    ///
    /// # Returns
    /// - `Ok(true)` if the backend answered
    /// - `Ok(false)` if it answered but reported itself unhealthy
    /// - `Err(RepositoryError)` if the check itself failed
    async fn health_check(&self) -> RepositoryResult<bool>;

    // ==================== Snapshot Operations ====================

    /// Store a new snapshot, assigning its id and timestamps.
    ///
    /// # Returns
    /// * `Ok(UtilizationSnapshot)` - The stored record
    /// * `Err(RepositoryError::Conflict)` - A snapshot already exists for that aircraft and day
    async fn insert_snapshot(&self, snapshot: NewSnapshot) -> RepositoryResult<UtilizationSnapshot>;

    /// Retrieve a snapshot by id.
    ///
    /// # Returns
    /// * `Err(RepositoryError::NotFound)` - If no snapshot has that id
    async fn get_snapshot(&self, id: SnapshotId) -> RepositoryResult<UtilizationSnapshot>;

    /// Replace the mutable fields of an existing snapshot and bump `updated_at`.
    ///
    /// `id` and `created_at` of `snapshot` are ignored.
    ///
    /// # Returns
    /// * `Err(RepositoryError::NotFound)` - If no snapshot has that id
    /// * `Err(RepositoryError::Conflict)` - If the new day collides with another snapshot
    async fn update_snapshot(
        &self,
        id: SnapshotId,
        snapshot: UtilizationSnapshot,
    ) -> RepositoryResult<UtilizationSnapshot>;

    /// Delete a snapshot and return it. Other snapshots are untouched.
    ///
    /// # Returns
    /// * `Err(RepositoryError::NotFound)` - If no snapshot has that id
    async fn delete_snapshot(&self, id: SnapshotId) -> RepositoryResult<UtilizationSnapshot>;

    // ==================== Chronological Lookups ====================

    /// Snapshot of `aircraft_id` recorded for exactly `date`.
    async fn find_snapshot_on_date(
        &self,
        aircraft_id: &AircraftId,
        date: NaiveDate,
    ) -> RepositoryResult<Option<UtilizationSnapshot>>;

    /// Latest snapshot of `aircraft_id` dated strictly before `date`.
    async fn find_previous_snapshot(
        &self,
        aircraft_id: &AircraftId,
        date: NaiveDate,
    ) -> RepositoryResult<Option<UtilizationSnapshot>>;

    /// Earliest snapshot of `aircraft_id` dated strictly after `date`.
    async fn find_next_snapshot(
        &self,
        aircraft_id: &AircraftId,
        date: NaiveDate,
    ) -> RepositoryResult<Option<UtilizationSnapshot>>;
}
