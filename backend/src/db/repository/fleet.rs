//! Range listings across the fleet.

use async_trait::async_trait;

use super::error::RepositoryResult;
use crate::api::{AircraftId, SnapshotFilter, UtilizationSnapshot};

/// Read-side queries spanning many snapshots.
#[async_trait]
pub trait FleetRepository: Send + Sync {
    /// Snapshots matching `filter`, ordered by `(aircraft_id, date)`.
    async fn list_snapshots(
        &self,
        filter: &SnapshotFilter,
    ) -> RepositoryResult<Vec<UtilizationSnapshot>>;

    /// Distinct aircraft with at least one snapshot, sorted.
    async fn list_aircraft(&self) -> RepositoryResult<Vec<AircraftId>>;

    /// Most recent snapshot of one aircraft.
    async fn latest_snapshot(
        &self,
        aircraft_id: &AircraftId,
    ) -> RepositoryResult<Option<UtilizationSnapshot>>;
}
