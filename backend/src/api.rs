//! Public API surface for the Rust backend.
//!
//! Identifier newtypes live here; the domain and computed types are
//! re-exported so HTTP and database layers share a single vocabulary.

pub use crate::models::snapshot::{
    CounterField, CounterValue, EngineCounters, EngineSet, NewSnapshot, SnapshotCandidate,
    SnapshotFilter, SnapshotPatch, UtilizationCounters, UtilizationSnapshot,
};
pub use crate::models::time::{parse_iso_date, DateRange, Period, PeriodBucket};
pub use crate::services::aggregation::{CounterOverflow, PeriodAggregate};
pub use crate::services::delta::{EngineDelta, UtilizationDelta};
pub use crate::services::monotonic::{CounterViolation, MonotonicValidationError};

use serde::{Deserialize, Serialize};
use std::fmt;

crate::define_id_type!(i64, SnapshotId);

/// Aircraft identifier (registration mark or external fleet id).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AircraftId(String);

impl AircraftId {
    /// Build an aircraft id, trimming surrounding whitespace.
    ///
    /// Returns `None` for empty or whitespace-only input.
    pub fn parse(value: impl AsRef<str>) -> Option<Self> {
        let trimmed = value.as_ref().trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AircraftId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_id_roundtrip() {
        let id = SnapshotId::new(42);
        assert_eq!(id.value(), 42);
        assert_eq!(i64::from(id), 42);
        assert_eq!(id.to_string(), "42");
    }

    #[test]
    fn test_aircraft_id_trims() {
        let id = AircraftId::parse("  9H-AEK ").unwrap();
        assert_eq!(id.as_str(), "9H-AEK");
        assert_eq!(id.to_string(), "9H-AEK");
    }

    #[test]
    fn test_aircraft_id_rejects_blank() {
        assert!(AircraftId::parse("").is_none());
        assert!(AircraftId::parse("   ").is_none());
    }

    #[test]
    fn test_aircraft_id_serializes_as_string() {
        let id = AircraftId::parse("A6-EDA").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"A6-EDA\"");
    }
}
