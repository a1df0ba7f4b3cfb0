//! Repository trait definitions for utilization storage.
//!
//! Storage is split into focused traits so backends and test doubles only
//! have to reason about one concern at a time:
//!
//! - [`error`]: Error types for repository operations
//! - [`utilization`]: Snapshot CRUD and the neighbour lookups the validator needs
//! - [`fleet`]: Range listings across one or many aircraft
//!
//! # Convenience Trait Bound
//!
//! Functions that need every capability take a [`FullRepository`]:
//!
//! ```ignore
//! async fn latest<R: FullRepository + ?Sized>(repo: &R, aircraft: &AircraftId) -> RepositoryResult<()> {
//!     let snapshots = repo.list_snapshots(&SnapshotFilter::for_aircraft(aircraft.clone())).await?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod fleet;
pub mod utilization;

pub use error::{ErrorContext, RepositoryError, RepositoryResult};

pub use fleet::FleetRepository;
pub use utilization::UtilizationRepository;

/// Composite trait bound for a complete repository implementation.
///
/// Automatically implemented for any type implementing every repository trait.
pub trait FullRepository: UtilizationRepository + FleetRepository {}

impl<T> FullRepository for T where T: UtilizationRepository + FleetRepository {}
