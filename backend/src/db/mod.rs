//! Storage for utilization snapshots.
//!
//! Abstractions for database operations via the Repository pattern, so the
//! in-memory and Postgres backends can be swapped freely.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  HTTP layer (axum handlers)                             │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼─────────────────────────────────────┐
//! │  Service Layer (services.rs)                            │
//! │  - Duplicate and monotonicity checks                    │
//! │  - Deltas and period aggregation over fetched data      │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼─────────────────────────────────────┐
//! │  Repository Traits (repository/) - Abstract Interface   │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//!     ┌───────────────┴──────────────┐
//!     │ Local (in-memory)  Postgres  │
//!     └──────────────────────────────┘
//! ```
//!
//! # Recommended Usage
//! ```ignore
//! use fleet_utilization::db::{services, RepositoryFactory, RepositoryType};
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let repo = RepositoryFactory::create(RepositoryType::Local, None).await?;
//!     let aircraft = services::list_aircraft(repo.as_ref()).await?;
//!     Ok(())
//! }
//! ```

#[cfg(not(any(feature = "postgres-repo", feature = "local-repo")))]
compile_error!("Enable at least one repository backend feature.");

pub mod factory;
pub mod repo_config;
pub mod repositories;
pub mod repository;
pub mod services;

#[cfg(test)]
#[path = "services_tests.rs"]
mod services_tests;

// Postgres config is colocated with the repository implementation.
#[cfg(feature = "postgres-repo")]
pub use repositories::postgres::PostgresConfig;

/// Stands in for the Postgres settings when that backend is compiled out.
///
/// Keeps [`RepositoryFactory::create`] and
/// [`RepositoryConfig::to_postgres_config`] callable with the same signature
/// in every feature set; it cannot be constructed.
#[cfg(not(feature = "postgres-repo"))]
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    _private: (),
}

// ==================== Service Layer ====================

pub use services::{
    aggregate_utilization, create_snapshot, delete_snapshot, get_daily_deltas, get_snapshot,
    health_check, import_snapshots, latest_snapshot, list_aircraft, list_snapshots,
    update_snapshot, ImportOutcome, ImportReport, ImportRow, UtilizationError, UtilizationResult,
};

// ==================== Repository Pattern Exports ====================

pub use repo_config::{RepositoryConfig, ServerSettings};

pub use factory::{RepositoryBuilder, RepositoryFactory, RepositoryType};
pub use repositories::LocalRepository;
#[cfg(feature = "postgres-repo")]
pub use repositories::PostgresRepository;
pub use repository::{
    ErrorContext, FleetRepository, FullRepository, RepositoryError, RepositoryResult,
    UtilizationRepository,
};
