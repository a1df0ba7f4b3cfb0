//! Postgres repository implementation using Diesel.
//!
//! Snapshots are stored one row per aircraft and day in `utilization_snapshots`;
//! the `(aircraft_id, snapshot_date)` unique constraint backs the
//! one-snapshot-per-day rule and surfaces as [`RepositoryError::Conflict`].
//!
//! ## Features
//!
//! - Connection pooling with r2d2
//! - Automatic retry for transient failures
//! - Automatic migration execution
//!
//! ## Configuration
//!
//! Environment variables:
//! - `DATABASE_URL` or `PG_DATABASE_URL`: Connection string (required)
//! - `PG_POOL_MAX`: Maximum pool size (default: 10)
//! - `PG_POOL_MIN`: Minimum pool size (default: 1)
//! - `PG_CONN_TIMEOUT_SEC`: Connection timeout in seconds (default: 30)
//! - `PG_IDLE_TIMEOUT_SEC`: Idle connection timeout in seconds (default: 600)
//! - `PG_MAX_RETRIES`: Maximum retry attempts for transient failures (default: 3)
//! - `PG_RETRY_DELAY_MS`: Initial retry delay in milliseconds (default: 100)

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::sql_query;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use log::info;
use std::time::Duration;
use tokio::task;

use crate::api::{AircraftId, NewSnapshot, SnapshotFilter, SnapshotId, UtilizationSnapshot};
use crate::db::repository::{
    ErrorContext, FleetRepository, RepositoryError, RepositoryResult, UtilizationRepository,
};

mod models;
mod schema;

use models::{rows_to_snapshots, SnapshotRow, SnapshotValues};
use schema::utilization_snapshots;

type PgPool = Pool<ConnectionManager<PgConnection>>;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("src/db/repositories/postgres/migrations");

/// Configuration for connecting to Postgres.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Database connection URL
    pub database_url: String,
    /// Maximum number of connections in the pool
    pub max_pool_size: u32,
    /// Minimum number of connections in the pool
    pub min_pool_size: u32,
    /// Connection timeout in seconds
    pub connection_timeout_sec: u64,
    /// Idle connection timeout in seconds
    pub idle_timeout_sec: u64,
    /// Maximum number of retry attempts for transient failures
    pub max_retries: u32,
    /// Initial retry delay in milliseconds (doubles with each retry)
    pub retry_delay_ms: u64,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            max_pool_size: 10,
            min_pool_size: 1,
            connection_timeout_sec: 30,
            idle_timeout_sec: 600,
            max_retries: 3,
            retry_delay_ms: 100,
        }
    }
}

impl PostgresConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    /// - `DATABASE_URL` or `PG_DATABASE_URL`: Connection string (required)
    /// - `PG_POOL_MAX`: Maximum pool size (default: 10)
    /// - `PG_POOL_MIN`: Minimum pool size (default: 1)
    /// - `PG_CONN_TIMEOUT_SEC`: Connection timeout in seconds (default: 30)
    /// - `PG_IDLE_TIMEOUT_SEC`: Idle connection timeout in seconds (default: 600)
    /// - `PG_MAX_RETRIES`: Maximum retry attempts (default: 3)
    /// - `PG_RETRY_DELAY_MS`: Initial retry delay in milliseconds (default: 100)
    pub fn from_env() -> Result<Self, String> {
        let database_url = std::env::var("DATABASE_URL")
            .or_else(|_| std::env::var("PG_DATABASE_URL"))
            .map_err(|_| "DATABASE_URL or PG_DATABASE_URL must be set".to_string())?;

        let max_pool_size = std::env::var("PG_POOL_MAX")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(10);

        let min_pool_size = std::env::var("PG_POOL_MIN")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(1);

        let connection_timeout_sec = std::env::var("PG_CONN_TIMEOUT_SEC")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(30);

        let idle_timeout_sec = std::env::var("PG_IDLE_TIMEOUT_SEC")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(600);

        let max_retries = std::env::var("PG_MAX_RETRIES")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(3);

        let retry_delay_ms = std::env::var("PG_RETRY_DELAY_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(100);

        Ok(Self {
            database_url,
            max_pool_size,
            min_pool_size,
            connection_timeout_sec,
            idle_timeout_sec,
            max_retries,
            retry_delay_ms,
        })
    }

    /// Create a new configuration with a database URL.
    pub fn with_url(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            ..Default::default()
        }
    }
}

/// Diesel-backed repository for Postgres.
///
/// This repository implementation provides:
/// - Connection pooling with configurable limits
/// - Automatic retry for transient failures
/// - Automatic schema migrations
#[derive(Clone, Debug)]
pub struct PostgresRepository {
    pool: PgPool,
    config: PostgresConfig,
}

impl PostgresRepository {
    /// Create a new repository and run pending migrations.
    ///
    /// # Arguments
    /// * `config` - Database configuration
    ///
    /// # Returns
    /// * `Ok(PostgresRepository)` on success
    /// * `Err(RepositoryError)` if connection or migration fails
    pub fn new(config: PostgresConfig) -> RepositoryResult<Self> {
        let manager = ConnectionManager::<PgConnection>::new(&config.database_url);

        let pool = Pool::builder()
            .max_size(config.max_pool_size)
            .min_idle(Some(config.min_pool_size))
            .connection_timeout(Duration::from_secs(config.connection_timeout_sec))
            .idle_timeout(Some(Duration::from_secs(config.idle_timeout_sec)))
            .test_on_check_out(true) // Validate connections before use
            .build(manager)
            .map_err(|e| {
                RepositoryError::connection_with_context(
                    e.to_string(),
                    ErrorContext::new("create_pool")
                        .with_details(format!("max_size={}", config.max_pool_size)),
                )
            })?;

        // Run migrations once during initialization
        {
            let mut conn = pool.get().map_err(|e| {
                RepositoryError::connection_with_context(
                    e.to_string(),
                    ErrorContext::new("get_connection_for_migrations"),
                )
            })?;
            Self::run_migrations(&mut conn)?;
        }

        info!(
            "Postgres repository ready (pool max={}, min={})",
            config.max_pool_size, config.min_pool_size
        );

        Ok(Self { pool, config })
    }

    /// Run pending database migrations.
    fn run_migrations(conn: &mut PgConnection) -> RepositoryResult<()> {
        conn.run_pending_migrations(MIGRATIONS).map_err(|e| {
            RepositoryError::internal_with_context(
                format!("Migration failed: {}", e),
                ErrorContext::new("run_migrations"),
            )
        })?;

        Ok(())
    }

    /// Execute a database operation with automatic retry for transient failures.
    ///
    /// This method will retry the operation up to `max_retries` times if a
    /// retryable error occurs (connection errors, timeouts, serialization failures).
    async fn with_conn<T, F>(&self, f: F) -> RepositoryResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut PgConnection) -> RepositoryResult<T> + Send + 'static + Clone,
    {
        let pool = self.pool.clone();
        let max_retries = self.config.max_retries;
        let retry_delay_ms = self.config.retry_delay_ms;

        task::spawn_blocking(move || {
            let mut last_error = None;
            let mut retry_delay = Duration::from_millis(retry_delay_ms);

            for attempt in 0..=max_retries {
                if attempt > 0 {
                    std::thread::sleep(retry_delay);
                    retry_delay *= 2; // Exponential backoff
                }

                // Get connection
                let mut conn = match pool.get() {
                    Ok(c) => c,
                    Err(e) => {
                        let err = RepositoryError::connection_with_context(
                            e.to_string(),
                            ErrorContext::new("get_connection")
                                .with_details(format!("attempt={}", attempt + 1))
                                .retryable(),
                        );
                        if attempt < max_retries {
                            last_error = Some(err);
                            continue;
                        }
                        return Err(err);
                    }
                };

                // Execute the operation
                match f.clone()(&mut conn) {
                    Ok(result) => return Ok(result),
                    Err(e) if e.is_retryable() && attempt < max_retries => {
                        last_error = Some(e);
                        continue;
                    }
                    Err(e) => return Err(e),
                }
            }

            Err(last_error.unwrap_or_else(|| {
                RepositoryError::internal("Max retries exceeded with no error captured")
            }))
        })
        .await
        .map_err(|e| {
            RepositoryError::internal_with_context(
                format!("Task join error: {}", e),
                ErrorContext::new("spawn_blocking"),
            )
        })?
    }
}

fn map_diesel_error(err: diesel::result::Error) -> RepositoryError {
    RepositoryError::from(err)
}

fn map_diesel_error_in(operation: &'static str) -> impl Fn(diesel::result::Error) -> RepositoryError {
    move |err| RepositoryError::from(err).with_operation(operation)
}

fn load_optional(
    conn: &mut PgConnection,
    query: utilization_snapshots::BoxedQuery<'static, diesel::pg::Pg>,
    operation: &'static str,
) -> RepositoryResult<Option<UtilizationSnapshot>> {
    query
        .select(SnapshotRow::as_select())
        .first::<SnapshotRow>(conn)
        .optional()
        .map_err(map_diesel_error_in(operation))?
        .map(UtilizationSnapshot::try_from)
        .transpose()
}

fn aircraft_query(aircraft_id: &AircraftId) -> utilization_snapshots::BoxedQuery<'static, diesel::pg::Pg> {
    utilization_snapshots::table
        .filter(utilization_snapshots::aircraft_id.eq(aircraft_id.as_str().to_string()))
        .into_boxed()
}

#[async_trait]
impl UtilizationRepository for PostgresRepository {
    async fn health_check(&self) -> RepositoryResult<bool> {
        self.with_conn(|conn| {
            sql_query("SELECT 1")
                .execute(conn)
                .map(|_| true)
                .map_err(map_diesel_error)
        })
        .await
    }

    async fn insert_snapshot(&self, snapshot: NewSnapshot) -> RepositoryResult<UtilizationSnapshot> {
        let values = SnapshotValues::from_candidate(&snapshot.data, &snapshot.updated_by)?;
        self.with_conn(move |conn| {
            let row: SnapshotRow = diesel::insert_into(utilization_snapshots::table)
                .values(&values)
                .returning(SnapshotRow::as_returning())
                .get_result(conn)
                .map_err(map_diesel_error_in("insert_snapshot"))?;
            UtilizationSnapshot::try_from(row)
        })
        .await
    }

    async fn get_snapshot(&self, id: SnapshotId) -> RepositoryResult<UtilizationSnapshot> {
        self.with_conn(move |conn| {
            let row = utilization_snapshots::table
                .find(id.value())
                .select(SnapshotRow::as_select())
                .first::<SnapshotRow>(conn)
                .optional()
                .map_err(map_diesel_error_in("get_snapshot"))?
                .ok_or_else(|| {
                    RepositoryError::not_found_with_context(
                        format!("Snapshot {} not found", id),
                        ErrorContext::new("get_snapshot")
                            .with_entity("snapshot")
                            .with_entity_id(id),
                    )
                })?;
            UtilizationSnapshot::try_from(row)
        })
        .await
    }

    async fn update_snapshot(
        &self,
        id: SnapshotId,
        snapshot: UtilizationSnapshot,
    ) -> RepositoryResult<UtilizationSnapshot> {
        let values = SnapshotValues::from_candidate(&snapshot.candidate(), &snapshot.updated_by)?;
        self.with_conn(move |conn| {
            let row = diesel::update(utilization_snapshots::table.find(id.value()))
                .set((&values, utilization_snapshots::updated_at.eq(Utc::now())))
                .returning(SnapshotRow::as_returning())
                .get_result::<SnapshotRow>(conn)
                .optional()
                .map_err(map_diesel_error_in("update_snapshot"))?
                .ok_or_else(|| {
                    RepositoryError::not_found_with_context(
                        format!("Snapshot {} not found", id),
                        ErrorContext::new("update_snapshot")
                            .with_entity("snapshot")
                            .with_entity_id(id),
                    )
                })?;
            UtilizationSnapshot::try_from(row)
        })
        .await
    }

    async fn delete_snapshot(&self, id: SnapshotId) -> RepositoryResult<UtilizationSnapshot> {
        self.with_conn(move |conn| {
            let row = diesel::delete(utilization_snapshots::table.find(id.value()))
                .returning(SnapshotRow::as_returning())
                .get_result::<SnapshotRow>(conn)
                .optional()
                .map_err(map_diesel_error_in("delete_snapshot"))?
                .ok_or_else(|| {
                    RepositoryError::not_found_with_context(
                        format!("Snapshot {} not found", id),
                        ErrorContext::new("delete_snapshot")
                            .with_entity("snapshot")
                            .with_entity_id(id),
                    )
                })?;
            UtilizationSnapshot::try_from(row)
        })
        .await
    }

    async fn find_snapshot_on_date(
        &self,
        aircraft_id: &AircraftId,
        date: NaiveDate,
    ) -> RepositoryResult<Option<UtilizationSnapshot>> {
        let aircraft_id = aircraft_id.clone();
        self.with_conn(move |conn| {
            let query = aircraft_query(&aircraft_id)
                .filter(utilization_snapshots::snapshot_date.eq(date));
            load_optional(conn, query, "find_snapshot_on_date")
        })
        .await
    }

    async fn find_previous_snapshot(
        &self,
        aircraft_id: &AircraftId,
        date: NaiveDate,
    ) -> RepositoryResult<Option<UtilizationSnapshot>> {
        let aircraft_id = aircraft_id.clone();
        self.with_conn(move |conn| {
            let query = aircraft_query(&aircraft_id)
                .filter(utilization_snapshots::snapshot_date.lt(date))
                .order(utilization_snapshots::snapshot_date.desc());
            load_optional(conn, query, "find_previous_snapshot")
        })
        .await
    }

    async fn find_next_snapshot(
        &self,
        aircraft_id: &AircraftId,
        date: NaiveDate,
    ) -> RepositoryResult<Option<UtilizationSnapshot>> {
        let aircraft_id = aircraft_id.clone();
        self.with_conn(move |conn| {
            let query = aircraft_query(&aircraft_id)
                .filter(utilization_snapshots::snapshot_date.gt(date))
                .order(utilization_snapshots::snapshot_date.asc());
            load_optional(conn, query, "find_next_snapshot")
        })
        .await
    }
}

#[async_trait]
impl FleetRepository for PostgresRepository {
    async fn list_snapshots(
        &self,
        filter: &SnapshotFilter,
    ) -> RepositoryResult<Vec<UtilizationSnapshot>> {
        let filter = filter.clone();
        self.with_conn(move |conn| {
            let mut query = utilization_snapshots::table.into_boxed();
            if let Some(aircraft_id) = &filter.aircraft_id {
                query = query
                    .filter(utilization_snapshots::aircraft_id.eq(aircraft_id.as_str().to_string()));
            }
            if let Some(start) = filter.range.start {
                query = query.filter(utilization_snapshots::snapshot_date.ge(start));
            }
            if let Some(end) = filter.range.end {
                query = query.filter(utilization_snapshots::snapshot_date.le(end));
            }

            let rows = query
                .order((
                    utilization_snapshots::aircraft_id.asc(),
                    utilization_snapshots::snapshot_date.asc(),
                ))
                .select(SnapshotRow::as_select())
                .load::<SnapshotRow>(conn)
                .map_err(map_diesel_error_in("list_snapshots"))?;
            rows_to_snapshots(rows)
        })
        .await
    }

    async fn list_aircraft(&self) -> RepositoryResult<Vec<AircraftId>> {
        self.with_conn(|conn| {
            let ids: Vec<String> = utilization_snapshots::table
                .select(utilization_snapshots::aircraft_id)
                .distinct()
                .order(utilization_snapshots::aircraft_id.asc())
                .load(conn)
                .map_err(map_diesel_error_in("list_aircraft"))?;
            Ok(ids.into_iter().filter_map(AircraftId::parse).collect())
        })
        .await
    }

    async fn latest_snapshot(
        &self,
        aircraft_id: &AircraftId,
    ) -> RepositoryResult<Option<UtilizationSnapshot>> {
        let aircraft_id = aircraft_id.clone();
        self.with_conn(move |conn| {
            let query = aircraft_query(&aircraft_id)
                .order(utilization_snapshots::snapshot_date.desc());
            load_optional(conn, query, "latest_snapshot")
        })
        .await
    }
}
