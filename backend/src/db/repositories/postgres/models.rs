use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use qtty::Hours;

use super::schema::utilization_snapshots;
use crate::api::{
    AircraftId, EngineCounters, EngineSet, SnapshotCandidate, SnapshotId, UtilizationCounters,
    UtilizationSnapshot,
};
use crate::db::repository::{ErrorContext, RepositoryError, RepositoryResult};

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = utilization_snapshots)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct SnapshotRow {
    pub snapshot_id: i64,
    pub aircraft_id: String,
    pub snapshot_date: NaiveDate,
    pub airframe_hours_total: f64,
    pub airframe_cycles_total: i64,
    pub engine1_hours: f64,
    pub engine1_cycles: i64,
    pub engine2_hours: f64,
    pub engine2_cycles: i64,
    pub engine3_hours: Option<f64>,
    pub engine3_cycles: Option<i64>,
    pub engine4_hours: Option<f64>,
    pub engine4_cycles: Option<i64>,
    pub apu_hours: f64,
    pub apu_cycles: Option<i64>,
    pub last_flight_date: Option<NaiveDate>,
    pub updated_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Column values shared by inserts and updates.
#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = utilization_snapshots)]
#[diesel(treat_none_as_null = true)]
pub struct SnapshotValues {
    pub aircraft_id: String,
    pub snapshot_date: NaiveDate,
    pub airframe_hours_total: f64,
    pub airframe_cycles_total: i64,
    pub engine1_hours: f64,
    pub engine1_cycles: i64,
    pub engine2_hours: f64,
    pub engine2_cycles: i64,
    pub engine3_hours: Option<f64>,
    pub engine3_cycles: Option<i64>,
    pub engine4_hours: Option<f64>,
    pub engine4_cycles: Option<i64>,
    pub apu_hours: f64,
    pub apu_cycles: Option<i64>,
    pub last_flight_date: Option<NaiveDate>,
    pub updated_by: String,
}

impl SnapshotValues {
    pub fn from_candidate(candidate: &SnapshotCandidate, updated_by: &str) -> RepositoryResult<Self> {
        let counters = &candidate.counters;
        let engine = |position: u8| counters.engines.get(position);
        let required = |position: u8| {
            engine(position).ok_or_else(|| {
                RepositoryError::validation(format!(
                    "engine{} is required for aircraft {}",
                    position, candidate.aircraft_id
                ))
            })
        };
        let engine1 = required(1)?;
        let engine2 = required(2)?;

        Ok(Self {
            aircraft_id: candidate.aircraft_id.as_str().to_string(),
            snapshot_date: candidate.date,
            airframe_hours_total: counters.airframe_hours_total.value(),
            airframe_cycles_total: counters.airframe_cycles_total,
            engine1_hours: engine1.hours.value(),
            engine1_cycles: engine1.cycles,
            engine2_hours: engine2.hours.value(),
            engine2_cycles: engine2.cycles,
            engine3_hours: engine(3).map(|e| e.hours.value()),
            engine3_cycles: engine(3).map(|e| e.cycles),
            engine4_hours: engine(4).map(|e| e.hours.value()),
            engine4_cycles: engine(4).map(|e| e.cycles),
            apu_hours: counters.apu_hours.value(),
            apu_cycles: counters.apu_cycles,
            last_flight_date: candidate.last_flight_date,
            updated_by: updated_by.to_string(),
        })
    }
}

fn optional_engine(hours: Option<f64>, cycles: Option<i64>) -> Option<EngineCounters> {
    match (hours, cycles) {
        (Some(h), Some(c)) => Some(EngineCounters::new(h, c)),
        _ => None,
    }
}

impl TryFrom<SnapshotRow> for UtilizationSnapshot {
    type Error = RepositoryError;

    fn try_from(row: SnapshotRow) -> Result<Self, Self::Error> {
        let context = || {
            ErrorContext::new("decode_snapshot")
                .with_entity("snapshot")
                .with_entity_id(row.snapshot_id)
        };

        let aircraft_id = AircraftId::parse(&row.aircraft_id).ok_or_else(|| {
            RepositoryError::internal_with_context("Stored aircraft id is empty", context())
        })?;

        let mut engines = vec![
            EngineCounters::new(row.engine1_hours, row.engine1_cycles),
            EngineCounters::new(row.engine2_hours, row.engine2_cycles),
        ];
        if let Some(engine3) = optional_engine(row.engine3_hours, row.engine3_cycles) {
            engines.push(engine3);
            if let Some(engine4) = optional_engine(row.engine4_hours, row.engine4_cycles) {
                engines.push(engine4);
            }
        }
        let engines = EngineSet::new(engines)
            .map_err(|e| RepositoryError::internal_with_context(e, context()))?;

        Ok(UtilizationSnapshot {
            id: SnapshotId::new(row.snapshot_id),
            aircraft_id,
            date: row.snapshot_date,
            counters: UtilizationCounters {
                airframe_hours_total: Hours::new(row.airframe_hours_total),
                airframe_cycles_total: row.airframe_cycles_total,
                engines,
                apu_hours: Hours::new(row.apu_hours),
                apu_cycles: row.apu_cycles,
            },
            last_flight_date: row.last_flight_date,
            updated_by: row.updated_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub fn rows_to_snapshots(rows: Vec<SnapshotRow>) -> RepositoryResult<Vec<UtilizationSnapshot>> {
    rows.into_iter().map(UtilizationSnapshot::try_from).collect()
}
