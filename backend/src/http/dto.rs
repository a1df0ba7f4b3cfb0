//! Data Transfer Objects for the HTTP API.
//!
//! Snapshots travel as flat camelCase objects (`engine1Hours`, `engine3Cycles`,
//! ...) and dates as ISO strings. Request DTOs convert into domain values
//! here, so every input check happens before the service layer runs.

use chrono::{DateTime, NaiveDate, Utc};
use qtty::Hours;
use serde::{Deserialize, Serialize};

pub use crate::api::{PeriodAggregate, UtilizationDelta};
use crate::api::{
    parse_iso_date, AircraftId, DateRange, EngineCounters, EngineSet, NewSnapshot, Period,
    SnapshotCandidate, SnapshotFilter, SnapshotId, SnapshotPatch, UtilizationCounters,
    UtilizationSnapshot,
};
use crate::db::services::ImportReport;

// =============================================================================
// Conversion helpers
// =============================================================================

fn parse_aircraft(raw: &str) -> Result<AircraftId, String> {
    AircraftId::parse(raw).ok_or_else(|| "aircraftId must not be empty".to_string())
}

fn parse_date_field(name: &str, raw: &str) -> Result<NaiveDate, String> {
    parse_iso_date(raw).map_err(|e| format!("{}: {}", name, e))
}

fn parse_optional_date(name: &str, raw: Option<&str>) -> Result<Option<NaiveDate>, String> {
    raw.map(|value| parse_date_field(name, value)).transpose()
}

fn date_range(start: Option<&str>, end: Option<&str>) -> Result<DateRange, String> {
    DateRange::new(
        parse_optional_date("startDate", start)?,
        parse_optional_date("endDate", end)?,
    )
}

/// Build the engine set from per-position `(hours, cycles)` pairs.
///
/// Positions must be filled contiguously and each slot needs both values.
fn engines_from_slots(slots: [(Option<f64>, Option<i64>); 4]) -> Result<EngineSet, String> {
    let mut engines = Vec::with_capacity(slots.len());
    let mut gap: Option<usize> = None;
    for (idx, slot) in slots.into_iter().enumerate() {
        let position = idx + 1;
        match slot {
            (Some(hours), Some(cycles)) => {
                if let Some(missing) = gap {
                    return Err(format!(
                        "engine{} cannot be reported without engine{}",
                        position, missing
                    ));
                }
                engines.push(EngineCounters::new(hours, cycles));
            }
            (Some(_), None) => {
                return Err(format!(
                    "engine{}Cycles is required when engine{}Hours is present",
                    position, position
                ))
            }
            (None, Some(_)) => {
                return Err(format!(
                    "engine{}Hours is required when engine{}Cycles is present",
                    position, position
                ))
            }
            (None, None) => {
                gap.get_or_insert(position);
            }
        }
    }
    EngineSet::new(engines)
}

// =============================================================================
// Snapshot requests
// =============================================================================

/// Request body for recording one daily snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSnapshotRequest {
    pub aircraft_id: String,
    pub date: String,
    pub airframe_hours_total: f64,
    pub airframe_cycles_total: i64,
    pub engine1_hours: f64,
    pub engine1_cycles: i64,
    pub engine2_hours: f64,
    pub engine2_cycles: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine3_hours: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine3_cycles: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine4_hours: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine4_cycles: Option<i64>,
    pub apu_hours: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apu_cycles: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_flight_date: Option<String>,
}

impl CreateSnapshotRequest {
    /// Validate and convert into the insert payload.
    pub fn into_new_snapshot(self, updated_by: &str) -> Result<NewSnapshot, String> {
        let engines = engines_from_slots([
            (Some(self.engine1_hours), Some(self.engine1_cycles)),
            (Some(self.engine2_hours), Some(self.engine2_cycles)),
            (self.engine3_hours, self.engine3_cycles),
            (self.engine4_hours, self.engine4_cycles),
        ])?;

        let data = SnapshotCandidate {
            aircraft_id: parse_aircraft(&self.aircraft_id)?,
            date: parse_date_field("date", &self.date)?,
            counters: UtilizationCounters {
                airframe_hours_total: Hours::new(self.airframe_hours_total),
                airframe_cycles_total: self.airframe_cycles_total,
                engines,
                apu_hours: Hours::new(self.apu_hours),
                apu_cycles: self.apu_cycles,
            },
            last_flight_date: parse_optional_date(
                "lastFlightDate",
                self.last_flight_date.as_deref(),
            )?,
        };
        data.validate()?;

        Ok(NewSnapshot {
            data,
            updated_by: updated_by.to_string(),
        })
    }
}

/// Partial update body. Absent fields keep their stored value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateSnapshotRequest {
    pub date: Option<String>,
    pub airframe_hours_total: Option<f64>,
    pub airframe_cycles_total: Option<i64>,
    pub engine1_hours: Option<f64>,
    pub engine1_cycles: Option<i64>,
    pub engine2_hours: Option<f64>,
    pub engine2_cycles: Option<i64>,
    pub engine3_hours: Option<f64>,
    pub engine3_cycles: Option<i64>,
    pub engine4_hours: Option<f64>,
    pub engine4_cycles: Option<i64>,
    pub apu_hours: Option<f64>,
    pub apu_cycles: Option<i64>,
    pub last_flight_date: Option<String>,
}

impl UpdateSnapshotRequest {
    pub fn into_patch(self) -> Result<SnapshotPatch, String> {
        let hours = |value: Option<f64>| value.map(Hours::new);
        let patch = SnapshotPatch {
            date: parse_optional_date("date", self.date.as_deref())?,
            airframe_hours_total: hours(self.airframe_hours_total),
            airframe_cycles_total: self.airframe_cycles_total,
            engine_hours: [
                hours(self.engine1_hours),
                hours(self.engine2_hours),
                hours(self.engine3_hours),
                hours(self.engine4_hours),
            ],
            engine_cycles: [
                self.engine1_cycles,
                self.engine2_cycles,
                self.engine3_cycles,
                self.engine4_cycles,
            ],
            apu_hours: hours(self.apu_hours),
            apu_cycles: self.apu_cycles,
            last_flight_date: parse_optional_date(
                "lastFlightDate",
                self.last_flight_date.as_deref(),
            )?,
        };

        if patch.is_empty() {
            return Err("update contains no fields".to_string());
        }
        Ok(patch)
    }
}

/// Batch of snapshots to record in one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRequest {
    pub snapshots: Vec<CreateSnapshotRequest>,
}

impl ImportRequest {
    /// Convert every row; the first malformed row fails the whole request.
    pub fn into_new_snapshots(self, updated_by: &str) -> Result<Vec<NewSnapshot>, String> {
        if self.snapshots.is_empty() {
            return Err("snapshots must not be empty".to_string());
        }
        self.snapshots
            .into_iter()
            .enumerate()
            .map(|(index, row)| {
                row.into_new_snapshot(updated_by)
                    .map_err(|e| format!("row {}: {}", index, e))
            })
            .collect()
    }
}

// =============================================================================
// Query parameters
// =============================================================================

/// Query parameters for listing snapshots.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotQuery {
    #[serde(default)]
    pub aircraft_id: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
}

impl SnapshotQuery {
    pub fn to_filter(&self) -> Result<SnapshotFilter, String> {
        let aircraft_id = self
            .aircraft_id
            .as_deref()
            .map(parse_aircraft)
            .transpose()?;
        let range = date_range(self.start_date.as_deref(), self.end_date.as_deref())?;
        Ok(SnapshotFilter::new(aircraft_id, range))
    }
}

/// Query parameters for the aggregation endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateQuery {
    /// `day` (default), `month` or `year`
    #[serde(default)]
    pub period: Option<String>,
    #[serde(flatten)]
    pub filter: SnapshotQuery,
}

impl AggregateQuery {
    pub fn period(&self) -> Result<Period, String> {
        self.period
            .as_deref()
            .map(str::parse::<Period>)
            .transpose()
            .map(Option::unwrap_or_default)
    }
}

/// Query parameters for the delta endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeltaQuery {
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
}

impl DeltaQuery {
    pub fn to_range(&self) -> Result<DateRange, String> {
        date_range(self.start_date.as_deref(), self.end_date.as_deref())
    }
}

// =============================================================================
// Responses
// =============================================================================

/// A stored snapshot in its flat wire form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotDto {
    pub id: SnapshotId,
    pub aircraft_id: AircraftId,
    pub date: NaiveDate,
    pub airframe_hours_total: f64,
    pub airframe_cycles_total: i64,
    pub engine1_hours: f64,
    pub engine1_cycles: i64,
    pub engine2_hours: f64,
    pub engine2_cycles: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine3_hours: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine3_cycles: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine4_hours: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine4_cycles: Option<i64>,
    pub apu_hours: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apu_cycles: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_flight_date: Option<NaiveDate>,
    pub updated_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UtilizationSnapshot> for SnapshotDto {
    fn from(snapshot: UtilizationSnapshot) -> Self {
        let counters = &snapshot.counters;
        let engine = |position: u8| counters.engines.get(position).copied();
        // Engines 1 and 2 always exist in a valid EngineSet.
        let engine1 = engine(1).unwrap_or(EngineCounters::new(0.0, 0));
        let engine2 = engine(2).unwrap_or(EngineCounters::new(0.0, 0));

        Self {
            id: snapshot.id,
            aircraft_id: snapshot.aircraft_id.clone(),
            date: snapshot.date,
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
            last_flight_date: snapshot.last_flight_date,
            updated_by: snapshot.updated_by.clone(),
            created_at: snapshot.created_at,
            updated_at: snapshot.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotListResponse {
    pub snapshots: Vec<SnapshotDto>,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AircraftListResponse {
    pub aircraft: Vec<AircraftId>,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeltaListResponse {
    pub aircraft_id: AircraftId,
    pub deltas: Vec<UtilizationDelta>,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateResponse {
    pub period: Period,
    pub buckets: Vec<PeriodAggregate>,
}

/// Batch import result, tagged with a generated batch id for log correlation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResponse {
    pub batch_id: String,
    #[serde(flatten)]
    pub report: ImportReport,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn create_body() -> serde_json::Value {
        json!({
            "aircraftId": "9H-AEK",
            "date": "2024-01-02",
            "airframeHoursTotal": 100.5,
            "airframeCyclesTotal": 50,
            "engine1Hours": 90.0,
            "engine1Cycles": 45,
            "engine2Hours": 91.0,
            "engine2Cycles": 46,
            "apuHours": 20.0
        })
    }

    #[test]
    fn test_create_request_converts() {
        let request: CreateSnapshotRequest = serde_json::from_value(create_body()).unwrap();
        let snapshot = request.into_new_snapshot("ops").unwrap();
        assert_eq!(snapshot.updated_by, "ops");
        assert_eq!(snapshot.data.aircraft_id.as_str(), "9H-AEK");
        assert_eq!(snapshot.data.counters.engines.len(), 2);
        assert_eq!(snapshot.data.counters.apu_cycles, None);
    }

    #[test]
    fn test_create_request_accepts_rfc3339_date() {
        let mut body = create_body();
        body["date"] = json!("2024-01-02T23:30:00Z");
        let request: CreateSnapshotRequest = serde_json::from_value(body).unwrap();
        let snapshot = request.into_new_snapshot("ops").unwrap();
        assert_eq!(
            snapshot.data.date,
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()
        );
    }

    #[test]
    fn test_create_request_rejects_half_engine() {
        let mut body = create_body();
        body["engine3Hours"] = json!(10.0);
        let request: CreateSnapshotRequest = serde_json::from_value(body).unwrap();
        let err = request.into_new_snapshot("ops").unwrap_err();
        assert!(err.contains("engine3Cycles"));
    }

    #[test]
    fn test_create_request_rejects_engine4_without_engine3() {
        let mut body = create_body();
        body["engine4Hours"] = json!(10.0);
        body["engine4Cycles"] = json!(5);
        let request: CreateSnapshotRequest = serde_json::from_value(body).unwrap();
        assert!(request.into_new_snapshot("ops").is_err());
    }

    #[test]
    fn test_create_request_rejects_blank_aircraft_and_bad_date() {
        let mut body = create_body();
        body["aircraftId"] = json!("  ");
        let request: CreateSnapshotRequest = serde_json::from_value(body).unwrap();
        assert!(request.into_new_snapshot("ops").is_err());

        let mut body = create_body();
        body["date"] = json!("02/01/2024");
        let request: CreateSnapshotRequest = serde_json::from_value(body).unwrap();
        assert!(request.into_new_snapshot("ops").unwrap_err().contains("date"));
    }

    #[test]
    fn test_create_request_rejects_negative_counter() {
        let mut body = create_body();
        body["airframeCyclesTotal"] = json!(-3);
        let request: CreateSnapshotRequest = serde_json::from_value(body).unwrap();
        assert!(request.into_new_snapshot("ops").is_err());
    }

    #[test]
    fn test_update_request_into_patch() {
        let request: UpdateSnapshotRequest =
            serde_json::from_value(json!({"engine2Cycles": 47, "date": "2024-01-03"})).unwrap();
        let patch = request.into_patch().unwrap();
        assert_eq!(patch.engine_cycles, [None, Some(47), None, None]);
        assert_eq!(patch.date, NaiveDate::from_ymd_opt(2024, 1, 3));
    }

    #[test]
    fn test_empty_update_rejected() {
        let request: UpdateSnapshotRequest = serde_json::from_value(json!({})).unwrap();
        assert!(request.into_patch().is_err());
    }

    #[test]
    fn test_query_filters() {
        let query = SnapshotQuery {
            aircraft_id: Some("X".to_string()),
            start_date: Some("2024-01-01".to_string()),
            end_date: None,
        };
        let filter = query.to_filter().unwrap();
        assert_eq!(filter.aircraft_id, AircraftId::parse("X"));
        assert_eq!(filter.range.start, NaiveDate::from_ymd_opt(2024, 1, 1));

        let reversed = SnapshotQuery {
            aircraft_id: None,
            start_date: Some("2024-02-01".to_string()),
            end_date: Some("2024-01-01".to_string()),
        };
        assert!(reversed.to_filter().is_err());
    }

    #[test]
    fn test_aggregate_query_period_default() {
        assert_eq!(AggregateQuery::default().period().unwrap(), Period::Day);
        let query = AggregateQuery {
            period: Some("month".to_string()),
            ..Default::default()
        };
        assert_eq!(query.period().unwrap(), Period::Month);
        let bad = AggregateQuery {
            period: Some("week".to_string()),
            ..Default::default()
        };
        assert!(bad.period().is_err());
    }

    #[test]
    fn test_snapshot_dto_flattens_engines() {
        let request: CreateSnapshotRequest = serde_json::from_value(create_body()).unwrap();
        let new = request.into_new_snapshot("ops").unwrap();
        let now = Utc::now();
        let stored = UtilizationSnapshot {
            id: SnapshotId::new(7),
            aircraft_id: new.data.aircraft_id,
            date: new.data.date,
            counters: new.data.counters,
            last_flight_date: None,
            updated_by: new.updated_by,
            created_at: now,
            updated_at: now,
        };

        let json = serde_json::to_value(SnapshotDto::from(stored)).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["engine2Cycles"], 46);
        assert_eq!(json["date"], "2024-01-02");
        assert!(json.get("engine3Hours").is_none());
        assert!(json.get("apuCycles").is_none());
    }
}
