//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Mutex;

use chrono::NaiveDate;
use fleet_utilization::api::{
    AircraftId, EngineCounters, EngineSet, NewSnapshot, SnapshotCandidate, UtilizationCounters,
};
use qtty::Hours;
use serde_json::{json, Value};

static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Runs `f` with environment variables temporarily modified.
///
/// Restores the previous values on unwind and serializes access to the
/// process environment across parallel tests.
///
/// `changes` is a list of `(key, value)` pairs: `Some(v)` sets, `None` removes.
pub fn with_scoped_env<F, R>(changes: &[(&str, Option<&str>)], f: F) -> R
where
    F: FnOnce() -> R,
{
    let _lock = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let _guard = EnvGuard::apply(changes);
    f()
}

/// Every variable the repository and server configuration read.
pub const CONFIG_VARS: &[&str] = &[
    "REPOSITORY_TYPE",
    "REPOSITORY_CONFIG",
    "DATABASE_URL",
    "PG_DATABASE_URL",
    "HOST",
    "PORT",
];

/// Clear every configuration variable, then apply `changes`.
pub fn with_clean_env<F, R>(changes: &[(&str, Option<&str>)], f: F) -> R
where
    F: FnOnce() -> R,
{
    let mut all: Vec<(&str, Option<&str>)> = CONFIG_VARS.iter().map(|k| (*k, None)).collect();
    all.extend_from_slice(changes);
    with_scoped_env(&all, f)
}

struct EnvGuard {
    saved: Vec<(String, Option<String>)>,
}

impl EnvGuard {
    fn apply(changes: &[(&str, Option<&str>)]) -> Self {
        let keys: HashSet<&str> = changes.iter().map(|(k, _)| *k).collect();
        let saved = keys
            .into_iter()
            .map(|k| (k.to_string(), std::env::var(k).ok()))
            .collect();

        for (k, v) in changes {
            match v {
                Some(val) => std::env::set_var(k, val),
                None => std::env::remove_var(k),
            }
        }

        Self { saved }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (k, v) in self.saved.drain(..) {
            match v {
                Some(val) => std::env::set_var(&k, val),
                None => std::env::remove_var(&k),
            }
        }
    }
}

// ==================== Snapshot fixtures ====================

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn aircraft(id: &str) -> AircraftId {
    AircraftId::parse(id).unwrap()
}

/// Twin-engine snapshot whose counters all derive from `hours`.
pub fn twin_snapshot(id: &str, day: &str, hours: f64) -> NewSnapshot {
    let cycles = (hours / 2.0) as i64;
    NewSnapshot {
        data: SnapshotCandidate {
            aircraft_id: aircraft(id),
            date: date(day),
            counters: UtilizationCounters {
                airframe_hours_total: Hours::new(hours),
                airframe_cycles_total: cycles,
                engines: EngineSet::twin(
                    EngineCounters::new(hours, cycles),
                    EngineCounters::new(hours, cycles),
                ),
                apu_hours: Hours::new(hours / 10.0),
                apu_cycles: None,
            },
            last_flight_date: None,
        },
        updated_by: "fixture".to_string(),
    }
}

/// JSON create body in the API's flat camelCase shape.
pub fn snapshot_body(id: &str, day: &str, hours: f64) -> Value {
    let cycles = (hours / 2.0) as i64;
    json!({
        "aircraftId": id,
        "date": day,
        "airframeHoursTotal": hours,
        "airframeCyclesTotal": cycles,
        "engine1Hours": hours,
        "engine1Cycles": cycles,
        "engine2Hours": hours,
        "engine2Cycles": cycles,
        "apuHours": hours / 10.0,
    })
}
