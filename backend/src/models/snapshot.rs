//! Utilization snapshot domain model.
//!
//! A snapshot is one day's reading of an aircraft's cumulative counters.
//! Engine slots are held in an [`EngineSet`] (two to four positions) and every
//! counter can be enumerated uniformly through [`UtilizationCounters::readings`],
//! which is what the validator and delta calculator iterate over.

use chrono::{DateTime, NaiveDate, Utc};
use qtty::Hours;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

use crate::api::{AircraftId, SnapshotId};
use crate::models::time::DateRange;

/// Fewest engine slots a snapshot may carry.
pub const MIN_ENGINES: usize = 2;
/// Most engine slots a snapshot may carry.
pub const MAX_ENGINES: usize = 4;

/// Cumulative counters of a single engine position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngineCounters {
    pub hours: Hours,
    pub cycles: i64,
}

impl EngineCounters {
    pub fn new(hours: f64, cycles: i64) -> Self {
        Self {
            hours: Hours::new(hours),
            cycles,
        }
    }
}

/// Engine slots in position order; index 0 is engine 1.
///
/// Always holds between [`MIN_ENGINES`] and [`MAX_ENGINES`] entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<EngineCounters>", into = "Vec<EngineCounters>")]
pub struct EngineSet(Vec<EngineCounters>);

impl EngineSet {
    pub fn new(engines: Vec<EngineCounters>) -> Result<Self, String> {
        if engines.len() < MIN_ENGINES || engines.len() > MAX_ENGINES {
            return Err(format!(
                "expected between {} and {} engines, got {}",
                MIN_ENGINES,
                MAX_ENGINES,
                engines.len()
            ));
        }
        Ok(Self(engines))
    }

    /// Two-engine configuration.
    pub fn twin(engine1: EngineCounters, engine2: EngineCounters) -> Self {
        Self(vec![engine1, engine2])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Engine at a 1-based position.
    pub fn get(&self, position: u8) -> Option<&EngineCounters> {
        (position as usize)
            .checked_sub(1)
            .and_then(|idx| self.0.get(idx))
    }

    /// Iterate `(position, counters)` pairs with 1-based positions.
    pub fn iter(&self) -> impl Iterator<Item = (u8, &EngineCounters)> {
        self.0
            .iter()
            .enumerate()
            .map(|(idx, engine)| ((idx + 1) as u8, engine))
    }

    pub fn as_slice(&self) -> &[EngineCounters] {
        &self.0
    }
}

impl TryFrom<Vec<EngineCounters>> for EngineSet {
    type Error = String;

    fn try_from(engines: Vec<EngineCounters>) -> Result<Self, Self::Error> {
        Self::new(engines)
    }
}

impl From<EngineSet> for Vec<EngineCounters> {
    fn from(set: EngineSet) -> Self {
        set.0
    }
}

/// One cumulative counter, named the way the API names it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CounterField {
    AirframeHours,
    AirframeCycles,
    EngineHours(u8),
    EngineCycles(u8),
    ApuHours,
    ApuCycles,
}

impl CounterField {
    pub fn name(&self) -> String {
        match self {
            CounterField::AirframeHours => "airframeHoursTotal".to_string(),
            CounterField::AirframeCycles => "airframeCyclesTotal".to_string(),
            CounterField::EngineHours(n) => format!("engine{}Hours", n),
            CounterField::EngineCycles(n) => format!("engine{}Cycles", n),
            CounterField::ApuHours => "apuHours".to_string(),
            CounterField::ApuCycles => "apuCycles".to_string(),
        }
    }

    /// Fields that may legitimately be missing from a snapshot.
    pub fn is_optional(&self) -> bool {
        match self {
            CounterField::EngineHours(n) | CounterField::EngineCycles(n) => {
                (*n as usize) > MIN_ENGINES
            }
            CounterField::ApuCycles => true,
            _ => false,
        }
    }
}

impl fmt::Display for CounterField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl Serialize for CounterField {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Value of a single counter reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CounterValue {
    Hours(Hours),
    Cycles(i64),
}

impl CounterValue {
    pub fn as_f64(&self) -> f64 {
        match self {
            CounterValue::Hours(h) => h.value(),
            CounterValue::Cycles(c) => *c as f64,
        }
    }

    pub fn is_less_than(&self, other: &CounterValue) -> bool {
        match (self, other) {
            (CounterValue::Cycles(a), CounterValue::Cycles(b)) => a < b,
            _ => self.as_f64() < other.as_f64(),
        }
    }
}

impl fmt::Display for CounterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CounterValue::Hours(h) => write!(f, "{}", h.value()),
            CounterValue::Cycles(c) => write!(f, "{}", c),
        }
    }
}

impl Serialize for CounterValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CounterValue::Hours(h) => serializer.serialize_f64(h.value()),
            CounterValue::Cycles(c) => serializer.serialize_i64(*c),
        }
    }
}

/// Full set of cumulative counters carried by a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UtilizationCounters {
    pub airframe_hours_total: Hours,
    pub airframe_cycles_total: i64,
    pub engines: EngineSet,
    pub apu_hours: Hours,
    pub apu_cycles: Option<i64>,
}

impl UtilizationCounters {
    /// Every present counter in a fixed order: airframe, engines by position, APU.
    pub fn readings(&self) -> Vec<(CounterField, CounterValue)> {
        let mut readings = Vec::with_capacity(4 + self.engines.len() * 2);
        readings.push((
            CounterField::AirframeHours,
            CounterValue::Hours(self.airframe_hours_total),
        ));
        readings.push((
            CounterField::AirframeCycles,
            CounterValue::Cycles(self.airframe_cycles_total),
        ));
        for (position, engine) in self.engines.iter() {
            readings.push((
                CounterField::EngineHours(position),
                CounterValue::Hours(engine.hours),
            ));
            readings.push((
                CounterField::EngineCycles(position),
                CounterValue::Cycles(engine.cycles),
            ));
        }
        readings.push((CounterField::ApuHours, CounterValue::Hours(self.apu_hours)));
        if let Some(cycles) = self.apu_cycles {
            readings.push((CounterField::ApuCycles, CounterValue::Cycles(cycles)));
        }
        readings
    }

    /// Reading for one field, `None` when the field is absent.
    pub fn reading(&self, field: CounterField) -> Option<CounterValue> {
        match field {
            CounterField::AirframeHours => Some(CounterValue::Hours(self.airframe_hours_total)),
            CounterField::AirframeCycles => Some(CounterValue::Cycles(self.airframe_cycles_total)),
            CounterField::EngineHours(n) => {
                self.engines.get(n).map(|e| CounterValue::Hours(e.hours))
            }
            CounterField::EngineCycles(n) => {
                self.engines.get(n).map(|e| CounterValue::Cycles(e.cycles))
            }
            CounterField::ApuHours => Some(CounterValue::Hours(self.apu_hours)),
            CounterField::ApuCycles => self.apu_cycles.map(CounterValue::Cycles),
        }
    }

    /// Reject negative or non-finite readings.
    pub fn validate(&self) -> Result<(), String> {
        let mut problems = Vec::new();
        for (field, value) in self.readings() {
            let raw = value.as_f64();
            if !raw.is_finite() {
                problems.push(format!("{} must be a finite number", field));
            } else if raw < 0.0 {
                problems.push(format!("{} ({}) must not be negative", field, value));
            }
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems.join("; "))
        }
    }
}

/// A stored daily utilization snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UtilizationSnapshot {
    pub id: SnapshotId,
    pub aircraft_id: AircraftId,
    pub date: NaiveDate,
    pub counters: UtilizationCounters,
    pub last_flight_date: Option<NaiveDate>,
    pub updated_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UtilizationSnapshot {
    /// The identity-free part of the snapshot, as the validator sees it.
    pub fn candidate(&self) -> SnapshotCandidate {
        SnapshotCandidate {
            aircraft_id: self.aircraft_id.clone(),
            date: self.date,
            counters: self.counters.clone(),
            last_flight_date: self.last_flight_date,
        }
    }
}

/// Snapshot fields submitted for a create or produced by merging a patch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotCandidate {
    pub aircraft_id: AircraftId,
    pub date: NaiveDate,
    pub counters: UtilizationCounters,
    pub last_flight_date: Option<NaiveDate>,
}

impl SnapshotCandidate {
    pub fn validate(&self) -> Result<(), String> {
        self.counters.validate()
    }
}

/// Insert payload handed to the repository.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSnapshot {
    pub data: SnapshotCandidate,
    pub updated_by: String,
}

/// Selects snapshots by aircraft and inclusive date range.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapshotFilter {
    pub aircraft_id: Option<AircraftId>,
    pub range: DateRange,
}

impl SnapshotFilter {
    pub fn new(aircraft_id: Option<AircraftId>, range: DateRange) -> Self {
        Self { aircraft_id, range }
    }

    /// Every snapshot of one aircraft.
    pub fn for_aircraft(aircraft_id: AircraftId) -> Self {
        Self {
            aircraft_id: Some(aircraft_id),
            range: DateRange::unbounded(),
        }
    }

    pub fn with_range(mut self, range: DateRange) -> Self {
        self.range = range;
        self
    }

    pub fn matches(&self, snapshot: &UtilizationSnapshot) -> bool {
        self.aircraft_id
            .as_ref()
            .map_or(true, |id| *id == snapshot.aircraft_id)
            && self.range.contains(snapshot.date)
    }
}

/// Partial update. Engine patches are per position (index 0 is engine 1).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapshotPatch {
    pub date: Option<NaiveDate>,
    pub airframe_hours_total: Option<Hours>,
    pub airframe_cycles_total: Option<i64>,
    pub engine_hours: [Option<Hours>; MAX_ENGINES],
    pub engine_cycles: [Option<i64>; MAX_ENGINES],
    pub apu_hours: Option<Hours>,
    pub apu_cycles: Option<i64>,
    pub last_flight_date: Option<NaiveDate>,
}

impl SnapshotPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Merge the patch over an existing snapshot.
    ///
    /// A patch may add engine slot 3 or 4 when it supplies both hours and
    /// cycles for that slot; it never removes a slot.
    pub fn apply(&self, base: &UtilizationSnapshot) -> Result<SnapshotCandidate, String> {
        let current = &base.counters;

        let mut engines: Vec<EngineCounters> = Vec::with_capacity(MAX_ENGINES);
        for idx in 0..MAX_ENGINES {
            let position = (idx + 1) as u8;
            let hours = self.engine_hours[idx];
            let cycles = self.engine_cycles[idx];
            match current.engines.get(position) {
                Some(existing) => engines.push(EngineCounters {
                    hours: hours.unwrap_or(existing.hours),
                    cycles: cycles.unwrap_or(existing.cycles),
                }),
                None => match (hours, cycles) {
                    (Some(hours), Some(cycles)) => {
                        if engines.len() != idx {
                            return Err(format!(
                                "engine{} cannot be added without engine{}",
                                position,
                                position - 1
                            ));
                        }
                        engines.push(EngineCounters { hours, cycles });
                    }
                    (Some(_), None) => {
                        return Err(format!(
                            "engine{}Cycles is required when adding engine {}",
                            position, position
                        ))
                    }
                    (None, Some(_)) => {
                        return Err(format!(
                            "engine{}Hours is required when adding engine {}",
                            position, position
                        ))
                    }
                    (None, None) => {}
                },
            }
        }

        let counters = UtilizationCounters {
            airframe_hours_total: self
                .airframe_hours_total
                .unwrap_or(current.airframe_hours_total),
            airframe_cycles_total: self
                .airframe_cycles_total
                .unwrap_or(current.airframe_cycles_total),
            engines: EngineSet::new(engines)?,
            apu_hours: self.apu_hours.unwrap_or(current.apu_hours),
            apu_cycles: self.apu_cycles.or(current.apu_cycles),
        };

        let candidate = SnapshotCandidate {
            aircraft_id: base.aircraft_id.clone(),
            date: self.date.unwrap_or(base.date),
            counters,
            last_flight_date: self.last_flight_date.or(base.last_flight_date),
        };
        candidate.validate()?;
        Ok(candidate)
    }
}
