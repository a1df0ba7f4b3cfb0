//! Day-over-day utilization deltas.
//!
//! A delta is the plain field-wise difference between two snapshots of the
//! same aircraft. No clamping is applied: a negative delta means the stored
//! history is inconsistent and is surfaced as-is.

use chrono::NaiveDate;
use qtty::Hours;
use serde::Serialize;

use crate::api::AircraftId;
use crate::models::UtilizationSnapshot;

/// Hours/cycles flown by one engine position between two snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineDelta {
    pub position: u8,
    pub hours: Hours,
    pub cycles: i64,
}

/// Difference between a snapshot and its chronological predecessor.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UtilizationDelta {
    pub aircraft_id: AircraftId,
    /// Date of the later snapshot.
    pub date: NaiveDate,
    pub previous_date: NaiveDate,
    pub flight_hours: Hours,
    pub flight_cycles: i64,
    /// Only positions present in both snapshots.
    pub engines: Vec<EngineDelta>,
    pub apu_hours: Hours,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apu_cycles: Option<i64>,
}

impl UtilizationDelta {
    /// True when any counter moved backwards.
    pub fn has_negative(&self) -> bool {
        self.flight_hours.value() < 0.0
            || self.flight_cycles < 0
            || self.apu_hours.value() < 0.0
            || self.apu_cycles.is_some_and(|c| c < 0)
            || self
                .engines
                .iter()
                .any(|e| e.hours.value() < 0.0 || e.cycles < 0)
    }

    pub fn engine(&self, position: u8) -> Option<&EngineDelta> {
        self.engines.iter().find(|e| e.position == position)
    }
}

/// Field-wise `current - previous`.
///
/// The caller guarantees both snapshots belong to the same aircraft and that
/// `previous` is the earlier one; neither is re-checked here.
pub fn compute_delta(
    current: &UtilizationSnapshot,
    previous: &UtilizationSnapshot,
) -> UtilizationDelta {
    let now = &current.counters;
    let then = &previous.counters;

    let engines = now
        .engines
        .iter()
        .filter_map(|(position, engine)| {
            then.engines.get(position).map(|earlier| EngineDelta {
                position,
                hours: hours_between(earlier.hours, engine.hours),
                cycles: engine.cycles - earlier.cycles,
            })
        })
        .collect();

    let apu_cycles = match (now.apu_cycles, then.apu_cycles) {
        (Some(a), Some(b)) => Some(a - b),
        _ => None,
    };

    UtilizationDelta {
        aircraft_id: current.aircraft_id.clone(),
        date: current.date,
        previous_date: previous.date,
        flight_hours: hours_between(then.airframe_hours_total, now.airframe_hours_total),
        flight_cycles: now.airframe_cycles_total - then.airframe_cycles_total,
        engines,
        apu_hours: hours_between(then.apu_hours, now.apu_hours),
        apu_cycles,
    }
}

fn hours_between(earlier: Hours, later: Hours) -> Hours {
    Hours::new(later.value() - earlier.value())
}

/// Deltas between chronologically adjacent snapshots of one aircraft.
///
/// Input order is not trusted: snapshots are sorted by date first. Returns
/// exactly `max(0, n - 1)` deltas, each dated with the later snapshot.
pub fn daily_deltas(snapshots: &[UtilizationSnapshot]) -> Vec<UtilizationDelta> {
    if snapshots.len() < 2 {
        return Vec::new();
    }

    let mut ordered: Vec<&UtilizationSnapshot> = snapshots.iter().collect();
    ordered.sort_by_key(|s| s.date);

    ordered
        .windows(2)
        .map(|pair| compute_delta(pair[1], pair[0]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::SnapshotId;
    use crate::models::{EngineCounters, EngineSet, UtilizationCounters};
    use chrono::Utc;
    use proptest::prelude::*;

    fn snap(day: u32, hours: f64, cycles: i64) -> UtilizationSnapshot {
        let now = Utc::now();
        UtilizationSnapshot {
            id: SnapshotId::new(day as i64),
            aircraft_id: AircraftId::parse("9H-AEK").unwrap(),
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            counters: UtilizationCounters {
                airframe_hours_total: Hours::new(hours),
                airframe_cycles_total: cycles,
                engines: EngineSet::twin(
                    EngineCounters::new(hours - 10.0, cycles),
                    EngineCounters::new(hours - 20.0, cycles),
                ),
                apu_hours: Hours::new(hours / 4.0),
                apu_cycles: None,
            },
            last_flight_date: None,
            updated_by: "tester".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_single_delta() {
        let delta = compute_delta(&snap(5, 108.0, 54), &snap(1, 100.0, 50));
        assert_eq!(delta.date, NaiveDate::from_ymd_opt(2024, 1, 5).unwrap());
        assert_eq!(delta.previous_date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(delta.flight_hours, Hours::new(8.0));
        assert_eq!(delta.flight_cycles, 4);
        assert_eq!(delta.engines.len(), 2);
        assert_eq!(delta.engine(2).unwrap().hours, Hours::new(8.0));
        assert_eq!(delta.apu_hours, Hours::new(2.0));
        assert_eq!(delta.apu_cycles, None);
        assert!(!delta.has_negative());
    }

    #[test]
    fn test_negative_delta_is_not_clamped() {
        let delta = compute_delta(&snap(2, 90.0, 50), &snap(1, 100.0, 50));
        assert_eq!(delta.flight_hours, Hours::new(-10.0));
        assert!(delta.has_negative());
    }

    #[test]
    fn test_optional_fields_omitted_unless_in_both() {
        let mut current = snap(2, 110.0, 51);
        let previous = snap(1, 100.0, 50);
        current.counters.engines = EngineSet::new(vec![
            EngineCounters::new(100.0, 51),
            EngineCounters::new(90.0, 51),
            EngineCounters::new(5.0, 1),
        ])
        .unwrap();
        current.counters.apu_cycles = Some(4);

        let delta = compute_delta(&current, &previous);
        assert_eq!(delta.engines.len(), 2);
        assert!(delta.engine(3).is_none());
        assert_eq!(delta.apu_cycles, None);

        let mut previous = previous;
        previous.counters.apu_cycles = Some(1);
        assert_eq!(compute_delta(&current, &previous).apu_cycles, Some(3));
    }

    #[test]
    fn test_daily_deltas_sorts_input() {
        let snapshots = vec![snap(3, 112.0, 56), snap(1, 100.0, 50), snap(2, 105.0, 52)];
        let deltas = daily_deltas(&snapshots);
        assert_eq!(deltas.len(), 2);
        assert_eq!(deltas[0].date.to_string(), "2024-01-02");
        assert_eq!(deltas[0].flight_hours, Hours::new(5.0));
        assert_eq!(deltas[1].date.to_string(), "2024-01-03");
        assert_eq!(deltas[1].flight_cycles, 4);
    }

    #[test]
    fn test_daily_deltas_needs_two_points() {
        assert!(daily_deltas(&[]).is_empty());
        assert!(daily_deltas(&[snap(1, 100.0, 50)]).is_empty());
    }

    #[test]
    fn test_delta_serialization_shape() {
        let delta = compute_delta(&snap(5, 108.0, 54), &snap(1, 100.0, 50));
        let json = serde_json::to_value(&delta).unwrap();
        assert_eq!(json["aircraftId"], "9H-AEK");
        assert_eq!(json["date"], "2024-01-05");
        assert_eq!(json["flightHours"], 8.0);
        assert!(json.get("apuCycles").is_none());
    }

    proptest! {
        #[test]
        fn prop_delta_count(n in 0usize..20) {
            let snapshots: Vec<UtilizationSnapshot> = (0..n)
                .map(|i| snap(i as u32 + 1, 100.0 + i as f64, 50 + i as i64))
                .collect();
            prop_assert_eq!(daily_deltas(&snapshots).len(), n.saturating_sub(1));
        }

        #[test]
        fn prop_delta_telescopes(
            a in 0u32..1_000,
            b in 0u32..1_000,
            c in 0u32..1_000,
            ca in 0i64..500,
            cb in 0i64..500,
            cc in 0i64..500,
        ) {
            // Quarter-hour readings keep the float arithmetic exact.
            let h = |q: u32| q as f64 * 0.25;
            let first = snap(1, h(a), ca);
            let second = snap(2, h(a + b), ca + cb);
            let third = snap(3, h(a + b + c), ca + cb + cc);

            let whole = compute_delta(&third, &first);
            let left = compute_delta(&second, &first);
            let right = compute_delta(&third, &second);

            prop_assert_eq!(whole.flight_hours.value(), left.flight_hours.value() + right.flight_hours.value());
            prop_assert_eq!(whole.flight_cycles, left.flight_cycles + right.flight_cycles);
            prop_assert_eq!(whole.apu_hours.value(), left.apu_hours.value() + right.apu_hours.value());
            for position in 1..=2u8 {
                let w = whole.engine(position).unwrap();
                let l = left.engine(position).unwrap();
                let r = right.engine(position).unwrap();
                prop_assert_eq!(w.hours.value(), l.hours.value() + r.hours.value());
                prop_assert_eq!(w.cycles, l.cycles + r.cycles);
            }
        }
    }
}
