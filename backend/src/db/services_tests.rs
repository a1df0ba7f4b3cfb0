use chrono::NaiveDate;
use qtty::Hours;

use super::repositories::LocalRepository;
use super::services::*;
use crate::api::{
    AircraftId, DateRange, EngineCounters, EngineSet, NewSnapshot, Period, SnapshotCandidate,
    SnapshotFilter, SnapshotId, SnapshotPatch, UtilizationCounters,
};

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn aircraft(id: &str) -> AircraftId {
    AircraftId::parse(id).unwrap()
}

fn counters(hours: f64) -> UtilizationCounters {
    UtilizationCounters {
        airframe_hours_total: Hours::new(hours),
        airframe_cycles_total: (hours / 2.0) as i64,
        engines: EngineSet::twin(
            EngineCounters::new(hours, (hours / 2.0) as i64),
            EngineCounters::new(hours, (hours / 2.0) as i64),
        ),
        apu_hours: Hours::new(hours / 10.0),
        apu_cycles: None,
    }
}

fn new_snapshot(id: &str, day: &str, hours: f64) -> NewSnapshot {
    NewSnapshot {
        data: SnapshotCandidate {
            aircraft_id: aircraft(id),
            date: date(day),
            counters: counters(hours),
            last_flight_date: None,
        },
        updated_by: "tester".to_string(),
    }
}

async fn seed(repo: &LocalRepository, rows: &[(&str, &str, f64)]) -> Vec<SnapshotId> {
    let mut ids = Vec::new();
    for (id, day, hours) in rows {
        let stored = create_snapshot(repo, new_snapshot(id, day, *hours))
            .await
            .unwrap();
        ids.push(stored.id);
    }
    ids
}

// ==================== create ====================

#[tokio::test]
async fn test_create_rejects_lower_airframe_hours() {
    let repo = LocalRepository::new();
    seed(&repo, &[("X", "2024-01-01", 100.0)]).await;

    let mut candidate = new_snapshot("X", "2024-01-02", 100.0);
    candidate.data.counters.airframe_hours_total = Hours::new(99.0);
    let err = create_snapshot(&repo, candidate).await.unwrap_err();

    match err {
        UtilizationError::MonotonicViolation(v) => {
            assert_eq!(
                v.messages(),
                vec!["airframeHoursTotal (99) cannot be less than previous value (100)"]
            );
        }
        other => panic!("expected monotonic violation, got {:?}", other),
    }
    assert_eq!(repo.snapshot_count(), 1);
}

#[tokio::test]
async fn test_create_accepts_unchanged_counters() {
    let repo = LocalRepository::new();
    seed(&repo, &[("X", "2024-01-01", 100.0)]).await;

    let stored = create_snapshot(&repo, new_snapshot("X", "2024-01-02", 100.0))
        .await
        .unwrap();
    assert_eq!(stored.date, date("2024-01-02"));
    assert_eq!(stored.updated_by, "tester");
}

#[tokio::test]
async fn test_create_duplicate_day_rejected_regardless_of_values() {
    let repo = LocalRepository::new();
    seed(&repo, &[("X", "2024-01-01", 100.0)]).await;

    let err = create_snapshot(&repo, new_snapshot("X", "2024-01-01", 500.0))
        .await
        .unwrap_err();
    assert!(matches!(err, UtilizationError::DuplicateSnapshot { .. }));
    assert_eq!(err.code(), "DUPLICATE_SNAPSHOT");
}

#[tokio::test]
async fn test_create_with_absent_third_engine_skips_that_slot() {
    let repo = LocalRepository::new();
    let mut first = new_snapshot("X", "2024-01-01", 100.0);
    first.data.counters.engines = EngineSet::new(vec![
        EngineCounters::new(100.0, 50),
        EngineCounters::new(100.0, 50),
        EngineCounters::new(100.0, 50),
    ])
    .unwrap();
    create_snapshot(&repo, first).await.unwrap();

    // Twin-engine candidate: engine 3 is missing, not decreasing.
    let second = new_snapshot("X", "2024-01-02", 101.0);
    assert!(create_snapshot(&repo, second).await.is_ok());
}

#[tokio::test]
async fn test_create_first_snapshot_always_accepted() {
    let repo = LocalRepository::new();
    let stored = create_snapshot(&repo, new_snapshot("X", "2024-01-01", 0.0))
        .await
        .unwrap();
    assert_eq!(stored.id, SnapshotId::new(1));
}

#[tokio::test]
async fn test_create_back_dated_must_not_exceed_successor() {
    let repo = LocalRepository::new();
    seed(&repo, &[("X", "2024-01-01", 100.0), ("X", "2024-01-10", 110.0)]).await;

    let err = create_snapshot(&repo, new_snapshot("X", "2024-01-05", 120.0))
        .await
        .unwrap_err();
    let UtilizationError::MonotonicViolation(v) = err else {
        panic!("expected monotonic violation");
    };
    assert!(v
        .messages()
        .contains(&"airframeHoursTotal (110) cannot be less than previous value (120)".to_string()));

    assert!(create_snapshot(&repo, new_snapshot("X", "2024-01-05", 105.0))
        .await
        .is_ok());
}

#[tokio::test]
async fn test_create_rejects_negative_counter() {
    let repo = LocalRepository::new();
    let mut candidate = new_snapshot("X", "2024-01-01", 10.0);
    candidate.data.counters.apu_hours = Hours::new(-1.0);
    let err = create_snapshot(&repo, candidate).await.unwrap_err();
    assert!(matches!(err, UtilizationError::InvalidInput(_)));
}

#[tokio::test]
async fn test_aircraft_chains_are_independent() {
    let repo = LocalRepository::new();
    seed(&repo, &[("X", "2024-01-01", 500.0)]).await;
    assert!(create_snapshot(&repo, new_snapshot("Y", "2024-01-02", 10.0))
        .await
        .is_ok());
}

// ==================== update ====================

#[tokio::test]
async fn test_update_validates_against_both_neighbours() {
    let repo = LocalRepository::new();
    let ids = seed(
        &repo,
        &[
            ("X", "2024-01-01", 100.0),
            ("X", "2024-01-02", 105.0),
            ("X", "2024-01-03", 110.0),
        ],
    )
    .await;

    let too_high = SnapshotPatch {
        airframe_hours_total: Some(Hours::new(115.0)),
        ..Default::default()
    };
    let err = update_snapshot(&repo, ids[1], &too_high, "editor")
        .await
        .unwrap_err();
    assert!(matches!(err, UtilizationError::MonotonicViolation(_)));

    let too_low = SnapshotPatch {
        airframe_hours_total: Some(Hours::new(95.0)),
        ..Default::default()
    };
    assert!(update_snapshot(&repo, ids[1], &too_low, "editor")
        .await
        .is_err());

    let fine = SnapshotPatch {
        airframe_hours_total: Some(Hours::new(108.0)),
        ..Default::default()
    };
    let updated = update_snapshot(&repo, ids[1], &fine, "editor")
        .await
        .unwrap();
    assert_eq!(updated.counters.airframe_hours_total, Hours::new(108.0));
    assert_eq!(updated.updated_by, "editor");
}

#[tokio::test]
async fn test_update_same_values_is_not_its_own_neighbour() {
    let repo = LocalRepository::new();
    let ids = seed(&repo, &[("X", "2024-01-01", 100.0)]).await;
    let patch = SnapshotPatch {
        last_flight_date: Some(date("2024-01-01")),
        ..Default::default()
    };
    let updated = update_snapshot(&repo, ids[0], &patch, "editor")
        .await
        .unwrap();
    assert_eq!(updated.last_flight_date, Some(date("2024-01-01")));
}

#[tokio::test]
async fn test_update_moving_date_onto_existing_day_is_duplicate() {
    let repo = LocalRepository::new();
    let ids = seed(&repo, &[("X", "2024-01-01", 100.0), ("X", "2024-01-02", 100.0)]).await;
    let patch = SnapshotPatch {
        date: Some(date("2024-01-02")),
        ..Default::default()
    };
    let err = update_snapshot(&repo, ids[0], &patch, "editor")
        .await
        .unwrap_err();
    assert!(matches!(err, UtilizationError::DuplicateSnapshot { .. }));
}

#[tokio::test]
async fn test_update_moving_date_past_successor_revalidates() {
    let repo = LocalRepository::new();
    let ids = seed(&repo, &[("X", "2024-01-01", 100.0), ("X", "2024-01-05", 110.0)]).await;

    // Moving the 100h record after the 110h one would make it go backwards.
    let patch = SnapshotPatch {
        date: Some(date("2024-01-09")),
        ..Default::default()
    };
    let err = update_snapshot(&repo, ids[0], &patch, "editor")
        .await
        .unwrap_err();
    assert!(matches!(err, UtilizationError::MonotonicViolation(_)));
}

#[tokio::test]
async fn test_update_missing_is_not_found() {
    let repo = LocalRepository::new();
    let err = update_snapshot(&repo, SnapshotId::new(9), &SnapshotPatch::default(), "editor")
        .await
        .unwrap_err();
    assert!(matches!(err, UtilizationError::NotFound(_)));
    assert_eq!(err.code(), "NOT_FOUND");
}

// ==================== delete ====================

#[tokio::test]
async fn test_delete_leaves_consistent_chain() {
    let repo = LocalRepository::new();
    let ids = seed(
        &repo,
        &[
            ("X", "2024-01-01", 100.0),
            ("X", "2024-01-02", 110.0),
            ("X", "2024-01-03", 110.0),
        ],
    )
    .await;

    let deleted = delete_snapshot(&repo, ids[1]).await.unwrap();
    assert_eq!(deleted.date, date("2024-01-02"));
    assert_eq!(repo.snapshot_count(), 2);
}

#[tokio::test]
async fn test_delete_rejects_inconsistent_join() {
    use super::repository::UtilizationRepository;

    // Raw repository writes bypass validation: 100 -> 120 -> 95.
    let repo = LocalRepository::new();
    repo.insert_snapshot(new_snapshot("X", "2024-01-01", 100.0))
        .await
        .unwrap();
    let middle = repo
        .insert_snapshot(new_snapshot("X", "2024-01-02", 120.0))
        .await
        .unwrap();
    repo.insert_snapshot(new_snapshot("X", "2024-01-03", 95.0))
        .await
        .unwrap();

    let err = delete_snapshot(&repo, middle.id).await.unwrap_err();
    assert!(matches!(err, UtilizationError::MonotonicViolation(_)));
    assert_eq!(repo.snapshot_count(), 3);
}

#[tokio::test]
async fn test_delete_missing_is_not_found() {
    let repo = LocalRepository::new();
    let err = delete_snapshot(&repo, SnapshotId::new(1)).await.unwrap_err();
    assert!(matches!(err, UtilizationError::NotFound(_)));
}

// ==================== reads ====================

#[tokio::test]
async fn test_daily_deltas_from_repository() {
    let repo = LocalRepository::new();
    seed(&repo, &[("X", "2024-01-01", 100.0), ("X", "2024-01-05", 108.0)]).await;

    let deltas = get_daily_deltas(&repo, &aircraft("X"), DateRange::unbounded())
        .await
        .unwrap();
    assert_eq!(deltas.len(), 1);
    assert_eq!(deltas[0].date, date("2024-01-05"));
    assert_eq!(deltas[0].previous_date, date("2024-01-01"));
    assert_eq!(deltas[0].flight_hours.value(), 8.0);
}

#[tokio::test]
async fn test_daily_deltas_respect_range() {
    let repo = LocalRepository::new();
    seed(
        &repo,
        &[
            ("X", "2024-01-01", 100.0),
            ("X", "2024-01-02", 104.0),
            ("X", "2024-01-03", 110.0),
        ],
    )
    .await;

    let range = DateRange::between(date("2024-01-02"), date("2024-01-03")).unwrap();
    let deltas = get_daily_deltas(&repo, &aircraft("X"), range).await.unwrap();
    assert_eq!(deltas.len(), 1);
    assert_eq!(deltas[0].flight_hours.value(), 6.0);
}

#[tokio::test]
async fn test_monthly_aggregation_for_one_aircraft() {
    let repo = LocalRepository::new();
    seed(
        &repo,
        &[
            ("X", "2024-01-10", 100.0),
            ("X", "2024-01-20", 110.0),
            ("X", "2024-02-15", 130.0),
            ("X", "2024-03-01", 140.0),
            ("Y", "2024-02-01", 10.0),
        ],
    )
    .await;

    let range = DateRange::between(date("2024-01-01"), date("2024-03-31")).unwrap();
    let filter = SnapshotFilter::for_aircraft(aircraft("X")).with_range(range);
    let buckets = aggregate_utilization(&repo, Period::Month, &filter)
        .await
        .unwrap();

    let labels: Vec<String> = buckets.iter().map(|b| b.bucket.label()).collect();
    assert_eq!(labels, vec!["2024-01", "2024-02", "2024-03"]);
    let counts: Vec<usize> = buckets.iter().map(|b| b.snapshot_count).collect();
    assert_eq!(counts, vec![2, 1, 1]);
    assert!(buckets.iter().all(|b| b.aircraft_count == 1));
}

fn with_cycles(id: &str, day: &str, cycles: i64) -> NewSnapshot {
    let mut snapshot = new_snapshot(id, day, 100.0);
    snapshot.data.counters.airframe_cycles_total = cycles;
    snapshot.data.counters.engines = EngineSet::twin(
        EngineCounters::new(100.0, cycles),
        EngineCounters::new(100.0, cycles),
    );
    snapshot
}

#[tokio::test]
async fn test_counters_at_integer_limit() {
    let repo = LocalRepository::new();
    create_snapshot(&repo, with_cycles("X", "2024-01-01", 0))
        .await
        .unwrap();
    create_snapshot(&repo, with_cycles("X", "2024-01-02", i64::MAX))
        .await
        .unwrap();

    let deltas = get_daily_deltas(&repo, &aircraft("X"), DateRange::unbounded())
        .await
        .unwrap();
    assert_eq!(deltas[0].flight_cycles, i64::MAX);
    assert!(deltas[0].engines.iter().all(|e| e.cycles == i64::MAX));

    let buckets = aggregate_utilization(&repo, Period::Month, &SnapshotFilter::default())
        .await
        .unwrap();
    assert_eq!(buckets[0].flight_cycles, i64::MAX);
    assert_eq!(buckets[0].airframe_cycles_end, i64::MAX);

    // A second aircraft pushes the closing fleet total past the limit.
    create_snapshot(&repo, with_cycles("Y", "2024-01-02", 1))
        .await
        .unwrap();
    let err = aggregate_utilization(&repo, Period::Month, &SnapshotFilter::default())
        .await
        .unwrap_err();
    assert!(matches!(err, UtilizationError::CounterOverflow(_)));
    assert_eq!(err.code(), "COUNTER_OVERFLOW");

    // Scoped to one aircraft the totals stay in range.
    let per_aircraft = SnapshotFilter::for_aircraft(aircraft("X"));
    assert!(aggregate_utilization(&repo, Period::Year, &per_aircraft)
        .await
        .is_ok());
}

#[tokio::test]
async fn test_latest_snapshot_and_aircraft_listing() {
    let repo = LocalRepository::new();
    seed(
        &repo,
        &[
            ("B", "2024-01-01", 10.0),
            ("A", "2024-01-01", 10.0),
            ("A", "2024-01-03", 12.0),
        ],
    )
    .await;

    let latest = latest_snapshot(&repo, &aircraft("A")).await.unwrap();
    assert_eq!(latest.date, date("2024-01-03"));

    let err = latest_snapshot(&repo, &aircraft("C")).await.unwrap_err();
    assert!(matches!(err, UtilizationError::NotFound(_)));

    assert_eq!(
        list_aircraft(&repo).await.unwrap(),
        vec![aircraft("A"), aircraft("B")]
    );
}

#[tokio::test]
async fn test_unhealthy_repository_surfaces_repository_error() {
    let repo = LocalRepository::new();
    repo.set_healthy(false);
    let err = list_snapshots(&repo, &SnapshotFilter::default())
        .await
        .unwrap_err();
    assert!(matches!(err, UtilizationError::Repository(_)));
    assert_eq!(err.code(), "REPOSITORY_ERROR");
    assert!(!health_check(&repo).await.unwrap());
}

// ==================== import ====================

#[tokio::test]
async fn test_import_processes_rows_in_chronological_order() {
    let repo = LocalRepository::new();
    let batch = vec![
        new_snapshot("X", "2024-01-03", 110.0),
        new_snapshot("X", "2024-01-01", 100.0),
        new_snapshot("X", "2024-01-02", 120.0),
    ];

    let report = import_snapshots(&repo, batch).await.unwrap();
    assert_eq!(report.total, 3);
    assert_eq!(report.created, 2);
    assert_eq!(report.rejected, 1);

    // Rows come back in submission order.
    let indices: Vec<usize> = report.rows.iter().map(|r| r.index).collect();
    assert_eq!(indices, vec![0, 1, 2]);

    // 01-01 (100) and 01-02 (120) go in; 01-03 (110) goes backwards.
    assert!(matches!(
        report.rows[0].outcome,
        ImportOutcome::Rejected { ref code, .. } if code == "MONOTONIC_VIOLATION"
    ));
    assert!(matches!(report.rows[1].outcome, ImportOutcome::Created { .. }));
    assert!(matches!(report.rows[2].outcome, ImportOutcome::Created { .. }));
}

#[tokio::test]
async fn test_import_reports_duplicates_without_aborting() {
    let repo = LocalRepository::new();
    let batch = vec![
        new_snapshot("X", "2024-01-01", 100.0),
        new_snapshot("X", "2024-01-01", 100.0),
        new_snapshot("Y", "2024-01-01", 5.0),
    ];

    let report = import_snapshots(&repo, batch).await.unwrap();
    assert_eq!(report.created, 2);
    assert!(matches!(
        report.rows[1].outcome,
        ImportOutcome::Rejected { ref code, .. } if code == "DUPLICATE_SNAPSHOT"
    ));
    assert_eq!(repo.snapshot_count(), 2);
}

#[tokio::test]
async fn test_import_report_serialization() {
    let repo = LocalRepository::new();
    let report = import_snapshots(&repo, vec![new_snapshot("X", "2024-01-01", 1.0)])
        .await
        .unwrap();
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["created"], 1);
    assert_eq!(json["rows"][0]["status"], "created");
    assert_eq!(json["rows"][0]["snapshotId"], 1);
    assert_eq!(json["rows"][0]["aircraftId"], "X");
}
