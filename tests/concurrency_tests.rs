mod common;

use common::{Harness, with_pool};
use std::time::Duration;
use workshop_timeline::ErrorKind;
use workshop_timeline::database::{self, queries};
use workshop_timeline::tracker::{
    ClockInRequest, ClockOutRequest, StartBreakRequest, StartSessionRequest,
};

/// File-backed store so that several pooled connections really race.
async fn shared_store(dir: &tempfile::TempDir) -> Harness {
    let url = format!("sqlite://{}", dir.path().join("workshop.db").display());
    let pool = database::create_connection(&url, 4, Duration::from_secs(5))
        .await
        .unwrap();
    with_pool(pool)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_session_starts_leave_exactly_one_open() {
    let dir = tempfile::tempdir().unwrap();
    let h = shared_store(&dir).await;
    let assembly_id = h.activity("Assembly", true).await.id;

    for round in 0..8 {
        let employee = h
            .employee(&format!("E{:03}", round), &format!("Worker {}", round))
            .await;
        let employee_id = employee.id;
        h.workshop
            .presence()
            .clock_in(employee_id, ClockInRequest::default())
            .await
            .unwrap();

        let first = h.workshop.clone();
        let second = h.workshop.clone();
        let (a, b) = tokio::join!(
            tokio::spawn(async move {
                first
                    .work()
                    .start_session(employee_id, StartSessionRequest::for_activity(assembly_id))
                    .await
            }),
            tokio::spawn(async move {
                second
                    .work()
                    .start_session(employee_id, StartSessionRequest::for_activity(assembly_id))
                    .await
            }),
        );
        let results = [a.unwrap(), b.unwrap()];

        let successes = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1, "round {}", round);
        for err in results.iter().filter_map(|r| r.as_ref().err()) {
            assert_eq!(err.reported_kind(), ErrorKind::AlreadyWorking, "round {}", round);
        }
        assert_eq!(
            queries::count_open_work(&h.pool, employee_id).await.unwrap(),
            1
        );
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_clock_ins_create_one_attendance() {
    let dir = tempfile::tempdir().unwrap();
    let h = shared_store(&dir).await;
    let ada_id = h.employee("E001", "Ada").await.id;

    let mut handles = Vec::new();
    for _ in 0..4 {
        let workshop = h.workshop.clone();
        handles.push(tokio::spawn(async move {
            workshop
                .presence()
                .clock_in(ada_id, ClockInRequest::default())
                .await
        }));
    }

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(err) => assert_eq!(err.reported_kind(), ErrorKind::AlreadyPresent),
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(h.workshop.presence().all_active().await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_break_and_session_never_coexist() {
    let dir = tempfile::tempdir().unwrap();
    let h = shared_store(&dir).await;
    let assembly_id = h.activity("Assembly", true).await.id;
    let lunch_id = h.break_category("Lunch", None).await.id;

    for round in 0..8 {
        let employee = h
            .employee(&format!("E{:03}", round), &format!("Worker {}", round))
            .await;
        let employee_id = employee.id;
        h.workshop
            .presence()
            .clock_in(employee_id, ClockInRequest::default())
            .await
            .unwrap();

        let work = h.workshop.clone();
        let breaks = h.workshop.clone();
        let (session, open_break) = tokio::join!(
            tokio::spawn(async move {
                work.work()
                    .start_session(employee_id, StartSessionRequest::for_activity(assembly_id))
                    .await
            }),
            tokio::spawn(async move {
                breaks
                    .breaks()
                    .start_break(employee_id, StartBreakRequest::new(lunch_id))
                    .await
            }),
        );
        let (session, open_break) = (session.unwrap(), open_break.unwrap());

        assert!(
            session.is_ok() != open_break.is_ok(),
            "round {}: session={:?} break={:?}",
            round,
            session.as_ref().map(|s| s.id),
            open_break.as_ref().map(|b| b.id)
        );
        let status = h.workshop.status(employee_id).await.unwrap();
        assert!(status.anomalies.is_empty(), "round {}", round);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn clock_out_racing_break_start_leaves_no_open_break() {
    let dir = tempfile::tempdir().unwrap();
    let h = shared_store(&dir).await;
    let lunch_id = h.break_category("Lunch", None).await.id;

    for round in 0..8 {
        let employee_id = h
            .employee(&format!("E{:03}", round), &format!("Worker {}", round))
            .await
            .id;
        h.workshop
            .presence()
            .clock_in(employee_id, ClockInRequest::default())
            .await
            .unwrap();

        let presence = h.workshop.clone();
        let breaks = h.workshop.clone();
        let (clock_out, open_break) = tokio::join!(
            tokio::spawn(async move {
                presence
                    .presence()
                    .clock_out(employee_id, ClockOutRequest::default())
                    .await
            }),
            tokio::spawn(async move {
                breaks
                    .breaks()
                    .start_break(employee_id, StartBreakRequest::new(lunch_id))
                    .await
            }),
        );

        assert!(clock_out.unwrap().is_ok(), "round {}", round);
        if let Err(err) = open_break.unwrap() {
            assert_eq!(err.kind(), ErrorKind::NotPresent, "round {}", round);
        }
        assert!(
            queries::get_open_break(&h.pool, employee_id)
                .await
                .unwrap()
                .is_none(),
            "round {}",
            round
        );
    }

    assert!(h.workshop.anomalies().await.unwrap().is_empty());
}
