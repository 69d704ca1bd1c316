//! Run lookup, run lifecycle and the raw event log.

use chrono::Utc;
use dtn_trace_core::{NewEvent, NewRun, RunConfiguration, RunStatus, TraceError, TraceStore};

fn store() -> TraceStore {
    let _ = env_logger::builder().is_test(true).try_init();
    let store = TraceStore::in_memory().expect("in-memory store");
    store.init_tables().expect("raw tables");
    store
}

#[test]
fn non_positive_or_unknown_run_ids_are_not_found() {
    let store = store();
    for id in [0, -1, 42] {
        let err = store.run(id).unwrap_err();
        assert!(matches!(err, TraceError::NotFound { entity: "run", .. }), "id {id}: {err}");
    }
}

#[test]
fn run_round_trips_its_attributes() {
    let store = store();
    let id = store
        .insert_run(
            &NewRun::new("broadcast-test", 7, 30_000_000, 2)
                .with_group("tests")
                .with_configuration(
                    r#"{"SIM_MODEL": "random_waypoint", "SIM_MODEL_OPTIONS": "{\"density\": 0.5}"}"#,
                ),
        )
        .unwrap();
    let run = store.run(id).unwrap();

    assert_eq!(run.name, "broadcast-test");
    assert_eq!(run.group.as_deref(), Some("tests"));
    assert_eq!(run.status, RunStatus::Running);
    assert_eq!(run.simulation_time, 30_000_000);
    assert_eq!(run.simulation_time_seconds(), 30.0);
    assert_eq!(run.device_count(), 3);
    assert!(run.end_ts.is_none());

    let cfg = RunConfiguration::parse(&run.configuration_json).unwrap();
    assert_eq!(cfg.model, "random_waypoint");
    assert_eq!(cfg.model_option_f64("density").unwrap(), 0.5);
    assert!(matches!(cfg.model_option_f64("speed"), Err(TraceError::MalformedInput(_))));
}

#[test]
fn large_seeds_survive_storage() {
    let store = store();
    let id = store.insert_run(&NewRun::new("seeded", u64::MAX - 3, 1_000_000, 0)).unwrap();
    assert_eq!(store.run(id).unwrap().seed, u64::MAX - 3);
}

#[test]
fn finished_runs_are_frozen() {
    let store = store();
    let id = store.insert_run(&NewRun::new("lifecycle", 1, 10_000_000, 1)).unwrap();

    store.update_run_progress(id, 50).unwrap();
    assert_eq!(store.run(id).unwrap().progress, 50);

    let end = Utc::now();
    store.finish_run(id, RunStatus::Completed, end).unwrap();
    let run = store.run(id).unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.end_ts.map(|t| t.timestamp()), Some(end.timestamp()));

    assert!(matches!(store.update_run_progress(id, 60), Err(TraceError::IntegrityViolation(_))));
    assert!(matches!(
        store.finish_run(id, RunStatus::Failed, Utc::now()),
        Err(TraceError::IntegrityViolation(_))
    ));
    assert_eq!(store.run(id).unwrap().progress, 50);
}

#[test]
fn a_run_cannot_finish_as_running() {
    let store = store();
    let id = store.insert_run(&NewRun::new("lifecycle", 1, 10_000_000, 1)).unwrap();
    assert!(matches!(
        store.finish_run(id, RunStatus::Running, Utc::now()),
        Err(TraceError::IntegrityViolation(_))
    ));
}

#[test]
fn events_come_back_in_time_order() {
    let store = store();
    let id = store.insert_run(&NewRun::new("events", 1, 10_000_000, 1)).unwrap();

    for (us, kind) in [(3_000, "conn_up"), (1_000, "adv"), (3_000, "bundle_rx"), (9_000, "conn_down")] {
        let event = NewEvent::with_payload(id, kind, 1, us, &serde_json::json!({ "us": us })).unwrap();
        store.append_event(&event).unwrap();
    }

    let events = store.events_between(id, 1_000, 3_000).unwrap();
    let kinds: Vec<&str> = events.iter().map(|e| e.event_type.as_str()).collect();
    assert_eq!(kinds, ["adv", "conn_up", "bundle_rx"]);
    assert_eq!(events[1].payload().unwrap()["us"], 3_000);
    assert_eq!(store.event_count(id).unwrap(), 4);
}
