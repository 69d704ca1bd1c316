//! Schema setup and reset tests.
//!
//! Setup must be idempotent. Reset must tear the analysis relations down in
//! dependency order and leave the raw trace alone.

use dtn_trace_core::{
    store::RelationKind, ConnectionInterval, NewBundle, NewDevice, NewEvent, NewRun, NewStoredBundle,
    Position, TraceError, TraceStore,
};

const CANONICAL: [&str; 5] = ["bundle_transmission", "stored_bundle", "bundle", "conn_info", "device"];
const ANALYSIS: [&str; 5] = ["device", "conn_info", "bundle", "stored_bundle", "bundle_transmission"];

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn store() -> TraceStore {
    init_logging();
    let store = TraceStore::in_memory().expect("in-memory store");
    store.init_tables().expect("raw tables");
    store.init_eval_tables().expect("eval tables");
    store
}

/// A store holding a transmission that references a copy that references a bundle.
fn populated_store() -> TraceStore {
    let store = store();
    let run = store.insert_run(&NewRun::new("reset-test", 1, 10_000_000, 1)).unwrap();
    let devices: Vec<i64> = (0..=1)
        .map(|n| store.insert_device(run, &NewDevice::new(n, format!("dtn://node{n}"), "00:00:00:00:00:00")).unwrap())
        .collect();
    for n in 0..=1 {
        for s in 0..=10 {
            store.insert_position(run, n, s * 1_000_000, Position::new(s as f64, n as f64)).unwrap();
        }
    }
    let broadcast = store
        .insert_bundle(run, &NewBundle::broadcast(devices[0], "dtn://node0", 0))
        .unwrap();
    let conn = store
        .insert_conn_info(run, &ConnectionInterval::new(devices[0], devices[1], 1_000_000, None))
        .unwrap();
    let source = store
        .insert_stored_bundle(run, &NewStoredBundle::new(devices[0], broadcast, 0, 1))
        .unwrap();
    let received = store
        .insert_stored_bundle(run, &NewStoredBundle::new(devices[1], broadcast, 2_000_000, 1))
        .unwrap();
    let tx = store.insert_bundle_transmission(run, conn, source, 1_500_000).unwrap();
    store.complete_bundle_transmission(run, tx, received, 2_000_000).unwrap();
    store
        .append_event(&NewEvent::with_payload(run, "bundle_received", 1, 2_000_000, &serde_json::json!({"bundle": broadcast})).unwrap())
        .unwrap();
    store
}

fn assert_all_analysis_relations(store: &TraceStore, present: bool) {
    for name in ANALYSIS {
        assert_eq!(store.relation_exists(name).unwrap(), present, "relation {name}");
    }
}

#[test]
fn defining_schema_twice_is_a_no_op() {
    let store = store();
    let before = store.relation_count().unwrap();

    store.init_tables().expect("second raw setup");
    store.init_eval_tables().expect("second eval setup");

    assert_eq!(store.relation_count().unwrap(), before);
    for name in ["run", "event", "position"].iter().chain(ANALYSIS.iter()) {
        assert!(store.relation_exists(name).unwrap(), "missing {name}");
    }
}

#[test]
fn reset_in_declared_order_succeeds_and_keeps_raw_trace() {
    let store = populated_store();
    let run = store.runs().unwrap()[0].id;
    let events = store.event_count(run).unwrap();
    let samples = store.position_sample_count(run).unwrap();

    store.reset_eval_tables().expect("reset");

    assert_all_analysis_relations(&store, false);
    assert!(store.run(run).is_ok());
    assert_eq!(store.event_count(run).unwrap(), events);
    assert_eq!(store.position_sample_count(run).unwrap(), samples);
}

#[test]
fn explicit_canonical_order_succeeds() {
    let store = populated_store();
    store.drop_eval_tables(&CANONICAL).expect("canonical drop");
    assert_all_analysis_relations(&store, false);
}

#[test]
fn store_graph_drops_in_the_canonical_order() {
    let store = store();
    let names: Vec<&str> = store
        .graph()
        .drop_order(RelationKind::Analysis)
        .iter()
        .map(|r| r.name)
        .collect();
    assert_eq!(names, CANONICAL);
}

#[test]
fn swapping_any_adjacent_pair_is_an_integrity_violation() {
    let store = populated_store();
    for i in 0..CANONICAL.len() - 1 {
        let mut order = CANONICAL;
        order.swap(i, i + 1);
        let err = store.drop_eval_tables(&order).unwrap_err();
        assert!(
            matches!(err, TraceError::IntegrityViolation(_)),
            "swap at {i} gave {err}"
        );
        // Nothing was dropped.
        assert_all_analysis_relations(&store, true);
    }
}

#[test]
fn partial_or_foreign_drop_lists_are_rejected() {
    let store = populated_store();
    assert!(matches!(
        store.drop_eval_tables(&CANONICAL[..4]),
        Err(TraceError::IntegrityViolation(_))
    ));
    assert!(matches!(
        store.drop_eval_tables(&["bundle_transmission", "stored_bundle", "bundle", "conn_info", "run"]),
        Err(TraceError::IntegrityViolation(_))
    ));
    assert!(matches!(
        store.drop_eval_tables(&["bundle_transmission", "bundle_transmission", "bundle", "conn_info", "device"]),
        Err(TraceError::IntegrityViolation(_))
    ));
    assert_all_analysis_relations(&store, true);
}

#[test]
fn eval_tables_can_be_redefined_after_reset() {
    let store = populated_store();
    let run = store.runs().unwrap()[0].id;
    store.reset_eval_tables().unwrap();
    store.init_eval_tables().unwrap();

    assert_all_analysis_relations(&store, true);
    assert!(store.devices(run).unwrap().is_empty());
}

#[test]
fn file_store_survives_reopen() {
    init_logging();
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("trace.db");
    let path = path.to_str().unwrap();

    let run = {
        let store = TraceStore::open(path).unwrap();
        store.init_tables().unwrap();
        store.init_eval_tables().unwrap();
        store.insert_run(&NewRun::new("persisted", 1, 5_000_000, 0)).unwrap()
    };

    let store = TraceStore::open(path).unwrap();
    store.init_tables().unwrap();
    assert_eq!(store.run(run).unwrap().name, "persisted");

    let again = store.reopen().unwrap();
    assert_eq!(again.run(run).unwrap().simulation_time, 5_000_000);
}
