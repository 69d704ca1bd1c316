//! Replay driver tests: clamping, one render per transition, microsecond keys.

use dtn_trace_core::{
    types::{BundleId, DeviceId, RunId, MICROS_PER_SECOND},
    NewBundle, NewDevice, NewRun, NewStoredBundle, Position, ReplayClock, ReplayDriver, Snapshot,
    TemporalQuery, TraceError, TraceResult, TraceStore,
};

fn store() -> TraceStore {
    let _ = env_logger::builder().is_test(true).try_init();
    let store = TraceStore::in_memory().expect("in-memory store");
    store.init_tables().expect("raw tables");
    store.init_eval_tables().expect("eval tables");
    store
}

struct Scenario {
    run:       RunId,
    /// Device row ids, indexed by device number.
    devices:   Vec<DeviceId>,
    broadcast: BundleId,
}

fn node_position(number: i64, second: i64) -> Position {
    Position::new(number as f64 * 10.0 + second as f64, number as f64)
}

/// `num_proxy_devices + 1` devices sampled every second over `seconds`, and a
/// broadcast bundle from the central node. No copies and no links yet.
fn broadcast_scenario(store: &TraceStore, num_proxy_devices: i64, seconds: i64) -> Scenario {
    let run = store
        .insert_run(&NewRun::new("broadcast-test", 7, seconds * MICROS_PER_SECOND, num_proxy_devices))
        .expect("insert run");
    let devices: Vec<DeviceId> = (0..=num_proxy_devices)
        .map(|n| {
            store
                .insert_device(run, &NewDevice::new(n, format!("dtn://node{n}"), format!("00:00:00:00:00:{n:02x}")))
                .expect("insert device")
        })
        .collect();
    for n in 0..=num_proxy_devices {
        for s in 0..=seconds {
            store
                .insert_position(run, n, s * MICROS_PER_SECOND, node_position(n, s))
                .expect("insert position");
        }
    }
    let broadcast = store
        .insert_bundle(run, &NewBundle::broadcast(devices[0], "dtn://node0", 0))
        .expect("insert bundle");
    Scenario { run, devices, broadcast }
}

#[derive(Default)]
struct RecordingSink {
    frames: Vec<Snapshot>,
}

impl dtn_trace_core::FrameSink for RecordingSink {
    fn render(&mut self, frame: &Snapshot) -> TraceResult<()> {
        self.frames.push(frame.clone());
        Ok(())
    }
}

#[test]
fn clock_clamps_at_both_ends() {
    let mut clock = ReplayClock::new(3.0);
    assert_eq!(clock.retreat(), 0.0);
    assert_eq!(clock.advance(), 1.0);
    assert_eq!(clock.advance(), 2.0);
    assert_eq!(clock.advance(), 3.0);
    assert_eq!(clock.advance(), 3.0);
    assert_eq!(clock.seek(-5.0), 0.0);
    assert_eq!(clock.seek(99.0), 3.0);
    assert_eq!(clock.seek(99.0), 3.0);
    assert_eq!(clock.seek(f64::NAN), 0.0);
    assert_eq!(clock.seek(1.5), 1.5);
    assert_eq!(clock.current_us(), 1_500_000);
}

#[test]
fn serialised_clock_reports_the_clamped_time() {
    let mut clock = ReplayClock::new(4.0);
    clock.seek(-3.0);
    assert_eq!(serde_json::to_value(&clock).unwrap(), serde_json::json!({"current_time": 0.0, "max_time": 4.0}));
    clock.seek(40.0);
    assert_eq!(serde_json::to_value(&clock).unwrap()["current_time"], 4.0);
}

#[test]
fn fractional_duration_is_the_upper_bound() {
    let mut clock = ReplayClock::new(2.5);
    clock.advance();
    clock.advance();
    assert_eq!(clock.advance(), 2.5);
    assert_eq!(clock.retreat(), 1.5);
}

#[test]
fn every_transition_renders_exactly_once() {
    let store = store();
    let sc = broadcast_scenario(&store, 2, 5);
    let q = TemporalQuery::new(&store, sc.run).unwrap();
    let mut driver = ReplayDriver::new(q, sc.broadcast, RecordingSink::default());

    driver.render_current().unwrap();
    driver.advance().unwrap();
    driver.advance().unwrap();
    driver.retreat().unwrap();
    driver.seek(100.0).unwrap();
    driver.advance().unwrap();

    assert_eq!(driver.clock().current_time(), 5.0);
    assert_eq!(driver.query().run().id, sc.run);

    let sink = driver.into_sink();
    let us: Vec<i64> = sink.frames.iter().map(|f| f.us).collect();
    assert_eq!(us, [0, 1_000_000, 2_000_000, 1_000_000, 5_000_000, 5_000_000]);
}

#[test]
fn replay_shows_broadcast_spreading() {
    let store = store();
    let sc = broadcast_scenario(&store, 2, 5);
    store
        .insert_stored_bundle(sc.run, &NewStoredBundle::new(sc.devices[0], sc.broadcast, 0, 1))
        .unwrap();
    store
        .insert_stored_bundle(sc.run, &NewStoredBundle::new(sc.devices[2], sc.broadcast, 2 * MICROS_PER_SECOND, 1))
        .unwrap();

    let q = TemporalQuery::new(&store, sc.run).unwrap();
    let mut holders = Vec::new();
    let sink = |frame: &Snapshot| -> TraceResult<()> {
        holders.push(frame.possessed_by.len());
        Ok(())
    };
    let mut driver = ReplayDriver::new(q, sc.broadcast, sink);
    driver.render_current().unwrap();
    for _ in 0..4 {
        driver.advance().unwrap();
    }
    drop(driver);

    assert_eq!(holders, [1, 1, 2, 2, 2]);
}

#[test]
fn missing_sample_propagates_out_of_the_driver() {
    let store = store();
    // 2.5 simulated seconds: the clock can reach 2.5s, where nothing was sampled.
    let run = store.insert_run(&NewRun::new("fractional", 1, 2_500_000, 0)).unwrap();
    let device = store
        .insert_device(run, &dtn_trace_core::NewDevice::new(0, "dtn://node0", "00:00:00:00:00:00"))
        .unwrap();
    for s in 0..=2 {
        store
            .insert_position(run, 0, s * MICROS_PER_SECOND, node_position(0, s))
            .unwrap();
    }
    let bundle = store
        .insert_bundle(run, &dtn_trace_core::NewBundle::broadcast(device, "dtn://node0", 0))
        .unwrap();

    let q = TemporalQuery::new(&store, run).unwrap();
    let mut driver = ReplayDriver::new(q, bundle, RecordingSink::default());
    driver.advance().unwrap();
    driver.advance().unwrap();
    let err = driver.advance().unwrap_err();
    assert!(matches!(err, TraceError::NotFound { entity: "position sample", .. }), "{err}");
    assert_eq!(driver.sink().frames.len(), 2);
}

#[test]
fn unknown_run_cannot_be_replayed() {
    let store = store();
    assert!(matches!(
        TemporalQuery::new(&store, 0),
        Err(TraceError::NotFound { entity: "run", .. })
    ));
}
