//! Shared primitive types used across the trace store and query engine.

/// Simulated time in microseconds since run start.
pub type Micros = i64;

/// Row id of a `run`.
pub type RunId = i64;

/// Row id of a `device`. Not the same as the device's ordinal number.
pub type DeviceId = i64;

/// Ordinal device number inside a run. 0 is the central sink node.
pub type DeviceNumber = i64;

pub type BundleId = i64;
pub type StoredBundleId = i64;
pub type ConnInfoId = i64;
pub type TransmissionId = i64;

pub const MICROS_PER_SECOND: Micros = 1_000_000;

/// Positions are sampled once per simulated second.
pub const POSITION_TICK_US: Micros = MICROS_PER_SECOND;

/// Destination eid carried by broadcast probe bundles.
pub const BROADCAST_EID: &str = "dtn://fake";

/// Convert a replay time in seconds to the microsecond key used by the store.
pub fn seconds_to_micros(seconds: f64) -> Micros {
    (seconds * MICROS_PER_SECOND as f64).round() as Micros
}
