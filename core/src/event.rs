//! The raw event log — generic typed records appended by the simulator.
//!
//! RULE: Events are append-only. Nothing in this crate updates or deletes them.

use crate::types::{DeviceNumber, Micros, RunId};
use serde::{Deserialize, Serialize};

/// The event log entry as persisted to SQLite.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TraceEvent {
    pub id:         i64,
    pub run:        RunId,
    pub event_type: String,
    pub device:     DeviceNumber,
    pub us:         Micros,
    pub data_json:  String, // opaque JSON payload
}

impl TraceEvent {
    pub fn payload(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_str(&self.data_json)
    }
}

#[derive(Debug, Clone)]
pub struct NewEvent {
    pub run:        RunId,
    pub event_type: String,
    pub device:     DeviceNumber,
    pub us:         Micros,
    pub data_json:  String,
}

impl NewEvent {
    /// Build an event whose payload is any serializable value.
    pub fn with_payload<T: Serialize>(
        run: RunId,
        event_type: &str,
        device: DeviceNumber,
        us: Micros,
        payload: &T,
    ) -> serde_json::Result<Self> {
        Ok(Self {
            run,
            event_type: event_type.to_string(),
            device,
            us,
            data_json: serde_json::to_string(payload)?,
        })
    }
}
