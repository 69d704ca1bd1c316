//! Simulated nodes and their mobility samples.

use crate::types::{DeviceId, DeviceNumber, RunId};
use serde::{Deserialize, Serialize};

/// Number of the central sink node. Proxies are numbered 1..=N.
pub const CENTRAL_DEVICE_NUMBER: DeviceNumber = 0;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Device {
    pub id:       DeviceId,
    pub run:      RunId,
    pub number:   DeviceNumber,
    pub eid:      String,
    pub mac_addr: String,
}

impl Device {
    pub fn is_central(&self) -> bool {
        self.number == CENTRAL_DEVICE_NUMBER
    }
}

#[derive(Debug, Clone)]
pub struct NewDevice {
    pub number:   DeviceNumber,
    pub eid:      String,
    pub mac_addr: String,
}

impl NewDevice {
    pub fn new(number: DeviceNumber, eid: impl Into<String>, mac_addr: impl Into<String>) -> Self {
        Self { number, eid: eid.into(), mac_addr: mac_addr.into() }
    }
}

/// A point of a device's mobility trace.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}
