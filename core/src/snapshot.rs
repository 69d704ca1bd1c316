//! Snapshot — the derived system state at one instant of a run.
//!
//! A snapshot is never stored. It is recomputed from the trace relations
//! every time one is requested.

use crate::{
    device::Position,
    types::{BundleId, DeviceId, Micros, RunId},
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
    pub run:                RunId,
    pub us:                 Micros,
    pub positions:          BTreeMap<DeviceId, Position>,
    /// (client, peripheral) pairs. Order carries no meaning.
    pub active_connections: BTreeSet<(DeviceId, DeviceId)>,
    pub bundle:             BundleId,
    pub possessed_by:       BTreeSet<DeviceId>,
}

impl Snapshot {
    pub fn possesses(&self, device: DeviceId) -> bool {
        self.possessed_by.contains(&device)
    }

    /// Endpoint coordinates of every active link, for drawing.
    /// Links touching a device without a position are skipped.
    pub fn link_segments(&self) -> Vec<(Position, Position)> {
        self.active_connections
            .iter()
            .filter_map(|(client, peripheral)| {
                Some((*self.positions.get(client)?, *self.positions.get(peripheral)?))
            })
            .collect()
    }
}
