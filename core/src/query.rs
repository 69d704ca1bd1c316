//! Temporal query engine — point-in-time reconstruction of a run.
//!
//! Every call is a pure function of the stored facts: nothing is cached and
//! nothing is written. The store is expected to be complete (ingestion
//! finished) before the first query runs.

use crate::{
    bundle::PossessionPolicy,
    connection::ChannelRole,
    device::Position,
    error::{TraceError, TraceResult},
    run::Run,
    snapshot::Snapshot,
    store::TraceStore,
    types::{BundleId, DeviceId, Micros, RunId},
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueryOptions {
    pub possession:   PossessionPolicy,
    pub channel_role: ChannelRole,
}

pub struct TemporalQuery<'s> {
    store:   &'s TraceStore,
    run:     Run,
    options: QueryOptions,
}

impl<'s> TemporalQuery<'s> {
    /// Bind the engine to one run. Fails with `NotFound` for an unknown run.
    pub fn new(store: &'s TraceStore, run: RunId) -> TraceResult<Self> {
        Ok(Self {
            store,
            run: store.run(run)?,
            options: QueryOptions::default(),
        })
    }

    pub fn with_options(mut self, options: QueryOptions) -> Self {
        self.options = options;
        self
    }

    pub fn run(&self) -> &Run {
        &self.run
    }

    pub fn options(&self) -> QueryOptions {
        self.options
    }

    /// Position of every device at exactly `t`.
    ///
    /// Devices are resolved by number, 0 through `num_proxy_devices`. A
    /// missing device or a missing sample fails the whole call; a partial
    /// topology is never returned.
    pub fn positions_at(&self, t: Micros) -> TraceResult<BTreeMap<DeviceId, Position>> {
        let mut positions = BTreeMap::new();
        for number in 0..=self.run.num_proxy_devices {
            let device = self.store.device_by_number(self.run.id, number)?;
            let pos = self
                .store
                .position_at(self.run.id, number, t)?
                .ok_or_else(|| {
                    TraceError::not_found(
                        "position sample",
                        format!("run {}, device {number}, {t}us", self.run.id),
                    )
                })?;
            positions.insert(device.id, pos);
        }
        Ok(positions)
    }

    /// (client, peripheral) pairs whose link is up at `t`.
    pub fn active_connections_at(&self, t: Micros) -> TraceResult<BTreeSet<(DeviceId, DeviceId)>> {
        let role = self.options.channel_role;
        let mut active = BTreeSet::new();
        for conn in self.store.conn_infos_up_by(self.run.id, role, t)? {
            if conn.is_active_at(role, t)? {
                active.insert(conn.endpoints());
            }
        }
        Ok(active)
    }

    /// Devices holding a copy of `bundle` at `t`, per the possession policy.
    pub fn possesses_at(&self, t: Micros, bundle: BundleId) -> TraceResult<BTreeSet<DeviceId>> {
        self.store.bundle(self.run.id, bundle)?;
        let policy = self.options.possession;
        Ok(self
            .store
            .stored_copies_of(self.run.id, bundle)?
            .into_iter()
            .filter(|copy| copy.held_at(t, policy))
            .map(|copy| copy.device)
            .collect())
    }

    pub fn snapshot_at(&self, t: Micros, bundle: BundleId) -> TraceResult<Snapshot> {
        let snapshot = Snapshot {
            run:                self.run.id,
            us:                 t,
            positions:          self.positions_at(t)?,
            active_connections: self.active_connections_at(t)?,
            bundle,
            possessed_by:       self.possesses_at(t, bundle)?,
        };
        log::debug!(
            "Snapshot at {t}us: {} links, {} holders",
            snapshot.active_connections.len(),
            snapshot.possessed_by.len()
        );
        Ok(snapshot)
    }
}
