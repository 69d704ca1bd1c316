//! Bundles, their per-device copies, and the transfers between copies.

use crate::{
    error::{TraceError, TraceResult},
    types::{
        BundleId, ConnInfoId, DeviceId, Micros, RunId, StoredBundleId, TransmissionId,
        BROADCAST_EID,
    },
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bundle {
    pub id:                    BundleId,
    pub run:                   RunId,
    pub source:                DeviceId,
    pub destination:           Option<DeviceId>,
    pub source_eid:            Option<String>,
    pub destination_eid:       Option<String>,
    pub creation_timestamp_ms: Option<i64>,
    pub payload_length:        Option<i64>,
    pub is_sv:                 bool,
    pub lifetime_ms:           Option<i64>,
    pub hop_count:             Option<i64>,
}

impl Bundle {
    pub fn is_broadcast(&self) -> bool {
        self.destination_eid.as_deref() == Some(BROADCAST_EID)
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewBundle {
    pub source:                DeviceId,
    pub destination:           Option<DeviceId>,
    pub source_eid:            Option<String>,
    pub destination_eid:       Option<String>,
    pub creation_timestamp_ms: Option<i64>,
    pub payload_length:        Option<i64>,
    pub is_sv:                 bool,
    pub lifetime_ms:           Option<i64>,
    pub hop_count:             Option<i64>,
}

impl NewBundle {
    pub fn new(source: DeviceId, source_eid: impl Into<String>, destination_eid: impl Into<String>) -> Self {
        Self {
            source,
            source_eid: Some(source_eid.into()),
            destination_eid: Some(destination_eid.into()),
            ..Self::default()
        }
    }

    /// A broadcast probe bundle originating at `source`.
    pub fn broadcast(source: DeviceId, source_eid: impl Into<String>, creation_timestamp_ms: i64) -> Self {
        Self {
            creation_timestamp_ms: Some(creation_timestamp_ms),
            ..Self::new(source, source_eid, BROADCAST_EID)
        }
    }
}

/// How possession of a bundle is derived from its stored copies.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PossessionPolicy {
    /// A copy counts from `created_us` onwards, deleted or not.
    #[default]
    CreatedOnly,
    /// A copy counts only within `[created_us, deleted_us)`.
    ExcludeDeleted,
}

impl PossessionPolicy {
    pub fn parse(s: &str) -> TraceResult<Self> {
        match s {
            "created-only"    => Ok(Self::CreatedOnly),
            "exclude-deleted" => Ok(Self::ExcludeDeleted),
            other => Err(TraceError::MalformedInput(format!("unknown possession policy '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredBundleCopy {
    pub id:             StoredBundleId,
    pub run:            RunId,
    pub device:         DeviceId,
    pub bundle:         BundleId,
    pub created_us:     Micros,
    pub local_id:       i64,
    pub deleted_us:     Option<Micros>,
    pub remaining_hops: Option<i64>,
}

impl StoredBundleCopy {
    pub fn held_at(&self, t: Micros, policy: PossessionPolicy) -> bool {
        if self.created_us > t {
            return false;
        }
        match policy {
            PossessionPolicy::CreatedOnly    => true,
            PossessionPolicy::ExcludeDeleted => self.deleted_us.map_or(true, |deleted| deleted > t),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewStoredBundle {
    pub device:         DeviceId,
    pub bundle:         BundleId,
    pub created_us:     Micros,
    pub local_id:       i64,
    pub deleted_us:     Option<Micros>,
    pub remaining_hops: Option<i64>,
}

impl NewStoredBundle {
    pub fn new(device: DeviceId, bundle: BundleId, created_us: Micros, local_id: i64) -> Self {
        Self { device, bundle, created_us, local_id, deleted_us: None, remaining_hops: None }
    }

    pub fn deleted_at(mut self, deleted_us: Micros) -> Self {
        self.deleted_us = Some(deleted_us);
        self
    }

    pub(crate) fn check(&self) -> TraceResult<()> {
        check_deletion(self.created_us, self.deleted_us)
    }
}

pub(crate) fn check_deletion(created_us: Micros, deleted_us: Option<Micros>) -> TraceResult<()> {
    match deleted_us {
        Some(deleted) if deleted < created_us => Err(TraceError::IntegrityViolation(format!(
            "stored bundle deleted at {deleted}us before it was created at {created_us}us"
        ))),
        _ => Ok(()),
    }
}

/// One transfer attempt: `source_stored_bundle` produced
/// `received_stored_bundle` over `conn_info`, once it succeeded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BundleTransmission {
    pub id:                     TransmissionId,
    pub run:                    RunId,
    pub conn_info:              ConnInfoId,
    pub source_stored_bundle:   StoredBundleId,
    pub received_stored_bundle: Option<StoredBundleId>,
    pub start_us:               Option<Micros>,
    pub end_us:                 Option<Micros>,
}

impl BundleTransmission {
    pub fn succeeded(&self) -> bool {
        self.received_stored_bundle.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn copy(created_us: Micros, deleted_us: Option<Micros>) -> StoredBundleCopy {
        StoredBundleCopy {
            id: 1,
            run: 1,
            device: 1,
            bundle: 1,
            created_us,
            local_id: 0,
            deleted_us,
            remaining_hops: None,
        }
    }

    #[test]
    fn created_only_ignores_deletion() {
        let c = copy(100, Some(200));
        assert!(!c.held_at(99, PossessionPolicy::CreatedOnly));
        assert!(c.held_at(100, PossessionPolicy::CreatedOnly));
        assert!(c.held_at(500, PossessionPolicy::CreatedOnly));
    }

    #[test]
    fn exclude_deleted_stops_at_deletion() {
        let c = copy(100, Some(200));
        assert!(c.held_at(199, PossessionPolicy::ExcludeDeleted));
        assert!(!c.held_at(200, PossessionPolicy::ExcludeDeleted));
    }

    #[test]
    fn deletion_before_creation_is_rejected() {
        assert!(check_deletion(100, Some(100)).is_ok());
        assert!(matches!(
            check_deletion(100, Some(99)),
            Err(TraceError::IntegrityViolation(_))
        ));
    }

    #[test]
    fn broadcast_bundle_uses_fake_destination() {
        let b = NewBundle::broadcast(1, "dtn://node0", 0);
        assert_eq!(b.destination_eid.as_deref(), Some(BROADCAST_EID));
        assert_eq!(PossessionPolicy::parse("exclude-deleted").unwrap(), PossessionPolicy::ExcludeDeleted);
    }
}
