//! Bundles, stored copies and transmissions.

use super::TraceStore;
use crate::{
    bundle::{check_deletion, Bundle, BundleTransmission, NewBundle, NewStoredBundle, StoredBundleCopy},
    error::{TraceError, TraceResult},
    types::{BundleId, ConnInfoId, Micros, RunId, StoredBundleId, TransmissionId, BROADCAST_EID},
};
use rusqlite::{params, OptionalExtension, Row};

const BUNDLE_COLUMNS: &str = "id, run, source, destination, source_eid, destination_eid,
    creation_timestamp_ms, payload_length, is_sv, lifetime_ms, hop_count";

fn bundle_from_row(r: &Row<'_>) -> rusqlite::Result<Bundle> {
    Ok(Bundle {
        id:                    r.get(0)?,
        run:                   r.get(1)?,
        source:                r.get(2)?,
        destination:           r.get(3)?,
        source_eid:            r.get(4)?,
        destination_eid:       r.get(5)?,
        creation_timestamp_ms: r.get(6)?,
        payload_length:        r.get(7)?,
        is_sv:                 r.get::<_, i32>(8)? != 0,
        lifetime_ms:           r.get(9)?,
        hop_count:             r.get(10)?,
    })
}

fn stored_bundle_from_row(r: &Row<'_>) -> rusqlite::Result<StoredBundleCopy> {
    Ok(StoredBundleCopy {
        id:             r.get(0)?,
        run:            r.get(1)?,
        device:         r.get(2)?,
        bundle:         r.get(3)?,
        created_us:     r.get(4)?,
        local_id:       r.get(5)?,
        deleted_us:     r.get(6)?,
        remaining_hops: r.get(7)?,
    })
}

impl TraceStore {
    // ── Bundle ─────────────────────────────────────────────────

    pub fn insert_bundle(&self, run: RunId, b: &NewBundle) -> TraceResult<BundleId> {
        self.conn.execute(
            "INSERT INTO bundle (
                run, source, destination, source_eid, destination_eid,
                creation_timestamp_ms, payload_length, is_sv, lifetime_ms, hop_count
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                run,
                b.source,
                b.destination,
                &b.source_eid,
                &b.destination_eid,
                b.creation_timestamp_ms,
                b.payload_length,
                if b.is_sv { 1 } else { 0 },
                b.lifetime_ms,
                b.hop_count,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn bundle(&self, run: RunId, id: BundleId) -> TraceResult<Bundle> {
        let sql = format!("SELECT {BUNDLE_COLUMNS} FROM bundle WHERE run = ?1 AND id = ?2");
        self.conn
            .query_row(&sql, params![run, id], bundle_from_row)
            .optional()?
            .ok_or_else(|| TraceError::not_found("bundle", format!("run {run}, id {id}")))
    }

    /// The run's broadcast probe bundle (lowest id if several exist).
    pub fn broadcast_bundle(&self, run: RunId) -> TraceResult<Bundle> {
        let sql = format!(
            "SELECT {BUNDLE_COLUMNS} FROM bundle
             WHERE run = ?1 AND destination_eid = ?2
             ORDER BY id ASC LIMIT 1"
        );
        self.conn
            .query_row(&sql, params![run, BROADCAST_EID], bundle_from_row)
            .optional()?
            .ok_or_else(|| TraceError::not_found("broadcast bundle", format!("run {run}")))
    }

    pub fn bundles(&self, run: RunId) -> TraceResult<Vec<Bundle>> {
        let sql = format!("SELECT {BUNDLE_COLUMNS} FROM bundle WHERE run = ?1 ORDER BY id ASC");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![run], bundle_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    // ── Stored copies ──────────────────────────────────────────

    pub fn insert_stored_bundle(&self, run: RunId, copy: &NewStoredBundle) -> TraceResult<StoredBundleId> {
        copy.check()?;
        self.conn.execute(
            "INSERT INTO stored_bundle (
                run, device, bundle, created_us, local_id, deleted_us, remaining_hops
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                run,
                copy.device,
                copy.bundle,
                copy.created_us,
                copy.local_id,
                copy.deleted_us,
                copy.remaining_hops,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn stored_bundle(&self, run: RunId, id: StoredBundleId) -> TraceResult<StoredBundleCopy> {
        self.conn
            .query_row(
                "SELECT id, run, device, bundle, created_us, local_id, deleted_us, remaining_hops
                 FROM stored_bundle WHERE run = ?1 AND id = ?2",
                params![run, id],
                stored_bundle_from_row,
            )
            .optional()?
            .ok_or_else(|| TraceError::not_found("stored bundle", format!("run {run}, id {id}")))
    }

    pub fn mark_stored_bundle_deleted(&self, run: RunId, id: StoredBundleId, deleted_us: Micros) -> TraceResult<()> {
        let copy = self.stored_bundle(run, id)?;
        check_deletion(copy.created_us, Some(deleted_us))?;
        self.conn.execute(
            "UPDATE stored_bundle SET deleted_us = ?1 WHERE run = ?2 AND id = ?3",
            params![deleted_us, run, id],
        )?;
        Ok(())
    }

    /// Every copy of `bundle` in the run, oldest first.
    pub fn stored_copies_of(&self, run: RunId, bundle: BundleId) -> TraceResult<Vec<StoredBundleCopy>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, run, device, bundle, created_us, local_id, deleted_us, remaining_hops
             FROM stored_bundle WHERE run = ?1 AND bundle = ?2
             ORDER BY created_us ASC, id ASC",
        )?;
        let rows = stmt.query_map(params![run, bundle], stored_bundle_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    // ── Transmissions ──────────────────────────────────────────

    pub fn insert_bundle_transmission(
        &self,
        run: RunId,
        conn_info: ConnInfoId,
        source_stored_bundle: StoredBundleId,
        start_us: Micros,
    ) -> TraceResult<TransmissionId> {
        self.conn.execute(
            "INSERT INTO bundle_transmission (run, conn_info, source_stored_bundle, start_us)
             VALUES (?1, ?2, ?3, ?4)",
            params![run, conn_info, source_stored_bundle, start_us],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Record the copy a successful transfer produced.
    pub fn complete_bundle_transmission(
        &self,
        run: RunId,
        id: TransmissionId,
        received_stored_bundle: StoredBundleId,
        end_us: Micros,
    ) -> TraceResult<()> {
        let updated = self.conn.execute(
            "UPDATE bundle_transmission SET received_stored_bundle = ?1, end_us = ?2
             WHERE run = ?3 AND id = ?4",
            params![received_stored_bundle, end_us, run, id],
        )?;
        if updated == 0 {
            return Err(TraceError::not_found("bundle transmission", format!("run {run}, id {id}")));
        }
        Ok(())
    }

    pub fn transmissions_over(&self, run: RunId, conn_info: ConnInfoId) -> TraceResult<Vec<BundleTransmission>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, run, conn_info, source_stored_bundle, received_stored_bundle, start_us, end_us
             FROM bundle_transmission WHERE run = ?1 AND conn_info = ?2
             ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![run, conn_info], |r| {
            Ok(BundleTransmission {
                id:                     r.get(0)?,
                run:                    r.get(1)?,
                conn_info:              r.get(2)?,
                source_stored_bundle:   r.get(3)?,
                received_stored_bundle: r.get(4)?,
                start_us:               r.get(5)?,
                end_us:                 r.get(6)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}
