//! Device identities.

use super::TraceStore;
use crate::{
    device::{Device, NewDevice},
    error::{TraceError, TraceResult},
    types::{DeviceId, DeviceNumber, RunId},
};
use rusqlite::{params, OptionalExtension, Row};

fn device_from_row(r: &Row<'_>) -> rusqlite::Result<Device> {
    Ok(Device {
        id:       r.get(0)?,
        run:      r.get(1)?,
        number:   r.get(2)?,
        eid:      r.get(3)?,
        mac_addr: r.get(4)?,
    })
}

impl TraceStore {
    pub fn insert_device(&self, run: RunId, device: &NewDevice) -> TraceResult<DeviceId> {
        self.conn.execute(
            "INSERT INTO device (run, number, eid, mac_addr) VALUES (?1, ?2, ?3, ?4)",
            params![run, device.number, &device.eid, &device.mac_addr],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn device(&self, run: RunId, id: DeviceId) -> TraceResult<Device> {
        self.conn
            .query_row(
                "SELECT id, run, number, eid, mac_addr FROM device WHERE run = ?1 AND id = ?2",
                params![run, id],
                device_from_row,
            )
            .optional()?
            .ok_or_else(|| TraceError::not_found("device", format!("run {run}, id {id}")))
    }

    pub fn device_by_number(&self, run: RunId, number: DeviceNumber) -> TraceResult<Device> {
        self.conn
            .query_row(
                "SELECT id, run, number, eid, mac_addr FROM device WHERE run = ?1 AND number = ?2",
                params![run, number],
                device_from_row,
            )
            .optional()?
            .ok_or_else(|| TraceError::not_found("device", format!("run {run}, number {number}")))
    }

    pub fn devices(&self, run: RunId) -> TraceResult<Vec<Device>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, run, number, eid, mac_addr FROM device WHERE run = ?1 ORDER BY number ASC",
        )?;
        let rows = stmt.query_map(params![run], device_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}
