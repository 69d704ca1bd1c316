//! Mobility samples. Exact-timestamp lookups only.

use super::TraceStore;
use crate::{
    device::Position,
    error::{TraceError, TraceResult},
    types::{DeviceNumber, Micros, RunId, POSITION_TICK_US},
};
use rusqlite::{params, OptionalExtension};

impl TraceStore {
    /// Record a sample. Samples only exist on the position tick.
    pub fn insert_position(
        &self,
        run: RunId,
        device: DeviceNumber,
        us: Micros,
        pos: Position,
    ) -> TraceResult<()> {
        if us % POSITION_TICK_US != 0 {
            return Err(TraceError::IntegrityViolation(format!(
                "position sample for device {device} at {us}us is off the {POSITION_TICK_US}us tick"
            )));
        }
        self.conn.execute(
            "INSERT INTO position (run, device, us, pos_x, pos_y) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![run, device, us, pos.x, pos.y],
        )?;
        Ok(())
    }

    /// The sample recorded at exactly `us`, if any. No interpolation.
    pub fn position_at(&self, run: RunId, device: DeviceNumber, us: Micros) -> TraceResult<Option<Position>> {
        Ok(self
            .conn
            .query_row(
                "SELECT pos_x, pos_y FROM position WHERE run = ?1 AND device = ?2 AND us = ?3",
                params![run, device, us],
                |r| Ok(Position { x: r.get(0)?, y: r.get(1)? }),
            )
            .optional()?)
    }

    pub fn position_sample_count(&self, run: RunId) -> TraceResult<i64> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM position WHERE run = ?1",
            params![run],
            |r| r.get(0),
        )?)
    }
}
