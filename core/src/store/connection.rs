//! Connection interval queries.

use super::TraceStore;
use crate::{
    connection::{ChannelRole, ConnectionInterval, EndpointTimeline},
    error::TraceResult,
    types::{ConnInfoId, Micros, RunId},
};
use rusqlite::{params, Row};

const CONN_INFO_COLUMNS: &str = "id, client, peripheral, client_conn_init_us,
    client_rx_bytes, client_tx_bytes, client_channel_up_us, client_channel_down_us,
    client_connection_success_us, client_connection_failure_us, client_disconnect_us,
    client_disconnect_reason, client_idle_disconnect_us,
    peripheral_rx_bytes, peripheral_tx_bytes, peripheral_channel_up_us, peripheral_channel_down_us,
    peripheral_connection_success_us, peripheral_connection_failure_us, peripheral_disconnect_us,
    peripheral_disconnect_reason, peripheral_idle_disconnect_us";

fn timeline_from_row(r: &Row<'_>, base: usize) -> rusqlite::Result<EndpointTimeline> {
    Ok(EndpointTimeline {
        rx_bytes:              r.get(base)?,
        tx_bytes:              r.get(base + 1)?,
        channel_up_us:         r.get(base + 2)?,
        channel_down_us:       r.get(base + 3)?,
        connection_success_us: r.get(base + 4)?,
        connection_failure_us: r.get(base + 5)?,
        disconnect_us:         r.get(base + 6)?,
        idle_disconnect_us:    r.get(base + 8)?,
    })
}

fn conn_info_from_row(r: &Row<'_>) -> rusqlite::Result<ConnectionInterval> {
    Ok(ConnectionInterval {
        id:                  Some(r.get(0)?),
        client:              r.get(1)?,
        peripheral:          r.get(2)?,
        client_conn_init_us: r.get(3)?,
        client_side:         timeline_from_row(r, 4)?,
        peripheral_side:     timeline_from_row(r, 13)?,
        client_disconnect_reason:     r.get(11)?,
        peripheral_disconnect_reason: r.get(20)?,
    })
}

impl TraceStore {
    /// Insert a link record. Inverted channel intervals are rejected.
    pub fn insert_conn_info(&self, run: RunId, conn: &ConnectionInterval) -> TraceResult<ConnInfoId> {
        conn.check()?;
        let (c, p) = (&conn.client_side, &conn.peripheral_side);
        self.conn.execute(
            "INSERT INTO conn_info (
                run, client, peripheral, client_conn_init_us,
                client_rx_bytes, client_tx_bytes, client_channel_up_us, client_channel_down_us,
                client_connection_success_us, client_connection_failure_us, client_disconnect_us,
                client_disconnect_reason, client_idle_disconnect_us,
                peripheral_rx_bytes, peripheral_tx_bytes, peripheral_channel_up_us, peripheral_channel_down_us,
                peripheral_connection_success_us, peripheral_connection_failure_us, peripheral_disconnect_us,
                peripheral_disconnect_reason, peripheral_idle_disconnect_us
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                      ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22)",
            params![
                run,
                conn.client,
                conn.peripheral,
                conn.client_conn_init_us,
                c.rx_bytes,
                c.tx_bytes,
                c.channel_up_us,
                c.channel_down_us,
                c.connection_success_us,
                c.connection_failure_us,
                c.disconnect_us,
                &conn.client_disconnect_reason,
                c.idle_disconnect_us,
                p.rx_bytes,
                p.tx_bytes,
                p.channel_up_us,
                p.channel_down_us,
                p.connection_success_us,
                p.connection_failure_us,
                p.disconnect_us,
                conn.peripheral_disconnect_reason,
                p.idle_disconnect_us,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Links whose `role` channel came up at or before `us`. Whether they are
    /// still up is left to [`ConnectionInterval::is_active_at`].
    pub fn conn_infos_up_by(&self, run: RunId, role: ChannelRole, us: Micros) -> TraceResult<Vec<ConnectionInterval>> {
        let up_column = match role {
            ChannelRole::Client     => "client_channel_up_us",
            ChannelRole::Peripheral => "peripheral_channel_up_us",
        };
        let sql = format!(
            "SELECT {CONN_INFO_COLUMNS} FROM conn_info
             WHERE run = ?1 AND {up_column} <= ?2
             ORDER BY id ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![run, us], conn_info_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn conn_infos(&self, run: RunId) -> TraceResult<Vec<ConnectionInterval>> {
        let sql = format!("SELECT {CONN_INFO_COLUMNS} FROM conn_info WHERE run = ?1 ORDER BY id ASC");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![run], conn_info_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}
