//! SQLite persistence layer.
//!
//! RULE: Only the store talks to the database.
//! The query engine and replay driver call store methods; they never execute SQL.
//!
//! A `TraceStore` is a session: it owns its connection and releases it on drop.
//! Nothing in this crate holds a process-wide handle.

use crate::{
    error::{TraceError, TraceResult},
    event::{NewEvent, TraceEvent},
    run::{parse_ts, NewRun, Run, RunStatus},
    types::{Micros, RunId},
};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

mod bundle;
mod connection;
mod device;
mod position;
pub mod schema;

pub use schema::{Relation, RelationGraph, RelationKind};

pub struct TraceStore {
    conn:  Connection,
    path:  Option<String>, // None for :memory:, Some(path) for file
    graph: &'static RelationGraph,
}

impl TraceStore {
    pub fn open(path: &str) -> TraceResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        log::debug!("Opened trace store at {path}");
        Ok(Self {
            conn,
            path: Some(path.to_string()),
            graph: RelationGraph::trace()?,
        })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> TraceResult<Self> {
        let conn = Connection::open(":memory:")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self {
            conn,
            path: None,
            graph: RelationGraph::trace()?,
        })
    }

    /// Reopen a new connection to the same database.
    /// For in-memory databases, this returns a new in-memory database (isolated).
    pub fn reopen(&self) -> TraceResult<Self> {
        match &self.path {
            Some(p) => Self::open(p),
            None => Self::in_memory(),
        }
    }

    pub fn graph(&self) -> &'static RelationGraph {
        self.graph
    }

    // ── Schema ─────────────────────────────────────────────────

    /// Define the raw trace relations (`run`, `event`, `position`).
    /// Safe to call any number of times.
    pub fn init_tables(&self) -> TraceResult<()> {
        self.define(RelationKind::Raw)
    }

    /// Define the analysis relations. Safe to call any number of times.
    pub fn init_eval_tables(&self) -> TraceResult<()> {
        self.define(RelationKind::Analysis)
    }

    fn define(&self, kind: RelationKind) -> TraceResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        for rel in self.graph.creation_order(kind) {
            tx.execute_batch(rel.ddl)?;
        }
        tx.commit()?;
        log::debug!("{kind:?} relations defined");
        Ok(())
    }

    /// Tear down every analysis relation so the run can be re-ingested.
    /// `run`, `event` and `position` are left untouched.
    pub fn reset_eval_tables(&self) -> TraceResult<()> {
        let order: Vec<&str> = self
            .graph
            .drop_order(RelationKind::Analysis)
            .into_iter()
            .map(|r| r.name)
            .collect();
        self.drop_eval_tables(&order)
    }

    /// Drop the analysis relations in the given order, as one unit.
    /// The order is checked against the relation graph before anything is
    /// dropped; a bad order leaves the schema as it was.
    pub fn drop_eval_tables(&self, order: &[&str]) -> TraceResult<()> {
        self.graph.validate_drop_sequence(order)?;
        let tx = self.conn.unchecked_transaction()?;
        for name in order {
            tx.execute_batch(&format!("DROP TABLE IF EXISTS {name};"))?;
        }
        tx.commit()?;
        log::info!("Analysis relations dropped: {}", order.join(", "));
        Ok(())
    }

    pub fn relation_exists(&self, name: &str) -> TraceResult<bool> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![name],
            |r| r.get(0),
        )?;
        Ok(n > 0)
    }

    /// Number of schema objects (tables and indexes) currently defined.
    pub fn relation_count(&self) -> TraceResult<i64> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master
             WHERE type IN ('table', 'index') AND name NOT LIKE 'sqlite_%'",
            [],
            |r| r.get(0),
        )?)
    }

    // ── Run ────────────────────────────────────────────────────

    pub fn insert_run(&self, run: &NewRun) -> TraceResult<RunId> {
        self.conn.execute(
            r#"INSERT INTO run (
                name, "group", start_ts, end_ts, status, seed,
                simulation_time, progress, num_proxy_devices, configuration_json
            ) VALUES (?1, ?2, ?3, NULL, ?4, ?5, ?6, 0, ?7, ?8)"#,
            params![
                &run.name,
                &run.group,
                run.start_ts.to_rfc3339(),
                RunStatus::Running.as_str(),
                run.seed as i64,
                run.simulation_time,
                run.num_proxy_devices,
                &run.configuration_json,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Resolve a run id. Non-positive or unknown ids are `NotFound`.
    pub fn run(&self, id: RunId) -> TraceResult<Run> {
        if id <= 0 {
            return Err(TraceError::not_found("run", id.to_string()));
        }
        let raw = self
            .conn
            .query_row(
                r#"SELECT id, name, "group", start_ts, end_ts, status, seed,
                          simulation_time, progress, num_proxy_devices, configuration_json
                   FROM run WHERE id = ?1"#,
                params![id],
                RawRun::from_row,
            )
            .optional()?;
        match raw {
            Some(raw) => raw.into_run(),
            None => Err(TraceError::not_found("run", id.to_string())),
        }
    }

    pub fn runs(&self) -> TraceResult<Vec<Run>> {
        let mut stmt = self.conn.prepare(
            r#"SELECT id, name, "group", start_ts, end_ts, status, seed,
                      simulation_time, progress, num_proxy_devices, configuration_json
               FROM run ORDER BY id ASC"#,
        )?;
        let raws = stmt
            .query_map([], RawRun::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        raws.into_iter().map(RawRun::into_run).collect()
    }

    pub fn update_run_progress(&self, id: RunId, progress: i64) -> TraceResult<()> {
        self.ensure_mutable(id)?;
        self.conn.execute(
            "UPDATE run SET progress = ?1 WHERE id = ?2",
            params![progress, id],
        )?;
        Ok(())
    }

    /// Close a run. Only a terminal status is accepted, and only once.
    pub fn finish_run(&self, id: RunId, status: RunStatus, end_ts: DateTime<Utc>) -> TraceResult<()> {
        if !status.is_terminal() {
            return Err(TraceError::IntegrityViolation(format!(
                "run {id} cannot finish with status '{}'",
                status.as_str()
            )));
        }
        self.ensure_mutable(id)?;
        self.conn.execute(
            "UPDATE run SET status = ?1, end_ts = ?2 WHERE id = ?3",
            params![status.as_str(), end_ts.to_rfc3339(), id],
        )?;
        log::debug!("Run {id} finished as {}", status.as_str());
        Ok(())
    }

    fn ensure_mutable(&self, id: RunId) -> TraceResult<()> {
        let run = self.run(id)?;
        if run.status.is_terminal() {
            return Err(TraceError::IntegrityViolation(format!(
                "run {id} is {} and can no longer change",
                run.status.as_str()
            )));
        }
        Ok(())
    }

    // ── Event log ──────────────────────────────────────────────

    pub fn append_event(&self, event: &NewEvent) -> TraceResult<i64> {
        self.conn.execute(
            "INSERT INTO event (run, type, device, us, data_json)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![event.run, event.event_type, event.device, event.us, event.data_json],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Events with `from_us <= us <= to_us`, in (us, insertion) order.
    pub fn events_between(&self, run: RunId, from_us: Micros, to_us: Micros) -> TraceResult<Vec<TraceEvent>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, run, type, device, us, data_json
             FROM event WHERE run = ?1 AND us >= ?2 AND us <= ?3
             ORDER BY us ASC, id ASC",
        )?;
        let entries = stmt
            .query_map(params![run, from_us, to_us], |row| {
                Ok(TraceEvent {
                    id:         row.get(0)?,
                    run:        row.get(1)?,
                    event_type: row.get(2)?,
                    device:     row.get(3)?,
                    us:         row.get(4)?,
                    data_json:  row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn event_count(&self, run: RunId) -> TraceResult<i64> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM event WHERE run = ?1",
            params![run],
            |r| r.get(0),
        )?)
    }
}

/// A run row before its text columns are parsed.
struct RawRun {
    id:                 RunId,
    name:               String,
    group:              Option<String>,
    start_ts:           String,
    end_ts:             Option<String>,
    status:             String,
    seed:               i64,
    simulation_time:    Micros,
    progress:           i64,
    num_proxy_devices:  i64,
    configuration_json: String,
}

impl RawRun {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id:                 row.get(0)?,
            name:               row.get(1)?,
            group:              row.get(2)?,
            start_ts:           row.get(3)?,
            end_ts:             row.get(4)?,
            status:             row.get(5)?,
            seed:               row.get(6)?,
            simulation_time:    row.get(7)?,
            progress:           row.get(8)?,
            num_proxy_devices:  row.get(9)?,
            configuration_json: row.get(10)?,
        })
    }

    fn into_run(self) -> TraceResult<Run> {
        Ok(Run {
            id:                 self.id,
            name:               self.name,
            group:              self.group,
            start_ts:           parse_ts(&self.start_ts)?,
            end_ts:             self.end_ts.as_deref().map(parse_ts).transpose()?,
            status:             RunStatus::parse(&self.status)?,
            seed:               self.seed as u64,
            simulation_time:    self.simulation_time,
            progress:           self.progress,
            num_proxy_devices:  self.num_proxy_devices,
            configuration_json: self.configuration_json,
        })
    }
}
