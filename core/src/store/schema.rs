//! Relation declarations and the dependency graph that orders them.
//!
//! RULE: Relations are never created or dropped from a hand-written list.
//! Creation follows a topological order of the `references` edges; dropping
//! follows its reverse. A new relation only has to declare what it references.

use crate::error::{TraceError, TraceResult};
use std::collections::HashSet;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    /// Written by the simulator while it runs. Never reset here.
    Raw,
    /// Derived from the raw log for analysis. Torn down by a reset.
    Analysis,
}

#[derive(Debug)]
pub struct Relation {
    pub name:       &'static str,
    pub kind:       RelationKind,
    pub references: &'static [&'static str],
    pub ddl:        &'static str,
}

pub static RELATIONS: &[Relation] = &[
    Relation {
        name: "run",
        kind: RelationKind::Raw,
        references: &[],
        ddl: r#"CREATE TABLE IF NOT EXISTS run (
                    id                 INTEGER PRIMARY KEY,
                    name               TEXT    NOT NULL,
                    "group"            TEXT,
                    start_ts           TEXT    NOT NULL,
                    end_ts             TEXT,
                    status             TEXT    NOT NULL,
                    seed               INTEGER NOT NULL,
                    simulation_time    INTEGER NOT NULL,
                    progress           INTEGER NOT NULL,
                    num_proxy_devices  INTEGER NOT NULL,
                    configuration_json TEXT    NOT NULL DEFAULT '{}'
                );"#,
    },
    Relation {
        name: "event",
        kind: RelationKind::Raw,
        references: &["run"],
        ddl: "CREATE TABLE IF NOT EXISTS event (
                  id        INTEGER PRIMARY KEY,
                  run       INTEGER NOT NULL REFERENCES run(id),
                  type      TEXT    NOT NULL,
                  device    INTEGER NOT NULL,
                  us        INTEGER NOT NULL,
                  data_json TEXT    NOT NULL
              );
              CREATE INDEX IF NOT EXISTS event_run_us ON event (run, us);",
    },
    Relation {
        name: "position",
        kind: RelationKind::Raw,
        references: &["run"],
        ddl: "CREATE TABLE IF NOT EXISTS position (
                  id     INTEGER PRIMARY KEY,
                  run    INTEGER NOT NULL REFERENCES run(id),
                  device INTEGER NOT NULL,
                  us     INTEGER NOT NULL,
                  pos_x  REAL    NOT NULL,
                  pos_y  REAL    NOT NULL,
                  UNIQUE (run, device, us)
              );",
    },
    Relation {
        name: "device",
        kind: RelationKind::Analysis,
        references: &["run"],
        ddl: "CREATE TABLE IF NOT EXISTS device (
                  id       INTEGER PRIMARY KEY,
                  run      INTEGER NOT NULL REFERENCES run(id),
                  number   INTEGER NOT NULL,
                  eid      TEXT    NOT NULL,
                  mac_addr TEXT    NOT NULL,
                  UNIQUE (run, number)
              );",
    },
    Relation {
        name: "conn_info",
        kind: RelationKind::Analysis,
        references: &["run", "device"],
        ddl: "CREATE TABLE IF NOT EXISTS conn_info (
                  id                               INTEGER PRIMARY KEY,
                  run                              INTEGER NOT NULL REFERENCES run(id),
                  client                           INTEGER NOT NULL REFERENCES device(id),
                  peripheral                       INTEGER NOT NULL REFERENCES device(id),
                  client_rx_bytes                  INTEGER,
                  client_tx_bytes                  INTEGER,
                  client_conn_init_us              INTEGER,
                  client_channel_up_us             INTEGER,
                  client_channel_down_us           INTEGER,
                  client_connection_success_us     INTEGER,
                  client_connection_failure_us     INTEGER,
                  client_disconnect_us             INTEGER,
                  client_disconnect_reason         TEXT,
                  client_idle_disconnect_us        INTEGER,
                  peripheral_rx_bytes              INTEGER,
                  peripheral_tx_bytes              INTEGER,
                  peripheral_channel_up_us         INTEGER,
                  peripheral_channel_down_us       INTEGER,
                  peripheral_connection_success_us INTEGER,
                  peripheral_connection_failure_us INTEGER,
                  peripheral_disconnect_us         INTEGER,
                  peripheral_disconnect_reason     INTEGER,
                  peripheral_idle_disconnect_us    INTEGER
              );
              CREATE INDEX IF NOT EXISTS conn_info_run ON conn_info (run);",
    },
    Relation {
        name: "bundle",
        kind: RelationKind::Analysis,
        references: &["run", "device"],
        ddl: "CREATE TABLE IF NOT EXISTS bundle (
                  id                    INTEGER PRIMARY KEY,
                  run                   INTEGER NOT NULL REFERENCES run(id),
                  source                INTEGER NOT NULL REFERENCES device(id),
                  destination_eid       TEXT,
                  source_eid            TEXT,
                  destination           INTEGER REFERENCES device(id),
                  creation_timestamp_ms INTEGER,
                  payload_length        INTEGER,
                  is_sv                 INTEGER NOT NULL DEFAULT 0,
                  lifetime_ms           INTEGER,
                  hop_count             INTEGER
              );",
    },
    Relation {
        name: "stored_bundle",
        kind: RelationKind::Analysis,
        references: &["run", "device", "bundle"],
        ddl: "CREATE TABLE IF NOT EXISTS stored_bundle (
                  id             INTEGER PRIMARY KEY,
                  run            INTEGER NOT NULL REFERENCES run(id),
                  device         INTEGER NOT NULL REFERENCES device(id),
                  bundle         INTEGER NOT NULL REFERENCES bundle(id),
                  created_us     INTEGER NOT NULL,
                  local_id       INTEGER NOT NULL,
                  deleted_us     INTEGER,
                  remaining_hops INTEGER
              );
              CREATE INDEX IF NOT EXISTS stored_bundle_run_bundle ON stored_bundle (run, bundle);",
    },
    Relation {
        name: "bundle_transmission",
        kind: RelationKind::Analysis,
        references: &["run", "conn_info", "stored_bundle"],
        ddl: "CREATE TABLE IF NOT EXISTS bundle_transmission (
                  id                     INTEGER PRIMARY KEY,
                  run                    INTEGER NOT NULL REFERENCES run(id),
                  conn_info              INTEGER NOT NULL REFERENCES conn_info(id),
                  source_stored_bundle   INTEGER NOT NULL REFERENCES stored_bundle(id),
                  received_stored_bundle INTEGER REFERENCES stored_bundle(id),
                  start_us               INTEGER,
                  end_us                 INTEGER
              );",
    },
];

/// The declared relations plus their creation order, computed once.
#[derive(Debug)]
pub struct RelationGraph {
    relations:      &'static [Relation],
    creation_order: Vec<usize>,
}

impl RelationGraph {
    /// Order `relations` topologically. Ties keep declaration order.
    pub fn new(relations: &'static [Relation]) -> TraceResult<Self> {
        let names: HashSet<&str> = relations.iter().map(|r| r.name).collect();
        if names.len() != relations.len() {
            return Err(TraceError::IntegrityViolation(
                "relation declared more than once".to_string(),
            ));
        }
        for rel in relations {
            if let Some(missing) = rel.references.iter().find(|r| !names.contains(*r)) {
                return Err(TraceError::IntegrityViolation(format!(
                    "relation `{}` references undeclared relation `{missing}`",
                    rel.name
                )));
            }
        }

        let mut placed: HashSet<&str> = HashSet::new();
        let mut creation_order = Vec::with_capacity(relations.len());
        while creation_order.len() < relations.len() {
            let next = relations.iter().enumerate().find(|(_, rel)| {
                !placed.contains(rel.name) && rel.references.iter().all(|r| placed.contains(r))
            });
            match next {
                Some((idx, rel)) => {
                    placed.insert(rel.name);
                    creation_order.push(idx);
                }
                None => {
                    let stuck: Vec<&str> = relations
                        .iter()
                        .map(|r| r.name)
                        .filter(|n| !placed.contains(n))
                        .collect();
                    return Err(TraceError::IntegrityViolation(format!(
                        "reference cycle among relations {stuck:?}"
                    )));
                }
            }
        }
        Ok(Self { relations, creation_order })
    }

    /// The graph of the trace schema, built on first use.
    pub fn trace() -> TraceResult<&'static RelationGraph> {
        static GRAPH: OnceLock<Result<RelationGraph, String>> = OnceLock::new();
        GRAPH
            .get_or_init(|| RelationGraph::new(RELATIONS).map_err(|e| e.to_string()))
            .as_ref()
            .map_err(|msg| TraceError::IntegrityViolation(msg.clone()))
    }

    pub fn get(&self, name: &str) -> Option<&'static Relation> {
        self.relations.iter().find(|r| r.name == name)
    }

    pub fn creation_order(&self, kind: RelationKind) -> Vec<&'static Relation> {
        self.creation_order
            .iter()
            .map(|&idx| &self.relations[idx])
            .filter(|r| r.kind == kind)
            .collect()
    }

    pub fn drop_order(&self, kind: RelationKind) -> Vec<&'static Relation> {
        let mut order = self.creation_order(kind);
        order.reverse();
        order
    }

    /// Relations that hold a reference to `name`.
    pub fn dependents<'g>(&'g self, name: &'g str) -> impl Iterator<Item = &'static Relation> + 'g {
        self.relations
            .iter()
            .filter(move |r| r.references.iter().any(|dep| *dep == name))
    }

    /// Check that `sequence` tears down every analysis relation, never
    /// leaves a dangling reference, and follows the declared drop order.
    pub fn validate_drop_sequence(&self, sequence: &[&str]) -> TraceResult<()> {
        let expected = self.drop_order(RelationKind::Analysis);

        let mut seen: HashSet<&str> = HashSet::new();
        for name in sequence {
            match self.get(name) {
                Some(rel) if rel.kind == RelationKind::Analysis => {}
                Some(_) => {
                    return Err(TraceError::IntegrityViolation(format!(
                        "`{name}` is a raw trace relation and is never dropped"
                    )))
                }
                None => {
                    return Err(TraceError::IntegrityViolation(format!(
                        "`{name}` is not a declared relation"
                    )))
                }
            }
            if !seen.insert(*name) {
                return Err(TraceError::IntegrityViolation(format!(
                    "`{name}` appears twice in the drop sequence"
                )));
            }
        }
        if sequence.len() != expected.len() {
            return Err(TraceError::IntegrityViolation(format!(
                "a reset drops all {} analysis relations, got {}",
                expected.len(),
                sequence.len()
            )));
        }

        let mut remaining: HashSet<&str> = self.relations.iter().map(|r| r.name).collect();
        for (pos, (name, want)) in sequence.iter().zip(&expected).enumerate() {
            if let Some(dep) = self.dependents(name).find(|d| remaining.contains(d.name)) {
                return Err(TraceError::IntegrityViolation(format!(
                    "cannot drop `{name}` while `{}` still references it",
                    dep.name
                )));
            }
            if *name != want.name {
                return Err(TraceError::IntegrityViolation(format!(
                    "`{name}` dropped at position {pos}, declared order expects `{}`",
                    want.name
                )));
            }
            remaining.remove(name);
        }
        Ok(())
    }
}
