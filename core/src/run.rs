//! Run records — one simulation execution and its lifecycle.

use crate::{
    error::{TraceError, TraceResult},
    types::{Micros, RunId, MICROS_PER_SECOND},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running   => "running",
            Self::Completed => "completed",
            Self::Failed    => "failed",
        }
    }

    pub fn parse(s: &str) -> TraceResult<Self> {
        match s {
            "running"   => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed"    => Ok(Self::Failed),
            other => Err(TraceError::MalformedInput(format!("unknown run status '{other}'"))),
        }
    }

    /// Completed and failed runs are frozen.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Run {
    pub id:                 RunId,
    pub name:               String,
    pub group:              Option<String>,
    pub start_ts:           DateTime<Utc>,
    pub end_ts:             Option<DateTime<Utc>>,
    pub status:             RunStatus,
    pub seed:               u64,
    /// Total simulated duration in microseconds.
    pub simulation_time:    Micros,
    pub progress:           i64,
    pub num_proxy_devices:  i64,
    pub configuration_json: String,
}

impl Run {
    pub fn simulation_time_seconds(&self) -> f64 {
        self.simulation_time as f64 / MICROS_PER_SECOND as f64
    }

    /// Number of devices including the central node.
    pub fn device_count(&self) -> i64 {
        self.num_proxy_devices + 1
    }
}

/// Values supplied by the simulator when a run starts.
#[derive(Debug, Clone)]
pub struct NewRun {
    pub name:               String,
    pub group:              Option<String>,
    pub start_ts:           DateTime<Utc>,
    pub seed:               u64,
    pub simulation_time:    Micros,
    pub num_proxy_devices:  i64,
    pub configuration_json: String,
}

impl NewRun {
    pub fn new(name: impl Into<String>, seed: u64, simulation_time: Micros, num_proxy_devices: i64) -> Self {
        Self {
            name: name.into(),
            group: None,
            start_ts: Utc::now(),
            seed,
            simulation_time,
            num_proxy_devices,
            configuration_json: "{}".to_string(),
        }
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn with_configuration(mut self, configuration_json: impl Into<String>) -> Self {
        self.configuration_json = configuration_json.into();
        self
    }
}

pub(crate) fn parse_ts(text: &str) -> TraceResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| TraceError::MalformedInput(format!("bad timestamp '{text}': {e}")))
}
