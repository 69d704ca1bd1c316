//! Configuration: the per-run model blob and the process environment.

use crate::error::{TraceError, TraceResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

// ── Run configuration ─────────────────────────────────────────────

/// The mobility model configuration a run was started with.
///
/// Stored in `run.configuration_json` as
/// `{"SIM_MODEL": "...", "SIM_MODEL_OPTIONS": "<json object as a string>"}`.
/// Interpreting the options (e.g. turning a density into a display area)
/// is left to model-specific code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunConfiguration {
    pub model:         String,
    pub model_options: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RunConfigurationFile {
    #[serde(rename = "SIM_MODEL")]
    model: String,
    #[serde(rename = "SIM_MODEL_OPTIONS", default)]
    model_options: Option<serde_json::Value>,
}

impl RunConfiguration {
    pub fn parse(configuration_json: &str) -> TraceResult<Self> {
        let file: RunConfigurationFile = serde_json::from_str(configuration_json)
            .map_err(|e| TraceError::MalformedInput(format!("run configuration: {e}")))?;

        let options = match file.model_options {
            None => serde_json::Value::Object(Default::default()),
            // The simulator writes the options as a JSON document inside a string.
            Some(serde_json::Value::String(inner)) => serde_json::from_str(&inner)
                .map_err(|e| TraceError::MalformedInput(format!("SIM_MODEL_OPTIONS: {e}")))?,
            Some(value) => value,
        };
        let serde_json::Value::Object(model_options) = options else {
            return Err(TraceError::MalformedInput(
                "SIM_MODEL_OPTIONS is not a JSON object".to_string(),
            ));
        };

        Ok(Self { model: file.model, model_options })
    }

    pub fn model_option_f64(&self, key: &str) -> TraceResult<f64> {
        self.model_options
            .get(key)
            .and_then(serde_json::Value::as_f64)
            .ok_or_else(|| {
                TraceError::MalformedInput(format!(
                    "model '{}' has no numeric option '{key}'",
                    self.model
                ))
            })
    }
}

// ── Environment ───────────────────────────────────────────────────

pub const DB_URI_VAR: &str = "SIM_DB_URI";
pub const LOG_DIR_VAR: &str = "SIM_LOG_DIR";
const DEFAULT_LOG_DIR: &str = "./logs";
const DEFAULT_DB_FILE: &str = "sim.db";

/// Where the trace database lives, taken from `SIM_DB_URI` / `SIM_LOG_DIR`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvConfig {
    pub log_dir: PathBuf,
    pub db_path: PathBuf,
}

impl EnvConfig {
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars().collect())
    }

    /// `SIM_DB_URI` may carry a `sqlite://` prefix. Relative paths resolve
    /// against the log directory.
    pub fn from_vars(vars: HashMap<String, String>) -> Self {
        let log_dir = PathBuf::from(
            vars.get(LOG_DIR_VAR).map(String::as_str).unwrap_or(DEFAULT_LOG_DIR),
        );
        let db_file = vars
            .get(DB_URI_VAR)
            .map(|uri| uri.strip_prefix("sqlite://").unwrap_or(uri.as_str()))
            .filter(|path| !path.is_empty())
            .unwrap_or(DEFAULT_DB_FILE);
        let db_path = if Path::new(db_file).is_absolute() {
            PathBuf::from(db_file)
        } else {
            log_dir.join(db_file)
        };
        Self { log_dir, db_path }
    }

    /// Create the log directory if it does not exist yet.
    pub fn ensure_log_dir(&self) -> TraceResult<()> {
        std::fs::create_dir_all(&self.log_dir)?;
        Ok(())
    }
}
