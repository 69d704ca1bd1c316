use thiserror::Error;

#[derive(Error, Debug)]
pub enum TraceError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    #[error("Integrity violation: {0}")]
    IntegrityViolation(String),

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TraceError {
    pub fn not_found(entity: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound { entity, key: key.into() }
    }
}

pub type TraceResult<T> = Result<T, TraceError>;
