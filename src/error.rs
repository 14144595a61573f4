use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum CoordError {
    #[error("Staging failed for job {job_id}: {reason}")]
    Staging { job_id: Uuid, reason: String },

    #[error("Conditional update conflict on job {job_id}: expected {expected}")]
    Conflict { job_id: Uuid, expected: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Expedited retrieval capacity exhausted")]
    Capacity,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl CoordError {
    /// Conflicts and missing records are expected under duplicate
    /// delivery; callers treat them as benign no-ops.
    pub fn is_benign(&self) -> bool {
        matches!(self, CoordError::Conflict { .. } | CoordError::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, CoordError>;
