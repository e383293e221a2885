// Error taxonomy for the sync hub
//
// Whole-request failures are `HubError`. Per-item failures inside a journal
// batch never become a `HubError`; they are folded into `SyncResult`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure raised by a repository implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("store connection poisoned")]
    Poisoned,

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// One structural problem found before any mutation happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub journal_external_id: String,
    pub error: String,
}

impl FieldError {
    pub fn new(journal_external_id: impl Into<String>, error: impl Into<String>) -> Self {
        FieldError {
            journal_external_id: journal_external_id.into(),
            error: error.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum HubError {
    /// Rejected before any mutation. The whole request fails.
    #[error("validation failed: {}", .0.len())]
    Validation(Vec<FieldError>),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// A pending unlock request already exists for the ledger.
    #[error("a pending unlock request already exists for this ledger")]
    PendingRequestExists {
        existing_request_id: String,
        created_at: chrono::DateTime<chrono::Utc>,
    },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl HubError {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Validation(_) | Self::InvalidInput(_) => 400,
            Self::Unauthorized(_) => 401,
            Self::NotFound(_) => 404,
            Self::PendingRequestExists { .. } | Self::Conflict(_) => 409,
            Self::Store(_) => 500,
        }
    }

    /// Message safe to hand to a caller. Store internals stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            Self::Validation(_) => "Validation failed".to_string(),
            Self::InvalidInput(msg)
            | Self::NotFound(msg)
            | Self::Conflict(msg)
            | Self::Unauthorized(msg) => msg.clone(),
            Self::PendingRequestExists { .. } => self.to_string(),
            Self::Store(_) => "Internal Server Error".to_string(),
        }
    }
}

pub type HubResult<T> = Result<T, HubError>;
