//! Error types for manager operations

use thiserror::Error;

/// Errors surfaced by the sync and update subsystems
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("Failed to fetch {artifact}: {message}")]
    Fetch { artifact: String, message: String },

    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type ManagerResult<T> = Result<T, ManagerError>;
