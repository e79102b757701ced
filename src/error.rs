use rusqlite::ffi;
use thiserror::Error;

/// Business failures surfaced to the caller. None of these are retried.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Validation(String),
    #[error("storage failure: {0}")]
    Storage(#[from] rusqlite::Error),
    #[error("{0}")]
    Internal(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    pub fn forbidden(msg: impl Into<String>) -> Self {
        CoreError::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        CoreError::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        CoreError::Conflict(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        CoreError::Validation(msg.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            CoreError::Forbidden(_) => "forbidden",
            CoreError::NotFound(_) => "not_found",
            CoreError::Conflict(_) => "conflict",
            CoreError::Validation(_) => "validation_error",
            CoreError::Storage(_) | CoreError::Internal(_) => "internal_error",
        }
    }
}

/// Maps a failed write onto the business taxonomy. Unique/primary-key
/// violations become `Conflict`, dangling foreign keys become `NotFound`,
/// anything else stays a storage failure.
pub fn classify_write(e: rusqlite::Error, conflict: &str, missing: &str) -> CoreError {
    if let rusqlite::Error::SqliteFailure(f, _) = &e {
        match f.extended_code {
            ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                return CoreError::conflict(conflict);
            }
            ffi::SQLITE_CONSTRAINT_FOREIGNKEY => return CoreError::not_found(missing),
            _ => {}
        }
    }
    CoreError::Storage(e)
}
