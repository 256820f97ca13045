//! Unified error model for the transfer service.
//! Client-boundary errors (`RegistryError`, `StoreError`) describe what went wrong talking to
//! an external collaborator; `TransferError` is what the orchestrator hands back to callers,
//! with helpers mapping each category onto the HTTP surface.

use serde::Serialize;
use thiserror::Error;

/// Failures reported by a session registry backend.
///
/// "Not found" is never an error here: `exists` answers `Ok(false)` and `delete`
/// treats a missing record as already removed.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry transport error: {0}")]
    Transport(String),
    #[error("registry call timed out after {0} ms")]
    Timeout(u64),
    #[error("registry responded with HTTP {code}")]
    Status { code: u16 },
    #[error("registry response could not be decoded: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for RegistryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            RegistryError::Decode(err.to_string())
        } else {
            RegistryError::Transport(err.to_string())
        }
    }
}

/// Failures reported by an object store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object '{name}' not found in group '{group}'")]
    NotFound { group: String, name: String },
    #[error("invalid object name: {0}")]
    InvalidName(String),
    #[error("store call timed out after {0} ms")]
    Timeout(u64),
    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),
    /// The caller's content stream failed mid-upload; the backend itself is fine.
    #[error("upload content stream failed: {0}")]
    ContentStream(std::io::Error),
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Errors surfaced by the session orchestrator to its callers.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Session absent or expired. Recoverable by creating a new session.
    #[error("session '{key}' is not live")]
    SessionInvalid { key: String },
    #[error("session registry unavailable: {cause}")]
    RegistryUnavailable { cause: RegistryError },
    #[error("object store unavailable: {cause}")]
    StoreUnavailable { cause: StoreError },
    /// The registry record is gone but the group's storage survived.
    #[error("session '{key}' invalidated but storage cleanup failed: {cause}")]
    PartialCleanupFailure { key: String, cause: StoreError },
    #[error("invalid file name: {0}")]
    InvalidFileName(String),
    #[error("file '{name}' not found in session '{key}'")]
    FileNotFound { key: String, name: String },
    #[error("session key generation failed: {0}")]
    KeyGeneration(String),
    /// The upload body broke off before completion. Nothing was stored.
    #[error("upload aborted: {0}")]
    UploadAborted(String),
}

impl TransferError {
    pub fn code_str(&self) -> &'static str {
        match self {
            TransferError::SessionInvalid { .. } => "session_invalid",
            TransferError::RegistryUnavailable { .. } => "registry_unavailable",
            TransferError::StoreUnavailable { .. } => "store_unavailable",
            TransferError::PartialCleanupFailure { .. } => "partial_cleanup_failure",
            TransferError::InvalidFileName(_) => "invalid_file_name",
            TransferError::FileNotFound { .. } => "file_not_found",
            TransferError::KeyGeneration(_) => "key_generation_failed",
            TransferError::UploadAborted(_) => "upload_aborted",
        }
    }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            TransferError::SessionInvalid { .. } => 404,
            TransferError::FileNotFound { .. } => 404,
            TransferError::InvalidFileName(_) => 400,
            TransferError::RegistryUnavailable { .. } => 503,
            TransferError::StoreUnavailable { .. } => 503,
            TransferError::PartialCleanupFailure { .. } => 500,
            TransferError::KeyGeneration(_) => 500,
            TransferError::UploadAborted(_) => 400,
        }
    }

    /// True for transient infrastructure failures a caller may retry with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransferError::RegistryUnavailable { .. } | TransferError::StoreUnavailable { .. })
    }

    /// Wire body for error responses.
    pub fn body(&self) -> ErrorBody {
        ErrorBody { status: "error", code: self.code_str(), message: self.to_string() }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub status: &'static str,
    pub code: &'static str,
    pub message: String,
}

pub type TransferResult<T> = Result<T, TransferError>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod error_tests;
