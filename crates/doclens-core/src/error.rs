//! Error taxonomy for per-file processing and remote engine calls.
//!
//! Detailed errors ([`EngineError`], [`FileError`]) carry the underlying
//! cause for operational logs. Callers only ever see an [`ErrorCategory`]
//! and its fixed message.

use serde::Serialize;
use thiserror::Error;

/// Classified failure of a call to the remote analysis engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Transport-level failure: connection refused, timeout, DNS, cancellation.
    #[error("analysis engine unavailable: {0}")]
    Unavailable(String),
    /// The engine answered with a non-success status.
    #[error("analysis engine returned status {status}")]
    BadStatus { status: u16 },
    /// The engine answered with a success status but a malformed body.
    #[error("malformed analysis engine response: {0}")]
    Decode(String),
}

impl EngineError {
    /// Short label used in the `error_kind` log field.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Unavailable(_) => "engine_unavailable",
            EngineError::BadStatus { .. } => "engine_bad_status",
            EngineError::Decode(_) => "engine_decode",
        }
    }

    /// User-facing category for this engine failure.
    pub fn category(&self) -> ErrorCategory {
        match self {
            EngineError::Unavailable(_) | EngineError::BadStatus { .. } => {
                ErrorCategory::ServiceUnavailable
            }
            EngineError::Decode(_) => ErrorCategory::InternalError,
        }
    }
}

/// Terminal failure of a single file's processing.
#[derive(Debug, Error)]
pub enum FileError {
    #[error("unsupported file type: {extension:?}")]
    UnsupportedFileType { extension: String },
    #[error("failed to read upload: {0}")]
    Io(#[from] std::io::Error),
    #[error("analysis engine unavailable: {0}")]
    RemoteUnavailable(String),
    #[error("analysis engine returned status {0}")]
    RemoteBadStatus(u16),
    #[error("malformed analysis engine response: {0}")]
    Decode(String),
    #[error("processing task failed: {0}")]
    Internal(String),
}

impl From<EngineError> for FileError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Unavailable(msg) => FileError::RemoteUnavailable(msg),
            EngineError::BadStatus { status } => FileError::RemoteBadStatus(status),
            EngineError::Decode(msg) => FileError::Decode(msg),
        }
    }
}

impl FileError {
    pub fn kind(&self) -> &'static str {
        match self {
            FileError::UnsupportedFileType { .. } => "unsupported_file_type",
            FileError::Io(_) => "io",
            FileError::RemoteUnavailable(_) => "engine_unavailable",
            FileError::RemoteBadStatus(_) => "engine_bad_status",
            FileError::Decode(_) => "engine_decode",
            FileError::Internal(_) => "internal",
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            FileError::UnsupportedFileType { .. } => ErrorCategory::UnsupportedFileType,
            FileError::RemoteUnavailable(_) | FileError::RemoteBadStatus(_) => {
                ErrorCategory::ServiceUnavailable
            }
            FileError::Io(_) | FileError::Decode(_) | FileError::Internal(_) => {
                ErrorCategory::InternalError
            }
        }
    }
}

/// What the caller is told. Each category has a fixed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    UnsupportedFileType,
    InternalError,
    ServiceUnavailable,
}

impl ErrorCategory {
    pub fn code(&self) -> &'static str {
        match self {
            ErrorCategory::UnsupportedFileType => "unsupported_file_type",
            ErrorCategory::InternalError => "internal_error",
            ErrorCategory::ServiceUnavailable => "service_unavailable",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            ErrorCategory::UnsupportedFileType => {
                "Unsupported file type. Please upload a valid document."
            }
            ErrorCategory::InternalError => "An internal error occurred. Please try again later.",
            ErrorCategory::ServiceUnavailable => {
                "Unable to contact the analysis service. Please try again later."
            }
        }
    }
}
