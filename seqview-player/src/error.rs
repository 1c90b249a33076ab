//! Error types for seqview-player
//!
//! Defines the player error type using thiserror for clear error
//! propagation, plus an `ErrorKind` classification for callers that only
//! care about the failure class.

use thiserror::Error;

/// Main error type for seqview-player
#[derive(Error, Debug)]
pub enum Error {
    /// Manifest fetch or parse failed (terminal, no playback possible)
    #[error("Manifest unavailable: {0}")]
    ManifestUnavailable(String),

    /// A single frame payload failed to load (recoverable)
    #[error("Frame load failed for {frame_id}: {reason}")]
    FrameLoadFailed { frame_id: String, reason: String },

    /// Invalid request from the control surface
    #[error("Bad request: {0}")]
    InvalidInput(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors from the shared library (configuration, I/O)
    #[error(transparent)]
    Common(#[from] seqview_common::Error),

    /// Other errors (e.g. the player task is gone)
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failure classes of the player
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ManifestUnavailable,
    FrameLoadFailed,
    Config,
    InvalidInput,
    Io,
    Internal,
}

impl Error {
    /// Build a FrameLoadFailed error
    pub fn frame_load(frame_id: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Error::FrameLoadFailed {
            frame_id: frame_id.into(),
            reason: reason.to_string(),
        }
    }

    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ManifestUnavailable(_) => ErrorKind::ManifestUnavailable,
            Error::FrameLoadFailed { .. } => ErrorKind::FrameLoadFailed,
            Error::InvalidInput(_) => ErrorKind::InvalidInput,
            Error::Io(_) => ErrorKind::Io,
            Error::Common(inner) => match inner {
                seqview_common::Error::Io(_) => ErrorKind::Io,
                seqview_common::Error::Config(_) => ErrorKind::Config,
                seqview_common::Error::InvalidInput(_) => ErrorKind::InvalidInput,
                seqview_common::Error::Internal(_) => ErrorKind::Internal,
            },
            Error::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Convenience Result type using seqview-player Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(
            Error::ManifestUnavailable("404".into()).kind(),
            ErrorKind::ManifestUnavailable
        );
        assert_eq!(
            Error::frame_load("a.png", "connection reset").kind(),
            ErrorKind::FrameLoadFailed
        );
        assert_eq!(
            Error::from(seqview_common::Error::Config("bad".into())).kind(),
            ErrorKind::Config
        );
    }

    #[test]
    fn test_frame_load_message_names_frame() {
        let err = Error::frame_load("images/b.jpg", "HTTP 404");
        assert_eq!(err.to_string(), "Frame load failed for images/b.jpg: HTTP 404");
    }
}
