//! Error types for the logging engine.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while configuring or driving a logger.
#[derive(Debug, Error)]
pub enum LogError {
    /// A rotation path pattern could not be compiled.
    #[error("invalid rotate pattern ({pattern}): {reason}")]
    InvalidPattern {
        /// The pattern as configured.
        pattern: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A level string did not name a known level.
    #[error("invalid log level: {0:?}")]
    InvalidLevel(String),

    /// A timestamp layout contains an unsupported strftime directive.
    #[error("invalid time layout: {0:?}")]
    InvalidTimeLayout(String),

    /// A writer failed to initialize during registration.
    #[error("failed to initialize writer {writer}: {source}")]
    WriterInit {
        /// Name of the writer that failed.
        writer: String,
        /// The underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A file writer was asked to write before its file was opened.
    #[error("no opened file for {}", .0.display())]
    NoOpenFile(PathBuf),

    /// The logger was closed and no longer accepts records or writers.
    #[error("logger closed")]
    Closed,
}

impl LogError {
    /// Returns true for errors that must abort application startup.
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidPattern { .. }
                | Self::InvalidLevel(_)
                | Self::InvalidTimeLayout(_)
                | Self::WriterInit { .. }
        )
    }
}

/// Result type alias for logger operations.
pub type Result<T> = std::result::Result<T, LogError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let err = LogError::InvalidPattern {
            pattern: "app.%Q".to_string(),
            reason: "unknown placeholder %Q".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid rotate pattern (app.%Q): unknown placeholder %Q"
        );

        let err = LogError::InvalidLevel("loud".to_string());
        assert_eq!(err.to_string(), "invalid log level: \"loud\"");

        let err = LogError::Closed;
        assert_eq!(err.to_string(), "logger closed");

        let err = LogError::NoOpenFile(PathBuf::from("/var/log/app.log"));
        assert_eq!(err.to_string(), "no opened file for /var/log/app.log");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<LogError>();
    }

    #[test]
    fn error_io_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: LogError = io_err.into();
        assert!(err.to_string().contains("I/O error"));
        assert!(!err.is_config_error());
    }

    #[test]
    fn writer_init_is_config_error() {
        let err = LogError::WriterInit {
            writer: "file(/root/app.log)".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.is_config_error());
        assert!(err.to_string().contains("file(/root/app.log)"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn runtime_errors_are_not_config_errors() {
        assert!(!LogError::Closed.is_config_error());
        assert!(!LogError::NoOpenFile(PathBuf::from("x")).is_config_error());
        assert!(LogError::InvalidLevel("x".to_string()).is_config_error());
    }
}
