//! Shared error types for the converter.
//!
//! Each input format has its own error enum close to its parser
//! ([`ExecDataError`](crate::exec::ExecDataError),
//! [`ClassParseError`](crate::classfile::ClassParseError),
//! [`AnalysisError`](crate::analysis::AnalysisError)). This module wraps
//! them together with the offending path so the session can apply the
//! strict/lenient policy by [`ErrorKind`].

use crate::analysis::AnalysisError;
use crate::exec::ExecDataError;
use std::path::PathBuf;
use thiserror::Error;

/// Classification used by the load policy and the binary's exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or unreadable execution data or class input
    Load,
    /// Class hash disagrees with the execution data recorded for its name
    Mismatch,
    /// I/O failure while producing the report
    Write,
    /// Source root could not be scanned
    SourceIndex,
    /// Configuration file could not be read or parsed
    Config,
}

/// Main error type for conversion operations
#[derive(Debug, Error)]
pub enum ConvertError {
    /// Execution data file failed to load
    #[error("failed to load execfile {path}: {source}")]
    ExecData {
        path: PathBuf,
        #[source]
        source: ExecDataError,
    },

    /// Class file, directory or archive failed to analyze
    #[error("failed to load classfile {path}: {source}")]
    Classes {
        path: PathBuf,
        #[source]
        source: AnalysisError,
    },

    /// Class compiled differently from the one that produced the execution data
    #[error("Mismatch in coverage data for {class}")]
    Mismatch { class: String },

    /// Report output could not be written
    #[error("failed to write to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Source root walk failed
    #[error("failed to scan source path {path}: {source}")]
    SourcePath {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration file errors
    #[error("configuration error in {path}: {message}")]
    Config { path: PathBuf, message: String },
}

impl ConvertError {
    /// Create a configuration error with path context
    pub fn config(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Config {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ExecData { .. } | Self::Classes { .. } => ErrorKind::Load,
            Self::Mismatch { .. } => ErrorKind::Mismatch,
            Self::Write { .. } => ErrorKind::Write,
            Self::SourcePath { .. } => ErrorKind::SourceIndex,
            Self::Config { .. } => ErrorKind::Config,
        }
    }

    /// Whether the lenient policy may log this error and carry on.
    pub fn is_recoverable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Load | ErrorKind::Mismatch)
    }
}

/// Result type alias using our error type
pub type Result<T> = std::result::Result<T, ConvertError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        let mismatch = ConvertError::Mismatch {
            class: "com/example/Foo".into(),
        };
        assert_eq!(mismatch.kind(), ErrorKind::Mismatch);
        assert!(mismatch.is_recoverable());

        let write = ConvertError::Write {
            path: "out.info".into(),
            source: std::io::Error::other("disk full"),
        };
        assert_eq!(write.kind(), ErrorKind::Write);
        assert!(!write.is_recoverable());

        let config = ConvertError::config("cfg.toml", "bad key");
        assert_eq!(config.kind(), ErrorKind::Config);
        assert!(!config.is_recoverable());
    }

    #[test]
    fn test_mismatch_message_names_class() {
        let err = ConvertError::Mismatch {
            class: "com/example/Foo".into(),
        };
        assert_eq!(err.to_string(), "Mismatch in coverage data for com/example/Foo");
    }

    #[test]
    fn test_exec_data_error_carries_path() {
        let err = ConvertError::ExecData {
            path: "run.exec".into(),
            source: ExecDataError::UnknownBlock { block: 0x42 },
        };
        let message = err.to_string();
        assert!(message.contains("run.exec"));
        assert!(message.contains("0x42"));
        assert_eq!(err.kind(), ErrorKind::Load);
    }
}
