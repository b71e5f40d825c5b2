//! Error types for the integrity checker

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Error kinds that can occur while checking a directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PintErrorKind {
    /// Permission denied when accessing a file or directory
    PermissionDenied,
    /// File or directory not found
    NotFound,
    /// I/O error while reading a file or listing a directory
    Io,
    /// The image decoder could not parse the file
    Decode,
    /// A manifest row was malformed
    ManifestParse,
    /// Writing or renaming the manifest failed
    ManifestWrite,
    /// Path cannot be represented (non UTF-8 or reserved characters)
    InvalidPath,
    /// Conflicting or unusable run options
    InvalidArgument,
    /// The hashing worker pool could not be built
    ThreadPool,
}

/// Represents an error that occurred during a check
#[derive(Debug, Error, Serialize)]
#[error("{kind:?}: {message} (path: {path:?})")]
pub struct PintError {
    /// The kind of error
    pub kind: PintErrorKind,
    /// The path where the error occurred
    pub path: Option<PathBuf>,
    /// Human-readable error message
    pub message: String,
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, PintError>;

impl PintError {
    /// Create a new error
    pub fn new(kind: PintErrorKind, path: Option<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            kind,
            path,
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(path: PathBuf) -> Self {
        Self::new(
            PintErrorKind::NotFound,
            Some(path.clone()),
            format!("Not found: {:?}", path),
        )
    }

    /// Wrap an I/O error, keeping its kind and attaching the path and operation
    pub fn io(path: PathBuf, operation: &str, err: std::io::Error) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::PermissionDenied => PintErrorKind::PermissionDenied,
            std::io::ErrorKind::NotFound => PintErrorKind::NotFound,
            _ => PintErrorKind::Io,
        };
        Self::new(kind, Some(path), format!("{}: {}", operation, err))
    }

    /// Create an image decode error
    pub fn decode(path: PathBuf, message: impl Into<String>) -> Self {
        Self::new(PintErrorKind::Decode, Some(path), message)
    }

    /// Create a manifest parse error for a given 1-based line
    pub fn manifest_parse(path: PathBuf, line: usize, message: impl Into<String>) -> Self {
        Self::new(
            PintErrorKind::ManifestParse,
            Some(path),
            format!("line {}: {}", line, message.into()),
        )
    }

    /// Create a manifest write error
    pub fn manifest_write(path: PathBuf, message: impl Into<String>) -> Self {
        Self::new(PintErrorKind::ManifestWrite, Some(path), message)
    }

    /// Create an invalid path error
    pub fn invalid_path(path: PathBuf, message: impl Into<String>) -> Self {
        Self::new(PintErrorKind::InvalidPath, Some(path), message)
    }

    /// Create an invalid argument error
    pub fn invalid_argument(path: Option<PathBuf>, message: impl Into<String>) -> Self {
        Self::new(PintErrorKind::InvalidArgument, path, message)
    }

    /// Whether this error is fatal for a whole directory pass
    pub fn is_manifest_error(&self) -> bool {
        matches!(
            self.kind,
            PintErrorKind::ManifestParse | PintErrorKind::ManifestWrite
        )
    }
}

impl From<std::io::Error> for PintError {
    fn from(err: std::io::Error) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::PermissionDenied => PintErrorKind::PermissionDenied,
            std::io::ErrorKind::NotFound => PintErrorKind::NotFound,
            _ => PintErrorKind::Io,
        };
        Self::new(kind, None, err.to_string())
    }
}

impl From<rayon::ThreadPoolBuildError> for PintError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        Self::new(PintErrorKind::ThreadPool, None, err.to_string())
    }
}
