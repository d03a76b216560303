//! Error types
//!
//! Defines the outcome taxonomy for sandbox resolution, filtering,
//! file operations and the control server.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Why a caller-supplied path was refused by the sandbox.
///
/// Produced before any filesystem mutation; never silently corrected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathRejection {
    #[error("path contains a NUL byte")]
    NulByte,

    #[error("absolute path not allowed: {0}")]
    AbsolutePath(String),

    #[error("path escapes the sandbox root: {0}")]
    EscapesRoot(String),

    #[error("symbolic link cannot be resolved: {0}")]
    UnresolvableLink(String),

    #[error("invalid entry name: {0:?}")]
    InvalidName(String),

    #[error("path belongs to a different sandbox: {0}")]
    ForeignPath(String),
}

/// Errors raised while building a sandbox.
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("sandbox root {path} cannot be opened: {source}")]
    RootUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("sandbox root is not a directory: {0}")]
    RootNotADirectory(PathBuf),
}

/// Errors raised while parsing an extension allow-list.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("extension allow-list is empty")]
    Empty,

    #[error("malformed extension pattern {0:?} (expected \"*.ext\")")]
    MalformedPattern(String),
}

/// Outcome of a guarded file operation that did not succeed.
#[derive(Debug, Error)]
pub enum FileOpError {
    /// The path was refused by the sandbox.
    #[error("rejected: {0}")]
    Rejected(#[from] PathRejection),

    /// Access policy or extension allow-list declined the operation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("file too large: more than {limit} bytes")]
    FileTooLarge { limit: u64 },

    /// Underlying filesystem failure not otherwise classified.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl FileOpError {
    /// Classifies an I/O error raised against `path`, turning a missing
    /// target into `NotFound`.
    pub fn from_io(error: io::Error, path: &str) -> Self {
        if error.kind() == io::ErrorKind::NotFound {
            FileOpError::NotFound(path.to_string())
        } else {
            FileOpError::Io(error)
        }
    }

    /// True for outcomes where the caller was refused rather than the
    /// target being absent or the input malformed.
    pub fn is_forbidden(&self) -> bool {
        matches!(self, FileOpError::Rejected(_) | FileOpError::Forbidden(_))
    }
}

/// Errors that stop the control server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("sandbox error: {0}")]
    Sandbox(#[from] SandboxError),

    #[error("filter error: {0}")]
    Filter(#[from] FilterError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
