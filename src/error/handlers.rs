//! Error handlers
//!
//! Maps file operation outcomes onto control-protocol reply codes.

use crate::error::types::FileOpError;
use crate::protocol::responses;
use log::{error, warn};

impl FileOpError {
    /// Reply code for this outcome. Refusals and missing targets get
    /// different codes so a client can tell them apart.
    pub fn reply_code(&self) -> u16 {
        match self {
            FileOpError::Rejected(_) | FileOpError::Forbidden(_) => responses::ACCESS_DENIED,
            FileOpError::NotFound(_) => responses::NOT_FOUND,
            FileOpError::InvalidArgument(_) => responses::SYNTAX_ERROR_IN_ARGUMENTS,
            FileOpError::FileTooLarge { .. } => responses::STORAGE_EXCEEDED,
            FileOpError::Io(_) => responses::LOCAL_ERROR,
        }
    }

    /// Short reply text; never echoes host paths back to the client.
    pub fn reply_text(&self) -> &'static str {
        match self {
            FileOpError::Rejected(_) | FileOpError::Forbidden(_) => "Access denied",
            FileOpError::NotFound(_) => "No such file or directory",
            FileOpError::InvalidArgument(_) => "Invalid argument",
            FileOpError::FileTooLarge { .. } => "File too large",
            FileOpError::Io(_) => "Local error in processing",
        }
    }
}

/// Log a failed operation at a level matching its class.
pub fn log_failure(operation: &str, target: &str, err: &FileOpError) {
    match err {
        FileOpError::Io(e) => error!("{operation} {target:?} failed: {e}"),
        _ => warn!("{operation} {target:?} refused: {err}"),
    }
}
