//! Storage result types
//!
//! Defines the records returned by listing and file operations.

use std::fs::File;

/// Kind of a listed filesystem object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    File,
    Directory,
}

/// A single listing record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Entry name, never containing a separator.
    pub name: String,
    pub kind: EntryKind,
    /// Size in bytes, 0 for directories.
    pub size: u64,
}

impl Entry {
    pub fn file(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::File,
            size,
        }
    }

    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Directory,
            size: 0,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

/// Result of a download: an open handle positioned at the start of the file.
#[derive(Debug)]
pub struct Download {
    pub file: File,
    pub size: u64,
    pub name: String,
}
