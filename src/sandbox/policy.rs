//! Access policy
//!
//! Pluggable authorization consulted by every file operation after the path
//! has been resolved. Alternate policies are substituted by passing a
//! different implementation, or any closure, to the file operations.

use std::fmt;

use super::ResolvedPath;

/// Operation a caller asks to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    List,
    Download,
    Upload,
    CreateDirectory,
    Delete,
}

impl Operation {
    /// Whether the operation leaves the filesystem untouched.
    pub fn is_read_only(&self) -> bool {
        matches!(self, Operation::List | Operation::Download)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::List => "list",
            Operation::Download => "download",
            Operation::Upload => "upload",
            Operation::CreateDirectory => "create directory",
            Operation::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// Decides whether `operation` may touch `target`.
///
/// Implementations are shared across connections and must not hold
/// mutable state.
pub trait AccessPolicy: Send + Sync {
    fn authorize(&self, operation: Operation, target: &ResolvedPath) -> bool;
}

/// Permits every operation inside the sandbox.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl AccessPolicy for AllowAll {
    fn authorize(&self, _operation: Operation, _target: &ResolvedPath) -> bool {
        true
    }
}

/// Permits listing and downloading only.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadOnly;

impl AccessPolicy for ReadOnly {
    fn authorize(&self, operation: Operation, _target: &ResolvedPath) -> bool {
        operation.is_read_only()
    }
}

impl<F> AccessPolicy for F
where
    F: Fn(Operation, &ResolvedPath) -> bool + Send + Sync,
{
    fn authorize(&self, operation: Operation, target: &ResolvedPath) -> bool {
        self(operation, target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::PathSandbox;
    use tempfile::TempDir;

    #[test]
    fn test_read_only_policy() {
        let temp_dir = TempDir::new().unwrap();
        let sandbox = PathSandbox::new(temp_dir.path()).unwrap();
        let root = sandbox.root_path();

        assert!(ReadOnly.authorize(Operation::List, &root));
        assert!(ReadOnly.authorize(Operation::Download, &root));
        assert!(!ReadOnly.authorize(Operation::Upload, &root));
        assert!(!ReadOnly.authorize(Operation::CreateDirectory, &root));
        assert!(!ReadOnly.authorize(Operation::Delete, &root));
        assert!(AllowAll.authorize(Operation::Delete, &root));
    }

    #[test]
    fn test_closure_policy() {
        let temp_dir = TempDir::new().unwrap();
        let sandbox = PathSandbox::new(temp_dir.path()).unwrap();

        let no_private = |_: Operation, target: &ResolvedPath| !target.relative().starts_with("private");

        let private = sandbox.resolve("private/notes.txt").unwrap();
        let public = sandbox.resolve("public/notes.txt").unwrap();
        assert!(!no_private.authorize(Operation::Download, &private));
        assert!(no_private.authorize(Operation::Download, &public));
    }
}
