//! Storage operations
//!
//! Guarded list, create-directory, delete, upload and download. Every
//! operation checks sandbox ownership and the access policy before touching
//! the filesystem; uploads and downloads are also gated by the extension
//! allow-list.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::sync::Arc;

use log::{debug, info, warn};
use tempfile::NamedTempFile;

use crate::error::{FileOpError, PathRejection};
use crate::filter::ExtensionFilter;
use crate::sandbox::{AccessPolicy, AllowAll, Operation, PathSandbox, ResolvedPath, validate_name};
use crate::storage::listing::list_directory;
use crate::storage::results::{Download, Entry, EntryKind};

/// File operations confined to one sandbox.
///
/// Holds only immutable configuration and can be shared across threads.
#[derive(Clone)]
pub struct FileOps {
    sandbox: PathSandbox,
    filter: ExtensionFilter,
    policy: Arc<dyn AccessPolicy>,
    max_upload_bytes: Option<u64>,
}

impl FileOps {
    /// Create file operations that allow every action inside the sandbox.
    pub fn new(sandbox: PathSandbox, filter: ExtensionFilter) -> Self {
        Self {
            sandbox,
            filter,
            policy: Arc::new(AllowAll),
            max_upload_bytes: None,
        }
    }

    /// Replace the access policy.
    pub fn with_policy<P: AccessPolicy + 'static>(mut self, policy: P) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    /// Limit upload size; `None` removes the limit.
    pub fn with_max_upload_bytes(mut self, limit: Option<u64>) -> Self {
        self.max_upload_bytes = limit;
        self
    }

    pub fn sandbox(&self) -> &PathSandbox {
        &self.sandbox
    }

    pub fn filter(&self) -> &ExtensionFilter {
        &self.filter
    }

    pub fn max_upload_bytes(&self) -> Option<u64> {
        self.max_upload_bytes
    }

    /// Resolve a caller-supplied path through the sandbox.
    pub fn resolve(&self, relative: &str) -> Result<ResolvedPath, FileOpError> {
        self.sandbox.resolve(relative).map_err(|rejection| {
            warn!("Rejected path {relative:?}: {rejection}");
            FileOpError::Rejected(rejection)
        })
    }

    /// Resolve a path for deletion: a symbolic link in the last segment is
    /// kept as is, so deleting it removes the link and not its target.
    pub fn resolve_entry(&self, relative: &str) -> Result<ResolvedPath, FileOpError> {
        self.sandbox.resolve_entry(relative).map_err(|rejection| {
            warn!("Rejected path {relative:?}: {rejection}");
            FileOpError::Rejected(rejection)
        })
    }

    /// Lists the entries of a directory.
    pub fn list(&self, dir: &ResolvedPath) -> Result<Vec<Entry>, FileOpError> {
        self.guard(Operation::List, dir)?;
        list_directory(&self.sandbox, dir, &self.filter)
    }

    /// Creates `name` inside `parent`. An existing directory is not an error.
    pub fn create_directory(
        &self,
        parent: &ResolvedPath,
        name: &str,
    ) -> Result<Entry, FileOpError> {
        validate_name(name).map_err(|e| FileOpError::InvalidArgument(e.to_string()))?;
        let target = self.sandbox.resolve_child(parent, name)?;
        self.guard(Operation::CreateDirectory, &target)?;

        match fs::create_dir(target.as_path()) {
            Ok(()) => info!("Created directory {target}"),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                if !target.as_path().is_dir() {
                    return Err(FileOpError::InvalidArgument(format!(
                        "{target} exists and is not a directory"
                    )));
                }
                debug!("Directory {target} already exists");
            }
            Err(e) => return Err(FileOpError::from_io(e, parent.relative())),
        }

        Ok(Entry::directory(name))
    }

    /// Deletes a file, or a directory with everything below it.
    ///
    /// A symbolic link counts as a file: it is unlinked and its target left
    /// alone. Use [`FileOps::resolve_entry`] to address the link itself.
    pub fn delete(&self, target: &ResolvedPath, kind: EntryKind) -> Result<(), FileOpError> {
        self.guard(Operation::Delete, target)?;

        if target.is_root() {
            return Err(FileOpError::Forbidden(
                "the sandbox root cannot be deleted".into(),
            ));
        }

        let metadata = fs::symlink_metadata(target.as_path())
            .map_err(|e| FileOpError::from_io(e, target.relative()))?;

        let removed = match (kind, metadata.is_dir()) {
            (EntryKind::File, false) => fs::remove_file(target.as_path()),
            (EntryKind::Directory, true) => fs::remove_dir_all(target.as_path()),
            (EntryKind::File, true) => {
                return Err(FileOpError::InvalidArgument(format!("{target} is a directory")));
            }
            (EntryKind::Directory, false) if metadata.file_type().is_symlink() => {
                return Err(FileOpError::InvalidArgument(format!(
                    "{target} is a symbolic link"
                )));
            }
            (EntryKind::Directory, false) => {
                return Err(FileOpError::InvalidArgument(format!(
                    "{target} is not a directory"
                )));
            }
        };
        removed.map_err(|e| FileOpError::from_io(e, target.relative()))?;

        info!("Deleted {kind:?} {target}");
        Ok(())
    }

    /// Writes `data` to `parent/name`, replacing any existing file.
    ///
    /// Data goes to a temporary file in the same directory which is renamed
    /// into place once complete, so a failed upload leaves nothing behind.
    pub fn upload<R: Read>(
        &self,
        parent: &ResolvedPath,
        name: &str,
        data: &mut R,
    ) -> Result<Entry, FileOpError> {
        validate_name(name).map_err(|e| FileOpError::InvalidArgument(e.to_string()))?;
        if !self.filter.is_allowed(name) {
            return Err(FileOpError::Forbidden(format!(
                "extension of {name:?} is not allowed"
            )));
        }

        let target = self.sandbox.resolve_child(parent, name)?;
        self.guard(Operation::Upload, &target)?;
        let stored_name = self.check_extension(&target)?;

        if target.as_path().is_dir() {
            return Err(FileOpError::InvalidArgument(format!("{target} is a directory")));
        }

        let directory = target
            .as_path()
            .parent()
            .ok_or_else(|| FileOpError::InvalidArgument(format!("{target} has no parent")))?;

        let mut temp_file = NamedTempFile::new_in(directory)
            .map_err(|e| FileOpError::from_io(e, parent.relative()))?;

        // Dropping `temp_file` on any error below removes it.
        let size = self.copy_limited(data, temp_file.as_file_mut())?;
        temp_file.as_file_mut().flush()?;

        temp_file
            .persist(target.as_path())
            .map_err(|e| FileOpError::Io(e.error))?;

        info!("Uploaded {target} ({size} bytes)");
        Ok(Entry::file(stored_name, size))
    }

    /// Opens a file for reading.
    pub fn download(&self, target: &ResolvedPath) -> Result<Download, FileOpError> {
        self.guard(Operation::Download, target)?;
        let name = self.check_extension(target)?;

        // Checked before opening: opening a fifo blocks.
        let metadata =
            fs::metadata(target.as_path()).map_err(|e| FileOpError::from_io(e, target.relative()))?;
        if !metadata.is_file() {
            return Err(FileOpError::NotFound(target.relative().to_string()));
        }

        let file =
            File::open(target.as_path()).map_err(|e| FileOpError::from_io(e, target.relative()))?;
        let size = file.metadata()?.len();

        info!("Opened {target} for download ({size} bytes)");
        Ok(Download {
            file,
            size,
            name: name.to_string(),
        })
    }

    /// Sandbox ownership first, then the access policy.
    fn guard(&self, operation: Operation, target: &ResolvedPath) -> Result<(), FileOpError> {
        if !self.sandbox.contains(target) {
            return Err(PathRejection::ForeignPath(target.to_string()).into());
        }
        if !self.policy.authorize(operation, target) {
            warn!("Policy refused {operation} on {target}");
            return Err(FileOpError::Forbidden(format!(
                "{operation} is not permitted on {target}"
            )));
        }
        Ok(())
    }

    /// The resolved name must be allowed too: a link may point at a file with
    /// a different extension.
    fn check_extension<'a>(&self, target: &'a ResolvedPath) -> Result<&'a str, FileOpError> {
        let name = target
            .file_name()
            .ok_or_else(|| FileOpError::NotFound(target.to_string()))?;
        if !self.filter.is_allowed(name) {
            return Err(FileOpError::Forbidden(format!(
                "extension of {name:?} is not allowed"
            )));
        }
        Ok(name)
    }

    fn copy_limited<R: Read, W: Write>(
        &self,
        reader: &mut R,
        writer: &mut W,
    ) -> Result<u64, FileOpError> {
        match self.max_upload_bytes {
            None => Ok(io::copy(reader, writer)?),
            Some(limit) => {
                let mut limited = reader.take(limit.saturating_add(1));
                let copied = io::copy(&mut limited, writer)?;
                if copied > limit {
                    return Err(FileOpError::FileTooLarge { limit });
                }
                Ok(copied)
            }
        }
    }
}
