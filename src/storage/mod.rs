//! File system storage management
//!
//! Handles directory listing and the guarded file operations.

pub mod listing;
pub mod operations;
pub mod results;

pub use listing::list_directory;
pub use operations::FileOps;
pub use results::{Download, Entry, EntryKind};
