//! fileroot: remote file management confined to a single directory tree.
//!
//! Every client-supplied path goes through a [`sandbox::PathSandbox`] before
//! any filesystem call; [`storage::FileOps`] layers the access policy and the
//! extension allow-list on top.

pub mod client;
pub mod config;
pub mod error;
pub mod filter;
pub mod protocol;
pub mod sandbox;
pub mod server;
pub mod storage;

pub use crate::config::ServerConfig;
pub use crate::error::{FileOpError, PathRejection, ServerError};
pub use crate::filter::ExtensionFilter;
pub use crate::sandbox::{AccessPolicy, AllowAll, Operation, PathSandbox, ReadOnly, ResolvedPath};
pub use crate::server::Server;
pub use crate::storage::{Download, Entry, EntryKind, FileOps};
