//! Control protocol
//!
//! Handles command parsing, dispatch onto the file operations, and reply
//! formatting.

pub mod commands;
pub mod handlers;
pub mod responses;

pub use commands::{Command, CommandStatus, parse_command};
pub use handlers::handle_command;
