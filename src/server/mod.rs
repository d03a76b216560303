//! Server core functionality
//!
//! Binds the control socket and hands each connection to a session task.

pub mod core;

pub use core::Server;
