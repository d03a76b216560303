//! Reply handling
//!
//! Defines reply codes and formatting for the control connection.

use crate::storage::Entry;

/// Reply codes
pub const OPENING_DATA: u16 = 150;
pub const OK: u16 = 200;
pub const READY: u16 = 220;
pub const GOODBYE: u16 = 221;
pub const TRANSFER_COMPLETE: u16 = 226;
pub const FILE_ACTION_OK: u16 = 250;
pub const PATH_CREATED: u16 = 257;
pub const SERVICE_UNAVAILABLE: u16 = 421;
pub const NOT_FOUND: u16 = 450;
pub const LOCAL_ERROR: u16 = 451;
pub const UNKNOWN_COMMAND: u16 = 500;
pub const SYNTAX_ERROR_IN_ARGUMENTS: u16 = 501;
pub const ACCESS_DENIED: u16 = 550;
pub const STORAGE_EXCEEDED: u16 = 552;

/// Format a reply line
pub fn format_response(code: u16, message: &str) -> String {
    format!("{code} {message}\r\n")
}

/// Format one listing line: `D <size> <name>` or `F <size> <name>`
pub fn format_entry(entry: &Entry) -> String {
    let marker = if entry.is_dir() { 'D' } else { 'F' };
    format!("{marker} {} {}\r\n", entry.size, entry.name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format() {
        assert_eq!(format_response(OK, "OK"), "200 OK\r\n");
        assert_eq!(format_entry(&Entry::file("a b.png", 7)), "F 7 a b.png\r\n");
        assert_eq!(format_entry(&Entry::directory("sub")), "D 0 sub\r\n");
    }
}
