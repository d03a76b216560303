//! Module `commands`
//!
//! Defines the control commands understood by the server and the parser
//! that turns a raw command line into a [`Command`].

/// A command parsed from one control line.
///
/// Paths are relative to the sandbox root and passed through untouched; the
/// sandbox decides whether they are acceptable.
#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    /// List a directory; empty path lists the root
    List(String),
    /// Create the last path segment inside its parent
    Mkd(String),
    /// Delete a file
    Dele(String),
    /// Delete a directory and everything below it
    Rmd(String),
    /// Upload; exactly `size` raw bytes follow the command line
    Stor { path: String, size: u64 },
    /// Download a file
    Retr(String),
    Noop,
    Quit,
    /// Unknown command or missing/malformed argument
    Unknown(String),
}

/// Status of an executed command.
#[derive(Debug, PartialEq, Eq)]
pub enum CommandStatus {
    Success,
    Failure(u16),
    CloseConnection,
}

/// Parses a raw command line into the `Command` enum.
///
/// Returns `Unknown` if a known command is missing a required argument.
pub fn parse_command(raw: &str) -> Command {
    let trimmed = raw.trim();
    let mut parts = trimmed.splitn(2, char::is_whitespace);
    let cmd = parts.next().unwrap_or("").to_ascii_uppercase();
    let arg = parts.next().unwrap_or("").trim();

    match cmd.as_str() {
        "LIST" => Command::List(arg.to_string()),
        "MKD" if !arg.is_empty() => Command::Mkd(arg.to_string()),
        "DELE" if !arg.is_empty() => Command::Dele(arg.to_string()),
        "RMD" if !arg.is_empty() => Command::Rmd(arg.to_string()),
        "RETR" if !arg.is_empty() => Command::Retr(arg.to_string()),
        "STOR" => parse_stor(arg).unwrap_or_else(|| Command::Unknown(trimmed.to_string())),
        "NOOP" => Command::Noop,
        "QUIT" => Command::Quit,
        _ => Command::Unknown(trimmed.to_string()),
    }
}

/// `STOR <path> <size>`; the path may contain spaces.
fn parse_stor(arg: &str) -> Option<Command> {
    let (path, size) = arg.rsplit_once(char::is_whitespace)?;
    let path = path.trim();
    if path.is_empty() {
        return None;
    }
    let size = size.parse().ok()?;
    Some(Command::Stor {
        path: path.to_string(),
        size,
    })
}

/// Splits `a/b/c` into (`a/b`, `c`); a bare name has an empty parent.
///
/// A leading separator stays on the parent so the sandbox can refuse it.
pub fn split_parent(path: &str) -> (&str, &str) {
    let path = path.trim_end_matches('/');
    match path.rsplit_once('/') {
        Some(("", name)) if path.starts_with('/') => ("/", name),
        Some((parent, name)) => (parent, name),
        None => ("", path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_commands() {
        assert_eq!(parse_command("QUIT"), Command::Quit);
        assert_eq!(parse_command("noop"), Command::Noop);
        assert_eq!(parse_command("LIST"), Command::List(String::new()));
    }

    #[test]
    fn test_parse_commands_with_args() {
        assert_eq!(
            parse_command("LIST photos/2024"),
            Command::List("photos/2024".to_string())
        );
        assert_eq!(parse_command("MKD albums"), Command::Mkd("albums".to_string()));
        assert_eq!(
            parse_command("DELE photos/cat.png"),
            Command::Dele("photos/cat.png".to_string())
        );
        assert_eq!(parse_command("RMD photos"), Command::Rmd("photos".to_string()));
        assert_eq!(
            parse_command("RETR my cat.png"),
            Command::Retr("my cat.png".to_string())
        );
    }

    #[test]
    fn test_parse_stor() {
        assert_eq!(
            parse_command("STOR photos/my cat.png 1024\r\n"),
            Command::Stor {
                path: "photos/my cat.png".to_string(),
                size: 1024
            }
        );
        assert_eq!(
            parse_command("STOR cat.png"),
            Command::Unknown("STOR cat.png".to_string())
        );
        assert_eq!(
            parse_command("STOR cat.png -1"),
            Command::Unknown("STOR cat.png -1".to_string())
        );
    }

    #[test]
    fn test_parse_with_whitespace() {
        assert_eq!(parse_command("  QUIT  "), Command::Quit);
        assert_eq!(
            parse_command("RETR   cat.png  "),
            Command::Retr("cat.png".to_string())
        );
    }

    #[test]
    fn test_unknown_commands() {
        assert_eq!(parse_command("SITE"), Command::Unknown("SITE".to_string()));
        assert_eq!(parse_command("MKD"), Command::Unknown("MKD".to_string()));
        assert_eq!(parse_command(""), Command::Unknown("".to_string()));
    }

    #[test]
    fn test_split_parent() {
        assert_eq!(split_parent("photos/2024"), ("photos", "2024"));
        assert_eq!(split_parent("a/b/c/"), ("a/b", "c"));
        assert_eq!(split_parent("albums"), ("", "albums"));
        assert_eq!(split_parent("/etc"), ("/", "etc"));
    }
}
