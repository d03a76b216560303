use log::{error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

use crate::client::ClientRegistry;
use crate::protocol::responses::{self, format_response};
use crate::protocol::{CommandStatus, handle_command, parse_command};
use crate::storage::FileOps;

/// One read from the control stream.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum CommandLine {
    Line(String),
    /// The line exceeded the limit; the rest of it has been discarded.
    TooLong,
    NotUtf8,
    Closed,
}

/// Reads one command line, holding at most `limit + 1` bytes in memory.
pub(crate) async fn read_command_line<R>(
    reader: &mut R,
    buffer: &mut Vec<u8>,
    limit: usize,
) -> io::Result<CommandLine>
where
    R: AsyncBufRead + Unpin,
{
    buffer.clear();
    let read = (&mut *reader)
        .take(limit as u64 + 1)
        .read_until(b'\n', buffer)
        .await?;
    if read == 0 {
        return Ok(CommandLine::Closed);
    }

    if buffer.len() > limit {
        if buffer.last() != Some(&b'\n') {
            discard_line(reader).await?;
        }
        return Ok(CommandLine::TooLong);
    }

    match std::str::from_utf8(buffer) {
        Ok(line) => Ok(CommandLine::Line(line.to_string())),
        Err(_) => Ok(CommandLine::NotUtf8),
    }
}

/// Drops input up to and including the next newline.
async fn discard_line<R>(reader: &mut R) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(());
        }
        match available.iter().position(|&b| b == b'\n') {
            Some(end) => {
                reader.consume(end + 1);
                return Ok(());
            }
            None => {
                let len = available.len();
                reader.consume(len);
            }
        }
    }
}

/// Handles a registered client session.
///
/// - Uses BufReader to read command lines of at most `max_command_length`
///   bytes; `STOR` payloads are read from the same buffered stream.
/// - Dispatches commands using `handle_command`.
/// - Removes the client from `clients` when the session ends.
pub async fn handle_client(
    cmd_stream: TcpStream,
    clients: Arc<Mutex<ClientRegistry>>,
    client_addr: SocketAddr,
    ops: Arc<FileOps>,
    max_command_length: usize,
) {
    let (read_half, mut write_half) = cmd_stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut buffer = Vec::new();

    loop {
        let line = match read_command_line(&mut reader, &mut buffer, max_command_length).await {
            Ok(CommandLine::Closed) => {
                info!("Connection closed by client {}", client_addr);
                break;
            }
            Ok(CommandLine::TooLong) => {
                warn!("Command from {} exceeds {} bytes", client_addr, max_command_length);
                let reply = format_response(responses::UNKNOWN_COMMAND, "Command too long");
                if write_half.write_all(reply.as_bytes()).await.is_err() {
                    break;
                }
                continue;
            }
            Ok(CommandLine::NotUtf8) => {
                warn!("Command from {} is not valid UTF-8", client_addr);
                let reply = format_response(responses::UNKNOWN_COMMAND, "Command is not valid UTF-8");
                if write_half.write_all(reply.as_bytes()).await.is_err() {
                    break;
                }
                continue;
            }
            Ok(CommandLine::Line(line)) => line,
            Err(e) => {
                error!("Failed to read from {}: {}", client_addr, e);
                break;
            }
        };

        let command = parse_command(&line);
        info!("Received from {}: {:?}", client_addr, &command);

        let status = match handle_command(&ops, command, &mut reader, &mut write_half).await {
            Ok(status) => status,
            Err(e) => {
                error!("Connection to {} failed: {}", client_addr, e);
                break;
            }
        };

        if let Some(client) = clients.lock().await.get_mut(&client_addr) {
            client.record(&status);
        }

        if status == CommandStatus::CloseConnection {
            info!("Client {} requested to quit", client_addr);
            break;
        }
    }

    let mut clients_guard = clients.lock().await;
    if let Some(client) = clients_guard.remove(&client_addr) {
        info!(
            "Client {} disconnected after {:?} ({} commands, {} failed)",
            client_addr,
            client.connected_for(),
            client.commands_handled(),
            client.failures()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_command_lines() {
        let mut reader: &[u8] = b"NOOP\r\nLIST photos\r\n";
        let mut buffer = Vec::new();

        assert_eq!(
            read_command_line(&mut reader, &mut buffer, 64).await.unwrap(),
            CommandLine::Line("NOOP\r\n".to_string())
        );
        assert_eq!(
            read_command_line(&mut reader, &mut buffer, 64).await.unwrap(),
            CommandLine::Line("LIST photos\r\n".to_string())
        );
        assert_eq!(
            read_command_line(&mut reader, &mut buffer, 64).await.unwrap(),
            CommandLine::Closed
        );
    }

    #[tokio::test]
    async fn test_oversized_line_is_bounded_and_skipped() {
        let mut input = vec![b'A'; 10_000];
        input.extend_from_slice(b"\r\nQUIT\r\n");
        let mut reader: &[u8] = &input;
        let mut buffer = Vec::new();

        assert_eq!(
            read_command_line(&mut reader, &mut buffer, 16).await.unwrap(),
            CommandLine::TooLong
        );
        assert!(buffer.len() <= 17);
        assert_eq!(
            read_command_line(&mut reader, &mut buffer, 16).await.unwrap(),
            CommandLine::Line("QUIT\r\n".to_string())
        );
    }

    #[tokio::test]
    async fn test_line_without_newline_until_eof() {
        let mut input = vec![b'A'; 100];
        let mut reader: &[u8] = &input;
        let mut buffer = Vec::new();

        assert_eq!(
            read_command_line(&mut reader, &mut buffer, 16).await.unwrap(),
            CommandLine::TooLong
        );
        assert_eq!(
            read_command_line(&mut reader, &mut buffer, 16).await.unwrap(),
            CommandLine::Closed
        );

        input.clear();
        input.extend_from_slice(b"RETR \xff.png\r\n");
        let mut reader: &[u8] = &input;
        assert_eq!(
            read_command_line(&mut reader, &mut buffer, 64).await.unwrap(),
            CommandLine::NotUtf8
        );
    }
}
