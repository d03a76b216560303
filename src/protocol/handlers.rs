//! Command handlers for the fileroot control connection.
//!
//! Each handler runs the blocking file operation on tokio's blocking pool
//! and writes the reply (and any payload) back to the client.

use std::io::{self, Seek, SeekFrom};
use std::sync::Arc;

use log::{error, info};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::FileOpError;
use crate::error::handlers::log_failure;
use crate::protocol::commands::{Command, CommandStatus, split_parent};
use crate::protocol::responses::{self, format_entry, format_response};
use crate::storage::{EntryKind, FileOps};

/// Dispatches a parsed command and writes its reply.
///
/// `reader` is the control stream positioned after the command line; `STOR`
/// consumes its payload from it. An `Err` means the connection itself is
/// unusable and must be closed.
pub async fn handle_command<R, W>(
    ops: &Arc<FileOps>,
    command: Command,
    reader: &mut R,
    writer: &mut W,
) -> io::Result<CommandStatus>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let status = match command {
        Command::List(path) => handle_cmd_list(ops, path, writer).await?,
        Command::Mkd(path) => handle_cmd_mkd(ops, path, writer).await?,
        Command::Dele(path) => handle_cmd_delete(ops, path, EntryKind::File, writer).await?,
        Command::Rmd(path) => handle_cmd_delete(ops, path, EntryKind::Directory, writer).await?,
        Command::Stor { path, size } => handle_cmd_stor(ops, path, size, reader, writer).await?,
        Command::Retr(path) => handle_cmd_retr(ops, path, writer).await?,
        Command::Noop => reply(writer, responses::OK, "OK").await?,
        Command::Quit => {
            reply(writer, responses::GOODBYE, "Goodbye").await?;
            CommandStatus::CloseConnection
        }
        Command::Unknown(raw) => {
            info!("Unknown command {raw:?}");
            reply(writer, responses::UNKNOWN_COMMAND, "Syntax error, command unrecognized")
                .await?;
            CommandStatus::Failure(responses::UNKNOWN_COMMAND)
        }
    };
    writer.flush().await?;
    Ok(status)
}

async fn handle_cmd_list<W>(ops: &Arc<FileOps>, path: String, writer: &mut W) -> io::Result<CommandStatus>
where
    W: AsyncWrite + Unpin,
{
    let target = path.clone();
    let result = run_blocking(ops, move |ops| {
        let dir = ops.resolve(&target)?;
        ops.list(&dir)
    })
    .await;

    match result {
        Ok(entries) => {
            let mut body = format_response(
                responses::OPENING_DATA,
                &format!("{} entries", entries.len()),
            );
            for entry in &entries {
                body.push_str(&format_entry(entry));
            }
            body.push_str(&format_response(responses::TRANSFER_COMPLETE, "Listing complete"));
            writer.write_all(body.as_bytes()).await?;
            Ok(CommandStatus::Success)
        }
        Err(e) => fail(writer, "LIST", &path, e).await,
    }
}

async fn handle_cmd_mkd<W>(ops: &Arc<FileOps>, path: String, writer: &mut W) -> io::Result<CommandStatus>
where
    W: AsyncWrite + Unpin,
{
    let target = path.clone();
    let result = run_blocking(ops, move |ops| {
        let (parent, name) = split_parent(&target);
        let parent = ops.resolve(parent)?;
        ops.create_directory(&parent, name)
    })
    .await;

    match result {
        Ok(_) => reply(writer, responses::PATH_CREATED, &format!("\"{path}\" created")).await,
        Err(e) => fail(writer, "MKD", &path, e).await,
    }
}

async fn handle_cmd_delete<W>(
    ops: &Arc<FileOps>,
    path: String,
    kind: EntryKind,
    writer: &mut W,
) -> io::Result<CommandStatus>
where
    W: AsyncWrite + Unpin,
{
    let target = path.clone();
    let result = run_blocking(ops, move |ops| {
        let resolved = ops.resolve_entry(&target)?;
        ops.delete(&resolved, kind)
    })
    .await;

    match (result, kind) {
        (Ok(()), EntryKind::File) => reply(writer, responses::FILE_ACTION_OK, "File deleted").await,
        (Ok(()), EntryKind::Directory) => {
            reply(writer, responses::FILE_ACTION_OK, "Directory removed").await
        }
        (Err(e), EntryKind::File) => fail(writer, "DELE", &path, e).await,
        (Err(e), EntryKind::Directory) => fail(writer, "RMD", &path, e).await,
    }
}

/// Receives `size` payload bytes and stores them at `path`.
///
/// The payload is always consumed, even when the upload is refused, so the
/// next command line starts where the client expects it.
async fn handle_cmd_stor<R, W>(
    ops: &Arc<FileOps>,
    path: String,
    size: u64,
    reader: &mut R,
    writer: &mut W,
) -> io::Result<CommandStatus>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    if let Some(limit) = ops.max_upload_bytes() {
        if size > limit {
            discard_payload(reader, size).await?;
            return fail(writer, "STOR", &path, FileOpError::FileTooLarge { limit }).await;
        }
    }

    let spool = match tempfile::tempfile() {
        Ok(file) => file,
        Err(e) => {
            discard_payload(reader, size).await?;
            return fail(writer, "STOR", &path, FileOpError::Io(e)).await;
        }
    };

    let mut spool = tokio::fs::File::from_std(spool);
    let received = tokio::io::copy(&mut (&mut *reader).take(size), &mut spool).await?;
    if received < size {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("upload ended after {received} of {size} bytes"),
        ));
    }
    spool.flush().await?;
    let mut spool = spool.into_std().await;

    let target = path.clone();
    let result = run_blocking(ops, move |ops| {
        spool.seek(SeekFrom::Start(0))?;
        let (parent, name) = split_parent(&target);
        let parent = ops.resolve(parent)?;
        ops.upload(&parent, name, &mut spool)
    })
    .await;

    match result {
        Ok(entry) => {
            reply(
                writer,
                responses::TRANSFER_COMPLETE,
                &format!("Stored {} bytes", entry.size),
            )
            .await
        }
        Err(e) => fail(writer, "STOR", &path, e).await,
    }
}

/// Sends the announced number of bytes of a file.
async fn handle_cmd_retr<W>(ops: &Arc<FileOps>, path: String, writer: &mut W) -> io::Result<CommandStatus>
where
    W: AsyncWrite + Unpin,
{
    let target = path.clone();
    let result = run_blocking(ops, move |ops| {
        let resolved = ops.resolve(&target)?;
        ops.download(&resolved)
    })
    .await;

    let download = match result {
        Ok(download) => download,
        Err(e) => return fail(writer, "RETR", &path, e).await,
    };

    let size = download.size;
    writer
        .write_all(
            format_response(responses::OPENING_DATA, &format!("{size} bytes follow")).as_bytes(),
        )
        .await?;

    let mut file = tokio::fs::File::from_std(download.file);
    let sent = tokio::io::copy(&mut (&mut file).take(size), writer).await?;
    if sent < size {
        // The file shrank underneath us; the client is waiting for bytes
        // that will never come.
        error!("RETR {path:?} sent {sent} of {size} bytes");
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("{} shrank during transfer", download.name),
        ));
    }

    info!("Sent {} ({sent} bytes)", download.name);
    reply(writer, responses::TRANSFER_COMPLETE, "Transfer complete").await
}

/// Runs a file operation on the blocking pool.
async fn run_blocking<T, F>(ops: &Arc<FileOps>, f: F) -> Result<T, FileOpError>
where
    F: FnOnce(&FileOps) -> Result<T, FileOpError> + Send + 'static,
    T: Send + 'static,
{
    let ops = Arc::clone(ops);
    tokio::task::spawn_blocking(move || f(&ops))
        .await
        .map_err(|e| FileOpError::Io(io::Error::other(e)))?
}

async fn discard_payload<R>(reader: &mut R, size: u64) -> io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let skipped = tokio::io::copy(&mut (&mut *reader).take(size), &mut tokio::io::sink()).await?;
    if skipped < size {
        return Err(io::ErrorKind::UnexpectedEof.into());
    }
    Ok(())
}

async fn reply<W>(writer: &mut W, code: u16, message: &str) -> io::Result<CommandStatus>
where
    W: AsyncWrite + Unpin,
{
    writer
        .write_all(format_response(code, message).as_bytes())
        .await?;
    Ok(CommandStatus::Success)
}

async fn fail<W>(
    writer: &mut W,
    operation: &str,
    target: &str,
    err: FileOpError,
) -> io::Result<CommandStatus>
where
    W: AsyncWrite + Unpin,
{
    log_failure(operation, target, &err);
    let code = err.reply_code();
    writer
        .write_all(format_response(code, err.reply_text()).as_bytes())
        .await?;
    Ok(CommandStatus::Failure(code))
}
