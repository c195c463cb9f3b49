//! Stream relay
//!
//! Copies the remote command's stderr to the local console and its stdout to
//! the dump file while the command runs. Success is only returned once the
//! dump file has been flushed and closed.

use crate::error::{DumpError, OutputWriteError};
use crate::transport::{CommandStreams, RemoteExec};
use std::io;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::task::JoinError;
use tracing::{debug, warn};

/// Run `command` on `exec`, writing its stdout into `file`.
///
/// stderr goes to this process's stderr. Returns the number of bytes written.
pub async fn capture<E: RemoteExec>(
    exec: &mut E,
    command: &str,
    path: &Path,
    file: File,
) -> Result<u64, DumpError> {
    capture_with_console(exec, command, path, file, tokio::io::stderr()).await
}

/// Same as [`capture`], relaying stderr into `console` instead.
pub async fn capture_with_console<E, W>(
    exec: &mut E,
    command: &str,
    path: &Path,
    mut file: File,
    console: W,
) -> Result<u64, DumpError>
where
    E: RemoteExec,
    W: AsyncWrite + Send + Unpin + 'static,
{
    let CommandStreams {
        mut stdout,
        mut stderr,
    } = exec.take_streams();

    // Not awaited: stderr is best effort and may still be draining at exit
    tokio::spawn(async move {
        let mut console = console;
        if let Err(e) = tokio::io::copy(&mut stderr, &mut console).await {
            warn!(error = %e, "Failed to relay remote stderr");
        }
    });

    let mut writer = tokio::spawn(async move {
        let copied = tokio::io::copy(&mut stdout, &mut file).await;
        let flushed = file.flush().await;
        drop(file);
        let bytes = copied?;
        flushed?;
        Ok::<u64, io::Error>(bytes)
    });

    let write_error = |source| OutputWriteError::Write {
        path: path.to_path_buf(),
        source,
    };

    let run = exec.run(command);
    tokio::pin!(run);

    // A failed write ends the run at once instead of draining the rest of the dump
    let bytes = tokio::select! {
        finished = &mut run => {
            finished?;
            joined_bytes(writer.await).map_err(write_error)?
        }
        joined = &mut writer => {
            let bytes = joined_bytes(joined).map_err(write_error)?;
            run.await?;
            bytes
        }
    };

    debug!(bytes, path = %path.display(), "Output file closed");
    Ok(bytes)
}

/// Bytes written by the stdout task, or the error that stopped it.
fn joined_bytes(joined: Result<io::Result<u64>, JoinError>) -> io::Result<u64> {
    joined.map_err(io::Error::other).and_then(|copied| copied)
}
