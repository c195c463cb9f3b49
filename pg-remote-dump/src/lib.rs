//! Remote PostgreSQL dump over SSH
//!
//! Connects to a host with a private key, runs `pg_dump` inside a Docker
//! container there, and streams the dump into a timestamped local file:
//! - Command-line configuration
//! - Identity file loading
//! - SSH transport with a pty-backed exec channel
//! - Concurrent stdout/stderr relay

pub mod command;
pub mod config;
pub mod credential;
pub mod error;
pub mod output;
pub mod relay;
pub mod transport;

#[cfg(test)]
mod testing;

use chrono::NaiveDateTime;
use std::path::PathBuf;
use tracing::{debug, info};

pub use command::build_command;
pub use config::{Cli, Config};
pub use credential::{load_credential, Credential};
pub use error::{DumpError, Result};
pub use output::{output_path, report};
pub use transport::{RemoteExec, SshSession};

/// Run the dump on an already-open session, naming the file after `started_at`.
///
/// Returns the path of the fully written and closed dump file.
pub async fn dump_to_directory<E: RemoteExec>(
    exec: &mut E,
    config: &Config,
    started_at: NaiveDateTime,
) -> Result<PathBuf> {
    let path = output_path(&config.output_directory, started_at);
    let file = output::create_output_file(&path).await?;

    let cmd = build_command(config);
    debug!("Executing command: {:?}", cmd);

    let bytes = relay::capture(exec, &cmd, &path, file).await?;
    info!(bytes, path = %path.display(), "Dump complete");

    Ok(path)
}

/// Full run: load the key, connect, dump, disconnect.
pub async fn run(config: &Config) -> Result<PathBuf> {
    let credential = load_credential(&config.identity_file)?;
    debug!(?credential, "Loaded identity file");

    let mut session = SshSession::connect(&config.host, &config.user, &credential).await?;
    let path = dump_to_directory(&mut session, config, output::local_now()).await?;
    session.close().await;

    Ok(path)
}
