//! Error taxonomy for a dump run
//!
//! Every error is terminal. Each stage has its own error type carrying the
//! underlying cause, and `DumpError` names the failing stage on top of it.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// A required flag was not supplied (or was supplied empty).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("-{0} argument must be set")]
    Missing(char),
}

/// The identity file could not be turned into a credential.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("failed to read {}", path.display())]
    FileUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse private key in {}", path.display())]
    KeyUnparseable {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Dialing, authenticating, or preparing the execution channel failed.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("failed to dial {host}")]
    Dial {
        host: String,
        #[source]
        source: russh::Error,
    },

    #[error("public key authentication failed for user {user}")]
    Authenticate {
        user: String,
        #[source]
        source: russh::Error,
    },

    #[error("authentication rejected for user {user}")]
    AuthenticationRejected { user: String },

    #[error("failed to open session channel")]
    Channel(#[source] russh::Error),

    #[error("failed to request pty")]
    Pty(#[source] russh::Error),

    #[error("pty request rejected by remote host")]
    PtyRejected,
}

/// The remote command did not finish cleanly.
#[derive(Debug, Error)]
pub enum RemoteCommandError {
    #[error("failed to start remote command")]
    Start(#[source] russh::Error),

    #[error("remote host rejected the exec request")]
    Rejected,

    #[error("process exited with status {0}")]
    ExitStatus(u32),

    #[error("process terminated by signal {0}")]
    Signal(String),

    #[error("channel closed without an exit status")]
    MissingStatus,
}

/// Local output file could not be created or written.
#[derive(Debug, Error)]
pub enum OutputWriteError {
    #[error("failed to create {}", path.display())]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Top-level error for a dump run, one variant per stage.
#[derive(Debug, Error)]
pub enum DumpError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("Failed to load identity file")]
    Credential(#[from] CredentialError),

    #[error("Failed to connect")]
    Connection(#[from] ConnectionError),

    #[error("pg_dump command failed")]
    RemoteCommand(#[from] RemoteCommandError),

    #[error("Failed to write to output file")]
    OutputWrite(#[from] OutputWriteError),
}

/// Convenience type alias for Results with DumpError
pub type Result<T> = std::result::Result<T, DumpError>;
