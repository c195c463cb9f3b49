//! Command-line configuration
//!
//! Flags follow single-dash short names. `-h` carries the remote host, so the
//! usual `-h` help shortcut is replaced by `--help`.

use crate::error::ConfigurationError;
use clap::{ArgAction, Parser};
use std::path::PathBuf;

/// Container the dump command is executed in when `-n` is not given
pub const DEFAULT_CONTAINER: &str = "postgres";

/// Database role used by pg_dump when `-U` is not given
pub const DEFAULT_POSTGRES_USER: &str = "postgres";

/// Raw command-line input, before required flags are checked.
#[derive(Parser, Debug)]
#[command(name = "pg-remote-dump")]
#[command(about = "Dump a PostgreSQL database running in a remote Docker container over SSH")]
#[command(version)]
#[command(disable_help_flag = true)]
pub struct Cli {
    /// Host and port to connect to
    #[arg(short = 'h', value_name = "HOST:PORT")]
    pub host: Option<String>,

    /// Username
    #[arg(short = 'u', value_name = "USER")]
    pub user: Option<String>,

    /// Identity file to authenticate with
    #[arg(short = 'i', value_name = "FILE")]
    pub identity_file: Option<PathBuf>,

    /// Postgres database name to dump
    #[arg(short = 'd', value_name = "DATABASE")]
    pub database_name: Option<String>,

    /// Output directory
    #[arg(short = 'o', value_name = "DIR", default_value = ".")]
    pub output_directory: PathBuf,

    /// Docker container name
    #[arg(short = 'n', value_name = "CONTAINER", default_value = DEFAULT_CONTAINER)]
    pub container_name: String,

    /// User to connect to database with
    #[arg(short = 'U', value_name = "PGUSER", default_value = DEFAULT_POSTGRES_USER)]
    pub postgres_user: String,

    /// Verbose
    #[arg(short = 'v')]
    pub verbose: bool,

    /// Print help
    #[arg(long, action = ArgAction::Help)]
    help: Option<bool>,
}

/// Resolved configuration for a single dump run. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub user: String,
    pub identity_file: PathBuf,
    pub database_name: String,
    pub output_directory: PathBuf,
    pub container_name: String,
    pub postgres_user: String,
    pub verbose: bool,
}

fn required(value: Option<String>, flag: char) -> Result<String, ConfigurationError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or(ConfigurationError::Missing(flag))
}

impl Cli {
    /// Check required flags in priority order: host, user, identity file, database.
    ///
    /// An empty value counts as missing. Nothing else is validated.
    pub fn resolve(self) -> Result<Config, ConfigurationError> {
        let host = required(self.host, 'h')?;
        let user = required(self.user, 'u')?;
        let identity_file = self
            .identity_file
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or(ConfigurationError::Missing('i'))?;
        let database_name = required(self.database_name, 'd')?;

        Ok(Config {
            host,
            user,
            identity_file,
            database_name,
            output_directory: self.output_directory,
            container_name: self.container_name,
            postgres_user: self.postgres_user,
            verbose: self.verbose,
        })
    }
}
