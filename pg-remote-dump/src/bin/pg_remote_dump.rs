//! pg-remote-dump - dump a containerized PostgreSQL database over SSH
//!
//! Prints the path of the dump file on success. Any failure is logged with
//! the stage that failed and the process exits non-zero.

use clap::Parser;
use common::init_logging;
use pg_remote_dump::{report, Cli};
use std::process::ExitCode;
use tracing::error;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let _guard = init_logging("pg-remote-dump", cli.verbose);

    let result = match cli.resolve() {
        Ok(config) => pg_remote_dump::run(&config).await,
        Err(e) => Err(e.into()),
    };

    let path = match result {
        Ok(path) => path,
        Err(e) => {
            error!("{:#}", anyhow::Error::from(e));
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = report(&path, &mut std::io::stdout().lock()) {
        error!(error = %e, "Failed to print output path");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
