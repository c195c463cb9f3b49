//! Structured logging initialization
//!
//! Provides consistent logging initialization for the dump tooling. Logs are
//! always written to stderr so stdout stays free for program results.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Guard that keeps the tracing subscriber active.
/// Drop this at the end of main to flush logs.
pub struct LogGuard;

/// Filter directive that enables debug output for a component's own crate.
///
/// Crate names use underscores in targets, so `pg-remote-dump` becomes `pg_remote_dump=debug`.
pub fn verbose_directive(component: &str) -> String {
    format!("{}=debug", component.replace('-', "_"))
}

/// Initialize structured logging for a component.
///
/// INFO is the floor for everything. With `verbose`, the component's own
/// crate logs at DEBUG while dependencies (the SSH stack in particular) stay
/// at INFO. `RUST_LOG` directives apply on top.
///
/// Returns a guard that should be held for the lifetime of the program.
///
/// # Example
/// ```ignore
/// let _guard = init_logging("pg-remote-dump", cli.verbose);
/// info!("Starting up...");
/// ```
pub fn init_logging(component: &str, verbose: bool) -> LogGuard {
    let mut filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());
    if verbose {
        if let Ok(directive) = verbose_directive(component).parse() {
            filter = filter.add_directive(directive);
        }
    }

    let format = fmt::layer().with_target(false).with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(format)
        .init();

    LogGuard
}
