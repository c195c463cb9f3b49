//! Remote dump command formatting

use crate::config::Config;

/// Build the remote command line that dumps the configured database.
///
/// Values are substituted verbatim with no shell quoting; a container, user,
/// or database name containing shell metacharacters produces a malformed
/// remote command.
pub fn build_command(config: &Config) -> String {
    format!(
        "docker exec -it {} pg_dump -C -U {} -d {}",
        config.container_name, config.postgres_user, config.database_name
    )
}
