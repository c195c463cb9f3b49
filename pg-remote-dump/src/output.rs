//! Output file naming and result reporting

use crate::error::OutputWriteError;
use chrono::{Local, NaiveDateTime};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tokio::fs::File;

/// Local time format used as the dump file name, e.g. `2024-03-05T143012`
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H%M%S";

/// Path of the dump file for a run started at `now`.
pub fn output_path(directory: &Path, now: NaiveDateTime) -> PathBuf {
    directory.join(now.format(TIMESTAMP_FORMAT).to_string())
}

/// Current local time, as used for naming dump files
pub fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Create (or truncate) the dump file.
pub async fn create_output_file(path: &Path) -> Result<File, OutputWriteError> {
    File::create(path)
        .await
        .map_err(|source| OutputWriteError::Create {
            path: path.to_path_buf(),
            source,
        })
}

/// Print the produced file's path as the single line of program output.
pub fn report(path: &Path, out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "{}", path.display())?;
    out.flush()
}
