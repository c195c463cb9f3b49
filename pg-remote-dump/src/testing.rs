//! Scripted stand-in for a remote session, used by unit tests

use crate::error::RemoteCommandError;
use crate::transport::{exit_outcome, CommandStreams, RemoteExec};
use std::time::Duration;
use tokio::io::{AsyncWriteExt, DuplexStream};

/// Small on purpose so relays see many short reads
const PIPE_CAPACITY: usize = 1024;

/// Replays fixed stdout/stderr chunks and then reports a fixed exit status.
pub(crate) struct ScriptedRemote {
    stdout: Vec<Vec<u8>>,
    stderr: Vec<Vec<u8>>,
    exit_status: u32,
    linger: Option<Duration>,
    sinks: Option<(DuplexStream, DuplexStream)>,
    pub(crate) commands: Vec<String>,
}

impl ScriptedRemote {
    pub(crate) fn succeeding(stdout: Vec<Vec<u8>>) -> Self {
        Self {
            stdout,
            stderr: Vec::new(),
            exit_status: 0,
            linger: None,
            sinks: None,
            commands: Vec::new(),
        }
    }

    pub(crate) fn with_stderr(mut self, stderr: Vec<Vec<u8>>) -> Self {
        self.stderr = stderr;
        self
    }

    /// Keep running this long after closing the output streams
    pub(crate) fn lingering(mut self, linger: Duration) -> Self {
        self.linger = Some(linger);
        self
    }

    pub(crate) fn exiting_with(mut self, status: u32) -> Self {
        self.exit_status = status;
        self
    }
}

impl RemoteExec for ScriptedRemote {
    fn take_streams(&mut self) -> CommandStreams {
        let (stdout, stdout_sink) = tokio::io::duplex(PIPE_CAPACITY);
        let (stderr, stderr_sink) = tokio::io::duplex(PIPE_CAPACITY);
        self.sinks = Some((stdout_sink, stderr_sink));
        CommandStreams { stdout, stderr }
    }

    async fn run(&mut self, command: &str) -> Result<(), RemoteCommandError> {
        self.commands.push(command.to_string());
        let (mut stdout, mut stderr) = self.sinks.take().expect("streams taken before run");

        // A reader that went away just stops receiving, like the real channel pump
        for chunk in &self.stdout {
            if stdout.write_all(chunk).await.is_err() {
                break;
            }
        }
        for chunk in &self.stderr {
            if stderr.write_all(chunk).await.is_err() {
                break;
            }
        }
        drop(stdout);
        drop(stderr);

        if let Some(linger) = self.linger {
            tokio::time::sleep(linger).await;
        }

        exit_outcome(Some(self.exit_status), None)
    }
}
