//! SSH transport
//!
//! Connects with public-key authentication, opens one session channel with a
//! pty, and runs a single command on it. The command's stdout and stderr are
//! exposed as local pipes that must be taken before the command starts.

use crate::credential::Credential;
use crate::error::{ConnectionError, RemoteCommandError};
use russh::client::{self, Handle, Msg};
use russh::keys::ssh_key::{HashAlg, PublicKey};
use russh::keys::PrivateKeyWithHashAlg;
use russh::{Channel, ChannelMsg, Disconnect, Pty};
use std::future::Future;
use std::ops::ControlFlow;
use std::sync::Arc;
use tokio::io::{AsyncWriteExt, DuplexStream};
use tracing::{debug, warn};

/// Pty geometry and modes requested for the exec channel
const TERM: &str = "xterm";
const PTY_COLUMNS: u32 = 80;
const PTY_ROWS: u32 = 40;
const PTY_BAUD: u32 = 14400;
const PTY_MODES: &[(Pty, u32)] = &[
    (Pty::ECHO, 0),
    (Pty::TTY_OP_ISPEED, PTY_BAUD),
    (Pty::TTY_OP_OSPEED, PTY_BAUD),
];

/// Buffer size of the local stdout/stderr pipes
const PIPE_CAPACITY: usize = 64 * 1024;

/// SSH extended data type for stderr
const EXTENDED_DATA_STDERR: u32 = 1;

/// Read halves of the remote command's output streams.
pub struct CommandStreams {
    pub stdout: DuplexStream,
    pub stderr: DuplexStream,
}

/// Something that can run one command and expose its output as byte streams.
pub trait RemoteExec {
    /// Hand out fresh stdout/stderr pipes. Call before `run`.
    ///
    /// Both pipes reach EOF once the remote side stops producing output.
    fn take_streams(&mut self) -> CommandStreams;

    /// Start `command` and wait until it exits.
    fn run(
        &mut self,
        command: &str,
    ) -> impl Future<Output = Result<(), RemoteCommandError>> + Send;
}

/// Turn what the channel reported at close into the command's outcome.
pub fn exit_outcome(
    exit_status: Option<u32>,
    exit_signal: Option<String>,
) -> Result<(), RemoteCommandError> {
    match (exit_status, exit_signal) {
        (Some(0), _) => Ok(()),
        (Some(code), _) => Err(RemoteCommandError::ExitStatus(code)),
        (None, Some(signal)) => Err(RemoteCommandError::Signal(signal)),
        (None, None) => Err(RemoteCommandError::MissingStatus),
    }
}

/// Client handler that accepts every host key.
///
/// Host identity is never verified, so the connection is open to
/// man-in-the-middle interception.
pub struct AcceptAnyHostKey;

impl client::Handler for AcceptAnyHostKey {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        debug!(
            fingerprint = %server_public_key.fingerprint(HashAlg::Sha256),
            "Accepting host key without verification"
        );
        Ok(true)
    }
}

/// Write halves of the pipes; `None` once closed or abandoned by the reader.
#[derive(Default)]
struct StreamSinks {
    stdout: Option<DuplexStream>,
    stderr: Option<DuplexStream>,
}

/// An authenticated SSH connection with one pty-backed session channel.
pub struct SshSession {
    handle: Handle<AcceptAnyHostKey>,
    channel: Channel<Msg>,
    sinks: StreamSinks,
}

impl SshSession {
    /// Dial `host` ("host:port"), authenticate as `user`, and open the exec channel.
    pub async fn connect(
        host: &str,
        user: &str,
        credential: &Credential,
    ) -> Result<Self, ConnectionError> {
        debug!(host, user, "Connecting via ssh");

        let config = Arc::new(client::Config::default());
        let mut handle = client::connect(config, host, AcceptAnyHostKey)
            .await
            .map_err(|source| ConnectionError::Dial {
                host: host.to_string(),
                source,
            })?;

        let authenticate = |source| ConnectionError::Authenticate {
            user: user.to_string(),
            source,
        };
        let hash_alg = handle
            .best_supported_rsa_hash()
            .await
            .map_err(authenticate)?
            .flatten();
        let auth = handle
            .authenticate_publickey(
                user,
                PrivateKeyWithHashAlg::new(credential.key(), hash_alg),
            )
            .await
            .map_err(authenticate)?;
        if !auth.success() {
            return Err(ConnectionError::AuthenticationRejected {
                user: user.to_string(),
            });
        }

        let channel = open_exec_channel(&handle).await?;
        debug!("Session opened with pty");

        Ok(Self {
            handle,
            channel,
            sinks: StreamSinks::default(),
        })
    }

    /// Disconnect from the remote host. Failures are only logged.
    pub async fn close(self) {
        if let Err(e) = self
            .handle
            .disconnect(Disconnect::ByApplication, "", "English")
            .await
        {
            warn!(error = %e, "Failed to disconnect cleanly");
        }
    }
}

/// Open a session channel and request a pty on it, closing the channel if the pty fails.
async fn open_exec_channel(
    handle: &Handle<AcceptAnyHostKey>,
) -> Result<Channel<Msg>, ConnectionError> {
    let mut channel = handle
        .channel_open_session()
        .await
        .map_err(ConnectionError::Channel)?;

    if let Err(e) = request_pty(&mut channel).await {
        if let Err(close_err) = channel.close().await {
            debug!(error = %close_err, "Failed to close channel after pty failure");
        }
        return Err(e);
    }

    Ok(channel)
}

async fn request_pty(channel: &mut Channel<Msg>) -> Result<(), ConnectionError> {
    channel
        .request_pty(true, TERM, PTY_COLUMNS, PTY_ROWS, 0, 0, PTY_MODES)
        .await
        .map_err(ConnectionError::Pty)?;

    // The reply to want_reply arrives as a channel message
    loop {
        match channel.wait().await {
            Some(ChannelMsg::Success) => return Ok(()),
            Some(ChannelMsg::Failure) | Some(ChannelMsg::Close) | None => {
                return Err(ConnectionError::PtyRejected)
            }
            Some(_) => {}
        }
    }
}

/// Push channel data into a local pipe.
///
/// If the reading side has gone away the pipe is dropped and further data is
/// discarded, so the channel keeps draining until the command exits.
async fn forward(sink: &mut Option<DuplexStream>, data: &[u8]) {
    let Some(writer) = sink.as_mut() else {
        return;
    };
    if let Err(e) = writer.write_all(data).await {
        debug!(error = %e, "Pipe reader went away, discarding remote output");
        *sink = None;
    }
}

/// Exit information reported by the channel before it closes
#[derive(Debug, Default)]
struct ExitState {
    status: Option<u32>,
    signal: Option<String>,
}

/// Handle one message from the exec channel.
///
/// Breaks once the channel is closed. A `Failure` reply means the exec
/// request itself was refused.
async fn apply(
    msg: ChannelMsg,
    sinks: &mut StreamSinks,
    exit: &mut ExitState,
) -> Result<ControlFlow<()>, RemoteCommandError> {
    match msg {
        ChannelMsg::Data { ref data } => forward(&mut sinks.stdout, data).await,
        ChannelMsg::ExtendedData { ref data, ext } if ext == EXTENDED_DATA_STDERR => {
            forward(&mut sinks.stderr, data).await
        }
        ChannelMsg::ExitStatus { exit_status } => exit.status = Some(exit_status),
        ChannelMsg::ExitSignal { signal_name, .. } => {
            exit.signal = Some(format!("{signal_name:?}"))
        }
        ChannelMsg::Failure => return Err(RemoteCommandError::Rejected),
        ChannelMsg::Eof => *sinks = StreamSinks::default(),
        ChannelMsg::Close => return Ok(ControlFlow::Break(())),
        _ => {}
    }
    Ok(ControlFlow::Continue(()))
}

impl RemoteExec for SshSession {
    fn take_streams(&mut self) -> CommandStreams {
        let (stdout, stdout_sink) = tokio::io::duplex(PIPE_CAPACITY);
        let (stderr, stderr_sink) = tokio::io::duplex(PIPE_CAPACITY);
        self.sinks = StreamSinks {
            stdout: Some(stdout_sink),
            stderr: Some(stderr_sink),
        };
        CommandStreams { stdout, stderr }
    }

    async fn run(&mut self, command: &str) -> Result<(), RemoteCommandError> {
        self.channel
            .exec(true, command)
            .await
            .map_err(RemoteCommandError::Start)?;

        let mut sinks = std::mem::take(&mut self.sinks);
        let mut exit = ExitState::default();

        while let Some(msg) = self.channel.wait().await {
            if apply(msg, &mut sinks, &mut exit).await?.is_break() {
                break;
            }
        }
        drop(sinks);

        debug!(exit_status = ?exit.status, exit_signal = ?exit.signal, "Remote command finished");
        exit_outcome(exit.status, exit.signal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use russh::CryptoVec;

    #[test]
    fn test_zero_status_is_success() {
        assert!(exit_outcome(Some(0), None).is_ok());
    }

    #[test]
    fn test_nonzero_status_fails() {
        assert!(matches!(
            exit_outcome(Some(1), None),
            Err(RemoteCommandError::ExitStatus(1))
        ));
    }

    #[test]
    fn test_signal_without_status_fails() {
        assert!(matches!(
            exit_outcome(None, Some("KILL".to_string())),
            Err(RemoteCommandError::Signal(sig)) if sig == "KILL"
        ));
    }

    #[test]
    fn test_no_status_fails() {
        assert!(matches!(
            exit_outcome(None, None),
            Err(RemoteCommandError::MissingStatus)
        ));
    }

    #[tokio::test]
    async fn test_forward_drops_abandoned_pipe() {
        let (reader, writer) = tokio::io::duplex(16);
        let mut sink = Some(writer);
        drop(reader);

        forward(&mut sink, b"dump bytes").await;
        assert!(sink.is_none());

        // Subsequent data is discarded quietly
        forward(&mut sink, b"more").await;
        assert!(sink.is_none());
    }

    /// Live sinks plus the read ends a local consumer would hold
    fn live_sinks() -> (StreamSinks, DuplexStream, DuplexStream) {
        let (stdout, stdout_sink) = tokio::io::duplex(1024);
        let (stderr, stderr_sink) = tokio::io::duplex(1024);
        let sinks = StreamSinks {
            stdout: Some(stdout_sink),
            stderr: Some(stderr_sink),
        };
        (sinks, stdout, stderr)
    }

    async fn drain(mut reader: DuplexStream) -> Vec<u8> {
        use tokio::io::AsyncReadExt;

        let mut received = Vec::new();
        reader.read_to_end(&mut received).await.unwrap();
        received
    }

    fn data(bytes: &[u8]) -> ChannelMsg {
        ChannelMsg::Data {
            data: CryptoVec::from_slice(bytes),
        }
    }

    fn extended(bytes: &[u8], ext: u32) -> ChannelMsg {
        ChannelMsg::ExtendedData {
            data: CryptoVec::from_slice(bytes),
            ext,
        }
    }

    #[tokio::test]
    async fn test_apply_routes_streams() {
        let (mut sinks, stdout, stderr) = live_sinks();
        let mut exit = ExitState::default();

        for msg in [
            data(b"line1\n"),
            extended(b"pg_dump: warning\n", EXTENDED_DATA_STDERR),
            data(b"line2\n"),
        ] {
            let flow = apply(msg, &mut sinks, &mut exit).await.unwrap();
            assert!(flow.is_continue());
        }
        drop(sinks);

        assert_eq!(drain(stdout).await, b"line1\nline2\n");
        assert_eq!(drain(stderr).await, b"pg_dump: warning\n");
    }

    #[tokio::test]
    async fn test_apply_drops_unknown_extended_data() {
        let (mut sinks, stdout, stderr) = live_sinks();
        let mut exit = ExitState::default();

        apply(extended(b"ignored", 2), &mut sinks, &mut exit)
            .await
            .unwrap();
        drop(sinks);

        assert!(drain(stdout).await.is_empty());
        assert!(drain(stderr).await.is_empty());
    }

    #[tokio::test]
    async fn test_apply_eof_closes_both_pipes() {
        let (mut sinks, stdout, stderr) = live_sinks();
        let mut exit = ExitState::default();

        apply(data(b"tail"), &mut sinks, &mut exit).await.unwrap();
        apply(ChannelMsg::Eof, &mut sinks, &mut exit).await.unwrap();
        assert!(sinks.stdout.is_none());
        assert!(sinks.stderr.is_none());

        // Readers see EOF while `sinks` is still alive
        assert_eq!(drain(stdout).await, b"tail");
        assert!(drain(stderr).await.is_empty());
    }

    #[tokio::test]
    async fn test_apply_records_status_then_breaks_on_close() {
        let (mut sinks, _stdout, _stderr) = live_sinks();
        let mut exit = ExitState::default();

        let flow = apply(ChannelMsg::ExitStatus { exit_status: 3 }, &mut sinks, &mut exit)
            .await
            .unwrap();
        assert!(flow.is_continue());
        let flow = apply(ChannelMsg::Close, &mut sinks, &mut exit).await.unwrap();
        assert!(flow.is_break());

        assert!(matches!(
            exit_outcome(exit.status, exit.signal),
            Err(RemoteCommandError::ExitStatus(3))
        ));
    }

    #[tokio::test]
    async fn test_apply_failure_after_exec_is_rejected() {
        let (mut sinks, _stdout, _stderr) = live_sinks();
        let mut exit = ExitState::default();

        // Unrelated success replies are ignored
        let flow = apply(ChannelMsg::Success, &mut sinks, &mut exit).await.unwrap();
        assert!(flow.is_continue());

        let result = apply(ChannelMsg::Failure, &mut sinks, &mut exit).await;
        assert!(matches!(result, Err(RemoteCommandError::Rejected)));
    }

    #[tokio::test]
    async fn test_forward_writes_to_live_pipe() {
        use tokio::io::AsyncReadExt;

        let (mut reader, writer) = tokio::io::duplex(16);
        let mut sink = Some(writer);

        forward(&mut sink, b"line1\n").await;
        drop(sink);

        let mut received = Vec::new();
        reader.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, b"line1\n");
    }
}
