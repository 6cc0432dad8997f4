//! Session: one live shell connection with a serializing command
//! executor.
//!
//! An interactive shell is a single input/output stream; overlapping
//! writes and reads would corrupt the prompt framing. All command
//! traffic is funneled through a dedicated executor task that owns the
//! shell, consumes requests from a queue and replies over per-request
//! oneshot channels. Callers hold a cheap [`Session`] handle and may
//! submit concurrently; execution is strictly sequential.
//!
//! The executor also exclusively owns the session's circuit breaker, so
//! failure accounting needs no locking.

use std::time::Duration;

use log::{debug, warn};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::breaker::{CircuitBreaker, DEFAULT_BACKOFF_UNIT, DEFAULT_FAILURE_THRESHOLD};
use super::shell::{Shell, ShellChannel};
use super::ssh::SshTransport;
use crate::device::Device;
use crate::error::TransportError;

/// Shell command issued after connect to normalize the prompt state.
const DISABLE_PAGING_COMMAND: &str = "terminal length 0";

/// Tuning for a session's command executor.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Base per-command timeout; scaled by the failure count.
    pub base_timeout: Duration,

    /// Consecutive failures before the circuit breaker opens.
    pub failure_threshold: u32,

    /// Backoff window unit for the open breaker.
    pub backoff_unit: Duration,

    /// Depth of the pending-command queue.
    pub queue_depth: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            base_timeout: Duration::from_secs(5),
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            backoff_unit: DEFAULT_BACKOFF_UNIT,
            queue_depth: 32,
        }
    }
}

struct CommandRequest {
    command: String,
    reply: oneshot::Sender<Result<String, TransportError>>,
}

/// Handle to one live device session.
///
/// Exclusively owned by the scrape that created it; destroyed at scrape
/// end regardless of outcome. Dropping the handle shuts the executor
/// down and releases the transport.
pub struct Session {
    tx: mpsc::Sender<CommandRequest>,
    executor: JoinHandle<()>,
    host: String,
}

impl Session {
    /// Connect to a device, open the interactive shell and prime it:
    /// an empty command to settle the prompt, then paging disable.
    pub async fn connect(device: &Device) -> Result<Self, TransportError> {
        let transport = SshTransport::connect(device).await?;
        let channel = match transport.open_shell().await {
            Ok(channel) => channel,
            Err(e) => {
                transport.close().await;
                return Err(e);
            }
        };

        let shell = ShellChannel::new(channel, device.batch_size);
        let options = SessionOptions {
            base_timeout: device.command_timeout,
            ..SessionOptions::default()
        };
        Self::start(shell, Some(transport), options, device.host.clone()).await
    }

    /// Prime the shell and spawn the command executor.
    pub(crate) async fn start<S: Shell + 'static>(
        mut shell: S,
        transport: Option<SshTransport>,
        options: SessionOptions,
        host: String,
    ) -> Result<Self, TransportError> {
        let mut breaker =
            CircuitBreaker::new(options.failure_threshold, options.backoff_unit);

        for command in ["", DISABLE_PAGING_COMMAND] {
            if let Err(e) = execute(&mut shell, &mut breaker, &options, &host, command).await {
                shell.close().await;
                if let Some(transport) = transport {
                    transport.close().await;
                }
                return Err(e);
            }
        }

        let (tx, rx) = mpsc::channel(options.queue_depth);
        let executor = tokio::spawn(run_executor(
            shell,
            transport,
            rx,
            breaker,
            options,
            host.clone(),
        ));

        Ok(Self { tx, executor, host })
    }

    /// Submit one command and wait for its framed response.
    pub async fn run_command(&self, command: &str) -> Result<String, TransportError> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(CommandRequest {
                command: command.to_string(),
                reply,
            })
            .await
            .map_err(|_| TransportError::SessionClosed)?;
        response.await.map_err(|_| TransportError::SessionClosed)?
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Shut the executor down and wait for the transport to be
    /// released. Bounded by the in-flight command's deadline.
    pub async fn close(self) {
        drop(self.tx);
        let _ = self.executor.await;
    }
}

async fn run_executor<S: Shell>(
    mut shell: S,
    transport: Option<SshTransport>,
    mut rx: mpsc::Receiver<CommandRequest>,
    mut breaker: CircuitBreaker,
    options: SessionOptions,
    host: String,
) {
    while let Some(request) = rx.recv().await {
        let result = execute(&mut shell, &mut breaker, &options, &host, &request.command).await;
        // A dropped caller (unit timeout) is fine; the command already ran.
        let _ = request.reply.send(result);
    }

    shell.close().await;
    if let Some(transport) = transport {
        transport.close().await;
    }
    debug!("{host}: session closed");
}

async fn execute<S: Shell>(
    shell: &mut S,
    breaker: &mut CircuitBreaker,
    options: &SessionOptions,
    host: &str,
    command: &str,
) -> Result<String, TransportError> {
    if let Some(retry_in) = breaker.should_reject() {
        debug!("{host}: circuit open, rejecting '{command}' (retry in {retry_in:?})");
        return Err(TransportError::CircuitOpen { retry_in });
    }

    let deadline = breaker.effective_timeout(options.base_timeout);
    match tokio::time::timeout(deadline, shell.run_command(command)).await {
        Ok(Ok(output)) => {
            breaker.record_success();
            Ok(output)
        }
        Ok(Err(e)) => {
            breaker.record_failure();
            // EOF at session teardown is expected traffic, not noise.
            if e.is_disconnect() {
                debug!("{host}: '{command}' failed: {e}");
            } else {
                warn!("{host}: '{command}' failed: {e}");
            }
            Err(e)
        }
        Err(_) => {
            breaker.record_failure();
            warn!(
                "{host}: '{command}' timed out after {deadline:?} ({} consecutive failures)",
                breaker.failures()
            );
            Err(TransportError::Timeout(deadline))
        }
    }
}
