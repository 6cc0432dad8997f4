//! Scripted shell implementations for transport, client and scrape
//! tests. No network involved.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::session::SessionOptions;
use super::shell::Shell;
use super::Session;
use crate::error::TransportError;

type Handler = Box<dyn FnMut(&str) -> Result<String, TransportError> + Send>;

/// Priming commands issued by `Session::start`; scripted shells answer
/// these instantly so scenarios only shape real command traffic.
fn is_priming(command: &str) -> bool {
    command.is_empty() || command == "terminal length 0"
}

/// A `Shell` driven by a closure instead of a network channel.
pub(crate) struct ScriptedShell {
    handler: Handler,
    delay: Duration,
    calls: Arc<AtomicUsize>,
    commands: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
    busy: Arc<AtomicBool>,
}

impl ScriptedShell {
    pub fn new(
        handler: impl FnMut(&str) -> Result<String, TransportError> + Send + 'static,
    ) -> Self {
        Self {
            handler: Box::new(handler),
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
            commands: Arc::new(Mutex::new(Vec::new())),
            closed: Arc::new(AtomicBool::new(false)),
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Every command succeeds instantly.
    pub fn ok() -> Self {
        Self::new(|_| Ok(String::from("sw1#")))
    }

    /// Responds to a fixed map of command → output; unknown commands
    /// fail with `Disconnected`.
    pub fn with_outputs(outputs: &[(&str, &str)]) -> Self {
        let outputs: Vec<(String, String)> = outputs
            .iter()
            .map(|(c, o)| (c.to_string(), o.to_string()))
            .collect();
        Self::new(move |command| {
            if is_priming(command) {
                return Ok(String::from("sw1#"));
            }
            outputs
                .iter()
                .find(|(c, _)| c == command)
                .map(|(_, o)| o.clone())
                .ok_or(TransportError::Disconnected)
        })
    }

    /// Priming succeeds; every later command fails.
    pub fn flaky_after_priming() -> Self {
        Self::new(|command| {
            if is_priming(command) {
                Ok(String::from("sw1#"))
            } else {
                Err(TransportError::Disconnected)
            }
        })
    }

    /// Priming succeeds instantly; later commands take `delay` and then
    /// return `output`.
    pub fn slow(delay: Duration, output: &str) -> Self {
        let output = output.to_string();
        let mut shell = Self::new(move |command| {
            if is_priming(command) {
                Ok(String::from("sw1#"))
            } else {
                Ok(output.clone())
            }
        });
        shell.delay = delay;
        shell
    }

    /// Total `run_command` invocations, priming included.
    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }

    /// Every command text seen, in order.
    pub fn commands(&self) -> Arc<Mutex<Vec<String>>> {
        self.commands.clone()
    }

    /// Set once `close` has been called.
    pub fn closed(&self) -> Arc<AtomicBool> {
        self.closed.clone()
    }

    /// Spawn a ready `Session` over this shell (no transport).
    pub async fn into_session(self) -> Session {
        Session::start(self, None, SessionOptions::default(), "sw1".into())
            .await
            .expect("scripted session should prime")
    }
}

struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl Shell for ScriptedShell {
    async fn run_command(&mut self, command: &str) -> Result<String, TransportError> {
        assert!(
            !self.busy.swap(true, Ordering::SeqCst),
            "overlapping run_command calls on one shell"
        );
        // Cleared on drop so a call cancelled by its deadline does not
        // read as an overlap.
        let _guard = BusyGuard(self.busy.clone());

        self.calls.fetch_add(1, Ordering::SeqCst);
        self.commands.lock().unwrap().push(command.to_string());

        let result = (self.handler)(command);
        if !self.delay.is_zero() && !is_priming(command) {
            tokio::time::sleep(self.delay).await;
        }

        result
    }

    async fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
