//! Dialect-aware command client with response caching.

mod cache;
mod dialect;

pub use cache::{ResponseCache, DEFAULT_RESPONSE_TTL};
pub use dialect::{Dialect, IDENTIFY_COMMAND};

use std::sync::Mutex;
use std::time::Duration;

use log::{debug, trace};

use crate::error::ClientError;
use crate::transport::Session;

/// Sends commands to one device, caching responses within a TTL.
///
/// Concurrent collector units share one client; command execution is
/// serialized by the underlying [`Session`], and the cache lock is held
/// only for synchronous lookups, never across a command.
pub struct Client {
    session: Session,
    dialect: Option<Dialect>,
    cache: Mutex<ResponseCache>,
}

impl Client {
    pub fn new(session: Session) -> Self {
        Self::with_ttl(session, DEFAULT_RESPONSE_TTL)
    }

    pub fn with_ttl(session: Session, ttl: Duration) -> Self {
        Self {
            session,
            dialect: None,
            cache: Mutex::new(ResponseCache::new(ttl)),
        }
    }

    pub fn host(&self) -> &str {
        self.session.host()
    }

    /// Identify the OS dialect. Fatal to the device's scrape on
    /// failure: no meaningful commands can be chosen without a dialect.
    pub async fn identify(&mut self) -> Result<Dialect, ClientError> {
        let output = self.run_command(IDENTIFY_COMMAND).await?;
        match Dialect::classify(&output) {
            Some(dialect) => {
                debug!("{}: identified as {dialect}", self.host());
                self.dialect = Some(dialect);
                Ok(dialect)
            }
            None => Err(ClientError::UnknownOs {
                command: IDENTIFY_COMMAND.to_string(),
            }),
        }
    }

    /// The dialect established by [`identify`](Self::identify).
    pub fn dialect(&self) -> Option<Dialect> {
        self.dialect
    }

    /// Run a command, preferring a live cached response.
    pub async fn run_command(&self, command: &str) -> Result<String, ClientError> {
        if let Some(output) = self.cache.lock().unwrap().get(command) {
            trace!("{}: cache hit for '{command}'", self.host());
            return Ok(output);
        }

        let output = self.session.run_command(command).await?;
        self.cache
            .lock()
            .unwrap()
            .insert(command.to_string(), output.clone());
        Ok(output)
    }

    /// Close the underlying session.
    pub async fn close(self) {
        self.session.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::transport::testing::ScriptedShell;

    const VERSION_IOSXE: &str = "Cisco IOS XE Software, Version 17.09.04a\nsw1 uptime is 1 day";

    #[tokio::test(start_paused = true)]
    async fn identical_commands_within_ttl_hit_the_cache() {
        let shell = ScriptedShell::with_outputs(&[("show version", VERSION_IOSXE)]);
        let calls = shell.calls();
        let client = Client::new(shell.into_session().await);
        let priming = calls.load(std::sync::atomic::Ordering::SeqCst);

        let first = client.run_command("show version").await.unwrap();
        let second = client.run_command("show version").await.unwrap();
        assert_eq!(first, second, "cached output must be byte-identical");
        assert_eq!(
            calls.load(std::sync::atomic::Ordering::SeqCst) - priming,
            1,
            "one underlying transport call"
        );

        // After TTL expiry a fresh transport call is made.
        tokio::time::advance(Duration::from_secs(31)).await;
        client.run_command("show version").await.unwrap();
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst) - priming, 2);

        client.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn failed_commands_are_not_cached() {
        let shell = ScriptedShell::with_outputs(&[("show version", VERSION_IOSXE)]);
        let calls = shell.calls();
        let client = Client::new(shell.into_session().await);
        let priming = calls.load(std::sync::atomic::Ordering::SeqCst);

        for _ in 0..2 {
            let err = client.run_command("show ip arp summary").await.unwrap_err();
            assert!(matches!(
                err,
                ClientError::Transport(TransportError::Disconnected)
            ));
        }
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst) - priming, 2);

        client.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn identify_sets_the_dialect() {
        let shell = ScriptedShell::with_outputs(&[("show version", VERSION_IOSXE)]);
        let mut client = Client::new(shell.into_session().await);

        assert_eq!(client.dialect(), None);
        let dialect = client.identify().await.unwrap();
        assert_eq!(dialect, Dialect::IosXe);
        assert_eq!(client.dialect(), Some(Dialect::IosXe));

        client.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn identify_shares_the_version_cache_entry() {
        let shell = ScriptedShell::with_outputs(&[("show version", VERSION_IOSXE)]);
        let calls = shell.calls();
        let mut client = Client::new(shell.into_session().await);
        let priming = calls.load(std::sync::atomic::Ordering::SeqCst);

        client.identify().await.unwrap();
        // An uptime-style collector re-reading `show version` is served
        // from the cache.
        client.run_command("show version").await.unwrap();
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst) - priming, 1);

        client.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_os_is_an_identification_error() {
        let shell = ScriptedShell::with_outputs(&[("show version", "JUNOS 21.2R3.8")]);
        let mut client = Client::new(shell.into_session().await);

        let err = client.identify().await.unwrap_err();
        assert!(matches!(err, ClientError::UnknownOs { .. }));
        assert_eq!(client.dialect(), None);

        client.close().await;
    }
}
