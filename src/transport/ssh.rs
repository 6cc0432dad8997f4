//! SSH transport implementation using russh.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, warn};
use russh::client::{self, Handle, Msg};
use russh::keys::{load_secret_key, PrivateKeyWithHashAlg, PublicKey};
use russh::Channel;
use secrecy::ExposeSecret;
use serde::Deserialize;

use crate::device::{AuthMethod, Device};
use crate::error::TransportError;

/// Terminal geometry for the requested PTY. Wide and short, so tabular
/// CLI output is not wrapped by the terminal.
const TERM_WIDTH: u32 = 2000;
const TERM_HEIGHT: u32 = 24;

/// Host key verification mode, analogous to OpenSSH's
/// `StrictHostKeyChecking`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostKeyVerification {
    /// Reject unknown and changed keys.
    Strict,

    /// Accept and auto-learn unknown keys, but reject changed keys.
    AcceptNew,

    /// Accept all keys without checking. The default: exporters
    /// typically poll large fleets where key management is external.
    #[default]
    Disabled,
}

/// SSH transport wrapping a russh client session.
pub struct SshTransport {
    session: Handle<SshHandler>,
    host: String,
}

impl SshTransport {
    /// Connect to the device and authenticate.
    pub async fn connect(device: &Device) -> Result<Self, TransportError> {
        let mut ssh_config = client::Config::default();
        // Sessions never outlive one scrape; the orchestrator deadline
        // bounds their lifetime, so no protocol-level inactivity cutoff.
        ssh_config.inactivity_timeout = None;
        if device.legacy_ciphers {
            let ciphers = ssh_config.preferred.cipher.to_mut();
            for name in [russh::cipher::AES_128_CBC, russh::cipher::AES_256_CBC] {
                if !ciphers.contains(&name) {
                    ciphers.push(name);
                }
            }
        }

        let rejected = Arc::new(AtomicBool::new(false));
        let handler = SshHandler {
            host: device.host.clone(),
            port: device.port,
            verification: device.host_key_verification.clone(),
            rejected: rejected.clone(),
        };

        let mut session = tokio::time::timeout(
            device.command_timeout,
            client::connect(
                Arc::new(ssh_config),
                (device.host.as_str(), device.port),
                handler,
            ),
        )
        .await
        .map_err(|_| TransportError::Timeout(device.command_timeout))?
        .map_err(|e| {
            if rejected.load(Ordering::Relaxed) {
                TransportError::HostKeyRejected {
                    host: device.host.clone(),
                    port: device.port,
                }
            } else {
                TransportError::Ssh(e)
            }
        })?;

        Self::authenticate(&mut session, device).await?;
        debug!("{}: connected and authenticated", device.host);

        Ok(Self {
            session,
            host: device.host.clone(),
        })
    }

    /// Open the interactive shell channel with a pseudo-terminal.
    pub async fn open_shell(&self) -> Result<Channel<Msg>, TransportError> {
        let channel = self
            .session
            .channel_open_session()
            .await
            .map_err(TransportError::Ssh)?;

        channel
            .request_pty(true, "vt100", TERM_WIDTH, TERM_HEIGHT, 0, 0, &[])
            .await
            .map_err(TransportError::Ssh)?;

        channel
            .request_shell(true)
            .await
            .map_err(TransportError::Ssh)?;

        Ok(channel)
    }

    async fn authenticate(
        session: &mut Handle<SshHandler>,
        device: &Device,
    ) -> Result<(), TransportError> {
        let success = match &device.auth {
            AuthMethod::None => session
                .authenticate_none(&device.username)
                .await
                .map_err(TransportError::Ssh)?
                .success(),
            AuthMethod::Password(password) => session
                .authenticate_password(&device.username, password.expose_secret())
                .await
                .map_err(TransportError::Ssh)?
                .success(),
            AuthMethod::PrivateKey { path, passphrase } => {
                let key = load_secret_key(path, passphrase.as_ref().map(|p| p.expose_secret()))
                    .map_err(|e| TransportError::Key(e.to_string()))?;

                let hash_alg = session
                    .best_supported_rsa_hash()
                    .await
                    .map_err(TransportError::Ssh)?
                    .flatten();

                session
                    .authenticate_publickey(
                        &device.username,
                        PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg),
                    )
                    .await
                    .map_err(TransportError::Ssh)?
                    .success()
            }
        };

        if !success {
            return Err(TransportError::AuthenticationFailed {
                user: device.username.clone(),
            });
        }

        Ok(())
    }

    /// Disconnect. Safe to call on an already-dead connection.
    pub async fn close(self) {
        if let Err(e) = self
            .session
            .disconnect(russh::Disconnect::ByApplication, "", "en")
            .await
        {
            debug!("{}: disconnect: {e}", self.host);
        }
    }
}

/// russh client handler enforcing the host key policy.
struct SshHandler {
    host: String,
    port: u16,
    verification: HostKeyVerification,
    /// Set when the key was rejected by policy, so connect() can report
    /// a policy error instead of a generic SSH error.
    rejected: Arc<AtomicBool>,
}

impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        let accept = match self.verification {
            HostKeyVerification::Disabled => true,

            HostKeyVerification::AcceptNew => {
                match russh::keys::check_known_hosts(&self.host, self.port, server_public_key) {
                    Ok(true) => true,
                    Ok(false) => {
                        if let Err(e) = russh::keys::known_hosts::learn_known_hosts(
                            &self.host,
                            self.port,
                            server_public_key,
                        ) {
                            warn!("{}: failed to record host key: {e}", self.host);
                        }
                        true
                    }
                    Err(e) => {
                        warn!("{}:{}: host key rejected: {e}", self.host, self.port);
                        false
                    }
                }
            }

            HostKeyVerification::Strict => {
                match russh::keys::check_known_hosts(&self.host, self.port, server_public_key) {
                    Ok(true) => true,
                    Ok(false) => {
                        warn!("{}:{}: host key not in known_hosts", self.host, self.port);
                        false
                    }
                    Err(e) => {
                        warn!("{}:{}: host key rejected: {e}", self.host, self.port);
                        false
                    }
                }
            }
        };

        if !accept {
            self.rejected.store(true, Ordering::Relaxed);
        }
        Ok(accept)
    }
}
