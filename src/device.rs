//! Resolved device description.
//!
//! A [`Device`] is built once from configuration and is immutable for
//! the process lifetime. Its identity key is the host.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::config::{Config, DeviceConfig, DEFAULT_SSH_PORT};
use crate::config::FeatureSet;
use crate::transport::HostKeyVerification;

/// Authentication method for SSH connections.
#[derive(Debug, Clone)]
pub enum AuthMethod {
    /// No authentication (for testing only).
    None,

    /// Password authentication.
    Password(SecretString),

    /// Private key authentication.
    PrivateKey {
        /// Path to the private key file.
        path: PathBuf,
        /// Optional passphrase for encrypted keys.
        passphrase: Option<SecretString>,
    },
}

/// One target device with all overrides applied.
#[derive(Debug, Clone)]
pub struct Device {
    /// Hostname or IP address; the device's identity key.
    pub host: String,

    /// SSH port.
    pub port: u16,

    /// Username for authentication.
    pub username: String,

    /// Authentication method.
    pub auth: AuthMethod,

    /// Base per-command timeout. The session transport scales this with
    /// the failure count.
    pub command_timeout: Duration,

    /// Read batch size in bytes; also the prompt search depth.
    pub batch_size: usize,

    /// Allow legacy CBC ciphers.
    pub legacy_ciphers: bool,

    /// Host key verification policy.
    pub host_key_verification: HostKeyVerification,

    /// Enabled feature set.
    pub features: FeatureSet,
}

impl Device {
    /// Apply a device entry's overrides on top of the global defaults.
    pub fn resolve(config: &Config, entry: &DeviceConfig) -> Self {
        let features = match &entry.features {
            Some(overrides) => overrides.resolve(&config.features),
            None => config.features.resolve(&Default::default()),
        };

        Self {
            host: entry.host.clone(),
            port: entry.port.unwrap_or(DEFAULT_SSH_PORT),
            username: entry
                .username
                .clone()
                .unwrap_or_else(|| config.username.clone()),
            auth: resolve_auth(config, entry),
            command_timeout: Duration::from_secs(entry.timeout.unwrap_or(config.timeout)),
            batch_size: entry.batch_size.unwrap_or(config.batch_size),
            legacy_ciphers: entry.legacy_ciphers.unwrap_or(config.legacy_ciphers),
            host_key_verification: config.host_key_verification.clone(),
            features,
        }
    }
}

fn resolve_auth(config: &Config, entry: &DeviceConfig) -> AuthMethod {
    if let Some(password) = entry.password.clone().or_else(|| config.password.clone()) {
        return AuthMethod::Password(password);
    }
    if let Some(path) = entry.key_file.clone().or_else(|| config.key_file.clone()) {
        return AuthMethod::PrivateKey {
            path,
            passphrase: None,
        };
    }
    AuthMethod::None
}
