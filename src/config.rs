//! Configuration model: global defaults plus per-device overrides.
//!
//! These types are serde-compatible so an outer binary can load them
//! from YAML or JSON; the crate itself never touches the filesystem.
//! All values are resolved into immutable [`Device`](crate::Device)
//! descriptions before any scraping starts.

use std::path::PathBuf;

use secrecy::SecretString;
use serde::Deserialize;

use crate::device::Device;
use crate::transport::HostKeyVerification;

/// Default per-command base timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// Default read batch size (bytes per channel read, and the prompt
/// search depth).
pub const DEFAULT_BATCH_SIZE: usize = 10_000;

/// Default SSH port.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Global configuration with per-device override entries.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Username used for devices without an override.
    pub username: String,

    /// Password used for devices without an override.
    pub password: Option<SecretString>,

    /// Private key file used for devices without an override.
    pub key_file: Option<PathBuf>,

    /// Base command timeout in seconds.
    pub timeout: u64,

    /// Read batch size in bytes.
    pub batch_size: usize,

    /// Allow legacy CBC ciphers for old IOS images.
    pub legacy_ciphers: bool,

    /// Host key verification policy for all devices.
    pub host_key_verification: HostKeyVerification,

    /// Device entries.
    pub devices: Vec<DeviceConfig>,

    /// Global feature toggles; unset toggles default to enabled.
    pub features: FeatureConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            username: String::new(),
            password: None,
            key_file: None,
            timeout: DEFAULT_TIMEOUT_SECS,
            batch_size: DEFAULT_BATCH_SIZE,
            legacy_ciphers: false,
            host_key_verification: HostKeyVerification::default(),
            devices: Vec::new(),
            features: FeatureConfig::default(),
        }
    }
}

impl Config {
    /// Replace the device list with entries built from a comma-separated
    /// host list (the `ssh.targets` flag form).
    pub fn devices_from_targets(&mut self, targets: &str) {
        self.devices = targets
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|t| DeviceConfig {
                host: t.to_string(),
                ..DeviceConfig::default()
            })
            .collect();
    }

    /// Resolve the feature set for one host: the device override wins
    /// where present, else the global default, else enabled.
    pub fn features_for(&self, host: &str) -> FeatureSet {
        match self.device_config(host).and_then(|d| d.features.as_ref()) {
            Some(overrides) => overrides.resolve(&self.features),
            None => self.features.resolve(&FeatureConfig::default()),
        }
    }

    /// Resolve every device entry into an immutable [`Device`].
    pub fn resolve_devices(&self) -> Vec<Device> {
        self.devices.iter().map(|d| Device::resolve(self, d)).collect()
    }

    pub(crate) fn device_config(&self, host: &str) -> Option<&DeviceConfig> {
        self.devices.iter().find(|d| d.host == host)
    }
}

/// One device entry. Unset fields fall back to the global defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Hostname or IP address. This is the device's identity key.
    pub host: String,

    /// SSH port (default 22).
    pub port: Option<u16>,

    pub username: Option<String>,
    pub password: Option<SecretString>,
    pub key_file: Option<PathBuf>,

    /// Allow legacy CBC ciphers for this device.
    pub legacy_ciphers: Option<bool>,

    /// Base command timeout in seconds.
    pub timeout: Option<u64>,

    /// Read batch size in bytes.
    pub batch_size: Option<usize>,

    /// Per-device feature toggles.
    pub features: Option<FeatureConfig>,
}

/// Boolean feature toggles. `None` means "inherit".
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    pub facts: Option<bool>,
    pub uptime: Option<bool>,
    pub arp: Option<bool>,
    pub environment: Option<bool>,
    pub optics: Option<bool>,
}

impl FeatureConfig {
    /// Resolve against a fallback layer. Toggles unset in both layers
    /// default to enabled.
    pub fn resolve(&self, fallback: &FeatureConfig) -> FeatureSet {
        FeatureSet {
            facts: self.facts.or(fallback.facts).unwrap_or(true),
            uptime: self.uptime.or(fallback.uptime).unwrap_or(true),
            arp: self.arp.or(fallback.arp).unwrap_or(true),
            environment: self.environment.or(fallback.environment).unwrap_or(true),
            optics: self.optics.or(fallback.optics).unwrap_or(true),
        }
    }

    /// A configuration with every toggle disabled.
    pub fn all_disabled() -> Self {
        Self {
            facts: Some(false),
            uptime: Some(false),
            arp: Some(false),
            environment: Some(false),
            optics: Some(false),
        }
    }
}

/// Fully-resolved feature flags for one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureSet {
    pub facts: bool,
    pub uptime: bool,
    pub arp: bool,
    pub environment: bool,
    pub optics: bool,
}

impl FeatureSet {
    /// Look up a toggle by its feature key.
    pub fn enabled(&self, key: &str) -> bool {
        match key {
            "facts" => self.facts,
            "uptime" => self.uptime,
            "arp" => self.arp,
            "environment" => self.environment,
            "optics" => self.optics,
            _ => false,
        }
    }
}
