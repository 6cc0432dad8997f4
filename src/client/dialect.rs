//! Device OS dialect identification.
//!
//! Dialect handling is a closed enumeration the core dispatches on;
//! there is no generic grammar for vendor CLI variants.

use std::fmt;

/// Diagnostic command whose output identifies the running OS.
pub const IDENTIFY_COMMAND: &str = "show version";

/// The device operating-system variant. Determines which commands and
/// response formats are valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// IOS XE (Catalyst 9k and friends).
    IosXe,
    /// NX-OS (Nexus).
    NxOs,
    /// Classic IOS.
    Ios,
}

impl Dialect {
    /// Classify `show version` output by substring match. Order
    /// matters: IOS XE output also mentions plain IOS.
    pub fn classify(output: &str) -> Option<Dialect> {
        if output.contains("IOS XE") {
            Some(Dialect::IosXe)
        } else if output.contains("NX-OS") {
            Some(Dialect::NxOs)
        } else if output.contains("IOS Software") {
            Some(Dialect::Ios)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::IosXe => "IOS-XE",
            Dialect::NxOs => "NX-OS",
            Dialect::Ios => "IOS",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
