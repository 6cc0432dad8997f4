//! Pluggable collector units and their registry.
//!
//! A collector unit issues commands through a [`Client`] and emits
//! domain-specific gauges. Units are stateless across scrapes and may
//! be invoked concurrently for different devices, so `collect` keeps
//! no per-call mutable state outside locals.

mod arp;
mod environment;
mod facts;
mod optics;
pub mod registry;
mod uptime;

pub use arp::ArpCollector;
pub use environment::EnvironmentCollector;
pub use facts::FactsCollector;
pub use optics::OpticsCollector;
pub use registry::{CollectorFactory, CollectorRegistry};
pub use uptime::UptimeCollector;

use async_trait::async_trait;
use log::debug;

use crate::client::Client;
use crate::error::CollectorError;
use crate::metrics::{Desc, MetricSink};

/// Scheduling band. Light units are scheduled before heavy ones so
/// cheap metrics survive a device deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum UnitCost {
    Light,
    Heavy,
}

/// Capability contract for one metric domain.
#[async_trait]
pub trait Collector: Send + Sync {
    /// Stable unit name, used as the `collector` label value.
    fn name(&self) -> &'static str;

    /// Scheduling band; heavyweight table scrapers should say so.
    fn cost(&self) -> UnitCost {
        UnitCost::Heavy
    }

    /// Append this unit's metric descriptors.
    fn describe(&self, descs: &mut Vec<Desc>);

    /// Collect metrics for one device. `labels` carries the label
    /// prefix (the target host).
    async fn collect(
        &self,
        client: &Client,
        sink: &MetricSink,
        labels: &[String],
    ) -> Result<(), CollectorError>;
}

/// Parse a numeric CLI field, treating garbage as zero. Device output
/// is best-effort; one mangled field should not sink a whole table.
pub(crate) fn parse_f64(field: &str) -> f64 {
    match field.trim().parse() {
        Ok(value) => value,
        Err(_) => {
            debug!("could not parse '{field}' as a number");
            0.0
        }
    }
}

/// Base labels plus unit-specific label values.
pub(crate) fn with_labels(base: &[String], extra: &[&str]) -> Vec<String> {
    let mut labels = base.to_vec();
    labels.extend(extra.iter().map(|s| s.to_string()));
    labels
}
