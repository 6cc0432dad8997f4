//! Collector registry: feature-gated unit sets per device.
//!
//! Units are stateless, so a single instance of each enabled unit is
//! shared across all devices that enable it. Per-device sets are
//! resolved once at build time and ordered light-before-heavy.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;

use super::{
    ArpCollector, Collector, EnvironmentCollector, FactsCollector, OpticsCollector,
    UptimeCollector,
};
use crate::device::Device;

/// Constructor for one collector unit.
pub type CollectorFactory = fn() -> Arc<dyn Collector>;

/// The built-in units, in registration order. Keys are the feature
/// names used in configuration.
pub fn builtin_factories() -> IndexMap<&'static str, CollectorFactory> {
    let mut factories: IndexMap<&'static str, CollectorFactory> = IndexMap::new();
    factories.insert("facts", || Arc::new(FactsCollector::new()));
    factories.insert("uptime", || Arc::new(UptimeCollector::new()));
    factories.insert("arp", || Arc::new(ArpCollector::new()));
    factories.insert("environment", || Arc::new(EnvironmentCollector::new()));
    factories.insert("optics", || Arc::new(OpticsCollector::new()));
    factories
}

/// Resolved unit sets for a fleet of devices.
pub struct CollectorRegistry {
    shared: IndexMap<&'static str, Arc<dyn Collector>>,
    by_device: HashMap<String, Vec<Arc<dyn Collector>>>,
}

impl CollectorRegistry {
    /// Build unit sets for `devices` from the built-in factories.
    pub fn build(devices: &[Device]) -> Self {
        Self::with_factories(devices, builtin_factories())
    }

    /// Build from an explicit factory table.
    pub fn with_factories(
        devices: &[Device],
        factories: IndexMap<&'static str, CollectorFactory>,
    ) -> Self {
        let mut shared: IndexMap<&'static str, Arc<dyn Collector>> = IndexMap::new();
        let mut by_device = HashMap::new();

        for device in devices {
            let mut units = Vec::new();
            for (key, factory) in &factories {
                if device.features.enabled(key) {
                    let unit = shared.entry(*key).or_insert_with(|| factory()).clone();
                    units.push(unit);
                }
            }
            // Stable sort keeps registration order within a band.
            units.sort_by_key(|unit| unit.cost());
            by_device.insert(device.host.clone(), units);
        }

        Self { shared, by_device }
    }

    /// The unit set for one device. Unknown hosts get no units.
    pub fn units_for(&self, host: &str) -> &[Arc<dyn Collector>] {
        self.by_device.get(host).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every instantiated unit, in registration order.
    pub fn all_units(&self) -> impl Iterator<Item = &Arc<dyn Collector>> {
        self.shared.values()
    }

    #[cfg(test)]
    pub(crate) fn from_units(host: &str, units: Vec<Arc<dyn Collector>>) -> Self {
        let mut shared = IndexMap::new();
        for unit in &units {
            shared.insert(unit.name(), unit.clone());
        }
        let mut by_device = HashMap::new();
        by_device.insert(host.to_string(), units);
        Self { shared, by_device }
    }
}
