//! # Ciscometer
//!
//! Async SSH metrics scraper core for Cisco network devices.
//!
//! Ciscometer opens interactive SSH shells on IOS, IOS XE and NX-OS
//! devices, runs `show` commands through a serialized session with a
//! circuit breaker and adaptive timeouts, parses the output with
//! dialect-aware collector units and streams gauge samples to a sink.
//! Exposition (Prometheus or otherwise) is left to the embedding
//! binary.
//!
//! ## Features
//!
//! - Async SSH sessions via russh, with prompt-framed command I/O
//! - Per-session circuit breaker and failure-scaled timeouts
//! - Dialect identification (IOS XE / NX-OS / IOS) from `show version`
//! - TTL response cache shared by the units of one scrape
//! - Bounded fan-out over devices and collector units, with a hard
//!   per-device deadline
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ciscometer::{Config, MetricSink, Scraper};
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut config = Config::default();
//!     config.username = "monitor".into();
//!     config.devices_from_targets("sw1.example.net,sw2.example.net");
//!
//!     let scraper = Scraper::new(&config);
//!     let (sink, mut samples) = MetricSink::channel(1024);
//!
//!     tokio::spawn(async move { scraper.collect(&sink).await });
//!     while let Some(sample) = samples.recv().await {
//!         println!("{} {:?} {}", sample.name, sample.labels, sample.value);
//!     }
//! }
//! ```

pub mod client;
pub mod collector;
pub mod config;
pub mod device;
pub mod error;
pub mod metrics;
pub mod scrape;
pub mod transport;

// Re-export main types for convenience
pub use client::{Client, Dialect};
pub use collector::{Collector, CollectorRegistry, UnitCost};
pub use config::{Config, DeviceConfig, FeatureConfig, FeatureSet};
pub use device::{AuthMethod, Device};
pub use error::{ClientError, CollectorError, Error, Result, TransportError};
pub use metrics::{Desc, MetricSink, Sample};
pub use scrape::{Connector, ScrapeOptions, Scraper, SshConnector};
pub use transport::{HostKeyVerification, Session, SessionOptions};
