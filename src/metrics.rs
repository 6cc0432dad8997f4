//! Metric stream model handed to the exposition layer.
//!
//! The core does not render a wire format. It produces a stream of
//! [`Sample`] values over a bounded channel; a pull-based exporter owns
//! the receiving side and is responsible for exposition.

use tokio::sync::mpsc;

use crate::error::SinkClosed;

/// Descriptor for a metric family: name, help text and label names.
///
/// Const-constructible so collectors can declare their descriptors as
/// associated constants instead of global registries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Desc {
    /// Fully-qualified metric name (e.g. `cisco_up`).
    pub name: &'static str,

    /// Help text.
    pub help: &'static str,

    /// Ordered label names.
    pub labels: &'static [&'static str],
}

impl Desc {
    /// Create a new descriptor.
    pub const fn new(
        name: &'static str,
        help: &'static str,
        labels: &'static [&'static str],
    ) -> Self {
        Self { name, help, labels }
    }
}

/// One gauge sample: a descriptor's name, a value and label values.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Metric name, taken from the descriptor.
    pub name: &'static str,

    /// Gauge value.
    pub value: f64,

    /// Label values, in the descriptor's label order.
    pub labels: Vec<String>,
}

impl Sample {
    /// Build a gauge sample for a descriptor.
    pub fn gauge(desc: &Desc, value: f64, labels: Vec<String>) -> Self {
        debug_assert_eq!(desc.labels.len(), labels.len());
        Self {
            name: desc.name,
            value,
            labels,
        }
    }
}

/// Sending half of the metric stream.
///
/// Cloneable; every collector task holds one. A send error means the
/// consumer dropped the receiver, which is the only condition that is
/// fatal to an overall scrape.
#[derive(Debug, Clone)]
pub struct MetricSink {
    tx: mpsc::Sender<Sample>,
}

impl MetricSink {
    /// Wrap an existing channel sender.
    pub fn new(tx: mpsc::Sender<Sample>) -> Self {
        Self { tx }
    }

    /// Create a sink together with its receiving half.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Sample>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Send one sample.
    pub async fn send(&self, sample: Sample) -> std::result::Result<(), SinkClosed> {
        self.tx.send(sample).await.map_err(|_| SinkClosed)
    }

    /// Whether the receiving half has been dropped. Producers check
    /// this before scheduling work whose samples would be lost.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Send one gauge sample for a descriptor.
    pub async fn gauge(
        &self,
        desc: &Desc,
        value: f64,
        labels: Vec<String>,
    ) -> std::result::Result<(), SinkClosed> {
        self.send(Sample::gauge(desc, value, labels)).await
    }
}
